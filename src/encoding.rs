//! Base64 helpers for moving key material through JSON and text fields.

use base64::{
    Engine,
    engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD},
};

pub use base64::DecodeError;

/// Encode bytes with the standard, padded alphabet (the wire format).
pub fn to_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decode a standard, padded base64 string.
pub fn from_base64(encoded: &str) -> Result<Vec<u8>, DecodeError> {
    STANDARD.decode(encoded)
}

/// Encode bytes with the URL-safe, padded alphabet.
pub fn to_base64_url(data: &[u8]) -> String {
    URL_SAFE.encode(data)
}

pub fn from_base64_url(encoded: &str) -> Result<Vec<u8>, DecodeError> {
    URL_SAFE.decode(encoded)
}

/// Encode bytes with the URL-safe alphabet and no padding.
pub fn to_base64_url_raw(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

pub fn from_base64_url_raw(encoded: &str) -> Result<Vec<u8>, DecodeError> {
    URL_SAFE_NO_PAD.decode(encoded)
}

/// Serde adapter storing `Vec<u8>` fields as standard base64 strings.
///
/// ```ignore
/// #[serde(with = "crate::encoding::base64_bytes")]
/// wrapped_vek: Vec<u8>,
/// ```
pub mod base64_bytes {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::to_base64(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        super::from_base64(&encoded).map_err(D::Error::custom)
    }
}
