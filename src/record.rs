//! The wrapped VEK as the server stores it, and the seam to that server.

use anyhow::{Context, Result, bail};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::{KdfParams, NONCE_LEN, SALT_LEN, Salt, TAG_LEN, WrappedVek};
use crate::encoding::base64_bytes;
use crate::error::CryptoError;
use crate::storage::Storage;

/// Version assigned to the first wrap of a VEK.
pub const FIRST_VERSION: i32 = 1;

/// Everything needed to re-derive the master key and unwrap the VEK,
/// except the password.
///
/// Field names match the server's vault key API.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VaultKeyRecord {
    #[serde(with = "base64_bytes")]
    wrapped_vek: Vec<u8>,
    #[serde(with = "base64_bytes")]
    wrap_iv: Vec<u8>,
    #[serde(with = "base64_bytes")]
    wrap_tag: Vec<u8>,
    #[serde(with = "base64_bytes")]
    kdf_salt: Vec<u8>,
    kdf_params: KdfParams,
    #[serde(default = "first_version")]
    version: i32,
    #[serde(default)]
    created_at: String,
    #[serde(default)]
    updated_at: String,
}

fn first_version() -> i32 {
    FIRST_VERSION
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl VaultKeyRecord {
    pub fn new(salt: &Salt, kdf_params: KdfParams, wrapped: &WrappedVek) -> Self {
        let ts = now();
        Self {
            wrapped_vek: wrapped.ciphertext.clone(),
            wrap_iv: wrapped.nonce.to_vec(),
            wrap_tag: wrapped.tag.to_vec(),
            kdf_salt: salt.to_vec(),
            kdf_params,
            version: FIRST_VERSION,
            created_at: ts.clone(),
            updated_at: ts,
        }
    }

    /// Same salt and parameters, new wrap, next version.
    pub fn rewrapped(&self, wrapped: &WrappedVek) -> Result<Self> {
        let version = self
            .version
            .checked_add(1)
            .context("vault key record version is exhausted")?;
        Ok(Self {
            wrapped_vek: wrapped.ciphertext.clone(),
            wrap_iv: wrapped.nonce.to_vec(),
            wrap_tag: wrapped.tag.to_vec(),
            version,
            updated_at: now(),
            ..self.clone()
        })
    }

    /// The wrapped triple.
    ///
    /// A nonce or tag of the wrong length cannot have come from a wrap, so it
    /// is reported the same way as any other tampering.
    pub fn wrapped(&self) -> Result<WrappedVek, CryptoError> {
        let nonce: [u8; NONCE_LEN] = self
            .wrap_iv
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::AuthenticationFailure)?;
        let tag: [u8; TAG_LEN] = self
            .wrap_tag
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::AuthenticationFailure)?;

        Ok(WrappedVek {
            ciphertext: self.wrapped_vek.clone(),
            nonce,
            tag,
        })
    }

    pub fn salt(&self) -> Result<Salt> {
        match self.kdf_salt.as_slice().try_into() {
            Ok(salt) => Ok(salt),
            Err(_) => bail!(
                "record salt must be {SALT_LEN} bytes, got {}",
                self.kdf_salt.len()
            ),
        }
    }

    pub fn kdf_params(&self) -> &KdfParams {
        &self.kdf_params
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn created_at(&self) -> &str {
        &self.created_at
    }

    pub fn updated_at(&self) -> &str {
        &self.updated_at
    }
}

/// Durable home of the [`VaultKeyRecord`], normally the server.
pub trait KeyEscrow {
    /// Persists the record, replacing any previous one.
    fn store(&self, record: &VaultKeyRecord) -> Result<()>;

    /// Returns the current record, if any.
    fn fetch(&self) -> Result<Option<VaultKeyRecord>>;
}

/// Keeps the record in a local JSON file.
#[derive(Clone, Debug)]
pub struct FileEscrow {
    storage: Storage,
}

impl FileEscrow {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }
}

impl KeyEscrow for FileEscrow {
    fn store(&self, record: &VaultKeyRecord) -> Result<()> {
        let data = serde_json::to_vec_pretty(record)?;
        self.storage
            .save(&data)
            .context("failed to store vault key record")
    }

    fn fetch(&self) -> Result<Option<VaultKeyRecord>> {
        match self.storage.load_if_exists()? {
            Some(data) => Ok(Some(
                serde_json::from_slice(&data).context("vault key record is corrupted")?,
            )),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KEY_LEN;
    use tempfile::tempdir;

    fn sample_wrap(fill: u8) -> WrappedVek {
        WrappedVek {
            ciphertext: vec![fill; KEY_LEN],
            nonce: [fill; NONCE_LEN],
            tag: [fill; TAG_LEN],
        }
    }

    #[test]
    fn new_record_starts_at_first_version() {
        let record = VaultKeyRecord::new(&[5u8; SALT_LEN], KdfParams::default(), &sample_wrap(1));

        assert_eq!(record.version(), FIRST_VERSION);
        assert_eq!(record.created_at(), record.updated_at());
        assert_eq!(record.salt().unwrap(), [5u8; SALT_LEN]);
        assert_eq!(record.wrapped().unwrap(), sample_wrap(1));
    }

    #[test]
    fn rewrapped_keeps_salt_and_bumps_version() {
        let record = VaultKeyRecord::new(&[5u8; SALT_LEN], KdfParams::mobile(), &sample_wrap(1));
        let next = record.rewrapped(&sample_wrap(2)).unwrap();

        assert_eq!(next.version(), 2);
        assert_eq!(next.salt().unwrap(), record.salt().unwrap());
        assert_eq!(next.kdf_params(), record.kdf_params());
        assert_eq!(next.created_at(), record.created_at());
        assert_eq!(next.wrapped().unwrap(), sample_wrap(2));
    }

    #[test]
    fn rewrapped_at_max_version_fails() {
        let mut record =
            VaultKeyRecord::new(&[5u8; SALT_LEN], KdfParams::default(), &sample_wrap(1));
        record.version = i32::MAX;

        assert!(record.rewrapped(&sample_wrap(2)).is_err());
    }

    #[test]
    fn json_uses_server_field_names() {
        let record = VaultKeyRecord::new(&[0u8; SALT_LEN], KdfParams::default(), &sample_wrap(0));
        let json = serde_json::to_value(&record).unwrap();

        for field in [
            "wrapped_vek",
            "wrap_iv",
            "wrap_tag",
            "kdf_salt",
            "kdf_params",
            "version",
            "created_at",
            "updated_at",
        ] {
            assert!(json.get(field).is_some(), "missing {field}");
        }
        assert_eq!(json["wrap_iv"], serde_json::json!("AAAAAAAAAAAAAAAA"));
        assert_eq!(json["kdf_params"]["memory"], serde_json::json!(65536));
    }

    #[test]
    fn server_payload_without_optional_fields_parses() {
        let json = format!(
            r#"{{"wrapped_vek":"{}","wrap_iv":"{}","wrap_tag":"{}","kdf_salt":"{}",
                "kdf_params":{{"time":3,"memory":65536,"parallelism":2,"keyLen":32}}}}"#,
            crate::encoding::to_base64(&[1u8; KEY_LEN]),
            crate::encoding::to_base64(&[2u8; NONCE_LEN]),
            crate::encoding::to_base64(&[3u8; TAG_LEN]),
            crate::encoding::to_base64(&[4u8; SALT_LEN]),
        );

        let record: VaultKeyRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record.version(), FIRST_VERSION);
        assert_eq!(record.kdf_params(), &KdfParams::default());
    }

    #[test]
    fn malformed_lengths_are_authentication_failures() {
        let mut record =
            VaultKeyRecord::new(&[0u8; SALT_LEN], KdfParams::default(), &sample_wrap(0));
        record.wrap_iv.pop();
        assert_eq!(
            record.wrapped().unwrap_err(),
            CryptoError::AuthenticationFailure
        );

        let mut record =
            VaultKeyRecord::new(&[0u8; SALT_LEN], KdfParams::default(), &sample_wrap(0));
        record.wrap_tag.push(0);
        assert!(record.wrapped().is_err());

        record.kdf_salt.truncate(16);
        assert!(record.salt().is_err());
    }

    #[test]
    fn file_escrow_roundtrip() {
        let dir = tempdir().unwrap();
        let escrow = FileEscrow::new(Storage::new(dir.path().join("vault-key.json")));

        assert!(escrow.fetch().unwrap().is_none());

        let record = VaultKeyRecord::new(&[8u8; SALT_LEN], KdfParams::default(), &sample_wrap(3));
        escrow.store(&record).unwrap();

        assert_eq!(escrow.fetch().unwrap(), Some(record));
    }
}
