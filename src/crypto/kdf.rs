use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};

use super::{KEY_LEN, MasterKey, Salt};
use crate::error::CryptoError;

/// Memory floor (KiB) below which parameters are accepted but considered weak.
pub const RECOMMENDED_MIN_MEM_KIB: u32 = 8 * 1024;

/// Argon2id parameters.
///
/// Every party deriving the same master key must use identical values, so
/// they travel with the wrapped key record. The JSON shape is
/// `{"time":3,"memory":65536,"parallelism":2,"keyLen":32}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    #[serde(rename = "time")]
    time_cost: u32,
    #[serde(rename = "memory")]
    mem_cost_kib: u32,
    parallelism: u32,
    #[serde(rename = "keyLen", default = "default_key_len")]
    key_len: u32,
}

fn default_key_len() -> u32 {
    KEY_LEN as u32
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            time_cost: 3,
            mem_cost_kib: 64 * 1024, // 64 MiB
            parallelism: 2,
            key_len: KEY_LEN as u32,
        }
    }
}

impl KdfParams {
    pub fn new(mem_cost_kib: u32, time_cost: u32, parallelism: u32) -> Result<Self, CryptoError> {
        let params = Self {
            time_cost,
            mem_cost_kib,
            parallelism,
            key_len: KEY_LEN as u32,
        };
        params.validate()?;
        Ok(params)
    }

    /// Lighter profile for constrained devices.
    pub fn mobile() -> Self {
        Self {
            time_cost: 2,
            mem_cost_kib: 32 * 1024,
            parallelism: 2,
            key_len: KEY_LEN as u32,
        }
    }

    pub fn mem_cost_kib(&self) -> u32 {
        self.mem_cost_kib
    }

    pub fn time_cost(&self) -> u32 {
        self.time_cost
    }

    pub fn parallelism(&self) -> u32 {
        self.parallelism
    }

    pub fn key_len(&self) -> u32 {
        self.key_len
    }

    pub fn is_below_recommended(&self) -> bool {
        self.mem_cost_kib < RECOMMENDED_MIN_MEM_KIB
    }

    pub fn validate(&self) -> Result<(), CryptoError> {
        let invalid = |msg: &str| Err(CryptoError::DerivationUnavailable(msg.to_string()));

        if self.time_cost < 1 {
            return invalid("argon2 time cost must be >= 1");
        }
        if self.parallelism < 1 {
            return invalid("argon2 parallelism must be >= 1");
        }
        if self
            .parallelism
            .checked_mul(8)
            .is_none_or(|min| self.mem_cost_kib < min)
        {
            return invalid("argon2 memory cost must be at least 8 * parallelism");
        }
        if self.key_len != KEY_LEN as u32 {
            return invalid("master key length must be 32 bytes");
        }
        Ok(())
    }
}

/// Derive the master key from a password and salt with Argon2id.
///
/// Deterministic for fixed inputs and parameters.
pub fn derive_master_key(
    password: &str,
    salt: &Salt,
    kdf: &KdfParams,
) -> Result<MasterKey, CryptoError> {
    kdf.validate()?;

    let params = Params::new(
        kdf.mem_cost_kib,
        kdf.time_cost,
        kdf.parallelism,
        Some(KEY_LEN),
    )
    .map_err(|e| CryptoError::DerivationUnavailable(format!("argon2 params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = [0u8; KEY_LEN];
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut key)
        .map_err(|e| CryptoError::DerivationUnavailable(format!("argon2: {e}")))?;

    Ok(MasterKey::from_bytes(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::generate_salt;

    fn fast() -> KdfParams {
        KdfParams::new(1024, 1, 2).unwrap()
    }

    #[test]
    fn defaults_match_server_parameters() {
        let kdf = KdfParams::default();
        assert_eq!(kdf.time_cost(), 3);
        assert_eq!(kdf.mem_cost_kib(), 65536);
        assert_eq!(kdf.parallelism(), 2);
        assert_eq!(kdf.key_len(), 32);
    }

    #[test]
    fn kdf_is_deterministic() {
        let salt = [42u8; 32];

        let k1 = derive_master_key("password", &salt, &fast()).unwrap();
        let k2 = derive_master_key("password", &salt, &fast()).unwrap();

        assert_eq!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn different_salts_give_different_keys() {
        let s1 = generate_salt().unwrap();
        let s2 = generate_salt().unwrap();

        let k1 = derive_master_key("Correct-Horse1!", &s1, &fast()).unwrap();
        let k2 = derive_master_key("Correct-Horse1!", &s2, &fast()).unwrap();

        assert_ne!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn different_passwords_give_different_keys() {
        let salt = [1u8; 32];

        let k1 = derive_master_key("pw-a", &salt, &fast()).unwrap();
        let k2 = derive_master_key("pw-b", &salt, &fast()).unwrap();

        assert_ne!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn kdf_params_affect_output() {
        let salt = [7u8; 32];

        let kdf1 = KdfParams::new(1024, 1, 2).unwrap();
        let kdf2 = KdfParams::new(2048, 1, 2).unwrap();

        let k1 = derive_master_key("pw", &salt, &kdf1).unwrap();
        let k2 = derive_master_key("pw", &salt, &kdf2).unwrap();

        assert_ne!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn empty_password_still_derives() {
        assert!(derive_master_key("", &[3u8; 32], &fast()).is_ok());
    }

    #[test]
    fn kdf_invalid_params_fail_gracefully() {
        assert!(matches!(
            KdfParams::new(0, 0, 0),
            Err(CryptoError::DerivationUnavailable(_))
        ));
        assert!(KdfParams::new(8, 1, 2).is_err());
    }

    #[test]
    fn huge_parallelism_from_record_is_rejected() {
        let kdf: KdfParams = serde_json::from_str(
            r#"{"time":1,"memory":1024,"parallelism":536870913,"keyLen":32}"#,
        )
        .unwrap();

        assert!(matches!(
            kdf.validate(),
            Err(CryptoError::DerivationUnavailable(_))
        ));
        assert!(derive_master_key("pw", &[0u8; 32], &kdf).is_err());
    }

    #[test]
    fn wrong_key_len_is_rejected_before_deriving() {
        let kdf: KdfParams =
            serde_json::from_str(r#"{"time":1,"memory":1024,"parallelism":1,"keyLen":16}"#)
                .unwrap();
        assert!(derive_master_key("pw", &[0u8; 32], &kdf).is_err());
    }

    #[test]
    fn params_use_server_json_shape() {
        let json = serde_json::to_value(KdfParams::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"time": 3, "memory": 65536, "parallelism": 2, "keyLen": 32})
        );

        let parsed: KdfParams =
            serde_json::from_str(r#"{"time":2,"memory":32768,"parallelism":2}"#).unwrap();
        assert_eq!(parsed, KdfParams::mobile());
    }

    #[test]
    fn weak_memory_is_flagged() {
        assert!(fast().is_below_recommended());
        assert!(!KdfParams::default().is_below_recommended());
        assert!(!KdfParams::mobile().is_below_recommended());
    }
}
