use super::{KEY_LEN, NONCE_LEN, SALT_LEN, Salt, Vek};
use crate::error::CryptoError;
use getrandom::fill;

/// Fill buffer with cryptographically secure random bytes
pub fn secure_random(buf: &mut [u8]) -> Result<(), CryptoError> {
    fill(buf).map_err(|_| CryptoError::EntropyUnavailable)
}

/// Generate a KDF salt
pub fn generate_salt() -> Result<Salt, CryptoError> {
    let mut salt = [0u8; SALT_LEN];
    secure_random(&mut salt)?;
    Ok(salt)
}

/// Generate an AES-GCM nonce
pub fn generate_nonce() -> Result<[u8; NONCE_LEN], CryptoError> {
    let mut nonce = [0u8; NONCE_LEN];
    secure_random(&mut nonce)?;
    Ok(nonce)
}

/// Generate a fresh vault encryption key
pub fn generate_vek() -> Result<Vek, CryptoError> {
    let mut bytes = [0u8; KEY_LEN];
    secure_random(&mut bytes)?;
    Ok(Vek::from_bytes(bytes))
}
