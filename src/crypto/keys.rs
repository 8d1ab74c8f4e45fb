//! Key material that must not outlive its use.

use std::fmt;

use zeroize::Zeroize;

use super::KEY_LEN;
use crate::error::CryptoError;

/// A 256-bit master key derived from the user's password.
///
/// Only ever held in memory during setup or unlock. Zeroized on drop.
#[derive(Clone)]
pub struct MasterKey {
    bytes: [u8; KEY_LEN],
}

impl MasterKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Builds a master key from a slice, rejecting anything but 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            CryptoError::WrapFailure(format!(
                "master key must be {KEY_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// The vault encryption key. Persisted only in wrapped form.
#[derive(Clone)]
pub struct Vek {
    bytes: [u8; KEY_LEN],
}

impl Vek {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl Drop for Vek {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl fmt::Debug for Vek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vek").field("bytes", &"[REDACTED]").finish()
    }
}
