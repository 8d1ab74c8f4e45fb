//! Cryptographic primitives for vault key setup and unlock.
//!
//! Key hierarchy:
//! ```text
//! password + salt --Argon2id--> master key (never stored)
//! random 256-bit VEK --AES-256-GCM(master key)--> (ciphertext, nonce, tag)
//! ```

pub mod kdf;
pub mod keys;
pub mod random;
pub mod wrap;

pub use kdf::{KdfParams, derive_master_key};
pub use keys::{MasterKey, Vek};
pub use random::{generate_nonce, generate_salt, generate_vek};
pub use wrap::{WrappedVek, unwrap_vek, unwrap_vek_with_aad, wrap_vek, wrap_vek_with_aad};

/// Length of the KDF salt (32 bytes).
pub const SALT_LEN: usize = 32;
/// Length of the master key and the VEK (32 bytes / 256 bits).
pub const KEY_LEN: usize = 32;
/// Length of the AES-GCM nonce (12 bytes / 96 bits).
pub const NONCE_LEN: usize = 12;
/// Length of the AES-GCM authentication tag (16 bytes / 128 bits).
pub const TAG_LEN: usize = 16;

/// A KDF salt.
pub type Salt = [u8; SALT_LEN];
