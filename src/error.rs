use thiserror::Error;

/// Failures of the key derivation and key wrapping primitives.
///
/// Only [`CryptoError::AuthenticationFailure`] is expected during normal
/// operation. The other kinds point at a broken environment or integration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// Argon2 rejected the parameters or could not run.
    #[error("key derivation unavailable: {0}")]
    DerivationUnavailable(String),

    /// The OS random generator could not be read.
    #[error("secure random source unavailable")]
    EntropyUnavailable,

    /// The cipher rejected its inputs, e.g. a key of the wrong length.
    #[error("failed to wrap vault key: {0}")]
    WrapFailure(String),

    /// Tag verification failed. Covers a wrong password as well as a
    /// corrupted ciphertext, nonce or tag; the causes are indistinguishable.
    #[error("incorrect password or corrupted vault")]
    AuthenticationFailure,
}

impl CryptoError {
    /// Returns `true` if `err` carries an authentication failure anywhere in its chain.
    pub fn is_authentication_failure(err: &anyhow::Error) -> bool {
        err.chain().any(|cause| {
            matches!(
                cause.downcast_ref::<CryptoError>(),
                Some(CryptoError::AuthenticationFailure)
            )
        })
    }
}
