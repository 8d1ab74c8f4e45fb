//! AES-256-GCM wrapping of the vault encryption key.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use zeroize::Zeroizing;

use super::{KEY_LEN, MasterKey, NONCE_LEN, TAG_LEN, Vek, generate_nonce};
use crate::error::CryptoError;

/// A VEK encrypted under a master key.
///
/// The three parts are only meaningful together; changing any of them makes
/// [`unwrap_vek`] fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedVek {
    pub ciphertext: Vec<u8>,
    pub nonce: [u8; NONCE_LEN],
    pub tag: [u8; TAG_LEN],
}

/// Wrap `vek` under `master` with a fresh random nonce and no associated data.
pub fn wrap_vek(vek: &Vek, master: &MasterKey) -> Result<WrappedVek, CryptoError> {
    wrap_vek_with_aad(vek, master, &[])
}

/// Wrap `vek` under `master`, binding `aad` into the tag.
pub fn wrap_vek_with_aad(
    vek: &Vek,
    master: &MasterKey,
    aad: &[u8],
) -> Result<WrappedVek, CryptoError> {
    let cipher = Aes256Gcm::new_from_slice(master.as_bytes())
        .map_err(|e| CryptoError::WrapFailure(format!("cipher init: {e}")))?;

    let nonce = generate_nonce()?;

    let mut sealed = cipher
        .encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: vek.as_bytes(),
                aad,
            },
        )
        .map_err(|_| CryptoError::WrapFailure("encryption failed".to_string()))?;

    // sealed = ciphertext || tag
    if sealed.len() != KEY_LEN + TAG_LEN {
        return Err(CryptoError::WrapFailure(format!(
            "unexpected sealed length {}",
            sealed.len()
        )));
    }
    let tag_bytes = sealed.split_off(KEY_LEN);
    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(&tag_bytes);

    Ok(WrappedVek {
        ciphertext: sealed,
        nonce,
        tag,
    })
}

/// Unwrap a VEK. Decryption and tag verification happen in one step.
pub fn unwrap_vek(wrapped: &WrappedVek, master: &MasterKey) -> Result<Vek, CryptoError> {
    unwrap_vek_with_aad(wrapped, master, &[])
}

/// Unwrap a VEK that was wrapped with associated data `aad`.
pub fn unwrap_vek_with_aad(
    wrapped: &WrappedVek,
    master: &MasterKey,
    aad: &[u8],
) -> Result<Vek, CryptoError> {
    if wrapped.ciphertext.len() != KEY_LEN {
        return Err(CryptoError::AuthenticationFailure);
    }

    let cipher = Aes256Gcm::new_from_slice(master.as_bytes())
        .map_err(|e| CryptoError::WrapFailure(format!("cipher init: {e}")))?;

    let mut combined = Vec::with_capacity(KEY_LEN + TAG_LEN);
    combined.extend_from_slice(&wrapped.ciphertext);
    combined.extend_from_slice(&wrapped.tag);

    let plaintext = Zeroizing::new(
        cipher
            .decrypt(
                Nonce::from_slice(&wrapped.nonce),
                Payload {
                    msg: &combined,
                    aad,
                },
            )
            .map_err(|_| CryptoError::AuthenticationFailure)?,
    );

    let bytes: [u8; KEY_LEN] = plaintext
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::AuthenticationFailure)?;
    Ok(Vek::from_bytes(bytes))
}
