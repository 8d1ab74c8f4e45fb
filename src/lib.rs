//! Client-side vault key management.
//!
//! A random vault encryption key (VEK) is wrapped with AES-256-GCM under a
//! master key derived from the user's password with Argon2id. The wrapped
//! key lives in a [`KeyEscrow`] (normally the server); the salt and a
//! setup-completed flag live in a local [`SetupStore`].

pub mod crypto;
pub mod encoding;
mod error;
pub mod record;
pub mod setup;
mod storage;

pub use crate::crypto::{KdfParams, Salt, Vek};
pub use crate::error::CryptoError;
pub use crate::record::{FileEscrow, KeyEscrow, VaultKeyRecord};
pub use crate::setup::{SetupState, SetupStore};
pub use crate::storage::Storage;

use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use zeroize::Zeroizing;

/// Drives setup, unlock and password changes for one account.
pub struct VaultKeys<E: KeyEscrow> {
    setup: SetupStore,
    escrow: E,
    kdf: KdfParams,
}

impl<E: KeyEscrow> VaultKeys<E> {
    pub fn new(setup: SetupStore, escrow: E) -> Self {
        Self {
            setup,
            escrow,
            kdf: KdfParams::default(),
        }
    }

    /// Parameters used for new setups. Unlock always uses the record's.
    pub fn with_kdf(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    pub fn escrow(&self) -> &E {
        &self.escrow
    }

    pub fn status(&self) -> Result<SetupState> {
        self.setup.load()
    }

    /// First-time setup: new salt, new VEK, wrapped and handed to the escrow.
    ///
    /// Setup state is written only after the escrow accepted the record.
    pub fn setup(&self, password: Zeroizing<String>) -> Result<Vek> {
        if self.setup.load()?.has_setup() {
            bail!("vault key setup already completed");
        }
        if self
            .escrow
            .fetch()
            .context("failed to fetch vault key record")?
            .is_some()
        {
            bail!("a vault key already exists for this account; use link to set up this device");
        }
        self.kdf.validate()?;

        let salt = crypto::generate_salt()?;
        let master = crypto::derive_master_key(&password, &salt, &self.kdf)
            .context("failed to derive master key")?;
        drop(password);

        let vek = crypto::generate_vek()?;
        let wrapped = crypto::wrap_vek(&vek, &master)?;

        let record = VaultKeyRecord::new(&salt, self.kdf, &wrapped);
        self.escrow
            .store(&record)
            .context("failed to store wrapped vault key")?;

        self.setup.set_salt(&salt)?;

        tracing::info!(version = record.version(), "vault key setup completed");
        Ok(vek)
    }

    /// Re-derives the master key from the stored salt and unwraps the VEK.
    pub fn unlock(&self, password: Zeroizing<String>) -> Result<Vek> {
        let state = self.setup.load()?;
        if !state.has_setup() {
            bail!("vault key setup has not been completed");
        }
        let salt = state
            .salt_bytes()?
            .context("setup state has no salt; link this device again")?;

        let record = self.fetch_record()?;
        if record.salt()? != salt {
            tracing::warn!("local salt differs from the stored vault key record");
        }

        let vek = open_record(&record, &salt, password)?;
        tracing::debug!(version = record.version(), "vault unlocked");
        Ok(vek)
    }

    /// Adopts an existing account on this device.
    ///
    /// The salt comes from the escrow record and is persisted locally only
    /// once the password has proven correct.
    pub fn link(&self, password: Zeroizing<String>) -> Result<Vek> {
        let record = self.fetch_record()?;
        let salt = record.salt()?;

        let vek = open_record(&record, &salt, password)?;
        self.setup.set_salt(&salt)?;

        tracing::info!(version = record.version(), "device linked to vault key");
        Ok(vek)
    }

    /// Rewraps the VEK under a master key from `new_password`.
    ///
    /// The salt is kept so existing setup state stays valid; the nonce is fresh.
    pub fn change_password(
        &self,
        old_password: Zeroizing<String>,
        new_password: Zeroizing<String>,
    ) -> Result<()> {
        let vek = self.unlock(old_password)?;
        let record = self.fetch_record()?;
        let salt = record.salt()?;

        let master = crypto::derive_master_key(&new_password, &salt, record.kdf_params())
            .context("failed to derive master key")?;
        drop(new_password);

        let wrapped = crypto::wrap_vek(&vek, &master)?;
        let next = record.rewrapped(&wrapped)?;
        self.escrow
            .store(&next)
            .context("failed to store rewrapped vault key")?;

        tracing::info!(version = next.version(), "vault key rewrapped");
        Ok(())
    }

    /// Forgets local setup state. The escrow record is untouched.
    pub fn reset(&self) -> Result<()> {
        self.setup.clear()
    }

    fn fetch_record(&self) -> Result<VaultKeyRecord> {
        self.escrow
            .fetch()
            .context("failed to fetch vault key record")?
            .context("no vault key record found")
    }
}

fn open_record(record: &VaultKeyRecord, salt: &Salt, password: Zeroizing<String>) -> Result<Vek> {
    let master = crypto::derive_master_key(&password, salt, record.kdf_params())
        .context("failed to derive master key")?;
    drop(password);

    let wrapped = record.wrapped()?;
    let vek = crypto::unwrap_vek(&wrapped, &master).inspect_err(|_| {
        tracing::debug!(version = record.version(), "vault key unwrap rejected");
    })?;
    Ok(vek)
}

/// Platform data directory for this application.
pub fn default_data_dir() -> Result<std::path::PathBuf> {
    let project_dirs =
        ProjectDirs::from("", "", "vaultkey").context("could not determine platform directories")?;
    Ok(project_dirs.data_dir().to_path_buf())
}

pub fn default_setup_store() -> Result<SetupStore> {
    Ok(SetupStore::new(Storage::new(
        default_data_dir()?.join("setup-state.json"),
    )))
}

pub fn default_escrow() -> Result<FileEscrow> {
    Ok(FileEscrow::new(Storage::new(
        default_data_dir()?.join("vault-key.json"),
    )))
}
