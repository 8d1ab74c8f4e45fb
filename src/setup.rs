//! Locally persisted setup state: the KDF salt and the has-completed-setup flag.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::crypto::{SALT_LEN, Salt};
use crate::encoding::{from_base64, to_base64};
use crate::storage::Storage;

/// What this device knows about key setup.
///
/// Persisted as `{"salt": "<base64>", "hasSetup": true}`.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SetupState {
    salt: Option<String>,
    has_setup: bool,
}

impl SetupState {
    pub fn has_setup(&self) -> bool {
        self.has_setup
    }

    /// The base64 salt, if one has been stored.
    pub fn salt(&self) -> Option<&str> {
        self.salt.as_deref()
    }

    /// The decoded salt, if one has been stored.
    pub fn salt_bytes(&self) -> Result<Option<Salt>> {
        let Some(encoded) = &self.salt else {
            return Ok(None);
        };
        let bytes = from_base64(encoded).context("stored salt is not valid base64")?;
        let salt: Salt = match bytes.try_into() {
            Ok(salt) => salt,
            Err(bytes) => bail!(
                "stored salt must be {SALT_LEN} bytes, got {}",
                bytes.len()
            ),
        };
        Ok(Some(salt))
    }
}

/// Reads and writes [`SetupState`] through a [`Storage`] file.
///
/// Every write replaces the whole file, so salt and flag are never observed
/// half-written.
#[derive(Clone, Debug)]
pub struct SetupStore {
    storage: Storage,
}

impl SetupStore {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Returns the persisted state, or the empty state before first setup.
    pub fn load(&self) -> Result<SetupState> {
        match self.storage.load_if_exists()? {
            Some(data) => serde_json::from_slice(&data).context("setup state is corrupted"),
            None => Ok(SetupState::default()),
        }
    }

    /// Stores the salt and marks setup as completed in one write.
    pub fn set_salt(&self, salt: &Salt) -> Result<()> {
        self.save(&SetupState {
            salt: Some(to_base64(salt)),
            has_setup: true,
        })
    }

    /// Updates only the flag, keeping any stored salt.
    pub fn set_has_setup(&self, value: bool) -> Result<()> {
        let mut state = self.load()?;
        state.has_setup = value;
        self.save(&state)
    }

    /// Forgets salt and flag, e.g. on logout.
    pub fn clear(&self) -> Result<()> {
        self.storage.remove()?;
        tracing::info!("setup state cleared");
        Ok(())
    }

    fn save(&self, state: &SetupState) -> Result<()> {
        let data = serde_json::to_vec(state)?;
        self.storage
            .save(&data)
            .context("failed to persist setup state")
    }
}
