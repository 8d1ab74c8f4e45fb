//! Durable single-file storage for setup state and wrapped key records.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::crypto::random::secure_random;

/// A file that is always replaced atomically.
///
/// Readers see either the previous contents or the new contents, never a
/// partial write.
#[derive(Clone, Debug)]
pub struct Storage {
    path: PathBuf,
}

impl Storage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Returns `true` if the file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Reads the whole file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn load(&self) -> Result<Vec<u8>> {
        fs::read(&self.path).with_context(|| format!("failed to read {}", self.path.display()))
    }

    /// Reads the whole file, or `None` if it does not exist.
    pub fn load_if_exists(&self) -> Result<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("failed to read {}", self.path.display())),
        }
    }

    /// Replaces the file contents.
    ///
    /// 1. write to a randomly named temp file next to the target
    /// 2. fsync the temp file
    /// 3. atomically replace the target
    /// 4. fsync the parent directory
    ///
    /// Creates parent directories if they don't exist.
    pub fn save(&self, data: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = self.random_tmp_path()?;

        let mut tmp_file = open_private(&tmp_path).context("failed to create temporary file")?;
        tmp_file.write_all(data)?;
        tmp_file.sync_all()?;
        drop(tmp_file);

        if let Err(e) = self.atomic_replace(&tmp_path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }

        sync_parent(&self.path)?;

        tracing::debug!(path = %self.path.display(), bytes = data.len(), "storage saved");
        Ok(())
    }

    /// Deletes the file. Succeeds if it is already gone.
    pub fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                sync_parent(&self.path)?;
                tracing::debug!(path = %self.path.display(), "storage removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("failed to remove {}", self.path.display())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `filename.tmp.<16 hex chars>` in the same directory as the target.
    fn random_tmp_path(&self) -> Result<PathBuf> {
        let mut buf = [0u8; 8];
        secure_random(&mut buf)?;

        let suffix: String = buf.iter().map(|b| format!("{b:02x}")).collect();

        let file_name = self
            .path
            .file_name()
            .context("storage path has no file name")?
            .to_string_lossy();

        Ok(self.path.with_file_name(format!("{file_name}.tmp.{suffix}")))
    }

    /// Uses `ReplaceFileW` with `REPLACEFILE_WRITE_THROUGH`, falling back to a
    /// rename when there is no target yet.
    #[cfg(target_os = "windows")]
    fn atomic_replace(&self, tmp_path: &Path) -> Result<()> {
        use std::ffi::OsStr;
        use std::os::windows::ffi::OsStrExt;
        use windows_sys::Win32::Storage::FileSystem::{REPLACEFILE_WRITE_THROUGH, ReplaceFileW};

        if !self.path.exists() {
            fs::rename(tmp_path, &self.path)?;
            return Ok(());
        }

        fn to_wide(s: &OsStr) -> Vec<u16> {
            s.encode_wide().chain(std::iter::once(0)).collect()
        }

        let target_w = to_wide(self.path.as_os_str());
        let tmp_w = to_wide(tmp_path.as_os_str());

        // SAFETY: both buffers are NUL-terminated UTF-16 and outlive the call.
        let result = unsafe {
            ReplaceFileW(
                target_w.as_ptr(),
                tmp_w.as_ptr(),
                std::ptr::null(),
                REPLACEFILE_WRITE_THROUGH,
                std::ptr::null(),
                std::ptr::null(),
            )
        };

        if result == 0 {
            let err = std::io::Error::last_os_error();
            return Err(err).context("atomic replace failed");
        }

        Ok(())
    }

    /// `rename()` is atomic within one filesystem.
    #[cfg(not(target_os = "windows"))]
    fn atomic_replace(&self, tmp_path: &Path) -> Result<()> {
        fs::rename(tmp_path, &self.path).context("atomic replace failed")?;
        Ok(())
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;

    OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}

#[cfg(unix)]
fn sync_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        File::open(parent)?.sync_all()?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> Result<()> {
    Ok(())
}
