//! On-disk persistence for vault containers.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::random;

/// A vault file on the local filesystem.
///
/// `Storage` only moves opaque container bytes; it never sees plaintext.
#[derive(Debug, Clone)]
pub struct Storage {
    path: PathBuf,
}

impl Storage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns `true` if the vault file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Reads the whole container.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn load(&self) -> Result<Vec<u8>> {
        fs::read(&self.path).with_context(|| format!("failed to read {}", self.path.display()))
    }

    /// Replaces the vault file with `data`.
    ///
    /// The bytes go to a fresh sibling file which is synced and then
    /// renamed over the target, followed by a sync of the directory. A crash
    /// leaves either the old or the new container, never a torn one.
    /// Missing parent directories are created.
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails; the sibling file is removed.
    pub fn save(&self, data: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let tmp_path = self.random_tmp_path()?;
        if let Err(e) = write_synced(&tmp_path, data).and_then(|()| self.atomic_replace(&tmp_path))
        {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }

        if let Some(parent) = self.path.parent() {
            File::open(parent)?.sync_all()?;
        }

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling path `<file name>.tmp.<16 hex digits>`.
    fn random_tmp_path(&self) -> Result<PathBuf> {
        let mut suffix = [0u8; 8];
        random::fill(&mut suffix)?;
        let suffix: String = suffix.iter().map(|b| format!("{b:02x}")).collect();

        let file_name = self
            .path
            .file_name()
            .with_context(|| format!("{} does not name a file", self.path.display()))?
            .to_string_lossy();

        Ok(self.path.with_file_name(format!("{file_name}.tmp.{suffix}")))
    }

    /// Windows: `ReplaceFileW` with write-through.
    #[cfg(target_os = "windows")]
    fn atomic_replace(&self, tmp_path: &Path) -> Result<()> {
        use std::ffi::OsStr;
        use std::os::windows::ffi::OsStrExt;
        use windows_sys::Win32::Storage::FileSystem::{
            MOVEFILE_REPLACE_EXISTING, MOVEFILE_WRITE_THROUGH, MoveFileExW, REPLACEFILE_WRITE_THROUGH,
            ReplaceFileW,
        };

        fn to_wide(s: &OsStr) -> Vec<u16> {
            s.encode_wide().chain(std::iter::once(0)).collect()
        }

        let target = to_wide(self.path.as_os_str());
        let tmp = to_wide(tmp_path.as_os_str());

        // ReplaceFileW needs an existing target; the first save moves instead.
        // SAFETY: both buffers are NUL-terminated UTF-16 and outlive the call.
        let ok = unsafe {
            if self.path.exists() {
                ReplaceFileW(
                    target.as_ptr(),
                    tmp.as_ptr(),
                    std::ptr::null(),
                    REPLACEFILE_WRITE_THROUGH,
                    std::ptr::null(),
                    std::ptr::null(),
                )
            } else {
                MoveFileExW(
                    tmp.as_ptr(),
                    target.as_ptr(),
                    MOVEFILE_REPLACE_EXISTING | MOVEFILE_WRITE_THROUGH,
                )
            }
        };

        if ok == 0 {
            return Err(std::io::Error::last_os_error()).context("atomic replace failed");
        }
        Ok(())
    }

    /// Unix: `rename` is atomic within one filesystem.
    #[cfg(not(target_os = "windows"))]
    fn atomic_replace(&self, tmp_path: &Path) -> Result<()> {
        fs::rename(tmp_path, &self.path)
            .with_context(|| format!("failed to replace {}", self.path.display()))
    }
}

fn write_synced(path: &Path, data: &[u8]) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options
        .open(path)
        .context("failed to create temporary file")?;
    file.write_all(data)?;
    file.sync_all()?;
    Ok(())
}
