//! Advisory file locks guarding concurrent installs into the same cache key.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

use super::RealRuntime;

/// Exclusive lock held for as long as the value lives.
///
/// The lock is released by the OS when the file handle is closed.
#[derive(Debug)]
pub struct FileLock {
    _file: Option<File>,
}

impl FileLock {
    /// A guard that holds nothing; used where no real lock file exists (mocks).
    pub fn detached() -> Self {
        Self { _file: None }
    }
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

impl RealRuntime {
    #[tracing::instrument(skip(self))]
    pub(crate) fn try_lock_exclusive_impl(&self, path: &Path) -> Result<Option<FileLock>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create lock directory {:?}", parent))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("Failed to open lock file {:?}", path))?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(FileLock { _file: Some(file) })),
            Err(e) if is_contended(&e) => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to lock {:?}", path)),
        }
    }
}
