//! Runtime abstraction for system operations.
//!
//! This module provides a trait-based abstraction over the filesystem and
//! environment queries the package core performs, enabling dependency
//! injection and testability.
//!
//! # Structure
//!
//! - `path` - Lexical path helpers (normalize, resolve against a base)
//! - `env` - Home and current directory lookups
//! - `fs` - File system operations (probe, read, directory)
//! - `lock` - Advisory file locks guarding cache installs

mod env;
mod fs;
mod lock;
pub mod path;

use anyhow::Result;
use std::path::{Path, PathBuf};

pub use lock::FileLock;
pub use path::{normalize_path, resolve_against};

#[cfg_attr(test, mockall::automock)]
pub trait Runtime: Send + Sync {
    // File System
    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    fn create_dir_all(&self, path: &Path) -> Result<()>;
    fn read_to_string(&self, path: &Path) -> Result<String>;
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Open (creating if needed) `path` and try to take an exclusive advisory
    /// lock on it without blocking. `None` means another handle holds it.
    /// The lock is released when the returned guard drops.
    fn try_lock_exclusive(&self, path: &Path) -> Result<Option<FileLock>>;

    // Directories
    fn home_dir(&self) -> Option<PathBuf>;
    fn current_dir(&self) -> Result<PathBuf>;
}

pub struct RealRuntime;

impl Runtime for RealRuntime {
    fn exists(&self, path: &Path) -> bool {
        self.exists_impl(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.is_dir_impl(path)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.create_dir_all_impl(path)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.read_to_string_impl(path)
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        self.read_dir_impl(path)
    }

    fn try_lock_exclusive(&self, path: &Path) -> Result<Option<FileLock>> {
        self.try_lock_exclusive_impl(path)
    }

    fn home_dir(&self) -> Option<PathBuf> {
        self.home_dir_impl()
    }

    fn current_dir(&self) -> Result<PathBuf> {
        self.current_dir_impl()
    }
}
