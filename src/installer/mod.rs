//! Delegation of package installation to an external installer.
//!
//! The core never unpacks or links packages itself; it hands a request to an
//! [`Installer`] and only checks the resulting cache layout afterwards.

mod npm;

use anyhow::Result;
use async_trait::async_trait;
use semver::Version;
use std::path::PathBuf;

pub use npm::{DEFAULT_INSTALLER, NpmInstaller};

/// One package to install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    /// Install root (`<root>/node_modules` is the installer's default store).
    pub root: PathBuf,
    /// Store directory the cache layout lives in, when caching is enabled.
    pub store_dir: Option<PathBuf>,
    pub name: String,
    pub version: Version,
}

impl InstallRequest {
    /// `name@version`, the form installers accept on their command line.
    pub fn package_spec(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }
}

/// Opaque package installer.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Installer: Send + Sync {
    async fn install(&self, request: &InstallRequest) -> Result<()>;
}
