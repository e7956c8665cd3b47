//! Per-invocation description of the package behind a command.

use semver::Version;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

use super::version::VersionSpec;

/// What to fetch and where to keep it.
///
/// Without a `store_dir` the descriptor is in local override mode: the
/// package is used straight from `target_path`, no cache indirection.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageDescriptor {
    name: String,
    requested: VersionSpec,
    resolved: Option<Version>,
    target_path: PathBuf,
    store_dir: Option<PathBuf>,
}

impl PackageDescriptor {
    pub fn new(
        name: &str,
        requested: VersionSpec,
        target_path: PathBuf,
        store_dir: Option<PathBuf>,
    ) -> Result<Self> {
        validate_name(name)?;
        if target_path.as_os_str().is_empty() {
            return Err(Error::Config(format!("no target path given for {}", name)));
        }
        if store_dir.as_ref().is_some_and(|s| s.as_os_str().is_empty()) {
            return Err(Error::Config(format!("empty store directory for {}", name)));
        }

        Ok(Self {
            name: name.to_string(),
            requested,
            resolved: None,
            target_path,
            store_dir,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn requested(&self) -> &VersionSpec {
        &self.requested
    }

    pub fn resolved(&self) -> Option<&Version> {
        self.resolved.as_ref()
    }

    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    pub fn store_dir(&self) -> Option<&Path> {
        self.store_dir.as_deref()
    }

    /// Pin the resolved version. Only the first call has an effect.
    pub(crate) fn pin(&mut self, version: Version) -> &Version {
        self.resolved.get_or_insert(version)
    }

    /// Move the resolved version forward. Never moves it backward.
    pub(crate) fn advance(&mut self, version: Version) -> bool {
        match &self.resolved {
            Some(current) if *current >= version => false,
            _ => {
                self.resolved = Some(version);
                true
            }
        }
    }
}

/// npm-style package names: `name` or `@scope/name`.
fn validate_name(name: &str) -> Result<()> {
    let invalid = |why: &str| Err(Error::Config(format!("invalid package name {:?}: {}", name, why)));

    if name.is_empty() {
        return invalid("empty");
    }
    if name.chars().any(|c| c.is_whitespace() || c == '\\') {
        return invalid("contains whitespace or backslash");
    }
    if name.starts_with('/') || name.ends_with('/') || name.contains("//") {
        return invalid("malformed '/' separator");
    }
    if name.split('/').any(|segment| segment == "." || segment == "..") {
        return invalid("relative path segment");
    }
    Ok(())
}
