//! Error kinds surfaced by package resolution, caching and installation.

use std::path::{Path, PathBuf};

/// Result alias for core package operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure kinds of the package core.
///
/// Lower layers (runtime, HTTP) report through `anyhow`; their error chains are
/// flattened into the `reason` of the matching kind at the core boundary.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or invalid descriptor/configuration fields.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Registry unreachable, non-success response or unexpected body.
    #[error("Registry request for {name} failed: {reason}")]
    Network { name: String, reason: String },

    /// No candidate version could be determined.
    #[error("Could not resolve a version of {name}: {reason}")]
    VersionResolution { name: String, reason: String },

    /// A cache directory or manifest could not be created or read.
    #[error("Filesystem operation on {} failed: {reason}", path.display())]
    Filesystem { path: PathBuf, reason: String },

    /// The delegated package installer failed.
    #[error("Failed to install {name}@{version}: {reason}")]
    Install {
        name: String,
        version: String,
        reason: String,
    },
}

impl Error {
    pub(crate) fn network(name: &str, err: &anyhow::Error) -> Self {
        Error::Network {
            name: name.to_string(),
            reason: format!("{:#}", err),
        }
    }

    pub(crate) fn filesystem(path: &Path, err: &anyhow::Error) -> Self {
        Error::Filesystem {
            path: path.to_path_buf(),
            reason: format!("{:#}", err),
        }
    }

    pub(crate) fn version_resolution(name: &str, reason: impl Into<String>) -> Self {
        Error::VersionResolution {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
