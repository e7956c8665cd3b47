//! Registry abstraction for package metadata lookups.
//!
//! A registry answers one question: which versions of a package have been
//! published. Everything else about the package is the installer's concern.

mod npm;

use async_trait::async_trait;

use crate::error::Result;

pub use npm::NpmRegistry;

/// Default registry (npm mirror).
pub const DEFAULT_REGISTRY: &str = "https://registry.npmmirror.com/";

/// The upstream npm registry.
pub const NPMJS_REGISTRY: &str = "https://registry.npmjs.org/";

/// Published versions of a package. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegistryMetadata {
    pub name: String,
    pub versions: Vec<String>,
}

/// Source of package metadata.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Base URL requests are made against.
    fn registry_url(&self) -> &str;

    /// Fetch the published versions of `name`.
    ///
    /// Returns `Ok(None)` when the registry has no such package; transport
    /// failures and unexpected responses are [`crate::error::Error::Network`].
    async fn fetch_metadata(&self, name: &str) -> Result<Option<RegistryMetadata>>;
}

/// Join a registry base URL and a package name with exactly one `/`.
pub fn package_url(registry_url: &str, name: &str) -> String {
    format!(
        "{}/{}",
        registry_url.trim_end_matches('/'),
        name.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_url_trailing_slash() {
        assert_eq!(
            package_url("https://registry.npmjs.org/", "cmd"),
            "https://registry.npmjs.org/cmd"
        );
    }

    #[test]
    fn test_package_url_without_trailing_slash() {
        assert_eq!(
            package_url("http://127.0.0.1:4873", "@scope/cmd"),
            "http://127.0.0.1:4873/@scope/cmd"
        );
    }
}
