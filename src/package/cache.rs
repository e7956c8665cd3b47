//! On-disk cache layout for installed command packages.

use log::debug;
use semver::Version;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::runtime::Runtime;

use super::version::parse_version;

/// Directory under the store holding per-key install locks.
const LOCKS_DIR: &str = ".locks";

/// Deterministic cache layout under a store directory.
///
/// A package `name` at `version` lives in
/// `<store>/_<name with "/" replaced by "_">@<version>@<name>`.
pub struct CacheStore<'a, R: Runtime> {
    runtime: &'a R,
    store_dir: PathBuf,
}

/// Filesystem-safe prefix for a package name.
pub fn sanitized_name(name: &str) -> String {
    name.replace('/', "_")
}

/// The cache key (relative directory) of `name` at `version`.
pub fn cache_key(name: &str, version: &Version) -> String {
    format!("_{}@{}@{}", sanitized_name(name), version, name)
}

/// The cache directory of `name` at `version` under `store_dir`.
pub fn cache_path(store_dir: &Path, name: &str, version: &Version) -> PathBuf {
    store_dir.join(cache_key(name, version))
}

impl<'a, R: Runtime> CacheStore<'a, R> {
    pub fn new(runtime: &'a R, store_dir: PathBuf) -> Self {
        Self { runtime, store_dir }
    }

    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    /// Cache directory for `name` at `version`.
    pub fn path(&self, name: &str, version: &Version) -> PathBuf {
        cache_path(&self.store_dir, name, version)
    }

    /// Lock file guarding installs of `name` at `version`.
    ///
    /// Returns: `<store>/.locks/_<sanitized name>@<version>.lock`
    pub fn lock_path(&self, name: &str, version: &Version) -> PathBuf {
        self.store_dir
            .join(LOCKS_DIR)
            .join(format!("_{}@{}.lock", sanitized_name(name), version))
    }

    /// Probe the filesystem; never cached.
    pub fn exists(&self, path: &Path) -> bool {
        self.runtime.exists(path)
    }

    /// Create `path` and its parents if missing.
    pub fn ensure_dir(&self, path: &Path) -> Result<()> {
        ensure_dir(self.runtime, path)
    }

    /// Versions of `name` already present in the store, in no particular order.
    ///
    /// A missing store yields an empty list.
    pub fn cached_versions(&self, name: &str) -> Result<Vec<Version>> {
        if !self.runtime.exists(&self.store_dir) {
            return Ok(vec![]);
        }

        let entries = self
            .runtime
            .read_dir(&self.store_dir)
            .map_err(|e| Error::filesystem(&self.store_dir, &e))?;

        let prefix = format!("_{}@", sanitized_name(name));
        // For scoped names only the scope is part of the store entry's file name
        let head = name.split('/').next().unwrap_or(name);
        let suffix = format!("@{}", head);

        let mut versions = Vec::new();
        for entry in entries {
            let Some(file_name) = entry.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(version) = file_name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(&suffix))
                .and_then(parse_version)
            else {
                continue;
            };
            if self.runtime.is_dir(&self.path(name, &version)) {
                versions.push(version);
            } else {
                debug!("Ignoring incomplete cache entry {:?}", entry);
            }
        }

        Ok(versions)
    }
}

/// Idempotent recursive directory creation.
pub fn ensure_dir<R: Runtime>(runtime: &R, path: &Path) -> Result<()> {
    if runtime.exists(path) {
        return Ok(());
    }
    debug!("Creating directory {:?}", path);
    runtime
        .create_dir_all(path)
        .map_err(|e| Error::filesystem(path, &e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MockRuntime, RealRuntime};
    use mockall::predicate::eq;
    use std::collections::HashSet;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_cache_key_plain_name() {
        assert_eq!(cache_key("cmd", &v("1.0.0")), "_cmd@1.0.0@cmd");
    }

    #[cfg(unix)]
    #[test]
    fn test_cache_path_scoped_name() {
        let store = PathBuf::from("/home/u/.cc/dependencies/node_modules");
        assert_eq!(
            cache_path(&store, "@scope/cmd", &v("2.0.0")),
            PathBuf::from("/home/u/.cc/dependencies/node_modules/_@scope_cmd@2.0.0@@scope/cmd")
        );
    }

    #[test]
    fn test_sanitized_name_replaces_every_slash() {
        assert_eq!(sanitized_name("@a/b/c"), "@a_b_c");
        assert!(!sanitized_name("@scope/cmd").contains('/'));
    }

    #[test]
    fn test_cache_paths_distinct_for_distinct_pairs() {
        let store = PathBuf::from("/store");
        let names = ["cmd", "@scope/cmd", "@scope_cmd", "scope/cmd", "cmd-init"];
        let versions = [v("1.0.0"), v("1.0.1"), v("1.0.0-rc.1"), v("10.0.0")];

        let mut seen = HashSet::new();
        for name in names {
            for version in &versions {
                assert!(
                    seen.insert(cache_path(&store, name, version)),
                    "collision for {}@{}",
                    name,
                    version
                );
            }
        }
    }

    #[test]
    fn test_lock_path() {
        let runtime = MockRuntime::new();
        let store = CacheStore::new(&runtime, PathBuf::from("/store"));
        assert_eq!(
            store.lock_path("@scope/cmd", &v("2.0.0")),
            PathBuf::from("/store/.locks/_@scope_cmd@2.0.0.lock")
        );
    }

    #[test]
    fn test_ensure_dir_skips_existing() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_exists()
            .with(eq(PathBuf::from("/store")))
            .returning(|_| true);
        runtime.expect_create_dir_all().never();

        ensure_dir(&runtime, Path::new("/store")).unwrap();
    }

    #[test]
    fn test_ensure_dir_failure_is_filesystem_error() {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| false);
        runtime
            .expect_create_dir_all()
            .returning(|_| Err(anyhow::anyhow!("permission denied")));

        let err = ensure_dir(&runtime, Path::new("/store")).unwrap_err();
        match err {
            Error::Filesystem { path, reason } => {
                assert_eq!(path, PathBuf::from("/store"));
                assert!(reason.contains("permission denied"));
            }
            other => panic!("expected filesystem error, got {other:?}"),
        }
    }

    #[test]
    fn test_cached_versions_missing_store() {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| false);

        let store = CacheStore::new(&runtime, PathBuf::from("/store"));
        assert!(store.cached_versions("cmd").unwrap().is_empty());
    }

    #[test]
    fn test_cached_versions_scans_real_store() {
        let runtime = RealRuntime;
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(&runtime, dir.path().to_path_buf());

        for (name, version) in [
            ("cmd", "1.0.0"),
            ("cmd", "1.2.0"),
            ("cmd-init", "9.0.0"),
            ("@scope/cmd", "3.0.0"),
        ] {
            std::fs::create_dir_all(store.path(name, &v(version))).unwrap();
        }
        // Stray entries that must be ignored
        std::fs::write(dir.path().join("_cmd@2.0.0@cmd"), "not a dir").unwrap();
        std::fs::create_dir_all(dir.path().join("_cmd@garbage@cmd")).unwrap();

        let mut plain = store.cached_versions("cmd").unwrap();
        plain.sort();
        assert_eq!(plain, vec![v("1.0.0"), v("1.2.0")]);

        assert_eq!(store.cached_versions("@scope/cmd").unwrap(), vec![v("3.0.0")]);
        assert!(store.cached_versions("other").unwrap().is_empty());
    }
}
