//! Entry point discovery inside an installed package.

use log::debug;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::runtime::{Runtime, normalize_path, resolve_against};

/// File name of a package manifest.
pub const MANIFEST_FILE: &str = "package.json";

/// The subset of `package.json` the resolver consumes.
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct Manifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    /// Entry file, relative to the manifest's directory.
    #[serde(default)]
    pub main: Option<String>,
}

impl Manifest {
    pub fn parse(content: &str) -> serde_json::Result<Self> {
        serde_json::from_str(content)
    }
}

/// Locates the nearest manifest above a path and resolves its entry file.
pub struct EntryResolver<'a, R: Runtime> {
    runtime: &'a R,
}

impl<'a, R: Runtime> EntryResolver<'a, R> {
    pub fn new(runtime: &'a R) -> Self {
        Self { runtime }
    }

    /// Nearest directory at or above `start` containing a manifest.
    ///
    /// `start` must already be absolute; the walk ends at the filesystem root.
    pub fn find_package_dir(&self, start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .find(|dir| self.runtime.exists(&dir.join(MANIFEST_FILE)))
            .map(Path::to_path_buf)
    }

    /// Absolute, normalized entry file of the package containing `start`.
    ///
    /// `Ok(None)` when no manifest exists up to the root or the manifest does
    /// not declare `main`.
    #[tracing::instrument(skip(self))]
    pub fn resolve_entry(&self, start: &Path) -> Result<Option<PathBuf>> {
        let start = if start.is_absolute() {
            normalize_path(start)
        } else {
            let cwd = self
                .runtime
                .current_dir()
                .map_err(|e| Error::filesystem(start, &e))?;
            resolve_against(&cwd, start)
        };

        let Some(package_dir) = self.find_package_dir(&start) else {
            debug!("No {} found at or above {:?}", MANIFEST_FILE, start);
            return Ok(None);
        };

        let manifest_path = package_dir.join(MANIFEST_FILE);
        let content = self
            .runtime
            .read_to_string(&manifest_path)
            .map_err(|e| Error::filesystem(&manifest_path, &e))?;
        let manifest = Manifest::parse(&content).map_err(|e| Error::Filesystem {
            path: manifest_path.clone(),
            reason: format!("invalid manifest: {}", e),
        })?;

        match manifest.main.as_deref().map(str::trim) {
            Some(main) if !main.is_empty() => {
                let entry = resolve_against(&package_dir, Path::new(main));
                debug!("Resolved entry {:?} from {:?}", entry, manifest_path);
                Ok(Some(entry))
            }
            _ => {
                debug!("{:?} declares no entry file", manifest_path);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MockRuntime, RealRuntime};
    use mockall::predicate::eq;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_manifest_parse_ignores_unknown_fields() {
        let manifest = Manifest::parse(
            r#"{"name":"cmd","version":"1.0.0","main":"lib/index.js","bin":{"cmd":"bin/cmd"}}"#,
        )
        .unwrap();
        assert_eq!(manifest.main.as_deref(), Some("lib/index.js"));
        assert_eq!(manifest.version.as_deref(), Some("1.0.0"));
    }

    #[test]
    fn test_resolve_entry_in_package_root() {
        let dir = tempdir().unwrap();
        let pkg = dir.path().join("_cmd@1.0.0@cmd");
        fs::create_dir_all(pkg.join("lib")).unwrap();
        fs::write(
            pkg.join(MANIFEST_FILE),
            r#"{"name":"cmd","version":"1.0.0","main":"./lib/../lib/index.js"}"#,
        )
        .unwrap();

        let runtime = RealRuntime;
        let entry = EntryResolver::new(&runtime).resolve_entry(&pkg).unwrap();
        assert_eq!(entry, Some(pkg.join("lib").join("index.js")));
    }

    #[test]
    fn test_resolve_entry_walks_up_from_nested_dir() {
        let dir = tempdir().unwrap();
        let pkg = dir.path().join("plugin");
        let nested = pkg.join("src/commands/deep");
        fs::create_dir_all(&nested).unwrap();
        fs::write(pkg.join(MANIFEST_FILE), r#"{"main":"cli.js"}"#).unwrap();

        let runtime = RealRuntime;
        let entry = EntryResolver::new(&runtime).resolve_entry(&nested).unwrap();
        assert_eq!(entry, Some(pkg.join("cli.js")));
    }

    #[test]
    fn test_resolve_entry_without_main_is_none() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), r#"{"name":"cmd"}"#).unwrap();

        let runtime = RealRuntime;
        let entry = EntryResolver::new(&runtime)
            .resolve_entry(dir.path())
            .unwrap();
        assert!(entry.is_none());
    }

    #[test]
    fn test_resolve_entry_invalid_manifest_is_filesystem_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), "{ not json").unwrap();

        let runtime = RealRuntime;
        let err = EntryResolver::new(&runtime)
            .resolve_entry(dir.path())
            .unwrap_err();
        assert!(matches!(err, Error::Filesystem { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_entry_no_manifest_up_to_root_is_none() {
        let mut runtime = MockRuntime::new();
        // Every probe from /a/b/c up to / misses
        for dir in ["/a/b/c", "/a/b", "/a", "/"] {
            runtime
                .expect_exists()
                .with(eq(PathBuf::from(dir).join(MANIFEST_FILE)))
                .times(1)
                .returning(|_| false);
        }

        let entry = EntryResolver::new(&runtime)
            .resolve_entry(Path::new("/a/b/c"))
            .unwrap();
        assert!(entry.is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_entry_relative_start_uses_current_dir() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_current_dir()
            .returning(|| Ok(PathBuf::from("/work")));
        runtime
            .expect_exists()
            .with(eq(PathBuf::from("/work/plugin/package.json")))
            .returning(|_| true);
        runtime
            .expect_read_to_string()
            .with(eq(PathBuf::from("/work/plugin/package.json")))
            .returning(|_| Ok(r#"{"main":"bin/run.js"}"#.to_string()));

        let entry = EntryResolver::new(&runtime)
            .resolve_entry(Path::new("plugin"))
            .unwrap();
        assert_eq!(entry, Some(PathBuf::from("/work/plugin/bin/run.js")));
    }
}
