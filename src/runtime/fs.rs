//! File system operations (probe, read, directory).

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::RealRuntime;

impl RealRuntime {
    #[tracing::instrument(skip(self))]
    pub(crate) fn exists_impl(&self, path: &Path) -> bool {
        path.exists()
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn is_dir_impl(&self, path: &Path) -> bool {
        path.is_dir()
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn create_dir_all_impl(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).context("Failed to create directory")?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn read_to_string_impl(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).context("Failed to read file to string")
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn read_dir_impl(&self, path: &Path) -> Result<Vec<PathBuf>> {
        fs::read_dir(path)
            .context("Failed to read directory")?
            .map(|entry| Ok(entry?.path()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::{RealRuntime, Runtime};
    use tempfile::tempdir;

    #[test]
    fn test_real_runtime_store_dir_ops() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let store = dir.path().join("dependencies/node_modules");

        // create_dir_all is idempotent
        runtime.create_dir_all(&store).unwrap();
        runtime.create_dir_all(&store).unwrap();
        assert!(runtime.exists(&store));
        assert!(runtime.is_dir(&store));

        let cached = store.join("_cmd@1.0.0@cmd");
        runtime.create_dir_all(&cached).unwrap();
        let entries = runtime.read_dir(&store).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].ends_with("_cmd@1.0.0@cmd"));
    }

    #[test]
    fn test_real_runtime_read_manifest() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let manifest = dir.path().join("package.json");
        std::fs::write(&manifest, r#"{"name":"cmd","main":"index.js"}"#).unwrap();

        let content = runtime.read_to_string(&manifest).unwrap();
        assert!(content.contains("index.js"));
        assert!(!runtime.is_dir(&manifest));
    }

    #[test]
    fn test_real_runtime_errors() {
        let runtime = RealRuntime;
        let missing = std::path::Path::new("/nonexistent/cmdpack/path");

        assert!(runtime.read_to_string(&missing.join("package.json")).is_err());
        assert!(runtime.read_dir(missing).is_err());
        assert!(!runtime.exists(missing));
    }
}
