//! Install/update/reuse decisions for one command package.
//!
//! ```text
//! Uninitialized --prepare--> Prepared --install--> Installed
//!                                     \--update--> Installed | UpToDate
//! ```

use log::{debug, info, warn};
use semver::Version;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::cleanup::{CleanupGuard, SharedCleanupContext, new_shared};
use crate::error::{Error, Result};
use crate::installer::{InstallRequest, Installer};
use crate::registry::RegistryClient;
use crate::runtime::{FileLock, Runtime};

use super::cache::{CacheStore, cache_path, ensure_dir};
use super::descriptor::PackageDescriptor;
use super::entry::EntryResolver;
use super::version::{VersionResolver, VersionSpec};

/// How often a contended install lock is retried.
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Lifecycle of a [`PackageManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageState {
    Uninitialized,
    Prepared,
    Installed,
    UpToDate,
}

/// Orchestrates version resolution, caching and installation of a package.
pub struct PackageManager<'a, R: Runtime, C: RegistryClient, I: Installer> {
    runtime: &'a R,
    registry: &'a C,
    installer: &'a I,
    descriptor: PackageDescriptor,
    state: PackageState,
    cleanup: SharedCleanupContext,
}

impl<'a, R: Runtime, C: RegistryClient, I: Installer> PackageManager<'a, R, C, I> {
    pub fn new(
        runtime: &'a R,
        registry: &'a C,
        installer: &'a I,
        descriptor: PackageDescriptor,
    ) -> Self {
        Self {
            runtime,
            registry,
            installer,
            descriptor,
            state: PackageState::Uninitialized,
            cleanup: new_shared(),
        }
    }

    /// Share a cleanup context, e.g. with an interrupt handler.
    pub fn with_cleanup_context(mut self, cleanup: SharedCleanupContext) -> Self {
        self.cleanup = cleanup;
        self
    }

    pub fn descriptor(&self) -> &PackageDescriptor {
        &self.descriptor
    }

    pub fn state(&self) -> PackageState {
        self.state
    }

    /// Cache directory of the resolved version, if caching is enabled and
    /// the version is known.
    pub fn cache_path(&self) -> Option<PathBuf> {
        let store = self.descriptor.store_dir()?;
        let version = self.descriptor.resolved()?;
        Some(cache_path(store, self.descriptor.name(), version))
    }

    /// Ensure the store exists and pin the version to use.
    ///
    /// Once a version is pinned further calls only re-check the store.
    #[tracing::instrument(skip(self), fields(name = %self.descriptor.name()))]
    pub async fn prepare(&mut self) -> Result<Version> {
        if let Some(store) = self.descriptor.store_dir() {
            ensure_dir(self.runtime, store)?;
        }

        if let Some(version) = self.descriptor.resolved() {
            return Ok(version.clone());
        }

        let version = match self.descriptor.requested().clone() {
            VersionSpec::Exact(version) => version,
            VersionSpec::Latest => self.resolve_latest().await?,
        };
        let version = self.descriptor.pin(version).clone();
        debug!(
            "Resolved {}@{} to {}",
            self.descriptor.name(),
            self.descriptor.requested(),
            version
        );

        if self.state == PackageState::Uninitialized {
            self.state = PackageState::Prepared;
        }
        Ok(version)
    }

    /// Whether the package is present: its cache directory in cached mode,
    /// the target path itself in override mode.
    pub async fn exists(&mut self) -> Result<bool> {
        if self.descriptor.store_dir().is_none() {
            return Ok(self.runtime.exists(self.descriptor.target_path()));
        }

        self.prepare().await?;
        Ok(self
            .cache_path()
            .is_some_and(|path| self.runtime.exists(&path)))
    }

    /// Install the resolved version through the installer.
    #[tracing::instrument(skip(self), fields(name = %self.descriptor.name()))]
    pub async fn install(&mut self) -> Result<()> {
        let version = self.prepare().await?;
        self.install_version(&version).await?;
        self.state = PackageState::Installed;
        Ok(())
    }

    /// Move to the newest published version if it is not cached yet.
    ///
    /// Returns the resulting state: `Installed` when a newer version was
    /// installed, `UpToDate` otherwise. A package the registry no longer
    /// knows keeps its current version.
    #[tracing::instrument(skip(self), fields(name = %self.descriptor.name()))]
    pub async fn update(&mut self) -> Result<PackageState> {
        if self.descriptor.store_dir().is_none() {
            debug!("Local override for {}; nothing to update", self.descriptor.name());
            self.state = PackageState::UpToDate;
            return Ok(self.state);
        }

        let current = self.prepare().await?;
        let name = self.descriptor.name().to_string();

        let Some(meta) = self.registry.fetch_metadata(&name).await? else {
            warn!("{} was not found in the registry; keeping {}", name, current);
            self.state = PackageState::UpToDate;
            return Ok(self.state);
        };
        let versions = VersionResolver::parse_all(&meta.versions);
        let Some(latest) = VersionResolver::highest(&versions).cloned() else {
            warn!("The registry lists no valid versions of {}; keeping {}", name, current);
            self.state = PackageState::UpToDate;
            return Ok(self.state);
        };

        if latest < current {
            debug!(
                "Newest published {} {} is older than {}; keeping it",
                name, latest, current
            );
            self.state = PackageState::UpToDate;
            return Ok(self.state);
        }

        let latest_path = self.cache_path_for(&latest);
        if latest_path.as_ref().is_some_and(|p| self.runtime.exists(p)) {
            debug!("{}@{} is already cached", name, latest);
            self.state = PackageState::UpToDate;
            return Ok(self.state);
        }

        info!("Updating {} to {}", name, latest);
        self.install_version(&latest).await?;
        self.descriptor.advance(latest);
        self.state = PackageState::Installed;
        Ok(self.state)
    }

    /// Entry file of the package, resolved from the cache directory (cached
    /// mode) or the target path (override mode).
    pub fn entry_path(&self) -> Result<Option<PathBuf>> {
        let start = if self.descriptor.store_dir().is_some() {
            self.cache_path().ok_or_else(|| {
                Error::version_resolution(
                    self.descriptor.name(),
                    "the version has not been resolved yet",
                )
            })?
        } else {
            self.descriptor.target_path().to_path_buf()
        };

        EntryResolver::new(self.runtime).resolve_entry(&start)
    }

    fn cache_path_for(&self, version: &Version) -> Option<PathBuf> {
        self.descriptor
            .store_dir()
            .map(|store| cache_path(store, self.descriptor.name(), version))
    }

    fn cache_store(&self) -> Option<CacheStore<'a, R>> {
        self.descriptor
            .store_dir()
            .map(|store| CacheStore::new(self.runtime, store.to_path_buf()))
    }

    async fn resolve_latest(&self) -> Result<Version> {
        let name = self.descriptor.name();

        let failure = match self.registry.fetch_metadata(name).await {
            Ok(Some(meta)) => {
                let versions = VersionResolver::parse_all(&meta.versions);
                if let Some(highest) = VersionResolver::highest(&versions) {
                    return Ok(highest.clone());
                }
                "the registry lists no valid versions".to_string()
            }
            Ok(None) => "the package was not found in the registry".to_string(),
            Err(e) => e.to_string(),
        };

        if let Some(store) = self.cache_store() {
            let cached = store.cached_versions(name)?;
            if let Some(version) = VersionResolver::highest(&cached) {
                warn!("{}; falling back to cached {}@{}", failure, name, version);
                return Ok(version.clone());
            }
        }

        Err(Error::version_resolution(name, failure))
    }

    /// Run the installer for `version`.
    ///
    /// In cached mode the install holds the key's lock, is skipped when the
    /// directory appeared meanwhile, and a failed attempt leaves nothing behind.
    async fn install_version(&self, version: &Version) -> Result<()> {
        let name = self.descriptor.name();
        let request = InstallRequest {
            root: self.descriptor.target_path().to_path_buf(),
            store_dir: self.descriptor.store_dir().map(|s| s.to_path_buf()),
            name: name.to_string(),
            version: version.clone(),
        };

        let Some(store) = self.cache_store() else {
            return self.run_installer(&request).await;
        };

        let target = store.path(name, version);
        let lock_path = store.lock_path(name, version);
        let _lock = self.acquire_lock(&lock_path).await?;

        if store.exists(&target) {
            info!("{}@{} was installed concurrently; reusing it", name, version);
            return Ok(());
        }

        let guard = CleanupGuard::new(Arc::clone(&self.cleanup), target.clone());
        self.run_installer(&request).await?;

        if !store.exists(&target) {
            return Err(Error::Install {
                name: name.to_string(),
                version: version.to_string(),
                reason: format!("installer succeeded but {} is missing", target.display()),
            });
        }

        guard.success();
        Ok(())
    }

    /// Wait for the install lock at `path` without blocking the executor.
    async fn acquire_lock(&self, path: &Path) -> Result<FileLock> {
        let mut announced = false;
        loop {
            let attempt = self
                .runtime
                .try_lock_exclusive(path)
                .map_err(|e| Error::filesystem(path, &e))?;
            if let Some(lock) = attempt {
                return Ok(lock);
            }
            if !announced {
                info!(
                    "Waiting for another install of {} to finish",
                    self.descriptor.name()
                );
                announced = true;
            }
            tokio::time::sleep(LOCK_POLL_INTERVAL).await;
        }
    }

    async fn run_installer(&self, request: &InstallRequest) -> Result<()> {
        self.installer
            .install(request)
            .await
            .map_err(|e| Error::Install {
                name: request.name.clone(),
                version: request.version.to_string(),
                reason: format!("{:#}", e),
            })
    }
}
