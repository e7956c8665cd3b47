//! Command dispatch: command name to package, package to entry file, entry
//! file to running process.

mod loader;
mod table;

use anyhow::{Result, anyhow};
use log::{debug, warn};
use semver::Version;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cleanup::{SharedCleanupContext, lock, new_shared};
use crate::config::Config;
use crate::error::Error;
use crate::installer::Installer;
use crate::package::{PackageDescriptor, PackageManager};
use crate::registry::RegistryClient;
use crate::runtime::Runtime;

pub use loader::{
    CONTEXT_ENV, Command, CommandContext, CommandLoader, LoaderRegistry, NativeLoader,
    ScriptLoader,
};
pub use table::{BUILTIN_COMMANDS, CommandTable, PackageRequest};

/// A command whose package is present and whose entry file is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand {
    pub command: String,
    pub package: String,
    pub version: Option<Version>,
    pub entry: PathBuf,
}

impl ResolvedCommand {
    pub fn context(&self) -> CommandContext {
        CommandContext {
            command: self.command.clone(),
            package: self.package.clone(),
            version: self.version.as_ref().map(Version::to_string),
            entry: self.entry.clone(),
        }
    }
}

pub struct Dispatcher<'a, R: Runtime, C: RegistryClient, I: Installer> {
    config: &'a Config,
    runtime: &'a R,
    registry: &'a C,
    installer: &'a I,
    table: CommandTable,
    loaders: LoaderRegistry,
    cleanup: SharedCleanupContext,
}

impl<'a, R: Runtime, C: RegistryClient, I: Installer> Dispatcher<'a, R, C, I> {
    pub fn new(
        config: &'a Config,
        runtime: &'a R,
        registry: &'a C,
        installer: &'a I,
        table: CommandTable,
    ) -> Self {
        Self {
            config,
            runtime,
            registry,
            installer,
            table,
            loaders: LoaderRegistry::default(),
            cleanup: new_shared(),
        }
    }

    pub fn with_loaders(mut self, loaders: LoaderRegistry) -> Self {
        self.loaders = loaders;
        self
    }

    pub fn table(&self) -> &CommandTable {
        &self.table
    }

    /// Make sure the package behind `command` is present and find its entry.
    ///
    /// With a cache, a present package is updated and a missing one is
    /// installed. A local override is used as is.
    #[tracing::instrument(skip(self))]
    pub async fn resolve(&self, command: &str) -> Result<ResolvedCommand> {
        let request = self.table.get(command)?;
        debug!("{} is provided by {}", command, request);

        let descriptor = match &self.config.target_path {
            Some(target) => {
                PackageDescriptor::new(&request.name, request.version.clone(), target.clone(), None)?
            }
            None => PackageDescriptor::new(
                &request.name,
                request.version.clone(),
                self.config.cache_root(),
                Some(self.config.store_dir()),
            )?,
        };
        let cached = descriptor.store_dir().is_some();

        let mut manager = PackageManager::new(self.runtime, self.registry, self.installer, descriptor)
            .with_cleanup_context(Arc::clone(&self.cleanup));

        if cached {
            let cleanup = Arc::clone(&self.cleanup);
            let ctrl_c_handler = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    eprintln!("\nInterrupted, cleaning up...");
                    lock(&cleanup).cleanup();
                    std::process::exit(130);
                }
            });

            let result = self.ensure_present(&mut manager).await;
            ctrl_c_handler.abort();
            result?;
        }

        let entry = manager.entry_path()?.ok_or_else(|| {
            anyhow!(
                "{} has no entry file (no package.json declaring \"main\" was found)",
                request.name
            )
        })?;

        Ok(ResolvedCommand {
            command: command.to_string(),
            package: request.name.clone(),
            version: manager.descriptor().resolved().cloned(),
            entry,
        })
    }

    async fn ensure_present(&self, manager: &mut PackageManager<'a, R, C, I>) -> Result<()> {
        if !manager.exists().await? {
            manager.install().await?;
            return Ok(());
        }

        match manager.update().await {
            Ok(_) => Ok(()),
            Err(e @ Error::Network { .. }) => {
                warn!("{}; using the cached version", e);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve `command`, run it with `args` and return its exit code.
    pub async fn run(&self, command: &str, args: &[String]) -> Result<i32> {
        let resolved = self.resolve(command).await?;
        let loaded = self.loaders.load(&resolved.entry)?;
        loaded.invoke(args, &resolved.context()).await
    }
}
