use anyhow::{Result, anyhow};
use clap::Parser;
use cmdpack::{
    config::{Config, ConfigOptions},
    dispatch::{CommandTable, Dispatcher},
    runtime::RealRuntime,
    selfcheck::{SELF_PACKAGE, check_for_update},
};
use log::{debug, warn};
use std::path::PathBuf;

const VERSION: &str = env!("CMDPACK_VERSION");

/// Version published to the registry, compared against newer releases.
const PACKAGE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// cmdpack - on-demand command packages
///
/// Runs commands that live in registry packages. The package behind a
/// command is installed into a local cache on first use, kept up to date on
/// later runs, and its entry file is executed with the remaining arguments.
///
/// Examples:
///   cmdpack init my-app          # Run the `init` command
///   cmdpack which init           # Print the entry file behind `init`
///   cmdpack --target-path . init # Run a local checkout of the package
#[derive(Parser, Debug)]
#[command(author, version = VERSION, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Home directory for the cache and command table (default ~/.cmdpack)
    #[arg(long, env = "CMDPACK_HOME", value_name = "PATH", global = true)]
    home: Option<PathBuf>,

    /// Use the package at this path instead of the cache
    #[arg(long, env = "CMDPACK_TARGET_PATH", value_name = "PATH", global = true)]
    target_path: Option<PathBuf>,

    /// Registry URL (default https://registry.npmmirror.com/)
    #[arg(long, env = "CMDPACK_REGISTRY", value_name = "URL", global = true)]
    registry: Option<String>,

    /// Use the upstream npm registry
    #[arg(long, global = true)]
    npmjs: bool,

    /// Bearer token for the registry
    #[arg(
        long,
        env = "CMDPACK_REGISTRY_TOKEN",
        value_name = "TOKEN",
        hide_env_values = true,
        global = true
    )]
    token: Option<String>,

    /// Installer program (default npminstall)
    #[arg(long, env = "CMDPACK_INSTALLER", value_name = "PROGRAM", global = true)]
    installer: Option<String>,

    /// Registry request timeout in seconds
    #[arg(long, value_name = "SECS", global = true)]
    timeout: Option<u64>,

    /// Attempts per registry request
    #[arg(long, value_name = "N", global = true)]
    retries: Option<usize>,

    /// Skip the check for a newer cmdpack
    #[arg(long, global = true)]
    no_update_check: bool,

    /// Log debug output
    #[arg(long, short, global = true)]
    verbose: bool,
}

impl Cli {
    fn config_options(&self) -> ConfigOptions {
        ConfigOptions {
            home: self.home.clone(),
            target_path: self.target_path.clone(),
            registry: self.registry.clone(),
            npmjs: self.npmjs,
            token: self.token.clone(),
            installer: self.installer.clone(),
            timeout_secs: self.timeout,
            retries: self.retries,
        }
    }
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Install the package behind a command if needed and print its entry file
    Which {
        #[arg(value_name = "COMMAND")]
        command: String,
    },

    /// List known commands and their packages
    Commands,

    #[command(external_subcommand)]
    External(Vec<String>),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("CMDPACK_LOG", default_filter),
    )
    .init();

    let code = run(cli).await?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<i32> {
    let runtime = RealRuntime;
    let config = Config::from_options(&runtime, cli.config_options())?;
    debug!("{:?}", config);

    let registry = config.registry()?;
    let installer = config.installer();
    let table = CommandTable::load(&runtime, &config.commands_file())?;
    let dispatcher = Dispatcher::new(&config, &runtime, &registry, &installer, table);

    if let Commands::Commands = cli.command {
        for (command, request) in dispatcher.table().iter() {
            println!("{}\t{}", command, request);
        }
        return Ok(0);
    }

    if !cli.no_update_check {
        match config.self_check_registry() {
            Ok(own) => {
                check_for_update(&own, SELF_PACKAGE, PACKAGE_VERSION).await;
            }
            Err(e) => warn!("Update check skipped: {:#}", e),
        }
    }

    match cli.command {
        Commands::Which { command } => {
            let resolved = dispatcher.resolve(&command).await?;
            println!("{}", resolved.entry.display());
            Ok(0)
        }
        Commands::External(argv) => {
            let (command, args) = argv
                .split_first()
                .ok_or_else(|| anyhow!("No command given"))?;
            dispatcher.run(command, args).await
        }
        Commands::Commands => Ok(0),
    }
}
