use anyhow::Result;
use log::debug;
use reqwest::{
    Client,
    header::{AUTHORIZATION, HeaderMap, HeaderValue},
};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{
    error::Error,
    http::{DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_ATTEMPTS, HttpClient, RetryPolicy},
    installer::{DEFAULT_INSTALLER, NpmInstaller},
    registry::{DEFAULT_REGISTRY, NPMJS_REGISTRY, NpmRegistry},
    runtime::{Runtime, resolve_against},
};

/// Home directory name under the user's home when none is configured.
pub const DEFAULT_HOME_DIR: &str = ".cmdpack";

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Upper bound on the advisory self-update lookup.
pub const SELF_CHECK_TIMEOUT_SECS: u64 = 3;

const USER_AGENT: &str = concat!("cmdpack/", env!("CMDPACK_VERSION"));

/// Raw settings as collected from flags and environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOptions {
    pub home: Option<PathBuf>,
    pub target_path: Option<PathBuf>,
    pub registry: Option<String>,
    pub npmjs: bool,
    pub token: Option<String>,
    pub installer: Option<String>,
    pub timeout_secs: Option<u64>,
    pub retries: Option<usize>,
}

/// Resolved settings, built once at startup and passed down explicitly.
#[derive(Clone)]
pub struct Config {
    pub home: PathBuf,
    /// Local override: use the package at this path instead of the cache.
    pub target_path: Option<PathBuf>,
    pub registry_url: String,
    pub token: Option<String>,
    pub installer: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("home", &self.home)
            .field("target_path", &self.target_path)
            .field("registry_url", &self.registry_url)
            .field("token", &self.token.as_deref().map(mask_token))
            .field("installer", &self.installer)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

impl Config {
    pub fn from_options<R: Runtime>(
        runtime: &R,
        options: ConfigOptions,
    ) -> std::result::Result<Self, Error> {
        let user_home = runtime.home_dir();

        let home = match (options.home, &user_home) {
            (Some(home), _) if home.is_absolute() => resolve_against(Path::new("/"), &home),
            (Some(home), Some(user_home)) => resolve_against(user_home, &home),
            (Some(home), None) => {
                return Err(Error::Config(format!(
                    "cannot resolve relative home {:?} without a user home directory",
                    home
                )));
            }
            (None, Some(user_home)) => user_home.join(DEFAULT_HOME_DIR),
            (None, None) => {
                return Err(Error::Config(
                    "no home directory configured and the user home is unknown".into(),
                ));
            }
        };

        let target_path = match options.target_path {
            Some(path) if path.as_os_str().is_empty() => {
                return Err(Error::Config("empty target path".into()));
            }
            Some(path) if path.is_absolute() => Some(resolve_against(Path::new("/"), &path)),
            Some(path) => {
                let cwd = runtime.current_dir().map_err(|e| {
                    Error::Config(format!("cannot resolve target path {:?}: {:#}", path, e))
                })?;
                Some(resolve_against(&cwd, &path))
            }
            None => None,
        };

        let registry_url = match options.registry {
            Some(url) if url.trim().is_empty() => {
                return Err(Error::Config("empty registry URL".into()));
            }
            Some(url) => url,
            None if options.npmjs => NPMJS_REGISTRY.to_string(),
            None => DEFAULT_REGISTRY.to_string(),
        };

        let installer = options
            .installer
            .filter(|i| !i.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_INSTALLER.to_string());

        Ok(Self {
            home,
            target_path,
            registry_url,
            token: options.token.filter(|t| !t.is_empty()),
            installer,
            timeout: Duration::from_secs(options.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            retry: RetryPolicy::new(
                options.retries.unwrap_or(DEFAULT_MAX_ATTEMPTS),
                Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            ),
        })
    }

    /// Install root of the cache: `<home>/dependencies`.
    pub fn cache_root(&self) -> PathBuf {
        self.home.join("dependencies")
    }

    /// Store the cache layout lives in: `<home>/dependencies/node_modules`.
    pub fn store_dir(&self) -> PathBuf {
        self.cache_root().join("node_modules")
    }

    /// User command table: `<home>/commands.json`.
    pub fn commands_file(&self) -> PathBuf {
        self.home.join("commands.json")
    }

    pub fn http_client(&self) -> Result<HttpClient> {
        self.build_http_client(self.timeout, self.retry)
    }

    /// Client for the self-update lookup: one attempt and a short timeout.
    fn self_check_http_client(&self) -> Result<HttpClient> {
        let timeout = self.timeout.min(Duration::from_secs(SELF_CHECK_TIMEOUT_SECS));
        self.build_http_client(timeout, RetryPolicy::none())
    }

    fn build_http_client(&self, timeout: Duration, retry: RetryPolicy) -> Result<HttpClient> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &self.token {
            let mut auth_value = HeaderValue::from_str(&format!("Bearer {}", token))?;
            auth_value.set_sensitive(true);
            headers.insert(AUTHORIZATION, auth_value);
            debug!("Using registry token for authentication: {}", mask_token(token));
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(HttpClient::new(client).with_retry_policy(retry))
    }

    pub fn registry(&self) -> Result<NpmRegistry> {
        Ok(NpmRegistry::new(self.http_client()?, &self.registry_url))
    }

    /// Registry used only by the self-update notice.
    pub fn self_check_registry(&self) -> Result<NpmRegistry> {
        Ok(NpmRegistry::new(
            self.self_check_http_client()?,
            &self.registry_url,
        ))
    }

    pub fn installer(&self) -> NpmInstaller {
        NpmInstaller::new(&self.installer, &self.registry_url)
    }
}

fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 12 {
        return "*********".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}*********{}", head, tail)
}
