//! Mapping of command names to the packages implementing them.

use log::debug;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::package::VersionSpec;
use crate::runtime::Runtime;

/// Commands known without any configuration.
pub const BUILTIN_COMMANDS: &[(&str, &str)] = &[("init", "@cmdpack/init")];

/// A package name with an optional version: `name`, `@scope/name`,
/// `name@1.2.0`, `@scope/name@latest`.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageRequest {
    pub name: String,
    pub version: VersionSpec,
}

impl FromStr for PackageRequest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (name, version) = match s.rfind('@') {
            Some(at) if at > 0 => (&s[..at], s[at + 1..].parse()?),
            _ => (s, VersionSpec::Latest),
        };
        if name.is_empty() {
            return Err(Error::Config(format!("missing package name in {:?}", s)));
        }
        Ok(Self {
            name: name.to_string(),
            version,
        })
    }
}

impl fmt::Display for PackageRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

#[derive(Deserialize, Debug, Default)]
struct CommandsFile {
    #[serde(default)]
    commands: BTreeMap<String, String>,
}

/// Command name to package request lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandTable {
    entries: BTreeMap<String, PackageRequest>,
}

impl CommandTable {
    /// Only the built-in commands.
    pub fn builtin() -> Self {
        let entries = BUILTIN_COMMANDS
            .iter()
            .map(|(command, package)| {
                (
                    command.to_string(),
                    PackageRequest {
                        name: package.to_string(),
                        version: VersionSpec::Latest,
                    },
                )
            })
            .collect();
        Self { entries }
    }

    /// Built-ins extended and overridden by the JSON file at `path`, if any.
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime>(runtime: &R, path: &Path) -> Result<Self> {
        let mut table = Self::builtin();
        if !runtime.exists(path) {
            debug!("No command table at {:?}", path);
            return Ok(table);
        }

        let content = runtime
            .read_to_string(path)
            .map_err(|e| Error::filesystem(path, &e))?;
        let file: CommandsFile = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("invalid command table {:?}: {}", path, e)))?;

        for (command, package) in file.commands {
            let request = package.parse()?;
            table.insert(&command, request);
        }
        Ok(table)
    }

    pub fn insert(&mut self, command: &str, request: PackageRequest) {
        self.entries.insert(command.to_string(), request);
    }

    pub fn get(&self, command: &str) -> Result<&PackageRequest> {
        self.entries
            .get(command)
            .ok_or_else(|| Error::Config(format!("unknown command {:?}", command)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PackageRequest)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}
