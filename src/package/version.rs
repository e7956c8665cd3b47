//! Version specs and version arithmetic.
//!
//! Ordering is semver precedence (`semver::Version`'s `Ord`), a total order,
//! so "highest" is a plain `max` over parsed versions.

use log::debug;
use semver::Version;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// The version a caller asked for.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum VersionSpec {
    /// The newest published version, resolved against the registry.
    #[default]
    Latest,
    /// A fixed version.
    Exact(Version),
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSpec::Latest => write!(f, "latest"),
            VersionSpec::Exact(v) => write!(f, "{}", v),
        }
    }
}

impl FromStr for VersionSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("latest") {
            return Ok(VersionSpec::Latest);
        }
        parse_version(trimmed)
            .map(VersionSpec::Exact)
            .ok_or_else(|| {
                Error::Config(format!(
                    "'{}' is neither 'latest' nor a semantic version",
                    s
                ))
            })
    }
}

/// Parse a version string, accepting an optional leading `v`.
pub fn parse_version(s: &str) -> Option<Version> {
    let s = s.trim();
    let s = s.strip_prefix('v').unwrap_or(s);
    Version::parse(s).ok()
}

/// Version resolver - pure functions over published versions.
pub struct VersionResolver;

impl VersionResolver {
    /// Parse published version strings, skipping the ones that are not semver.
    pub fn parse_all<I, S>(versions: I) -> Vec<Version>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        versions
            .into_iter()
            .filter_map(|v| {
                let parsed = parse_version(v.as_ref());
                if parsed.is_none() {
                    debug!("Skipping unparsable version {:?}", v.as_ref());
                }
                parsed
            })
            .collect()
    }

    /// The highest version, pre-releases included.
    pub fn highest(versions: &[Version]) -> Option<&Version> {
        versions.iter().max()
    }

    /// The highest version strictly greater than `base`.
    ///
    /// Only meant for "is there something newer than what I run" checks,
    /// never for picking an install target.
    pub fn highest_greater_than<'a>(base: &Version, versions: &'a [Version]) -> Option<&'a Version> {
        versions.iter().filter(|v| *v > base).max()
    }
}
