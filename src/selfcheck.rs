//! Notice about newer releases of cmdpack itself.

use log::{debug, warn};
use semver::Version;

use crate::package::{VersionResolver, parse_version};
use crate::registry::RegistryClient;

/// Package cmdpack is published under.
pub const SELF_PACKAGE: &str = "cmdpack";

/// Look up a release newer than `current`.
///
/// Never fails: any problem is logged and treated as "no update".
#[tracing::instrument(skip(registry))]
pub async fn check_for_update<C: RegistryClient>(
    registry: &C,
    name: &str,
    current: &str,
) -> Option<Version> {
    let Some(current) = parse_version(current) else {
        debug!("Skipping update check: {:?} is not a release version", current);
        return None;
    };

    let metadata = match registry.fetch_metadata(name).await {
        Ok(Some(metadata)) => metadata,
        Ok(None) => {
            debug!("{} is not published on {}", name, registry.registry_url());
            return None;
        }
        Err(e) => {
            warn!("Update check failed: {}", e);
            return None;
        }
    };

    let versions = VersionResolver::parse_all(&metadata.versions);
    let newer = VersionResolver::highest_greater_than(&current, &versions).cloned();
    if let Some(newer) = &newer {
        warn!(
            "A newer {} is available: {} (installed {})",
            name, newer, current
        );
    }
    newer
}
