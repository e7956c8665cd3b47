//! Package resolution and caching
//!
//! Everything needed to go from a package name and version request to an
//! installed directory and its entry file.

mod cache;
mod descriptor;
mod entry;
mod manager;
mod version;

pub use cache::{CacheStore, cache_key, cache_path, sanitized_name};
pub use descriptor::PackageDescriptor;
pub use entry::{EntryResolver, MANIFEST_FILE, Manifest};
pub use manager::{PackageManager, PackageState};
pub use version::{VersionResolver, VersionSpec, parse_version};
