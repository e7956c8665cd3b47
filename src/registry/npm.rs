//! npm-compatible registry client.

use async_trait::async_trait;
use log::debug;

use crate::error::{Error, Result};
use crate::http::HttpClient;

use super::{RegistryClient, RegistryMetadata, package_url};

/// npm registry response types (internal).
mod api {
    use serde::Deserialize;
    use serde::de::IgnoredAny;
    use std::collections::BTreeMap;

    #[derive(Deserialize, Debug)]
    pub struct Packument {
        pub name: Option<String>,
        pub versions: Option<BTreeMap<String, IgnoredAny>>,
        /// Some mirrors answer unknown packages with `200 {"error": "not_found"}`.
        pub error: Option<String>,
    }
}

/// Registry client speaking the npm "packument" protocol:
/// `GET <registry>/<name>` returning a JSON document with a `versions` map.
pub struct NpmRegistry {
    http_client: HttpClient,
    registry_url: String,
}

impl NpmRegistry {
    pub fn new(http_client: HttpClient, registry_url: &str) -> Self {
        Self {
            http_client,
            registry_url: registry_url.to_string(),
        }
    }
}

#[async_trait]
impl RegistryClient for NpmRegistry {
    fn registry_url(&self) -> &str {
        &self.registry_url
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_metadata(&self, name: &str) -> Result<Option<RegistryMetadata>> {
        let url = package_url(&self.registry_url, name);
        debug!("Fetching package metadata from {}...", url);

        let document: Option<api::Packument> = self
            .http_client
            .get_json_optional(&url)
            .await
            .map_err(|e| Error::network(name, &e))?;

        let Some(document) = document else {
            return Ok(None);
        };

        match (document.versions, document.error) {
            (Some(versions), _) => Ok(Some(RegistryMetadata {
                name: document.name.unwrap_or_else(|| name.to_string()),
                versions: versions.into_keys().collect(),
            })),
            (None, Some(error)) => {
                debug!("Registry reported {} for {}", error, name);
                Ok(None)
            }
            (None, None) => Err(Error::Network {
                name: name.to_string(),
                reason: format!("response from {} has no `versions` field", url),
            }),
        }
    }
}
