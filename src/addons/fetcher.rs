//! Remote addon configuration fetcher.

use super::types::{AddonDescriptor, AddonError, AddonManifest, CONFIG_TIMEOUT};
use reqwest::Client;
use std::time::Instant;
use tracing::{debug, error, info};

/// Fetches the addon manifest from the remote configuration URL.
#[derive(Debug, Clone)]
pub struct ConfigFetcher {
    client: Client,
    url: String,
}

impl ConfigFetcher {
    /// Creates a fetcher for `url` using a shared client.
    #[must_use]
    pub fn new(client: Client, url: &str) -> Self {
        assert!(!url.is_empty(), "Config URL must not be empty");
        Self {
            client,
            url: url.to_string(),
        }
    }

    /// Returns the configuration URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetches and validates the manifest.
    ///
    /// Single attempt, no retry.
    ///
    /// # Errors
    /// - `ConfigTimeout` if the request exceeds 10 seconds.
    /// - `ConfigUnavailable` on any other transport or HTTP failure.
    /// - `InvalidManifest` if the payload is not a manifest.
    pub async fn fetch(&self) -> Result<Vec<AddonDescriptor>, AddonError> {
        debug!("[ADDON-CONFIG] GET {}", self.url);
        let start = Instant::now();

        let response = self
            .client
            .get(&self.url)
            .timeout(CONFIG_TIMEOUT)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        debug!("[ADDON-CONFIG] Response: {} in {:?}", status, start.elapsed());

        if !status.is_success() {
            error!("[ADDON-CONFIG] Error loading addons config: HTTP {}", status);
            return Err(AddonError::ConfigUnavailable(format!("HTTP {}", status)));
        }

        let manifest: AddonManifest = response.json().await.map_err(classify)?;
        let descriptors = manifest.into_descriptors();

        info!(
            "[ADDON-CONFIG] Loaded {} addon(s) in {:?}",
            descriptors.len(),
            start.elapsed()
        );
        Ok(descriptors)
    }
}

/// Maps a reqwest error onto the configuration error taxonomy.
fn classify(e: reqwest::Error) -> AddonError {
    error!("[ADDON-CONFIG] Error loading addons config: {}", e);
    if e.is_timeout() {
        AddonError::ConfigTimeout
    } else if e.is_decode() {
        AddonError::InvalidManifest(e.to_string())
    } else {
        AddonError::ConfigUnavailable(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addons::ErrorKind;

    #[test]
    fn test_fetcher_keeps_url() {
        let fetcher = ConfigFetcher::new(Client::new(), "http://127.0.0.1:1/addons.json");
        assert_eq!(fetcher.url(), "http://127.0.0.1:1/addons.json");
    }

    #[test]
    #[should_panic(expected = "Config URL must not be empty")]
    fn test_empty_url_panics() {
        let _ = ConfigFetcher::new(Client::new(), "");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_unavailable() {
        // Port 1 is never listening on loopback.
        let fetcher = ConfigFetcher::new(Client::new(), "http://127.0.0.1:1/addons.json");
        let err = fetcher.fetch().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigUnavailable);
    }
}
