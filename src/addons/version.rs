//! Version oracle for the tracked addon.
//!
//! Compares the local version marker with the remote one. Every lookup is
//! best-effort: failures are logged and degrade to "unknown".

use super::types::{AddonDescriptor, VERSION_TIMEOUT};
use reqwest::Client;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Local/remote version lookups plus the process-wide check guard.
#[derive(Debug)]
pub struct VersionOracle {
    client: Client,
    url: String,
    checking: AtomicBool,
}

/// Held while a version check is in flight.
pub(crate) struct CheckGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for CheckGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl VersionOracle {
    /// Creates an oracle reading the remote marker from `url`.
    #[must_use]
    pub fn new(client: Client, url: &str) -> Self {
        assert!(!url.is_empty(), "Version URL must not be empty");
        Self {
            client,
            url: url.to_string(),
            checking: AtomicBool::new(false),
        }
    }

    /// Reads the local version marker.
    ///
    /// Returns `None` if the marker is absent, unreadable or empty.
    pub async fn local_version(
        &self,
        game_root: &Path,
        descriptor: &AddonDescriptor,
    ) -> Option<String> {
        let path = descriptor.version_marker_path(game_root);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => non_empty(&content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("[ADDON-VERSION] No local marker at {}", path.display());
                None
            }
            Err(e) => {
                warn!(
                    "[ADDON-VERSION] Error reading local version {}: {}",
                    path.display(),
                    e
                );
                None
            }
        }
    }

    /// Fetches the remote version marker.
    ///
    /// Returns `None` on any failure.
    pub async fn remote_version(&self) -> Option<String> {
        let response = match self
            .client
            .get(&self.url)
            .timeout(VERSION_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("[ADDON-VERSION] Error getting remote version: {}", e);
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!("[ADDON-VERSION] Remote version answered {}", status);
            return None;
        }

        match response.text().await {
            Ok(body) => non_empty(&body),
            Err(e) => {
                warn!("[ADDON-VERSION] Error reading remote version: {}", e);
                None
            }
        }
    }

    /// Claims the process-wide check slot.
    ///
    /// Returns `None` when another check is already running.
    pub(crate) fn try_begin_check(&self) -> Option<CheckGuard<'_>> {
        self.checking
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CheckGuard {
                flag: &self.checking,
            })
    }

    /// Returns true while a check is in flight.
    #[must_use]
    pub fn is_checking(&self) -> bool {
        self.checking.load(Ordering::Acquire)
    }
}

/// Decides whether an update is needed.
///
/// Unknown versions on either side never count as an update.
#[must_use]
pub fn needs_update(local: Option<&str>, remote: Option<&str>) -> bool {
    match (local, remote) {
        (Some(local), Some(remote)) => local != remote,
        _ => false,
    }
}

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
