//! Add-on registry and state tracker.
//!
//! Owns the descriptor set and one [`AddonState`] per addon, serializes
//! operations per addon name and recomputes install status from the
//! filesystem after every operation.

use super::events::{AddonEvent, EventSink, ProgressReporter};
use super::fetcher::ConfigFetcher;
use super::fsutil::has_matching_entry;
use super::installer::AddonInstaller;
use super::types::{AddonDescriptor, AddonError, AddonState, Endpoints, NSQC_ADDON, USER_AGENT};
use super::uninstaller;
use super::version::{self, VersionOracle};
use reqwest::Client;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Registry construction options.
#[derive(Debug, Clone)]
pub struct RegistryOptions {
    /// Remote endpoints.
    pub endpoints: Endpoints,
    /// Directory for temporary archives.
    pub temp_dir: PathBuf,
    /// Game root, if already known.
    pub game_root: Option<PathBuf>,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::default(),
            temp_dir: AddonInstaller::default_temp_dir(),
            game_root: None,
        }
    }
}

/// Point-in-time copy of one addon's descriptor and state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddonSnapshot {
    /// Immutable description.
    pub descriptor: AddonDescriptor,
    /// Status at the time of the snapshot.
    pub state: AddonState,
}

struct AddonEntry {
    descriptor: Arc<AddonDescriptor>,
    state: AddonState,
}

/// Registry of known addons.
pub struct AddonRegistry {
    fetcher: ConfigFetcher,
    installer: AddonInstaller,
    oracle: VersionOracle,
    sink: Arc<dyn EventSink>,
    game_root: RwLock<Option<PathBuf>>,
    entries: Mutex<BTreeMap<String, AddonEntry>>,
}

/// Clears the in-flight flags of one addon when dropped.
struct ProcessingGuard<'a> {
    registry: &'a AddonRegistry,
    name: &'a str,
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        if let Some(entry) = self.registry.entries().get_mut(self.name) {
            entry.state.updating = false;
            entry.state.being_processed = false;
        }
    }
}

impl AddonRegistry {
    /// Creates an empty registry. Call [`load`](Self::load) to populate it.
    ///
    /// # Errors
    /// Returns `ConfigUnavailable` if the HTTP client cannot be built.
    pub fn new(options: RegistryOptions, sink: Arc<dyn EventSink>) -> Result<Self, AddonError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| {
                AddonError::ConfigUnavailable(format!("cannot build HTTP client: {}", e))
            })?;

        let endpoints = options.endpoints;
        Ok(Self {
            fetcher: ConfigFetcher::new(client.clone(), &endpoints.config_url),
            installer: AddonInstaller::new(
                client.clone(),
                &endpoints.nsqc_archive_url,
                options.temp_dir,
            ),
            oracle: VersionOracle::new(client, &endpoints.version_url),
            sink,
            game_root: RwLock::new(options.game_root),
            entries: Mutex::new(BTreeMap::new()),
        })
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<String, AddonEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets the game root all operations work under.
    pub fn set_game_root(&self, root: PathBuf) {
        info!("[ADDON-REGISTRY] Game path set to {}", root.display());
        *self.game_root.write().unwrap_or_else(PoisonError::into_inner) = Some(root);
    }

    /// Returns the game root, if set.
    #[must_use]
    pub fn game_root(&self) -> Option<PathBuf> {
        self.game_root
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn require_game_root(&self) -> Result<PathBuf, AddonError> {
        self.game_root().ok_or(AddonError::GamePathNotSet)
    }

    /// Returns the temp directory used for downloads.
    #[must_use]
    pub fn temp_dir(&self) -> &Path {
        self.installer.temp_dir()
    }

    /// Fetches the manifest and replaces the descriptor set.
    ///
    /// # Errors
    /// Propagates configuration fetch errors; the current set is kept.
    pub async fn load(&self) -> Result<Vec<AddonSnapshot>, AddonError> {
        let descriptors = self.fetcher.fetch().await?;
        self.replace_descriptors(descriptors);
        self.recompute_installed().await;
        Ok(self.snapshot())
    }

    /// Replaces the descriptor set wholesale with fresh state records.
    ///
    /// In-flight flags of addons that are still being processed survive the
    /// swap so a reload cannot open a second operation on the same name.
    fn replace_descriptors(&self, descriptors: Vec<AddonDescriptor>) {
        let mut entries = self.entries();
        let mut fresh = BTreeMap::new();

        for descriptor in descriptors {
            let mut state = AddonState::default();
            if let Some(old) = entries.get(&descriptor.name) {
                state.being_processed = old.state.being_processed;
                state.updating = old.state.updating;
            }
            fresh.insert(
                descriptor.name.clone(),
                AddonEntry {
                    descriptor: Arc::new(descriptor),
                    state,
                },
            );
        }

        debug!("[ADDON-REGISTRY] Registry now holds {} addon(s)", fresh.len());
        *entries = fresh;
    }

    /// Returns snapshots of every addon, sorted by name.
    #[must_use]
    pub fn snapshot(&self) -> Vec<AddonSnapshot> {
        self.entries()
            .values()
            .map(|entry| AddonSnapshot {
                descriptor: entry.descriptor.as_ref().clone(),
                state: entry.state,
            })
            .collect()
    }

    /// Returns a snapshot of one addon.
    #[must_use]
    pub fn addon(&self, name: &str) -> Option<AddonSnapshot> {
        self.entries().get(name).map(|entry| AddonSnapshot {
            descriptor: entry.descriptor.as_ref().clone(),
            state: entry.state,
        })
    }

    /// Returns the recorded install status of `name`.
    #[must_use]
    pub fn is_installed(&self, name: &str) -> bool {
        self.entries()
            .get(name)
            .is_some_and(|entry| entry.state.installed)
    }

    /// Installs (`install == true`) or uninstalls one addon.
    ///
    /// Emits progress while running, then `Finished` or `Error`. Flags are
    /// cleared and install status recomputed on every exit path.
    ///
    /// # Errors
    /// - `GamePathNotSet` before a game root is supplied.
    /// - `UnknownAddon` / `AlreadyProcessing` are rejected synchronously
    ///   without events.
    /// - Any installer or uninstaller failure, after it was reported.
    pub async fn toggle(&self, name: &str, install: bool) -> Result<(), AddonError> {
        let game_root = self.require_game_root()?;

        let descriptor = {
            let mut entries = self.entries();
            let entry = entries.get_mut(name).ok_or_else(|| {
                error!("[ADDON-REGISTRY] Addon '{}' not found", name);
                AddonError::UnknownAddon(name.to_string())
            })?;
            if entry.state.being_processed {
                warn!("[ADDON-REGISTRY] Addon '{}' is already being processed", name);
                return Err(AddonError::AlreadyProcessing(name.to_string()));
            }
            entry.state.being_processed = true;
            entry.state.updating = true;
            Arc::clone(&entry.descriptor)
        };
        let _guard = ProcessingGuard {
            registry: self,
            name,
        };

        let mut progress = ProgressReporter::new(name, self.sink.as_ref());
        let result = if install {
            self.installer
                .install(&descriptor, &game_root, &self.oracle, &mut progress)
                .await
        } else {
            uninstaller::uninstall(&descriptor, &game_root, &mut progress)
                .await
                .map(|_| ())
        };

        self.recompute_installed().await;
        if descriptor.is_tracked() {
            if let Err(e) = self.check_for_update().await {
                warn!("[ADDON-REGISTRY] Update check after '{}' failed: {}", name, e);
            }
        }

        match &result {
            Ok(()) => {
                self.sink.emit(AddonEvent::Finished {
                    name: name.to_string(),
                    success: true,
                });
            }
            Err(e) => {
                error!(
                    "[ADDON-REGISTRY] Error {} addon '{}': {}",
                    if install { "installing" } else { "uninstalling" },
                    name,
                    e
                );
                self.sink.emit(AddonEvent::Error {
                    message: e.to_string(),
                });
            }
        }

        result
    }

    /// Recomputes `installed` for every addon from the filesystem.
    ///
    /// Never fails: a scan error marks only that addon as not installed.
    pub async fn recompute_installed(&self) {
        let descriptors: Vec<Arc<AddonDescriptor>> = self
            .entries()
            .values()
            .map(|entry| Arc::clone(&entry.descriptor))
            .collect();
        let game_root = self.game_root();

        let mut results = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let installed = match &game_root {
                Some(root) => match installed_on_disk(&descriptor, root).await {
                    Ok(installed) => installed,
                    Err(e) => {
                        error!("[ADDON-REGISTRY] Error checking addon '{}': {}", descriptor.name, e);
                        false
                    }
                },
                None => false,
            };
            results.push((descriptor.name.clone(), installed));
        }

        let mut entries = self.entries();
        for (name, installed) in results {
            if let Some(entry) = entries.get_mut(&name) {
                entry.state.installed = installed;
            }
        }
    }

    /// Compares local and remote versions of the tracked addon.
    ///
    /// Only one check runs at a time process-wide; a call made while another
    /// is in flight returns `Ok(false)` without doing anything. Skipped when
    /// the addon is unknown or not installed; a not-installed addon has its
    /// `needs_update` cleared. Emits `UpdateAvailable` when
    /// `needs_update` turns true and the addon is not being processed.
    /// Returns the resulting `needs_update`.
    ///
    /// # Errors
    /// Returns `GamePathNotSet` before a game root is supplied.
    pub async fn check_for_update(&self) -> Result<bool, AddonError> {
        let game_root = self.require_game_root()?;
        let Some(_check) = self.oracle.try_begin_check() else {
            debug!("[ADDON-VERSION] Check already in flight, skipping");
            return Ok(false);
        };

        let descriptor = {
            let mut entries = self.entries();
            let Some(entry) = entries.get_mut(NSQC_ADDON) else {
                return Ok(false);
            };
            if !entry.state.installed {
                entry.state.needs_update = false;
                return Ok(false);
            }
            Arc::clone(&entry.descriptor)
        };

        let local = self.oracle.local_version(&game_root, &descriptor).await;
        let remote = self.oracle.remote_version().await;
        let needs_update = version::needs_update(local.as_deref(), remote.as_deref());
        debug!(
            "[ADDON-VERSION] local={:?} remote={:?} needs_update={}",
            local, remote, needs_update
        );

        let notify = {
            let mut entries = self.entries();
            let Some(entry) = entries.get_mut(NSQC_ADDON) else {
                return Ok(false);
            };
            let was = entry.state.needs_update;
            entry.state.needs_update = needs_update;
            needs_update && !was && !entry.state.being_processed
        };

        if notify {
            info!("[ADDON-VERSION] Update available for {}", NSQC_ADDON);
            self.sink.emit(AddonEvent::UpdateAvailable {
                name: NSQC_ADDON.to_string(),
            });
        }
        Ok(needs_update)
    }

    /// Runs [`check_for_update`](Self::check_for_update) every `interval`.
    pub fn spawn_update_watcher(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let Err(e) = registry.check_for_update().await {
                    debug!("[ADDON-VERSION] Periodic check skipped: {}", e);
                }
            }
        })
    }
}

/// Install status as seen on disk.
async fn installed_on_disk(descriptor: &AddonDescriptor, game_root: &Path) -> io::Result<bool> {
    if descriptor.is_tracked() {
        tokio::fs::try_exists(descriptor.version_marker_path(game_root)).await
    } else {
        has_matching_entry(&descriptor.target_dir(game_root), descriptor).await
    }
}
