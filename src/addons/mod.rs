//! Add-ons system for the NightWatch launcher.
//!
//! Downloads addon packages listed in a remote manifest, installs them under
//! the game directory and tracks their install state.
//!
//! # Architecture
//!
//! - **types**: Manifest schema, descriptors, state records and errors
//! - **fetcher**: Remote manifest fetcher
//! - **version**: Version oracle for the tracked NSQC addon
//! - **installer**: Download/extract/verify pipelines
//! - **uninstaller**: Best-effort removal of an addon's files
//! - **registry**: Per-addon state, mutual exclusion and status recomputation
//! - **events**: Progress and notification events for the UI
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use nightwatch::addons::{AddonRegistry, RegistryOptions};
//!
//! let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
//! let registry = AddonRegistry::new(RegistryOptions::default(), Arc::new(tx))?;
//! registry.set_game_root(game_dir);
//! registry.load().await?;
//! registry.toggle("NSQC", true).await?;
//! ```

mod archive;
mod download;
mod events;
mod fetcher;
mod fsutil;
mod installer;
mod registry;
mod types;
mod uninstaller;
mod version;

pub use events::{AddonEvent, EventSink, NullSink, ProgressReporter};
pub use fetcher::ConfigFetcher;
pub use installer::{checkpoints, AddonInstaller};
pub use registry::{AddonRegistry, AddonSnapshot, RegistryOptions};
pub use types::{
    AddonDescriptor, AddonEntryConfig, AddonError, AddonManifest, AddonState, ArchiveKind,
    Endpoints, ErrorKind, CONFIG_TIMEOUT, DEFAULT_CONFIG_URL, DEFAULT_NSQC_ARCHIVE_URL,
    DEFAULT_VERSION_URL, DOWNLOAD_TIMEOUT, NSQC_ADDON, USER_AGENT, VERSION_MARKER_FILE,
    VERSION_TIMEOUT,
};
pub use uninstaller::uninstall;
pub use version::{needs_update, VersionOracle};
