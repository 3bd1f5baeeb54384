//! NightWatch
//!
//! Launcher and updater for a game client: installs and updates addon
//! packages listed in a remote manifest, tracks their install state and
//! launches the game.
//!
//! # Architecture
//!
//! - **Addons Module**: Manifest fetching, install/uninstall pipelines,
//!   NSQC version tracking and the per-addon state registry
//! - **Config Module**: `.nightwatchrc` settings and game path persistence
//! - **Launcher Module**: Detached game start
//! - **Logging Module**: File logging with retention
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use nightwatch::addons::{AddonRegistry, NullSink};
//! use nightwatch::Config;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load()?;
//! let registry = AddonRegistry::new(config.registry_options(), Arc::new(NullSink))?;
//! registry.load().await?;
//! registry.toggle("NSQC", true).await?;
//! # Ok(())
//! # }
//! ```

// Clippy configuration - allow common patterns
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::struct_excessive_bools)]

pub mod addons;
pub mod config;
pub mod launcher;
pub mod logging;

// Re-export main types
pub use addons::{AddonError, AddonEvent, AddonRegistry};
pub use config::Config;
