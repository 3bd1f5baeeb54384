//! Add-on type definitions.
//!
//! Core data structures for the add-ons system: the manifest schema served
//! by the remote configuration, the immutable descriptors built from it, the
//! per-addon mutable state and the error taxonomy.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Name of the specially tracked addon.
pub const NSQC_ADDON: &str = "NSQC";

/// File name of the version marker inside the NSQC install directory.
pub const VERSION_MARKER_FILE: &str = "vers";

/// User agent sent with every request.
pub const USER_AGENT: &str = "NightWatchUpdater";

/// Timeout for the remote configuration request.
pub const CONFIG_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for the remote version marker request.
pub const VERSION_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for asset downloads.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Default location of the addon manifest.
pub const DEFAULT_CONFIG_URL: &str =
    "https://raw.githubusercontent.com/Vladgobelen/NSQCu/main/addons.json";

/// Default location of the remote NSQC version marker.
pub const DEFAULT_VERSION_URL: &str = "https://raw.githubusercontent.com/Vladgobelen/NSQC/main/vers";

/// Default location of the NSQC source archive.
pub const DEFAULT_NSQC_ARCHIVE_URL: &str =
    "https://github.com/Vladgobelen/NSQC/archive/refs/heads/main.zip";

/// Remote endpoints used by the addon system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Addon manifest URL.
    pub config_url: String,
    /// Remote NSQC version marker URL.
    pub version_url: String,
    /// NSQC archive URL (used instead of the descriptor link).
    pub nsqc_archive_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            config_url: DEFAULT_CONFIG_URL.to_string(),
            version_url: DEFAULT_VERSION_URL.to_string(),
            nsqc_archive_url: DEFAULT_NSQC_ARCHIVE_URL.to_string(),
        }
    }
}

/// Raw manifest payload: `{ "addons": { name: { ... } } }`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddonManifest {
    /// Addon entries keyed by name.
    #[serde(default)]
    pub addons: BTreeMap<String, AddonEntryConfig>,
}

/// A single manifest entry as served by the remote configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AddonEntryConfig {
    /// Download URL.
    pub link: String,
    /// Display text.
    #[serde(default)]
    pub description: String,
    /// Install location relative to the game root, `/`-separated.
    pub target_path: String,
    /// Archive hint. Accepted but not consulted: the link extension
    /// decides the [`ArchiveKind`].
    #[serde(default)]
    pub is_zip: Option<bool>,
}

impl AddonManifest {
    /// Validates every entry and builds descriptors.
    ///
    /// Malformed entries are skipped with a warning so that one bad entry
    /// does not hide the rest of the catalogue.
    #[must_use]
    pub fn into_descriptors(self) -> Vec<AddonDescriptor> {
        let mut descriptors = Vec::with_capacity(self.addons.len());

        for (name, entry) in self.addons {
            match AddonDescriptor::from_config(&name, entry) {
                Ok(descriptor) => descriptors.push(descriptor),
                Err(e) => {
                    warn!("[ADDON-CONFIG] Skipping invalid addon '{}': {}", name, e);
                }
            }
        }

        descriptors
    }
}

/// Classification of a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// Compressed archive that is extracted into the target directory.
    Zip,
    /// Raw file copied as-is into the target directory.
    Mpq,
}

impl ArchiveKind {
    /// Classifies a download link by its extension.
    ///
    /// Anything that is not `.mpq` takes the archive path.
    #[must_use]
    pub fn from_link(link: &str) -> Self {
        if link_path(link).to_lowercase().ends_with(".mpq") {
            Self::Mpq
        } else {
            Self::Zip
        }
    }
}

/// Immutable description of an installable addon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddonDescriptor {
    /// Unique name, also used to recognise installed files.
    pub name: String,
    /// Download URL.
    pub download_link: String,
    /// Display text.
    pub description: String,
    /// Install directory relative to the game root.
    pub target_relative_path: PathBuf,
}

impl AddonDescriptor {
    /// Builds a descriptor from a manifest entry.
    ///
    /// # Errors
    /// Returns `InvalidManifest` for empty fields, names that are not plain
    /// file names, and target paths escaping the game root.
    pub fn from_config(name: &str, config: AddonEntryConfig) -> Result<Self, AddonError> {
        if name.trim().is_empty() {
            return Err(AddonError::InvalidManifest("empty addon name".to_string()));
        }
        if name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(AddonError::InvalidManifest(format!(
                "addon name '{}' is not a plain name",
                name
            )));
        }
        if config.link.trim().is_empty() {
            return Err(AddonError::InvalidManifest(format!(
                "addon '{}' has no download link",
                name
            )));
        }

        let target_relative_path = normalize_target_path(&config.target_path).ok_or_else(|| {
            AddonError::InvalidManifest(format!(
                "addon '{}' has invalid target path '{}'",
                name, config.target_path
            ))
        })?;

        Ok(Self {
            name: name.to_string(),
            download_link: config.link.trim().to_string(),
            description: config.description,
            target_relative_path,
        })
    }

    /// Returns the archive kind derived from the download link.
    #[must_use]
    pub fn archive_kind(&self) -> ArchiveKind {
        ArchiveKind::from_link(&self.download_link)
    }

    /// Returns true for the specially tracked addon.
    #[must_use]
    pub fn is_tracked(&self) -> bool {
        self.name == NSQC_ADDON
    }

    /// Returns the absolute install directory under `game_root`.
    #[must_use]
    pub fn target_dir(&self, game_root: &Path) -> PathBuf {
        game_root.join(&self.target_relative_path)
    }

    /// Returns the directory the tracked addon is installed into.
    #[must_use]
    pub fn tracked_install_dir(&self, game_root: &Path) -> PathBuf {
        self.target_dir(game_root).join(NSQC_ADDON)
    }

    /// Returns the version marker path of the tracked addon.
    #[must_use]
    pub fn version_marker_path(&self, game_root: &Path) -> PathBuf {
        self.tracked_install_dir(game_root).join(VERSION_MARKER_FILE)
    }

    /// Returns the file name a raw download is stored under.
    #[must_use]
    pub fn download_file_name(&self) -> String {
        let path = link_path(&self.download_link);
        match path.rsplit('/').next() {
            Some(base) if !base.is_empty() => base.to_string(),
            _ => format!("{}.mpq", self.name),
        }
    }

    /// Returns true if a directory entry belongs to this addon.
    #[must_use]
    pub fn owns_entry(&self, entry_name: &str) -> bool {
        entry_name
            .to_lowercase()
            .contains(&self.name.to_lowercase())
    }
}

/// Mutable per-addon status, owned by the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddonState {
    /// Recomputed from the filesystem after every operation.
    pub installed: bool,
    /// True while an install or uninstall is in flight.
    pub updating: bool,
    /// Only meaningful for the tracked addon.
    pub needs_update: bool,
    /// Mutual-exclusion guard for operations on this addon.
    pub being_processed: bool,
}

/// Category of an [`AddonError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ConfigTimeout,
    ConfigUnavailable,
    InvalidManifest,
    UnknownAddon,
    AlreadyProcessing,
    DirectoryCreateFailed,
    DownloadFailed,
    ExtractFailed,
    AddonNotFoundAfterInstall,
    UninstallIncomplete,
    InstallFailed,
    GamePathNotSet,
}

/// Add-on error types.
#[derive(Debug, Error)]
pub enum AddonError {
    /// The configuration request timed out.
    #[error("Timed out loading the add-on configuration. Check your internet connection.")]
    ConfigTimeout,
    /// The configuration could not be fetched.
    #[error("Failed to load add-on configuration: {0}")]
    ConfigUnavailable(String),
    /// The configuration payload was rejected.
    #[error("Invalid add-on configuration: {0}")]
    InvalidManifest(String),
    /// No addon with this name exists.
    #[error("Add-on '{0}' not found")]
    UnknownAddon(String),
    /// Another operation on this addon is in flight.
    #[error("Add-on '{0}' is already being processed")]
    AlreadyProcessing(String),
    /// A target or temp directory could not be created.
    #[error("Cannot create directory {}: {reason}", .path.display())]
    DirectoryCreateFailed { path: PathBuf, reason: String },
    /// The asset download failed.
    #[error("Download of {url} failed: {reason}")]
    DownloadFailed { url: String, reason: String },
    /// The archive could not be extracted.
    #[error("Failed to extract archive: {0}")]
    ExtractFailed(String),
    /// The archive layout did not contain the addon.
    #[error("Add-on '{0}' not found after installation")]
    AddonNotFoundAfterInstall(String),
    /// Some entries could not be removed.
    #[error("Failed to completely uninstall '{name}': {failed} item(s) could not be removed")]
    UninstallIncomplete { name: String, failed: usize },
    /// Placing files into the game directory failed.
    #[error("Installation of '{name}' failed: {reason}")]
    InstallFailed { name: String, reason: String },
    /// No game root has been supplied yet.
    #[error("Game path is not set")]
    GamePathNotSet,
}

impl AddonError {
    /// Returns the error category.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigTimeout => ErrorKind::ConfigTimeout,
            Self::ConfigUnavailable(_) => ErrorKind::ConfigUnavailable,
            Self::InvalidManifest(_) => ErrorKind::InvalidManifest,
            Self::UnknownAddon(_) => ErrorKind::UnknownAddon,
            Self::AlreadyProcessing(_) => ErrorKind::AlreadyProcessing,
            Self::DirectoryCreateFailed { .. } => ErrorKind::DirectoryCreateFailed,
            Self::DownloadFailed { .. } => ErrorKind::DownloadFailed,
            Self::ExtractFailed(_) => ErrorKind::ExtractFailed,
            Self::AddonNotFoundAfterInstall(_) => ErrorKind::AddonNotFoundAfterInstall,
            Self::UninstallIncomplete { .. } => ErrorKind::UninstallIncomplete,
            Self::InstallFailed { .. } => ErrorKind::InstallFailed,
            Self::GamePathNotSet => ErrorKind::GamePathNotSet,
        }
    }

    pub(crate) fn directory(path: &Path, err: &std::io::Error) -> Self {
        Self::DirectoryCreateFailed {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    }

    pub(crate) fn download(url: &str, reason: impl ToString) -> Self {
        Self::DownloadFailed {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn install(name: &str, reason: impl ToString) -> Self {
        Self::InstallFailed {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Strips query string and fragment from a link.
fn link_path(link: &str) -> &str {
    let end = link.find(['?', '#']).unwrap_or(link.len());
    &link[..end]
}

/// Converts a `/` or `\` separated relative path to the host convention.
///
/// Returns `None` for absolute paths or paths with `..` components.
fn normalize_target_path(raw: &str) -> Option<PathBuf> {
    let path: PathBuf = raw
        .split(['/', '\\'])
        .filter(|part| !part.is_empty() && *part != ".")
        .collect();

    if raw.starts_with(['/', '\\']) || path.as_os_str().is_empty() {
        return None;
    }
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if escapes { None } else { Some(path) }
}
