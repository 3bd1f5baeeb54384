//! Add-on installer.
//!
//! Downloads an addon and places it under the game directory. Three paths:
//! raw `.mpq` files, zip archives extracted in place, and the tracked addon
//! which is extracted into an isolated temp directory before replacing the
//! existing install.

use super::archive::{content_root, copy_dir, extract_zip};
use super::download::download_to_file;
use super::events::ProgressReporter;
use super::fsutil::{has_matching_entry, ScopedPath};
use super::types::{AddonDescriptor, AddonError, ArchiveKind, NSQC_ADDON, VERSION_MARKER_FILE};
use super::version::VersionOracle;
use reqwest::Client;
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Progress checkpoints reported to the UI.
pub mod checkpoints {
    /// Operation accepted.
    pub const STARTED: f64 = 0.1;
    /// Archive download starts; download spans `DOWNLOAD_START..EXTRACTING`.
    pub const DOWNLOAD_START: f64 = 0.15;
    /// Raw file download starts; download spans `RAW_START..=RAW_END`.
    pub const RAW_START: f64 = 0.2;
    /// Upper bound of raw file download progress.
    pub const RAW_END: f64 = 0.9;
    /// Download finished, extraction running.
    pub const EXTRACTING: f64 = 0.75;
    /// Extraction finished, verification running.
    pub const VERIFYING: f64 = 0.9;
    /// Files in place, cleanup running.
    pub const INSTALLED: f64 = 0.95;
}

use checkpoints::*;

/// Installs addons into a game directory.
#[derive(Debug, Clone)]
pub struct AddonInstaller {
    client: Client,
    /// Archive URL of the tracked addon.
    nsqc_archive_url: String,
    /// Directory for temporary archives and extraction trees.
    temp_dir: PathBuf,
}

impl AddonInstaller {
    /// Creates a new installer.
    #[must_use]
    pub fn new(client: Client, nsqc_archive_url: &str, temp_dir: PathBuf) -> Self {
        Self {
            client,
            nsqc_archive_url: nsqc_archive_url.to_string(),
            temp_dir,
        }
    }

    /// Returns the default temp directory (`<system temp>/nightwatch-addons`).
    #[must_use]
    pub fn default_temp_dir() -> PathBuf {
        env::temp_dir().join("nightwatch-addons")
    }

    /// Returns the temp directory in use.
    #[must_use]
    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Installs `descriptor` under `game_root`.
    ///
    /// Progress is non-decreasing and ends at exactly 1.0 on success; 1.0 is
    /// never reported on failure. Temp artifacts are removed on every path.
    ///
    /// # Errors
    /// Returns the first failure of the pipeline; see [`AddonError`].
    pub async fn install(
        &self,
        descriptor: &AddonDescriptor,
        game_root: &Path,
        oracle: &VersionOracle,
        progress: &mut ProgressReporter<'_>,
    ) -> Result<(), AddonError> {
        info!("[ADDON-INSTALL] Installing '{}'", descriptor.name);
        progress.report(STARTED);

        let result = if descriptor.is_tracked() {
            self.install_tracked(descriptor, game_root, oracle, progress)
                .await
        } else {
            let target_dir = descriptor.target_dir(game_root);
            ensure_dir(&target_dir).await?;

            match descriptor.archive_kind() {
                ArchiveKind::Mpq => self.install_raw(descriptor, &target_dir, progress).await,
                ArchiveKind::Zip => {
                    self.install_archive(descriptor, &target_dir, progress)
                        .await
                }
            }
        };

        match &result {
            Ok(()) => info!("[ADDON-INSTALL] '{}' installed successfully", descriptor.name),
            Err(e) => error!("[ADDON-INSTALL] Error installing '{}': {}", descriptor.name, e),
        }
        result
    }

    /// Streams a raw file straight into the target directory.
    async fn install_raw(
        &self,
        descriptor: &AddonDescriptor,
        target_dir: &Path,
        progress: &mut ProgressReporter<'_>,
    ) -> Result<(), AddonError> {
        let target = target_dir.join(descriptor.download_file_name());
        debug!("[ADDON-INSTALL] Raw download into {}", target.display());

        // Removes the partial file unless the download completes.
        let partial = ScopedPath::adopt(target);
        progress.report(RAW_START);

        download_to_file(
            &self.client,
            &descriptor.download_link,
            partial.path(),
            |ratio| progress.report_scaled(RAW_START, RAW_END - RAW_START, ratio),
        )
        .await?;

        partial.disarm();
        progress.finish();
        Ok(())
    }

    /// Downloads a zip to the temp directory and extracts it in place.
    async fn install_archive(
        &self,
        descriptor: &AddonDescriptor,
        target_dir: &Path,
        progress: &mut ProgressReporter<'_>,
    ) -> Result<(), AddonError> {
        ensure_dir(&self.temp_dir).await?;
        let archive = ScopedPath::fresh(self.temp_dir.join(format!("{}.zip", descriptor.name)));

        progress.report(DOWNLOAD_START);
        download_to_file(
            &self.client,
            &descriptor.download_link,
            archive.path(),
            |ratio| progress.report_scaled(DOWNLOAD_START, EXTRACTING - DOWNLOAD_START, ratio),
        )
        .await?;

        info!("[ADDON-INSTALL] Download completed, extracting '{}'", descriptor.name);
        progress.report(EXTRACTING);
        extract_zip(archive.path(), target_dir).await?;

        progress.report(VERIFYING);
        let present = has_matching_entry(target_dir, descriptor)
            .await
            .map_err(|e| AddonError::install(&descriptor.name, e))?;
        if !present {
            return Err(AddonError::AddonNotFoundAfterInstall(descriptor.name.clone()));
        }

        progress.report(INSTALLED);
        drop(archive);
        progress.finish();
        Ok(())
    }

    /// Installs the tracked addon from its source archive.
    ///
    /// A no-op when the local and remote versions match. Fails before
    /// touching the existing install when the remote version is unknown.
    async fn install_tracked(
        &self,
        descriptor: &AddonDescriptor,
        game_root: &Path,
        oracle: &VersionOracle,
        progress: &mut ProgressReporter<'_>,
    ) -> Result<(), AddonError> {
        let local = oracle.local_version(game_root, descriptor).await;
        let remote = oracle.remote_version().await;
        debug!(
            "[ADDON-INSTALL] {} versions: local={:?} remote={:?}",
            NSQC_ADDON, local, remote
        );

        if local.is_some() && local == remote {
            info!("[ADDON-INSTALL] {} is already up to date", NSQC_ADDON);
            progress.finish();
            return Ok(());
        }
        // A copy without a version marker reads as not installed.
        let Some(remote) = remote else {
            return Err(AddonError::install(
                &descriptor.name,
                "remote version is unavailable",
            ));
        };

        ensure_dir(&self.temp_dir).await?;
        let archive = ScopedPath::fresh(self.temp_dir.join("nsqc_main.zip"));
        let staging = ScopedPath::fresh(self.temp_dir.join("nsqc_temp"));

        progress.report(DOWNLOAD_START);
        download_to_file(&self.client, &self.nsqc_archive_url, archive.path(), |ratio| {
            progress.report_scaled(DOWNLOAD_START, EXTRACTING - DOWNLOAD_START, ratio)
        })
        .await?;

        info!("[ADDON-INSTALL] Download completed, extracting {}", NSQC_ADDON);
        progress.report(EXTRACTING);
        ensure_dir(staging.path()).await?;
        extract_zip(archive.path(), staging.path()).await?;

        let source =
            content_root(staging.path()).map_err(|e| AddonError::ExtractFailed(e.to_string()))?;
        let install_dir = descriptor.tracked_install_dir(game_root);

        if tokio::fs::try_exists(&install_dir).await.unwrap_or(false) {
            debug!("[ADDON-INSTALL] Removing previous {}", install_dir.display());
            tokio::fs::remove_dir_all(&install_dir)
                .await
                .map_err(|e| AddonError::install(&descriptor.name, e))?;
        }
        ensure_dir(&descriptor.target_dir(game_root)).await?;

        copy_dir(&source, &install_dir)
            .await
            .map_err(|e| AddonError::install(&descriptor.name, e))?;

        tokio::fs::write(install_dir.join(VERSION_MARKER_FILE), remote)
            .await
            .map_err(|e| AddonError::install(&descriptor.name, e))?;

        progress.report(INSTALLED);
        drop(staging);
        drop(archive);
        progress.finish();
        Ok(())
    }
}

/// Creates `dir` and its parents.
async fn ensure_dir(dir: &Path) -> Result<(), AddonError> {
    tokio::fs::create_dir_all(dir).await.map_err(|e| {
        error!("[ADDON-INSTALL] Cannot create directory {}: {}", dir.display(), e);
        AddonError::directory(dir, &e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addons::events::NullSink;
    use crate::addons::types::AddonEntryConfig;
    use crate::addons::ErrorKind;
    use std::fs;

    fn descriptor(name: &str, link: &str) -> AddonDescriptor {
        AddonDescriptor::from_config(
            name,
            AddonEntryConfig {
                link: link.to_string(),
                description: String::new(),
                target_path: "Interface/AddOns".to_string(),
                is_zip: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_checkpoints_are_ordered() {
        let order = [STARTED, DOWNLOAD_START, EXTRACTING, VERIFYING, INSTALLED, 1.0];
        assert!(order.windows(2).all(|w| w[0] < w[1]));
        assert!(STARTED < RAW_START && RAW_START < RAW_END && RAW_END < 1.0);
    }

    #[test]
    fn test_default_temp_dir() {
        let dir = AddonInstaller::default_temp_dir();
        assert!(dir.starts_with(env::temp_dir()));
        assert!(dir.ends_with("nightwatch-addons"));
    }

    #[tokio::test]
    async fn test_unreachable_download_cleans_partial_mpq() {
        let root = tempfile::tempdir().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let installer =
            AddonInstaller::new(Client::new(), "http://127.0.0.1:1/n.zip", temp.path().into());
        let oracle = VersionOracle::new(Client::new(), "http://127.0.0.1:1/vers");
        let patch = descriptor("Patch", "http://127.0.0.1:1/patch-z.mpq");
        let mut progress = ProgressReporter::new("Patch", &NullSink);

        let err = installer
            .install(&patch, root.path(), &oracle, &mut progress)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DownloadFailed);
        assert!(progress.last().unwrap() < 1.0);
        let target = patch.target_dir(root.path());
        assert!(target.is_dir());
        assert_eq!(fs::read_dir(target).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_target_dir_creation_failure() {
        let root = tempfile::tempdir().unwrap();
        // A file where the target directory should be.
        fs::write(root.path().join("Interface"), b"not a dir").unwrap();
        let installer = AddonInstaller::new(
            Client::new(),
            "http://127.0.0.1:1/n.zip",
            root.path().join("tmp"),
        );
        let oracle = VersionOracle::new(Client::new(), "http://127.0.0.1:1/vers");
        let foo = descriptor("Foo", "http://127.0.0.1:1/foo.zip");
        let mut progress = ProgressReporter::new("Foo", &NullSink);

        let err = installer
            .install(&foo, root.path(), &oracle, &mut progress)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DirectoryCreateFailed);
    }

    #[tokio::test]
    async fn test_tracked_install_without_remote_version_keeps_existing() {
        let root = tempfile::tempdir().unwrap();
        let nsqc = descriptor(NSQC_ADDON, "http://127.0.0.1:1/nsqc.zip");
        let install_dir = nsqc.tracked_install_dir(root.path());
        fs::create_dir_all(&install_dir).unwrap();
        fs::write(nsqc.version_marker_path(root.path()), "5").unwrap();

        let installer = AddonInstaller::new(
            Client::new(),
            "http://127.0.0.1:1/nsqc.zip",
            root.path().join("tmp"),
        );
        let oracle = VersionOracle::new(Client::new(), "http://127.0.0.1:1/vers");
        let mut progress = ProgressReporter::new(NSQC_ADDON, &NullSink);

        let err = installer
            .install(&nsqc, root.path(), &oracle, &mut progress)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InstallFailed);
        assert_eq!(progress.last(), Some(STARTED));
        assert_eq!(
            fs::read_to_string(nsqc.version_marker_path(root.path())).unwrap(),
            "5"
        );
    }
}
