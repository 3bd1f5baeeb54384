//! Add-on removal.

use super::events::ProgressReporter;
use super::fsutil::{matching_entries, remove_path};
use super::types::{AddonDescriptor, AddonError};
use std::path::Path;
use tracing::{error, info};

/// Removes every entry of `descriptor` from its target directory.
///
/// A missing target directory or an addon with no matching entries is a
/// successful no-op. Removal is a best-effort sweep: every entry is tried
/// even after a failure. Returns the number of entries removed.
///
/// # Errors
/// - `UninstallIncomplete` if any entry could not be removed.
/// - `InstallFailed` if the target directory cannot be listed.
pub async fn uninstall(
    descriptor: &AddonDescriptor,
    game_root: &Path,
    progress: &mut ProgressReporter<'_>,
) -> Result<usize, AddonError> {
    let target_dir = descriptor.target_dir(game_root);

    if !tokio::fs::try_exists(&target_dir).await.unwrap_or(false) {
        info!(
            "[ADDON-UNINSTALL] Target directory {} does not exist, nothing to uninstall",
            target_dir.display()
        );
        progress.finish();
        return Ok(0);
    }

    let items = matching_entries(&target_dir, descriptor)
        .await
        .map_err(|e| AddonError::install(&descriptor.name, e))?;
    if items.is_empty() {
        info!("[ADDON-UNINSTALL] No items found to uninstall for '{}'", descriptor.name);
        progress.finish();
        return Ok(0);
    }

    info!(
        "[ADDON-UNINSTALL] Uninstalling '{}', removing {} item(s)",
        descriptor.name,
        items.len()
    );

    let total = items.len();
    let mut removed = 0;
    let mut failed = 0;
    for item in &items {
        match remove_path(item).await {
            Ok(()) => {
                removed += 1;
                info!("[ADDON-UNINSTALL] Removed: {}", item.display());
                progress.report_scaled(0.1, 0.8, removed as f64 / total as f64);
            }
            Err(e) => {
                error!("[ADDON-UNINSTALL] Error removing {}: {}", item.display(), e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return Err(AddonError::UninstallIncomplete {
            name: descriptor.name.clone(),
            failed,
        });
    }

    info!("[ADDON-UNINSTALL] '{}' uninstalled successfully", descriptor.name);
    progress.report(0.95);
    progress.finish();
    Ok(removed)
}
