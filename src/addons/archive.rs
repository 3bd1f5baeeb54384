//! Zip extraction and directory copying.
//!
//! Both run on the blocking pool; the `zip` crate and recursive copies are
//! synchronous.

use super::types::AddonError;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Extracts `archive` into `dest`, returning the number of files written.
///
/// # Errors
/// Returns `ExtractFailed` if the archive is unreadable or a file cannot be
/// written.
pub(crate) async fn extract_zip(archive: &Path, dest: &Path) -> Result<usize, AddonError> {
    let archive = archive.to_path_buf();
    let dest = dest.to_path_buf();

    tokio::task::spawn_blocking(move || extract_blocking(&archive, &dest))
        .await
        .map_err(|e| AddonError::ExtractFailed(format!("extraction task failed: {}", e)))?
}

fn extract_blocking(archive: &Path, dest: &Path) -> Result<usize, AddonError> {
    let file = File::open(archive)
        .map_err(|e| AddonError::ExtractFailed(format!("cannot open archive: {}", e)))?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| AddonError::ExtractFailed(format!("failed to open archive: {}", e)))?;

    fs::create_dir_all(dest).map_err(|e| AddonError::ExtractFailed(e.to_string()))?;

    let mut written = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| {
            AddonError::ExtractFailed(format!("failed to read archive entry: {}", e))
        })?;

        // Entries with absolute paths or `..` are never written.
        let Some(relative) = entry.enclosed_name() else {
            warn!("[ADDON-EXTRACT] Skipping unsafe entry '{}'", entry.name());
            continue;
        };
        let outpath = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&outpath).map_err(|e| AddonError::ExtractFailed(e.to_string()))?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent).map_err(|e| AddonError::ExtractFailed(e.to_string()))?;
        }
        let mut outfile = File::create(&outpath).map_err(|e| {
            AddonError::ExtractFailed(format!("cannot create {}: {}", outpath.display(), e))
        })?;
        io::copy(&mut entry, &mut outfile).map_err(|e| {
            AddonError::ExtractFailed(format!("cannot write {}: {}", outpath.display(), e))
        })?;
        written += 1;
    }

    debug!(
        "[ADDON-EXTRACT] Extracted {} file(s) into {}",
        written,
        dest.display()
    );
    Ok(written)
}

/// Recursively copies `src` into `dst`.
///
/// # Errors
/// Returns error if any file cannot be copied.
pub(crate) async fn copy_dir(src: &Path, dst: &Path) -> io::Result<()> {
    let src = src.to_path_buf();
    let dst = dst.to_path_buf();

    tokio::task::spawn_blocking(move || copy_dir_recursive(&src, &dst))
        .await
        .map_err(io::Error::other)?
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir_all(dst)?;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
        }
    }

    Ok(())
}

/// Returns the single top-level directory of an extracted tree.
///
/// Source archives wrap their content in one folder (`NSQC-main/`); when
/// that is the case the folder is returned, otherwise `root` itself.
pub(crate) fn content_root(root: &Path) -> io::Result<PathBuf> {
    let mut entries = fs::read_dir(root)?.collect::<io::Result<Vec<_>>>()?;
    if entries.len() == 1 && entries[0].file_type()?.is_dir() {
        if let Some(only) = entries.pop() {
            return Ok(only.path());
        }
    }
    Ok(root.to_path_buf())
}
