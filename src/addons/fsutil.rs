//! Filesystem helpers shared by the installer, uninstaller and registry.

use super::types::AddonDescriptor;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Lists entries of `dir` that belong to `descriptor`.
///
/// # Errors
/// Returns error if the directory cannot be read.
pub(crate) async fn matching_entries(
    dir: &Path,
    descriptor: &AddonDescriptor,
) -> io::Result<Vec<PathBuf>> {
    let mut reader = tokio::fs::read_dir(dir).await?;
    let mut matches = Vec::new();

    while let Some(entry) = reader.next_entry().await? {
        let file_name = entry.file_name();
        if descriptor.owns_entry(&file_name.to_string_lossy()) {
            matches.push(entry.path());
        }
    }

    matches.sort();
    Ok(matches)
}

/// Returns true if `dir` exists and holds at least one entry of the addon.
///
/// # Errors
/// Returns error if the directory exists but cannot be read.
pub(crate) async fn has_matching_entry(dir: &Path, descriptor: &AddonDescriptor) -> io::Result<bool> {
    if !tokio::fs::try_exists(dir).await? {
        return Ok(false);
    }
    Ok(!matching_entries(dir, descriptor).await?.is_empty())
}

/// Removes a file or a directory tree.
///
/// # Errors
/// Returns error if removal fails.
pub(crate) async fn remove_path(path: &Path) -> io::Result<()> {
    let metadata = tokio::fs::symlink_metadata(path).await?;
    if metadata.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    }
}

/// Path removed when the guard goes out of scope.
///
/// Ties temp files and partial downloads to the operation that created
/// them. Removal failures are logged, never propagated.
#[derive(Debug)]
pub(crate) struct ScopedPath {
    path: PathBuf,
    armed: bool,
}

impl ScopedPath {
    /// Guards `path`, clearing anything left there by an earlier run.
    pub(crate) fn fresh(path: PathBuf) -> Self {
        let guard = Self::adopt(path);
        guard.remove();
        guard
    }

    /// Guards `path` without touching its current contents.
    pub(crate) fn adopt(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    /// Returns the guarded path.
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Keeps the path on drop.
    pub(crate) fn disarm(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }

    fn remove(&self) {
        let result = match fs::symlink_metadata(&self.path) {
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(&self.path),
            Ok(_) => fs::remove_file(&self.path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => debug!("[ADDON-CLEANUP] Removed {}", self.path.display()),
            Err(e) => warn!(
                "[ADDON-CLEANUP] Failed to remove {} (ignored): {}",
                self.path.display(),
                e
            ),
        }
    }
}

impl Drop for ScopedPath {
    fn drop(&mut self) {
        if self.armed {
            self.remove();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addons::types::AddonEntryConfig;

    fn foo() -> AddonDescriptor {
        AddonDescriptor::from_config(
            "Foo",
            AddonEntryConfig {
                link: "http://x/a.zip".to_string(),
                description: String::new(),
                target_path: "AddOns".to_string(),
                is_zip: None,
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_matching_entries() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("Foo")).unwrap();
        fs::write(dir.path().join("foo_extra.lua"), b"").unwrap();
        fs::create_dir(dir.path().join("Bar")).unwrap();

        let entries = matching_entries(dir.path(), &foo()).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(has_matching_entry(dir.path(), &foo()).await.unwrap());
        assert!(!has_matching_entry(&dir.path().join("missing"), &foo())
            .await
            .unwrap());
    }

    #[test]
    fn test_scoped_path_removes_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("foo.zip");
        let nested = dir.path().join("foo_temp");
        fs::write(&file, b"zip").unwrap();
        fs::create_dir_all(nested.join("inner")).unwrap();

        {
            let _a = ScopedPath::adopt(file.clone());
            let _b = ScopedPath::adopt(nested.clone());
        }

        assert!(!file.exists());
        assert!(!nested.exists());
    }

    #[test]
    fn test_scoped_path_fresh_and_disarm() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("stale.zip");
        fs::write(&file, b"old").unwrap();

        let guard = ScopedPath::fresh(file.clone());
        assert!(!file.exists());

        fs::write(guard.path(), b"new").unwrap();
        let kept = guard.disarm();
        assert_eq!(fs::read(kept).unwrap(), b"new");
    }
}
