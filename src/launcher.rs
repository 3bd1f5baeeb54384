//! Game launch handoff.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{error, info};

/// Executable expected in the game root.
pub const GAME_EXECUTABLE: &str = "Wow.exe";

/// Returns the game executable path under `game_root`.
#[must_use]
pub fn game_executable(game_root: &Path) -> PathBuf {
    game_root.join(GAME_EXECUTABLE)
}

/// Starts the game detached from the launcher.
///
/// Returns false if the executable is missing or cannot be spawned.
#[must_use]
pub fn launch(game_root: &Path) -> bool {
    let exe = game_executable(game_root);
    if !exe.is_file() {
        error!("[LAUNCH] {} not found", exe.display());
        return false;
    }

    info!("[LAUNCH] Launching game: {}", exe.display());

    #[cfg(windows)]
    let mut command = {
        let mut command = Command::new("cmd");
        command.arg("/C").arg("start").arg("").arg(&exe);
        command
    };

    #[cfg(not(windows))]
    let mut command = Command::new(&exe);

    let spawned = command
        .current_dir(game_root)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();

    match spawned {
        Ok(child) => {
            info!("[LAUNCH] Game started (pid {})", child.id());
            true
        }
        Err(e) => {
            error!("[LAUNCH] Error launching game: {}", e);
            false
        }
    }
}
