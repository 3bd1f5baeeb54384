//! Configuration module for the NightWatch launcher.
//!
//! Handles loading and parsing the .nightwatchrc configuration file.

use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::addons::{AddonInstaller, Endpoints, RegistryOptions};
use crate::launcher::GAME_EXECUTABLE;
use crate::logging::LogConfig;

/// Environment variable overriding the manifest URL.
pub const CONFIG_URL_ENV: &str = "NIGHTWATCH_CONFIG_URL";

/// Default interval between background update checks.
pub const DEFAULT_UPDATE_INTERVAL_SECS: u64 = 30;

/// Default .nightwatchrc file content with all settings documented.
const DEFAULT_RC: &str = r#"# NightWatch Launcher Configuration File
# ======================================
# Lines starting with '#' are comments.
#
# Game
# ----
# Directory containing Wow.exe. Set with `nightwatch set-game-path <dir>`.
# game_path = C:\Games\WoW
#
# Add-ons
# -------
# config_url = https://raw.githubusercontent.com/Vladgobelen/NSQCu/main/addons.json
# version_url = https://raw.githubusercontent.com/Vladgobelen/NSQC/main/vers
# nsqc_archive_url = https://github.com/Vladgobelen/NSQC/archive/refs/heads/main.zip
# temp_dir = /tmp/nightwatch-addons
# update_interval = 30     # Seconds between NSQC update checks
#
# Logging
# -------
# log_enabled = true       # Enable/disable file logging (true/false)
# log_level = info         # Log level: trace, debug, info, warn, error, off
# log_retention = 24       # Hours to keep log files (default: 24)
"#;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Game root directory.
    pub game_path: Option<PathBuf>,
    /// Remote endpoints for the addon system.
    pub endpoints: Endpoints,
    /// Directory for temporary downloads.
    pub temp_dir: PathBuf,
    /// Interval between background update checks.
    pub update_interval: Duration,
    /// Logging configuration.
    pub log_config: LogConfig,
    /// Path to config file.
    pub config_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            game_path: None,
            endpoints: Endpoints::default(),
            temp_dir: AddonInstaller::default_temp_dir(),
            update_interval: Duration::from_secs(DEFAULT_UPDATE_INTERVAL_SECS),
            log_config: LogConfig::default(),
            config_path: Self::default_config_path(),
        }
    }
}

impl Config {
    /// Returns the default config file path (~/.nightwatchrc).
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".nightwatchrc")
    }

    /// Loads configuration from the default path, creating it if it doesn't exist.
    ///
    /// # Errors
    /// Returns error if config cannot be read or created.
    pub fn load() -> io::Result<Self> {
        let path = Self::default_config_path();
        Self::load_from(&path)
    }

    /// Loads configuration from a specific path.
    ///
    /// # Errors
    /// Returns error if config cannot be read or created.
    pub fn load_from(path: &Path) -> io::Result<Self> {
        if !path.exists() {
            Self::create_default_config(path)?;
        }

        let content = fs::read_to_string(path)?;
        let mut config = Self {
            config_path: path.to_path_buf(),
            ..Self::default()
        };
        config.parse(&content);

        if let Ok(url) = env::var(CONFIG_URL_ENV) {
            if !url.trim().is_empty() {
                config.endpoints.config_url = url.trim().to_string();
            }
        }

        Ok(config)
    }

    /// Creates the default config file.
    fn create_default_config(path: &Path) -> io::Result<()> {
        let mut file = fs::File::create(path)?;
        file.write_all(DEFAULT_RC.as_bytes())?;
        Ok(())
    }

    /// Parses the config file content.
    fn parse(&mut self, content: &str) {
        for line in content.lines() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                let value = value.trim();

                // Remove inline comments
                let value = value.split(" #").next().unwrap_or(value).trim();

                self.apply_setting(key, value);
            }
        }
    }

    /// Applies a single setting.
    fn apply_setting(&mut self, key: &str, value: &str) {
        if value.is_empty() {
            return;
        }

        match key {
            "game_path" | "game-path" => {
                self.game_path = Some(PathBuf::from(value));
            }
            "config_url" => self.endpoints.config_url = value.to_string(),
            "version_url" => self.endpoints.version_url = value.to_string(),
            "nsqc_archive_url" => self.endpoints.nsqc_archive_url = value.to_string(),
            "temp_dir" => self.temp_dir = PathBuf::from(value),
            "update_interval" => {
                if let Ok(secs) = value.parse::<u64>() {
                    if secs > 0 {
                        self.update_interval = Duration::from_secs(secs);
                    }
                }
            }
            "log_level" => {
                self.log_config.level = LogConfig::parse_level(value);
            }
            "log_retention" | "log_retention_hours" => {
                self.log_config.retention_hours = LogConfig::parse_retention(value);
            }
            "log_enabled" | "logging" => {
                self.log_config.enabled =
                    matches!(value.to_lowercase().as_str(), "true" | "yes" | "1" | "on");
            }
            _ => {}
        }
    }

    /// Reloads the configuration from disk.
    ///
    /// # Errors
    /// Returns error if config cannot be read.
    pub fn reload(&mut self) -> io::Result<()> {
        let path = self.config_path.clone();
        *self = Self::load_from(&path)?;
        Ok(())
    }

    /// Saves a single setting to the config file.
    ///
    /// # Errors
    /// Returns error if file cannot be written.
    pub fn save_setting(&self, key: &str, value: &str) -> io::Result<()> {
        assert!(!key.is_empty(), "Setting key cannot be empty");
        assert!(!value.is_empty(), "Setting value cannot be empty");

        let content = if self.config_path.exists() {
            fs::read_to_string(&self.config_path)?
        } else {
            String::new()
        };

        fs::write(&self.config_path, update_or_append_setting(&content, key, value))
    }

    /// Returns true if the configured game path contains the game executable.
    #[must_use]
    pub fn is_game_path_valid(&self) -> bool {
        self.game_path
            .as_deref()
            .is_some_and(|path| path.join(GAME_EXECUTABLE).is_file())
    }

    /// Validates and persists a new game path.
    ///
    /// # Errors
    /// Returns `InvalidInput` if the directory does not contain the game
    /// executable, or an I/O error if the config cannot be written.
    pub fn set_game_path(&mut self, path: &Path) -> io::Result<()> {
        if !path.join(GAME_EXECUTABLE).is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} does not contain {}", path.display(), GAME_EXECUTABLE),
            ));
        }

        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        self.save_setting("game_path", &path.to_string_lossy())?;
        tracing::info!("Game path set to: {}", path.display());
        self.game_path = Some(path);
        Ok(())
    }

    /// Builds registry options from this configuration.
    #[must_use]
    pub fn registry_options(&self) -> RegistryOptions {
        RegistryOptions {
            endpoints: self.endpoints.clone(),
            temp_dir: self.temp_dir.clone(),
            game_root: self.game_path.clone(),
        }
    }
}

/// Updates an existing setting or appends a new one.
fn update_or_append_setting(content: &str, key: &str, value: &str) -> String {
    let mut lines: Vec<String> = content.lines().map(String::from).collect();
    let setting_line = format!("{} = {}", key, value);
    let mut found = false;

    for line in &mut lines {
        let trimmed = line.trim();
        if trimmed.starts_with('#') {
            continue;
        }
        if let Some((existing_key, _)) = trimmed.split_once('=') {
            if existing_key.trim() == key {
                *line = setting_line.clone();
                found = true;
                break;
            }
        }
    }

    if !found {
        lines.push(setting_line);
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}
