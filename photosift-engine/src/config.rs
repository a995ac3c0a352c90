//! Configuration management for the photosift engine
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (--data-dir, --photos-root)
//! 2. Environment variables (PHOTOSIFT_DATA_DIR, PHOTOSIFT_PHOTOS_ROOT)
//! 3. TOML configuration file (`photosift/config.toml` under the user config
//!    directory, `[engine]` table)
//! 4. Built-in defaults (code constants, OS-dependent data directory)
//!
//! A missing TOML file is not an error: the engine starts on defaults and
//! logs where it looked.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "PHOTOSIFT_DATA_DIR";

/// Environment variable overriding the photos root
pub const PHOTOS_ROOT_ENV: &str = "PHOTOSIFT_PHOTOS_ROOT";

fn default_lookahead() -> usize {
    10
}

fn default_evict_distance() -> usize {
    15
}

fn default_pacer_interval_ms() -> u64 {
    300
}

fn default_autosave_interval_secs() -> u64 {
    30
}

fn default_target_size() -> u32 {
    1800
}

fn default_event_capacity() -> usize {
    256
}

/// Configuration file form
///
/// ```toml
/// [engine]
/// data_dir = "/home/me/.local/share/photosift"
/// photos_root = "/home/me/Pictures"
/// lookahead = 10
/// evict_distance = 15
/// pacer_interval_ms = 300
/// autosave_interval_secs = 30
/// target_size = 1800
/// event_capacity = 256
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Engine settings table
    #[serde(default)]
    pub engine: EngineSection,
}

/// `[engine]` table of the configuration file
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    /// Data directory holding the persisted state files (optional)
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Root directory scanned for media items (optional)
    #[serde(default)]
    pub photos_root: Option<PathBuf>,

    /// Items prefetched ahead of the cursor
    #[serde(default = "default_lookahead")]
    pub lookahead: usize,

    /// Distance behind the cursor past which cached content is evicted
    #[serde(default = "default_evict_distance")]
    pub evict_distance: usize,

    /// Continuous-mode repeat interval in milliseconds
    #[serde(default = "default_pacer_interval_ms")]
    pub pacer_interval_ms: u64,

    /// Periodic autosave sweep interval in seconds
    #[serde(default = "default_autosave_interval_secs")]
    pub autosave_interval_secs: u64,

    /// Requested content size hint (long edge, pixels)
    #[serde(default = "default_target_size")]
    pub target_size: u32,

    /// Event bus channel capacity
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            data_dir: None,
            photos_root: None,
            lookahead: default_lookahead(),
            evict_distance: default_evict_distance(),
            pacer_interval_ms: default_pacer_interval_ms(),
            autosave_interval_secs: default_autosave_interval_secs(),
            target_size: default_target_size(),
            event_capacity: default_event_capacity(),
        }
    }
}

/// Command-line configuration overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub photos_root: Option<PathBuf>,
}

/// Resolved engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory holding photoData.json and its backups
    pub data_dir: PathBuf,

    /// Root directory scanned for media items (None when a caller supplies
    /// its own media source)
    pub photos_root: Option<PathBuf>,

    /// Items prefetched ahead of the cursor
    pub lookahead: usize,

    /// Distance behind the cursor past which cached content is evicted
    pub evict_distance: usize,

    /// Continuous-mode repeat interval in milliseconds
    pub pacer_interval_ms: u64,

    /// Periodic autosave sweep interval in seconds
    pub autosave_interval_secs: u64,

    /// Requested content size hint (long edge, pixels)
    pub target_size: u32,

    /// Event bus channel capacity
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let section = EngineSection::default();
        Self {
            data_dir: default_data_dir(),
            photos_root: None,
            lookahead: section.lookahead,
            evict_distance: section.evict_distance,
            pacer_interval_ms: section.pacer_interval_ms,
            autosave_interval_secs: section.autosave_interval_secs,
            target_size: section.target_size,
            event_capacity: section.event_capacity,
        }
    }
}

impl EngineConfig {
    /// Load configuration, applying the priority chain
    ///
    /// # Errors
    ///
    /// Returns an error only when a config file exists but cannot be parsed.
    /// A missing file falls through to defaults.
    pub fn load(overrides: ConfigOverrides) -> Result<Self> {
        let toml_path = overrides
            .config_path
            .clone()
            .or_else(default_config_file_path);

        let section = match toml_path {
            Some(path) if path.exists() => {
                let text = std::fs::read_to_string(&path).map_err(|e| {
                    Error::Config(format!("Failed to read config file {:?}: {}", path, e))
                })?;
                let parsed: TomlConfig = toml::from_str(&text).map_err(|e| {
                    Error::Config(format!("Failed to parse {:?}: {}", path, e))
                })?;
                info!("Loaded configuration from {:?}", path);
                parsed.engine
            }
            Some(path) => {
                info!("No config file at {:?}, using defaults", path);
                EngineSection::default()
            }
            None => {
                debug!("Could not determine config directory, using defaults");
                EngineSection::default()
            }
        };

        let data_dir = resolve_path(
            overrides.data_dir,
            DATA_DIR_ENV,
            section.data_dir.clone(),
        )
        .unwrap_or_else(default_data_dir);

        let photos_root = resolve_path(
            overrides.photos_root,
            PHOTOS_ROOT_ENV,
            section.photos_root.clone(),
        );

        Ok(Self {
            data_dir,
            photos_root,
            lookahead: section.lookahead,
            evict_distance: section.evict_distance,
            pacer_interval_ms: section.pacer_interval_ms,
            autosave_interval_secs: section.autosave_interval_secs,
            target_size: section.target_size,
            event_capacity: section.event_capacity,
        })
    }

    /// Continuous-mode repeat interval as a Duration
    pub fn pacer_interval(&self) -> Duration {
        Duration::from_millis(self.pacer_interval_ms)
    }

    /// Autosave sweep interval as a Duration
    pub fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_interval_secs)
    }
}

/// Resolve one path setting through the priority chain:
/// CLI argument, then environment variable, then TOML value.
///
/// Returns None when no layer provides a value (callers apply their own
/// final default).
fn resolve_path(
    cli_arg: Option<PathBuf>,
    env_var_name: &str,
    toml_value: Option<PathBuf>,
) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path);
    }
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    toml_value
}

/// Default configuration file path for the platform
fn default_config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("photosift").join("config.toml"))
}

/// OS-dependent default data directory
pub fn default_data_dir() -> PathBuf {
    if cfg!(target_os = "macos") {
        // ~/Library/Application Support/photosift
        dirs::data_dir()
            .map(|d| d.join("photosift"))
            .unwrap_or_else(|| PathBuf::from("./photosift_data"))
    } else {
        // Linux: ~/.local/share/photosift, Windows: %LOCALAPPDATA%\photosift
        dirs::data_local_dir()
            .map(|d| d.join("photosift"))
            .unwrap_or_else(|| PathBuf::from("./photosift_data"))
    }
}
