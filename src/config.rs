//! Configuration management for Darshan
//!
//! Provides persistent settings storage with schema versioning and migrations.
//! Configuration is stored in `~/.darshan/config.json`. It is loaded once at
//! startup and passed to the components that need it.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Current config schema version
const CURRENT_VERSION: u32 = 2;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Schema version for migrations
    pub version: u32,
    /// Speech synthesis service settings
    pub narration: NarrationConfig,
    /// Voice names per narration phase
    pub voices: VoiceConfig,
    /// Autoplay pacing and audio output settings
    pub playback: PlaybackConfig,
    /// Content dataset location
    pub content: ContentConfig,
    /// Database location
    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            narration: NarrationConfig::default(),
            voices: VoiceConfig::default(),
            playback: PlaybackConfig::default(),
            content: ContentConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

/// Speech synthesis service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrationConfig {
    /// Whether to call the synthesis service at all
    pub enabled: bool,
    /// API base URL
    pub base_url: String,
    /// TTS model name
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Attempts per request, including the first (0 is treated as 1)
    #[serde(alias = "max_retries")]
    pub max_attempts: u32,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.5-flash-preview-tts".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            timeout_secs: 30,
            max_attempts: 3,
        }
    }
}

/// Prebuilt voice names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Sanskrit recitation
    pub sanskrit: String,
    /// English meaning
    pub meaning: String,
    /// Life lesson
    pub lesson: String,
    /// Title, overview and conclusion slides
    pub ui: String,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            sanskrit: "Kore".to_string(),
            meaning: "Zephyr".to_string(),
            lesson: "Charon".to_string(),
            ui: "Puck".to_string(),
        }
    }
}

/// Where narration audio goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    /// Wait out the audio duration without a device
    #[default]
    Simulated,
    /// Default output device (requires the `speaker` feature)
    Speaker,
}

/// Autoplay pacing and audio format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Delay on title/overview/conclusion slides before advancing
    pub slide_delay_ms: u64,
    /// Pause after a narration ends before autoplay continues
    pub contemplative_pause_ms: u64,
    /// Sample rate of the synthesis payload in Hz
    pub sample_rate: u32,
    /// Channel count of the synthesis payload
    pub channels: u16,
    /// Output sink
    pub output: OutputKind,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            slide_delay_ms: 7000,
            contemplative_pause_ms: 1500,
            sample_rate: 24000,
            channels: 1,
            output: OutputKind::Simulated,
        }
    }
}

/// Content dataset configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ContentConfig {
    /// JSON dataset path (None for the bundled dataset)
    pub path: Option<PathBuf>,
}

/// Database configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database path (None for `~/.darshan/darshan.db`)
    pub database_path: Option<PathBuf>,
}

/// Get the path to the data directory (~/.darshan)
pub fn get_data_dir() -> PathBuf {
    home_dir_or_fallback().join(".darshan")
}

/// Get the path to the config file (~/.darshan/config.json)
pub fn get_config_path() -> PathBuf {
    get_data_dir().join("config.json")
}

/// Get the home directory, falling back to /tmp if unavailable
fn home_dir_or_fallback() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| {
        tracing::error!("Could not determine home directory, using /tmp");
        PathBuf::from("/tmp")
    })
}

/// Load configuration from a file, running migrations if needed
///
/// A missing file yields the defaults. A migrated config is written back.
pub fn load_from_path(path: &Path) -> Result<Config, String> {
    if !path.exists() {
        tracing::info!("Config file not found, using defaults");
        return Ok(Config::default());
    }

    let contents =
        fs::read_to_string(path).map_err(|e| format!("Failed to read config file: {}", e))?;

    let config: Config =
        serde_json::from_str(&contents).map_err(|e| format!("Failed to parse config: {}", e))?;

    let original_version = config.version;
    let migrated = migrate_config(config)?;
    if migrated.version != original_version {
        save_to_path(&migrated, path)?;
    }

    Ok(migrated)
}

/// Save configuration to a file, creating its directory
pub fn save_to_path(config: &Config, path: &Path) -> Result<(), String> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            fs::create_dir_all(dir)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }
    }

    let contents = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialise config: {}", e))?;

    fs::write(path, contents).map_err(|e| format!("Failed to write config file: {}", e))?;

    tracing::info!("Config saved to {}", path.display());
    Ok(())
}

/// Load the config from its default location, falling back to defaults on error
pub fn load_or_default() -> Config {
    let path = get_config_path();
    let config = load_from_path(&path).unwrap_or_else(|e| {
        tracing::error!("Failed to load config, using defaults: {}", e);
        Config::default()
    });
    tracing::info!(
        "Config loaded: narration_enabled={}, output={:?}",
        config.narration.enabled,
        config.playback.output
    );
    config
}

/// Migrate configuration from older schema versions
fn migrate_config(mut config: Config) -> Result<Config, String> {
    let original_version = config.version;

    // Apply migrations sequentially
    while config.version < CURRENT_VERSION {
        config = apply_migration(config)?;
    }

    if config.version != original_version {
        tracing::info!(
            "Migrated config from version {} to {}",
            original_version,
            config.version
        );
    }

    Ok(config)
}

/// Apply a single migration step
fn apply_migration(config: Config) -> Result<Config, String> {
    match config.version {
        // Version 0 -> 1: Initial migration
        0 => {
            let mut migrated = config;
            migrated.version = 1;
            Ok(migrated)
        }
        // Version 1 -> 2: pacing moved to milliseconds; reset out-of-range values
        1 => {
            let mut migrated = config;
            let defaults = PlaybackConfig::default();
            if migrated.playback.slide_delay_ms < 100 {
                migrated.playback.slide_delay_ms = defaults.slide_delay_ms;
            }
            if migrated.playback.channels == 0 {
                migrated.playback.channels = defaults.channels;
            }
            migrated.version = 2;
            Ok(migrated)
        }
        v => Err(format!("Unknown config version: {}", v)),
    }
}
