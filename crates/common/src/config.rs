//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default encoding parameters for burn sessions.
    pub encoding: EncodingDefaults,

    /// Font discovery settings.
    pub fonts: FontConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default encoding parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodingDefaults {
    /// Frame rate the source is sampled and re-encoded at.
    pub frame_rate: u32,

    /// Output format name (`webm` or `mp4`).
    pub format: String,

    /// Video bitrate in kbps.
    pub video_bitrate_kbps: u32,

    /// ffmpeg executable.
    pub ffmpeg: String,

    /// ffprobe executable.
    pub ffprobe: String,
}

/// Font discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FontConfig {
    /// Directories scanned (recursively) for `.ttf` / `.otf` files.
    pub search_dirs: Vec<PathBuf>,

    /// Family tried when the style's family is not installed.
    pub fallback_family: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "burnin=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            encoding: EncodingDefaults::default(),
            fonts: FontConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for EncodingDefaults {
    fn default() -> Self {
        Self {
            frame_rate: 30,
            format: "webm".to_string(),
            video_bitrate_kbps: 2500,
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
        }
    }
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            search_dirs: default_font_dirs(),
            fallback_family: Some("DejaVu Sans".to_string()),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"));
    base.join("burnin").join("config.json")
}

/// System and per-user font directories.
fn default_font_dirs() -> Vec<PathBuf> {
    let home = home_dir();
    let data_home = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home.join(".local").join("share"));

    vec![
        data_home.join("fonts"),
        home.join(".fonts"),
        PathBuf::from("/usr/share/fonts"),
        PathBuf::from("/usr/local/share/fonts"),
        PathBuf::from("/Library/Fonts"),
        PathBuf::from("/System/Library/Fonts"),
        PathBuf::from("C:\\Windows\\Fonts"),
    ]
}

fn home_dir() -> PathBuf {
    PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string()))
}
