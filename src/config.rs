// App settings storage

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::utils::default_download_dir;

/// User-facing settings. Empty credential strings mean "disabled":
/// no YouTube API key puts the resolver in fallback-only mode, and no
/// Spotify client id makes Spotify sources unusable (the pipeline
/// reports the missing credential before doing any work).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Spotify application client id for the PKCE login flow.
    #[serde(default)]
    pub spotify_client_id: String,
    /// YouTube Data API v3 key for the primary search backend.
    #[serde(default)]
    pub youtube_api_key: String,
    /// Path of the yt-dlp executable.
    #[serde(default = "default_ytdlp")]
    pub ytdlp_path: String,
    /// Path of the ffmpeg executable used for artwork embedding.
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg_path: String,
    /// Directory downloads are written to.
    #[serde(default = "default_download_dir")]
    pub output_dir: PathBuf,
}

fn default_ytdlp() -> String {
    "yt-dlp".to_string()
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            spotify_client_id: String::new(),
            youtube_api_key: String::new(),
            ytdlp_path: default_ytdlp(),
            ffmpeg_path: default_ffmpeg(),
            output_dir: default_download_dir(),
        }
    }
}

/// Get the path to the settings file
fn settings_path() -> PathBuf {
    let config_dir = dirs::config_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tunedrop");
    fs::create_dir_all(&config_dir).ok();
    config_dir.join("settings.json")
}

impl Settings {
    /// Load settings from disk, falling back to defaults, then apply
    /// environment overrides for the credentials. A missing file is
    /// created with the defaults so the user has something to edit.
    pub fn load() -> Self {
        let path = settings_path();
        let mut settings = if path.exists() {
            fs::read_to_string(&path)
                .ok()
                .and_then(|json| serde_json::from_str(&json).ok())
                .unwrap_or_default()
        } else {
            let defaults = Self::default();
            if let Err(e) = defaults.write_to(&path) {
                warn!("config: could not write default settings: {}", e);
            }
            defaults
        };

        if let Ok(id) = std::env::var("TUNEDROP_SPOTIFY_CLIENT_ID") {
            settings.spotify_client_id = id;
        }
        if let Ok(key) = std::env::var("TUNEDROP_YOUTUBE_API_KEY") {
            settings.youtube_api_key = key;
        }

        settings
    }

    /// Save settings to the config file
    pub fn save(&self) -> Result<()> {
        self.write_to(&settings_path())
    }

    fn write_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn has_spotify_credentials(&self) -> bool {
        !self.spotify_client_id.is_empty()
    }

    pub fn has_youtube_api_key(&self) -> bool {
        !self.youtube_api_key.is_empty()
    }
}
