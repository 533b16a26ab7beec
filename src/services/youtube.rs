// yt-dlp wrapper: fallback text search and flat-playlist listing.
// All invocations pass explicit argument vectors; nothing is routed
// through a shell, so quotes in track names cannot inject arguments.

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{Error, Result, SearchError};
use crate::ledger::WATCH_URL_PREFIX;
use crate::services::SearchBackend;

#[derive(Clone)]
pub struct YtDlpClient {
    ytdlp_path: String,
}

impl YtDlpClient {
    pub fn new(ytdlp_path: &str) -> Self {
        Self {
            ytdlp_path: ytdlp_path.to_string(),
        }
    }

    /// Whether the yt-dlp binary can be spawned at all. A missing binary
    /// disables the fallback backend entirely.
    pub async fn is_available(&self) -> bool {
        Command::new(&self.ytdlp_path)
            .arg("--version")
            .output()
            .await
            .map(|out| out.status.success())
            .unwrap_or(false)
    }

    /// List a native YouTube playlist without downloading anything.
    /// Returns (playlist title, canonical watch URLs in playlist order).
    pub async fn list_playlist(&self, playlist_id: &str) -> Result<(String, Vec<String>)> {
        let playlist_url = format!("https://www.youtube.com/playlist?list={}", playlist_id);
        info!("youtube: listing playlist {}", playlist_id);

        let output = Command::new(&self.ytdlp_path)
            .args(["--flat-playlist", "--dump-json", "--no-warnings", &playlist_url])
            .output()
            .await
            .map_err(|e| Error::Tool {
                tool: "yt-dlp",
                message: format!("failed to spawn: {}", e),
            })?;

        if !output.status.success() {
            return Err(Error::Tool {
                tool: "yt-dlp",
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let mut playlist_name = String::from("YouTube Playlist");
        let mut urls = Vec::new();

        // One JSON object per line, one line per video.
        for line in String::from_utf8_lossy(&output.stdout).lines() {
            let Ok(json) = serde_json::from_str::<Value>(line) else {
                continue;
            };
            if playlist_name == "YouTube Playlist" {
                if let Some(title) = json.get("playlist_title").and_then(Value::as_str) {
                    playlist_name = title.to_string();
                }
            }
            if let Some(id) = json.get("id").and_then(Value::as_str) {
                urls.push(format!("{}{}", WATCH_URL_PREFIX, id));
            }
        }

        info!("youtube: playlist '{}' has {} videos", playlist_name, urls.len());
        Ok((playlist_name, urls))
    }
}

#[async_trait]
impl SearchBackend for YtDlpClient {
    /// Best-effort single-result text search against YouTube itself.
    /// No output means no match.
    async fn search(&self, query: &str) -> std::result::Result<Option<String>, SearchError> {
        let search_url = format!("ytsearch1:{}", query);
        debug!("search-fallback: querying '{}'", query);

        let output = Command::new(&self.ytdlp_path)
            .args([
                "--dump-json",
                "--no-download",
                "--flat-playlist",
                "--no-warnings",
                &search_url,
            ])
            .output()
            .await
            .map_err(|e| SearchError::Failed(format!("failed to spawn yt-dlp: {}", e)))?;

        if !output.status.success() {
            warn!(
                "search-fallback: yt-dlp exited with {:?}",
                output.status.code()
            );
            return Err(SearchError::Failed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines() {
            let Ok(json) = serde_json::from_str::<Value>(line) else {
                continue;
            };
            if let Some(id) = json.get("id").and_then(Value::as_str) {
                return Ok(Some(format!("{}{}", WATCH_URL_PREFIX, id)));
            }
        }

        Ok(None)
    }
}
