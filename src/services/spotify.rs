// Spotify Web API metadata fetcher

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::auth::AuthSession;
use crate::error::Result;
use crate::source::{ContentType, SourceReference};

const API_BASE: &str = "https://api.spotify.com/v1";
const PLAYLIST_PAGE_SIZE: u32 = 100;
const ALBUM_PAGE_SIZE: u32 = 50;

// ============================================================================
// Types
// ============================================================================

/// One track's metadata in catalog order. Read-only downstream; each
/// record maps to exactly one resolution attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackRecord {
    pub name: String,
    /// All artists as a single display string, comma-joined.
    pub artists_joined: String,
    pub album: Option<String>,
    pub artwork_url: Option<String>,
    pub year: Option<String>,
}

impl TrackRecord {
    /// The search query used to resolve this record to a video.
    pub fn search_query(&self) -> String {
        format!("{} - {}", self.name, self.artists_joined)
    }
}

// ============================================================================
// Fetcher
// ============================================================================

pub struct SpotifyClient {
    client: reqwest::Client,
    token: String,
}

impl SpotifyClient {
    pub fn new(session: &AuthSession) -> Self {
        Self {
            client: reqwest::Client::new(),
            token: session.access_token.clone(),
        }
    }

    /// Fetch ordered track records for a classified Spotify source.
    /// Returns (collection display name, tracks). Page failures truncate
    /// to whatever was accumulated; an empty result is the caller's
    /// "nothing to do" condition.
    pub async fn fetch(&self, source: &SourceReference) -> Result<(String, Vec<TrackRecord>)> {
        match source.content_type {
            ContentType::Playlist => self.fetch_playlist(&source.id).await,
            ContentType::Album => self.fetch_album(&source.id).await,
            ContentType::Track => self.fetch_track(&source.id).await,
        }
    }

    async fn fetch_playlist(&self, id: &str) -> Result<(String, Vec<TrackRecord>)> {
        let name = match self
            .get_json(&format!("{}/playlists/{}?fields=name", API_BASE, id))
            .await
        {
            Ok(json) => json
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or("Spotify Playlist")
                .to_string(),
            Err(e) => {
                warn!("spotify: playlist name lookup failed: {}", e);
                "Spotify Playlist".to_string()
            }
        };

        let mut tracks = Vec::new();
        let mut url = format!(
            "{}/playlists/{}/tracks?limit={}&offset=0",
            API_BASE, id, PLAYLIST_PAGE_SIZE
        );

        loop {
            let page = match self.get_json(&url).await {
                Ok(page) => page,
                Err(e) => {
                    // Keep what we have; downstream decides what an empty
                    // result means.
                    warn!("spotify: page fetch failed, keeping {} tracks: {}", tracks.len(), e);
                    break;
                }
            };

            if let Some(items) = page.get("items").and_then(Value::as_array) {
                for item in items {
                    // Playlist items wrap the track object; local or
                    // removed tracks come through as null.
                    if let Some(track) = item.get("track").filter(|t| !t.is_null()) {
                        if let Some(record) = parse_track(track, None) {
                            tracks.push(record);
                        }
                    }
                }
            }

            match page.get("next").and_then(Value::as_str) {
                Some(next) => url = next.to_string(),
                None => break,
            }
        }

        info!("spotify: playlist '{}' has {} tracks", name, tracks.len());
        Ok((name, tracks))
    }

    async fn fetch_album(&self, id: &str) -> Result<(String, Vec<TrackRecord>)> {
        // One album-level lookup for the fields the per-track listing
        // doesn't carry (artwork, release year, album name).
        let album = match self.get_json(&format!("{}/albums/{}", API_BASE, id)).await {
            Ok(json) => json,
            Err(e) => {
                warn!("spotify: album lookup failed: {}", e);
                return Ok(("Spotify Album".to_string(), Vec::new()));
            }
        };

        let album_name = album
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("Spotify Album")
            .to_string();
        let artwork_url = pick_artwork_from(&album);
        let year = album
            .get("release_date")
            .and_then(Value::as_str)
            .and_then(|d| d.split('-').next())
            .map(str::to_string);

        let album_info = AlbumInfo {
            name: album_name.clone(),
            artwork_url,
            year,
        };

        let mut tracks = Vec::new();
        let mut url = format!(
            "{}/albums/{}/tracks?limit={}&offset=0",
            API_BASE, id, ALBUM_PAGE_SIZE
        );

        loop {
            let page = match self.get_json(&url).await {
                Ok(page) => page,
                Err(e) => {
                    warn!("spotify: album page fetch failed, keeping {} tracks: {}", tracks.len(), e);
                    break;
                }
            };

            if let Some(items) = page.get("items").and_then(Value::as_array) {
                for item in items {
                    if let Some(record) = parse_track(item, Some(&album_info)) {
                        tracks.push(record);
                    }
                }
            }

            match page.get("next").and_then(Value::as_str) {
                Some(next) => url = next.to_string(),
                None => break,
            }
        }

        info!("spotify: album '{}' has {} tracks", album_name, tracks.len());
        Ok((album_name, tracks))
    }

    async fn fetch_track(&self, id: &str) -> Result<(String, Vec<TrackRecord>)> {
        let track = match self.get_json(&format!("{}/tracks/{}", API_BASE, id)).await {
            Ok(json) => json,
            Err(e) => {
                warn!("spotify: track lookup failed: {}", e);
                return Ok(("Spotify Track".to_string(), Vec::new()));
            }
        };

        let records: Vec<TrackRecord> = parse_track(&track, None).into_iter().collect();
        let name = records
            .first()
            .map(|r| r.name.clone())
            .unwrap_or_else(|| "Spotify Track".to_string());
        Ok((name, records))
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        debug!("spotify: GET {}", url);
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}

struct AlbumInfo {
    name: String,
    artwork_url: Option<String>,
    year: Option<String>,
}

/// Build a `TrackRecord` from a track object. `album_info` supplies the
/// album-level fields for album track listings, which omit them.
fn parse_track(track: &Value, album_info: Option<&AlbumInfo>) -> Option<TrackRecord> {
    let name = track.get("name").and_then(Value::as_str)?.to_string();

    let artists_joined = track
        .get("artists")
        .and_then(Value::as_array)
        .map(|artists| {
            artists
                .iter()
                .filter_map(|a| a.get("name").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default();

    let (album, artwork_url, year) = match album_info {
        Some(info) => (
            Some(info.name.clone()),
            info.artwork_url.clone(),
            info.year.clone(),
        ),
        None => {
            let album_obj = track.get("album");
            let album = album_obj
                .and_then(|a| a.get("name"))
                .and_then(Value::as_str)
                .map(str::to_string);
            let artwork = album_obj.and_then(pick_artwork_from);
            let year = album_obj
                .and_then(|a| a.get("release_date"))
                .and_then(Value::as_str)
                .and_then(|d| d.split('-').next())
                .map(str::to_string);
            (album, artwork, year)
        }
    };

    Some(TrackRecord {
        name,
        artists_joined,
        album,
        artwork_url,
        year,
    })
}

/// Pick an artwork image URL from an object carrying `images`.
/// Prefers the 300px rendition, otherwise the first listed.
fn pick_artwork_from(obj: &Value) -> Option<String> {
    let images = obj.get("images").and_then(Value::as_array)?;
    images
        .iter()
        .find(|img| img.get("width").and_then(Value::as_u64) == Some(300))
        .or_else(|| images.first())
        .and_then(|img| img.get("url"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_full_track_object() {
        let track = json!({
            "name": "Bohemian Rhapsody",
            "artists": [{"name": "Queen"}],
            "album": {
                "name": "A Night at the Opera",
                "release_date": "1975-11-21",
                "images": [
                    {"url": "https://i.scdn.co/640", "width": 640},
                    {"url": "https://i.scdn.co/300", "width": 300}
                ]
            }
        });

        let record = parse_track(&track, None).unwrap();
        assert_eq!(record.name, "Bohemian Rhapsody");
        assert_eq!(record.artists_joined, "Queen");
        assert_eq!(record.album.as_deref(), Some("A Night at the Opera"));
        assert_eq!(record.artwork_url.as_deref(), Some("https://i.scdn.co/300"));
        assert_eq!(record.year.as_deref(), Some("1975"));
    }

    #[test]
    fn joins_multiple_artists() {
        let track = json!({
            "name": "Under Pressure",
            "artists": [{"name": "Queen"}, {"name": "David Bowie"}]
        });
        let record = parse_track(&track, None).unwrap();
        assert_eq!(record.artists_joined, "Queen, David Bowie");
        assert_eq!(record.search_query(), "Under Pressure - Queen, David Bowie");
    }

    #[test]
    fn album_info_fills_missing_fields() {
        let info = AlbumInfo {
            name: "The Wall".to_string(),
            artwork_url: Some("https://img".to_string()),
            year: Some("1979".to_string()),
        };
        let item = json!({"name": "Hey You", "artists": [{"name": "Pink Floyd"}]});
        let record = parse_track(&item, Some(&info)).unwrap();
        assert_eq!(record.album.as_deref(), Some("The Wall"));
        assert_eq!(record.artwork_url.as_deref(), Some("https://img"));
        assert_eq!(record.year.as_deref(), Some("1979"));
    }

    #[test]
    fn track_without_name_is_skipped() {
        assert!(parse_track(&json!({"artists": []}), None).is_none());
    }

    #[test]
    fn artwork_falls_back_to_first_image() {
        let obj = json!({"images": [{"url": "https://only", "width": 64}]});
        assert_eq!(pick_artwork_from(&obj).as_deref(), Some("https://only"));
    }
}
