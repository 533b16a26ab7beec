// External service clients

pub mod spotify;
pub mod youtube;
pub mod youtube_api;

use async_trait::async_trait;

use crate::error::SearchError;

pub use spotify::{SpotifyClient, TrackRecord};
pub use youtube::YtDlpClient;
pub use youtube_api::YouTubeApiSearch;

/// A search backend maps a free-text query to at most one playable
/// watch URL. Top-1 semantics: no match and a transport error are both
/// "no entry" to the resolver; quota exhaustion is its own signal.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &str) -> Result<Option<String>, SearchError>;
}
