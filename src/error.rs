// Crate-wide error taxonomy

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The URL matched no known provider rule. Fatal before any network call.
    #[error("unsupported URL format: {0}")]
    UnsupportedUrl(String),

    /// Authentication could not be completed (listener bind, denied
    /// callback, timeout, or token-exchange rejection).
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Metadata fetch produced zero tracks - nothing to do.
    #[error("no tracks found for {0}")]
    NoTracks(String),

    /// A required credential is missing from config and environment.
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),

    /// An external tool exited non-zero or could not be spawned.
    #[error("{tool} failed: {message}")]
    Tool { tool: &'static str, message: String },

    /// The ledger file could not be created or written.
    #[error("ledger error at {path}: {source}")]
    Ledger {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Per-item failure from a search backend. These never abort the
/// resolution loop; `QuotaExhausted` additionally flips the resolver
/// into fallback mode for the rest of the run.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("search quota exhausted")]
    QuotaExhausted,

    #[error("search failed: {0}")]
    Failed(String),
}
