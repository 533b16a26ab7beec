// Tunedrop - playlist to local audio pipeline
// Resolves Spotify playlists/albums/tracks (and native YouTube
// playlists) to downloadable video matches, persists progress in an
// append-as-you-go ledger file, then drives yt-dlp downloads with
// optional artwork/metadata embedding via ffmpeg.

pub mod auth;
pub mod config;
pub mod download;
pub mod error;
pub mod ledger;
pub mod pipeline;
pub mod resolve;
pub mod services;
pub mod signal;
pub mod source;
pub mod utils;

pub use config::Settings;
pub use download::{DownloadOptions, DownloadSummary};
pub use error::{Error, Result, SearchError};
pub use ledger::{Ledger, LedgerWriter};
pub use pipeline::{Pipeline, ResolutionRun};
pub use resolve::{BackendMode, LoopOutcome, ResolutionSummary, Resolver};
pub use services::TrackRecord;
pub use signal::{MediaFormat, Signal, SignalSource};
pub use source::{ContentType, Provider, SourceReference};
