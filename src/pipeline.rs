// Stage sequencing: detect -> authenticate -> fetch metadata ->
// resolve into the ledger, then a separate ledger-driven download pass.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::auth::PkceFlow;
use crate::config::Settings;
use crate::download::{
    DownloadOptions, DownloadSummary, Embedder, FfmpegRemux, Orchestrator, YtDlpFetcher,
};
use crate::error::{Error, Result};
use crate::ledger::{Ledger, LedgerWriter};
use crate::resolve::{record_passthrough, ResolutionSummary, Resolver};
use crate::services::{SearchBackend, SpotifyClient, TrackRecord, YouTubeApiSearch, YtDlpClient};
use crate::signal::SignalSource;
use crate::source::{detect, Provider};
use crate::utils::{ensure_dir, sanitize_filename};

/// Everything the resolution stage leaves behind: the on-disk ledger
/// plus the in-memory track records needed for tagging at download time.
pub struct ResolutionRun {
    pub ledger_path: PathBuf,
    pub collection_name: String,
    pub tracks: Vec<TrackRecord>,
    pub summary: ResolutionSummary,
}

pub struct Pipeline {
    settings: Settings,
}

impl Pipeline {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Run the resolution half of the pipeline for a raw URL. The ledger
    /// is complete (or validly partial, on cancellation) when this
    /// returns. `present_auth_url` surfaces the authorization URL to the
    /// user when a Spotify login is needed.
    pub async fn resolve_source(
        &self,
        url: &str,
        signals: &mut dyn SignalSource,
        present_auth_url: impl FnOnce(&str),
    ) -> Result<ResolutionRun> {
        let source = detect(url)?;
        info!(
            "pipeline: {} {:?} '{}'",
            source.provider.display_name(),
            source.content_type,
            source.id
        );

        match source.provider {
            Provider::Spotify => {
                if !self.settings.has_spotify_credentials() {
                    return Err(Error::MissingCredential(
                        "spotify_client_id (settings.json or TUNEDROP_SPOTIFY_CLIENT_ID)",
                    ));
                }

                let session = PkceFlow::new(&self.settings.spotify_client_id)
                    .authorize(present_auth_url)
                    .await?;
                let (name, tracks) = SpotifyClient::new(&session).fetch(&source).await?;
                if tracks.is_empty() {
                    return Err(Error::NoTracks(name));
                }

                let mut ledger = self.create_ledger(&name, tracks.len())?;
                let mut resolver = self.build_resolver().await;
                let summary = resolver.resolve_all(&tracks, &mut ledger, signals).await?;

                Ok(ResolutionRun {
                    ledger_path: ledger.path().to_path_buf(),
                    collection_name: name,
                    tracks,
                    summary,
                })
            }
            Provider::YouTube => {
                // Targets are already known; resolution is a pass-through.
                let ytdlp = YtDlpClient::new(&self.settings.ytdlp_path);
                let (name, urls) = ytdlp.list_playlist(&source.id).await?;
                if urls.is_empty() {
                    return Err(Error::NoTracks(name));
                }

                let mut ledger = self.create_ledger(&name, urls.len())?;
                let summary = record_passthrough(&urls, &mut ledger, signals).await?;

                Ok(ResolutionRun {
                    ledger_path: ledger.path().to_path_buf(),
                    collection_name: name,
                    tracks: Vec::new(),
                    summary,
                })
            }
        }
    }

    /// Run the download half over a finished resolution run, using its
    /// in-memory records for naming and tagging.
    pub async fn download_run(
        &self,
        run: &ResolutionRun,
        options: DownloadOptions,
        signals: &mut dyn SignalSource,
    ) -> Result<DownloadSummary> {
        let ledger = Ledger::read(&run.ledger_path)?;

        // Align each ledger entry with its source record. Entries were
        // appended in resolution order, so positions line up.
        let metadata: Vec<Option<TrackRecord>> = ledger
            .entries
            .iter()
            .enumerate()
            .map(|(i, _)| {
                run.summary
                    .entries
                    .get(i)
                    .and_then(|entry| run.tracks.get(entry.source_index))
                    .cloned()
            })
            .collect();

        self.orchestrator().run(&ledger, &metadata, options, signals).await
    }

    /// Download straight from a ledger file on disk (a resumed run).
    /// No source metadata survives the file, so the platform's own
    /// titles name the files and nothing is embedded.
    pub async fn download_ledger_file(
        &self,
        path: &std::path::Path,
        options: DownloadOptions,
        signals: &mut dyn SignalSource,
    ) -> Result<DownloadSummary> {
        let ledger = Ledger::read(path)?;
        if ledger.entries.is_empty() {
            return Err(Error::NoTracks(ledger.playlist_name));
        }
        let metadata = vec![None; ledger.entries.len()];
        self.orchestrator().run(&ledger, &metadata, options, signals).await
    }

    async fn build_resolver(&self) -> Resolver {
        let primary: Option<Box<dyn SearchBackend>> = if self.settings.has_youtube_api_key() {
            Some(Box::new(YouTubeApiSearch::new(&self.settings.youtube_api_key)))
        } else {
            None
        };

        let ytdlp = YtDlpClient::new(&self.settings.ytdlp_path);
        let fallback: Option<Box<dyn SearchBackend>> = if ytdlp.is_available().await {
            Some(Box::new(ytdlp))
        } else {
            warn!("pipeline: yt-dlp not found, fallback search disabled");
            None
        };

        if primary.is_none() && fallback.is_none() {
            warn!("pipeline: no search backend available, every track will fail to resolve");
        }

        Resolver::new(primary, fallback)
    }

    fn orchestrator(&self) -> Orchestrator {
        let embedder = Embedder::new(Box::new(FfmpegRemux::new(&self.settings.ffmpeg_path)));
        Orchestrator::new(
            Box::new(YtDlpFetcher::new(&self.settings.ytdlp_path)),
            Some(Box::new(embedder)),
            &self.settings.output_dir,
        )
    }

    fn create_ledger(&self, name: &str, total: usize) -> Result<LedgerWriter> {
        ensure_dir(&self.settings.output_dir)?;
        let path = self
            .settings
            .output_dir
            .join(format!("{}.txt", sanitize_filename(name)));
        LedgerWriter::create(&path, name, total)
    }
}
