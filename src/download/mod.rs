// Download orchestration module - drives the external fetch/transcode
// tool over the entries of a ledger and hands finished audio files to
// the artwork embedder.

pub mod embed;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::ledger::Ledger;
use crate::resolve::LoopOutcome;
use crate::services::TrackRecord;
use crate::signal::{MediaFormat, Signal, SignalSource};
use crate::utils::sanitize_filename;

pub use embed::{ArtworkEmbedder, Embedder, FfmpegRemux, TagFields};

// ============================================================================
// Types
// ============================================================================

/// Externally supplied choices for a download run. Both can still be
/// changed mid-run through the signal source, taking effect from the
/// next item on.
#[derive(Debug, Clone, Copy)]
pub struct DownloadOptions {
    pub format: MediaFormat,
    pub numbered: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            format: MediaFormat::Audio,
            numbered: false,
        }
    }
}

/// One unit of download work, derived from a ledger entry plus its
/// ordinal position. Ephemeral; never persisted.
#[derive(Debug, Clone)]
pub struct DownloadTask {
    pub target_url: String,
    /// yt-dlp style output template with a `%(ext)s` placeholder.
    pub output_template: String,
    /// Where the finished file will land, when the name is derived from
    /// source metadata. `None` when the tool names the file itself.
    pub final_path: Option<PathBuf>,
    pub track_number: Option<u32>,
    pub metadata: Option<TrackRecord>,
}

#[derive(Debug)]
pub struct DownloadSummary {
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
    pub outcome: LoopOutcome,
}

/// The external download+transcode call. Exit status zero is the sole
/// success signal; one invocation per resolved item, no retry.
#[async_trait]
pub trait FetchTool: Send + Sync {
    async fn fetch(&self, url: &str, output_template: &str, format: MediaFormat) -> Result<()>;
}

// ============================================================================
// yt-dlp fetch tool
// ============================================================================

pub struct YtDlpFetcher {
    ytdlp_path: String,
}

impl YtDlpFetcher {
    pub fn new(ytdlp_path: &str) -> Self {
        Self {
            ytdlp_path: ytdlp_path.to_string(),
        }
    }
}

#[async_trait]
impl FetchTool for YtDlpFetcher {
    async fn fetch(&self, url: &str, output_template: &str, format: MediaFormat) -> Result<()> {
        let mut args: Vec<&str> = vec![url];
        match format {
            MediaFormat::Audio => {
                args.extend([
                    "-f",
                    "bestaudio",
                    "--extract-audio",
                    "--audio-format",
                    "mp3",
                    "--audio-quality",
                    "0",
                ]);
            }
            MediaFormat::Video => {
                args.extend(["-f", "bestvideo+bestaudio/best", "--merge-output-format", "mp4"]);
            }
        }
        args.extend(["--no-warnings", "--output", output_template]);

        let output = tokio::process::Command::new(&self.ytdlp_path)
            .args(&args)
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
        Ok(())
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

pub struct Orchestrator {
    fetcher: Box<dyn FetchTool>,
    embedder: Option<Box<dyn ArtworkEmbedder>>,
    output_dir: PathBuf,
}

impl Orchestrator {
    pub fn new(
        fetcher: Box<dyn FetchTool>,
        embedder: Option<Box<dyn ArtworkEmbedder>>,
        output_dir: &Path,
    ) -> Self {
        Self {
            fetcher,
            embedder,
            output_dir: output_dir.to_path_buf(),
        }
    }

    /// Download every ledger entry in order. `metadata` is aligned with
    /// the entries (`None` where the source carried no track metadata,
    /// e.g. a run resumed from the ledger file alone). Per-item failures
    /// are tallied and never stop the loop.
    pub async fn run(
        &self,
        ledger: &Ledger,
        metadata: &[Option<TrackRecord>],
        mut options: DownloadOptions,
        signals: &mut dyn SignalSource,
    ) -> Result<DownloadSummary> {
        let total = ledger.entries.len();
        std::fs::create_dir_all(&self.output_dir)?;

        let mut completed = 0usize;
        let mut failed = 0usize;

        for (index, url) in ledger.entries.iter().enumerate() {
            match signals.poll() {
                Some(Signal::Restart) => {
                    return Ok(DownloadSummary {
                        completed,
                        failed,
                        total,
                        outcome: LoopOutcome::Restarted,
                    });
                }
                Some(Signal::Quit) => {
                    return Ok(DownloadSummary {
                        completed,
                        failed,
                        total,
                        outcome: LoopOutcome::Quit,
                    });
                }
                Some(Signal::FormatChoice(format)) => options.format = format,
                Some(Signal::NumberingChoice(numbered)) => options.numbered = numbered,
                None => {}
            }

            let track = metadata.get(index).and_then(Option::as_ref);
            let task = self.build_task(url, index, total, track, &options);

            info!("download: [{}/{}] {}", index + 1, total, task.target_url);
            match self
                .fetcher
                .fetch(&task.target_url, &task.output_template, options.format)
                .await
            {
                Ok(()) => {
                    completed += 1;
                    self.maybe_embed(&task, options.format).await;
                }
                Err(e) => {
                    warn!("download: entry {} failed: {}", index + 1, e);
                    failed += 1;
                }
            }
        }

        info!("download: finished, {} ok / {} failed of {}", completed, failed, total);
        Ok(DownloadSummary {
            completed,
            failed,
            total,
            outcome: LoopOutcome::Completed,
        })
    }

    /// Derive naming for one entry. Metadata-backed names are sanitized
    /// "artist - title"; otherwise the platform's own title fills the
    /// template. Numbering pads to the digit count of the total.
    fn build_task(
        &self,
        url: &str,
        index: usize,
        total: usize,
        track: Option<&TrackRecord>,
        options: &DownloadOptions,
    ) -> DownloadTask {
        let prefix = if options.numbered {
            format_track_prefix(index + 1, total)
        } else {
            String::new()
        };

        let extension = match options.format {
            MediaFormat::Audio => "mp3",
            MediaFormat::Video => "mp4",
        };

        let (output_template, final_path) = match track {
            Some(record) => {
                let base = sanitize_filename(&format!(
                    "{} - {}",
                    record.artists_joined, record.name
                ));
                let template = self
                    .output_dir
                    .join(format!("{}{}.%(ext)s", prefix, base))
                    .to_string_lossy()
                    .into_owned();
                let final_path = self
                    .output_dir
                    .join(format!("{}{}.{}", prefix, base, extension));
                (template, Some(final_path))
            }
            None => {
                let template = self
                    .output_dir
                    .join(format!("{}%(title)s.%(ext)s", prefix))
                    .to_string_lossy()
                    .into_owned();
                (template, None)
            }
        };

        DownloadTask {
            target_url: url.to_string(),
            output_template,
            final_path,
            track_number: options.numbered.then_some((index + 1) as u32),
            metadata: track.cloned(),
        }
    }

    /// Embed artwork into a finished audio file when the source record
    /// carries an artwork reference. Embed failures are soft warnings;
    /// the file keeps whatever tags the transcoder wrote.
    async fn maybe_embed(&self, task: &DownloadTask, format: MediaFormat) {
        if format != MediaFormat::Audio {
            return;
        }
        let (Some(embedder), Some(track), Some(path)) =
            (&self.embedder, &task.metadata, &task.final_path)
        else {
            return;
        };
        let Some(artwork_url) = &track.artwork_url else {
            return;
        };

        let tags = TagFields {
            title: track.name.clone(),
            artist: track.artists_joined.clone(),
            album: track.album.clone(),
            track_number: task.track_number,
            year: track.year.clone(),
        };

        if let Err(e) = embedder.embed(path, artwork_url, &tags).await {
            warn!("embed: leaving {} untagged: {}", path.display(), e);
        }
    }
}

/// Zero-padded "NN - " prefix; width is the decimal digit count of the
/// total entry count, never less than two.
fn format_track_prefix(position: usize, total: usize) -> String {
    let width = total.to_string().len().max(2);
    format!("{:0width$} - ", position, width = width)
}
