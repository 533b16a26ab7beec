// Artwork/metadata embedder - post-processes a downloaded audio file by
// remuxing cover art and tag fields into it. All-or-nothing: the
// original file is replaced only after the remux fully succeeds and is
// left byte-identical on any failure.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{Error, Result};

// ============================================================================
// Types
// ============================================================================

/// Tag fields written during the remux.
#[derive(Debug, Clone, Default)]
pub struct TagFields {
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub track_number: Option<u32>,
    pub year: Option<String>,
}

/// The external remux operation. Copies the audio stream unmodified,
/// attaches the image as a cover-art stream and writes the tags into
/// `output`. Zero exit status is the sole success signal.
#[async_trait]
pub trait Remux: Send + Sync {
    async fn remux(
        &self,
        audio: &Path,
        artwork: &Path,
        output: &Path,
        tags: &TagFields,
    ) -> Result<()>;
}

/// What the download stage needs from an embedder.
#[async_trait]
pub trait ArtworkEmbedder: Send + Sync {
    async fn embed(&self, audio: &Path, artwork_url: &str, tags: &TagFields) -> Result<()>;
}

// ============================================================================
// ffmpeg remux
// ============================================================================

pub struct FfmpegRemux {
    ffmpeg_path: String,
}

impl FfmpegRemux {
    pub fn new(ffmpeg_path: &str) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.to_string(),
        }
    }
}

#[async_trait]
impl Remux for FfmpegRemux {
    async fn remux(
        &self,
        audio: &Path,
        artwork: &Path,
        output: &Path,
        tags: &TagFields,
    ) -> Result<()> {
        let mut args: Vec<String> = vec![
            "-y".into(),
            "-i".into(),
            audio.to_string_lossy().into_owned(),
            "-i".into(),
            artwork.to_string_lossy().into_owned(),
            "-map".into(),
            "0:a".into(),
            "-map".into(),
            "1".into(),
            "-c".into(),
            "copy".into(),
            "-id3v2_version".into(),
            "3".into(),
            "-disposition:v".into(),
            "attached_pic".into(),
            "-metadata".into(),
            format!("title={}", tags.title),
            "-metadata".into(),
            format!("artist={}", tags.artist),
        ];
        if let Some(album) = &tags.album {
            args.push("-metadata".into());
            args.push(format!("album={}", album));
        }
        if let Some(track) = tags.track_number {
            args.push("-metadata".into());
            args.push(format!("track={}", track));
        }
        if let Some(year) = &tags.year {
            args.push("-metadata".into());
            args.push(format!("date={}", year));
        }
        args.push(output.to_string_lossy().into_owned());

        debug!("embed: running ffmpeg for {}", audio.display());
        let result = tokio::process::Command::new(&self.ffmpeg_path)
            .args(&args)
            .output()
            .await
            .map_err(|e| Error::Tool {
                tool: "ffmpeg",
                message: format!("failed to spawn: {}", e),
            })?;

        if !result.status.success() {
            return Err(Error::Tool {
                tool: "ffmpeg",
                message: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// Embedder
// ============================================================================

pub struct Embedder {
    remux: Box<dyn Remux>,
    client: reqwest::Client,
}

impl Embedder {
    pub fn new(remux: Box<dyn Remux>) -> Self {
        Self {
            remux,
            client: reqwest::Client::new(),
        }
    }

    /// Remux `artwork` and `tags` into `audio` via a temporary output
    /// file, atomically replacing the original only on full success.
    /// On failure the temporary output is removed and the original is
    /// left untouched.
    async fn embed_with_artwork(
        &self,
        audio: &Path,
        artwork: &Path,
        tags: &TagFields,
    ) -> Result<()> {
        let temp_out = temp_output_path(audio);

        match self.remux.remux(audio, artwork, &temp_out, tags).await {
            Ok(()) => {
                // Rename is the commit point; the original is never gone
                // without its replacement being in place.
                std::fs::rename(&temp_out, audio)?;
                Ok(())
            }
            Err(e) => {
                std::fs::remove_file(&temp_out).ok();
                Err(e)
            }
        }
    }
}

#[async_trait]
impl ArtworkEmbedder for Embedder {
    async fn embed(&self, audio: &Path, artwork_url: &str, tags: &TagFields) -> Result<()> {
        let artwork = temp_artwork_path(audio);

        let result = async {
            let bytes = self
                .client
                .get(artwork_url)
                .send()
                .await?
                .error_for_status()?
                .bytes()
                .await?;
            std::fs::write(&artwork, &bytes)?;
            self.embed_with_artwork(audio, &artwork, tags).await
        }
        .await;

        // The artwork temp goes away on success and failure alike
        std::fs::remove_file(&artwork).ok();

        if result.is_ok() {
            info!("embed: tagged {}", audio.display());
        }
        result
    }
}

fn temp_artwork_path(audio: &Path) -> PathBuf {
    audio.with_extension("cover.jpg")
}

fn temp_output_path(audio: &Path) -> PathBuf {
    let ext = audio
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mp3".to_string());
    audio.with_extension(format!("tmp.{}", ext))
}
