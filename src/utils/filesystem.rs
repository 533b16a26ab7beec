// Filename and download-directory helpers

use std::fs;
use std::path::{Path, PathBuf};

const ILLEGAL_FILENAME_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Make a track or playlist name safe to use as a filename: characters
/// the common filesystems reject become underscores, surrounding
/// whitespace is trimmed.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if ILLEGAL_FILENAME_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Get the default download directory for Tunedrop
/// Returns: ~/Downloads/Tunedrop
pub fn default_download_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join("Downloads")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Tunedrop")
}

/// Create a directory (and parents) if it doesn't exist
pub fn ensure_dir(dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dir)
}
