// Progress ledger - the durable intermediate file between resolution
// and download. Every append is flushed before the next resolution
// starts, so a run interrupted at any point leaves a usable file.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::error::{Error, Result};

/// Only lines carrying this exact prefix are download entries; anything
/// else in the file (header, footer, blanks) is ignored by the reader.
pub const WATCH_URL_PREFIX: &str = "https://www.youtube.com/watch?v=";

const DATE_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

// ============================================================================
// Writer
// ============================================================================

pub struct LedgerWriter {
    file: File,
    path: PathBuf,
}

impl LedgerWriter {
    /// Create the ledger with its header. Truncates any previous file at
    /// the same path.
    pub fn create(path: &Path, playlist_name: &str, total_tracks: usize) -> Result<Self> {
        let mut file = File::create(path).map_err(|e| Error::Ledger {
            path: path.to_path_buf(),
            source: e,
        })?;

        let header = format!(
            "# Playlist: {}\n# Total tracks: {}\n# Generated: {}\n\n",
            playlist_name,
            total_tracks,
            Local::now().format(DATE_FORMAT)
        );
        file.write_all(header.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|e| Error::Ledger {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Append one resolved URL and flush it to disk immediately.
    pub fn append(&mut self, url: &str) -> Result<()> {
        self.file
            .write_all(format!("{}\n", url).as_bytes())
            .and_then(|()| self.file.flush())
            .map_err(|e| Error::Ledger {
                path: self.path.clone(),
                source: e,
            })
    }

    /// Write the summary footer. Called on normal completion; a cancelled
    /// run simply drops the writer, leaving a valid footer-less file.
    pub fn finish(&mut self, found: usize, failed: usize, total: usize) -> Result<()> {
        let footer = format!(
            "\n# Final Summary:\n# Successfully found: {}/{}\n# Failed to find: {}/{}\n# Completed: {}\n",
            found,
            total,
            failed,
            total,
            Local::now().format(DATE_FORMAT)
        );
        self.file
            .write_all(footer.as_bytes())
            .and_then(|()| self.file.flush())
            .map_err(|e| Error::Ledger {
                path: self.path.clone(),
                source: e,
            })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

// ============================================================================
// Reader
// ============================================================================

/// Parsed-back view of a ledger file.
#[derive(Debug, Clone)]
pub struct Ledger {
    pub playlist_name: String,
    pub entries: Vec<String>,
}

impl Ledger {
    /// Read a ledger back from disk. Header and footer lines are skipped;
    /// only canonical watch URLs become entries, so a truncated or
    /// footer-less file parses the same way a complete one does.
    pub fn read(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::Ledger {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut playlist_name = String::from("Unknown Playlist");
        let mut entries = Vec::new();

        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| Error::Ledger {
                path: path.to_path_buf(),
                source: e,
            })?;
            let trimmed = line.trim();

            if let Some(name) = trimmed.strip_prefix("# Playlist:") {
                playlist_name = name.trim().to_string();
            } else if trimmed.starts_with(WATCH_URL_PREFIX) {
                entries.push(trimmed.to_string());
            }
        }

        Ok(Self {
            playlist_name,
            entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trip_preserves_entries_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("playlist.txt");

        let mut writer = LedgerWriter::create(&path, "Road Trip", 3).unwrap();
        writer.append("https://www.youtube.com/watch?v=aaa").unwrap();
        writer.append("https://www.youtube.com/watch?v=bbb").unwrap();
        writer.append("https://www.youtube.com/watch?v=ccc").unwrap();
        writer.finish(3, 0, 3).unwrap();

        let ledger = Ledger::read(&path).unwrap();
        assert_eq!(ledger.playlist_name, "Road Trip");
        assert_eq!(
            ledger.entries,
            vec![
                "https://www.youtube.com/watch?v=aaa",
                "https://www.youtube.com/watch?v=bbb",
                "https://www.youtube.com/watch?v=ccc",
            ]
        );
    }

    #[test]
    fn file_without_footer_still_parses() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("partial.txt");

        let mut writer = LedgerWriter::create(&path, "Interrupted", 5).unwrap();
        writer.append("https://www.youtube.com/watch?v=one").unwrap();
        writer.append("https://www.youtube.com/watch?v=two").unwrap();
        drop(writer); // cancelled mid-run, no footer

        let ledger = Ledger::read(&path).unwrap();
        assert_eq!(ledger.entries.len(), 2);
        assert_eq!(ledger.playlist_name, "Interrupted");
    }

    #[test]
    fn every_append_prefix_is_parseable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prefix.txt");

        let mut writer = LedgerWriter::create(&path, "P", 4).unwrap();
        for i in 0..4 {
            // the file must be valid before and after each append
            let ledger = Ledger::read(&path).unwrap();
            assert_eq!(ledger.entries.len(), i);
            writer
                .append(&format!("https://www.youtube.com/watch?v=v{}", i))
                .unwrap();
        }
        assert_eq!(Ledger::read(&path).unwrap().entries.len(), 4);
    }

    #[test]
    fn foreign_lines_are_ignored() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("noisy.txt");
        std::fs::write(
            &path,
            "# Playlist: Noisy\n\nhttps://example.com/nope\nhttps://www.youtube.com/watch?v=ok\nsome garbage\n",
        )
        .unwrap();

        let ledger = Ledger::read(&path).unwrap();
        assert_eq!(ledger.entries, vec!["https://www.youtube.com/watch?v=ok"]);
    }

    #[test]
    fn header_counts_are_not_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        let mut writer = LedgerWriter::create(&path, "Empty", 0).unwrap();
        writer.finish(0, 0, 0).unwrap();

        let ledger = Ledger::read(&path).unwrap();
        assert!(ledger.entries.is_empty());
    }
}
