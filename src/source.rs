// Source URL classification

use crate::error::{Error, Result};

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Spotify,
    YouTube,
}

impl Provider {
    pub fn display_name(&self) -> &str {
        match self {
            Provider::Spotify => "Spotify",
            Provider::YouTube => "YouTube",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Playlist,
    Album,
    Track,
}

/// A classified source URL. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReference {
    pub provider: Provider,
    pub content_type: ContentType,
    pub id: String,
}

// ============================================================================
// Classification rules
// ============================================================================

/// One classification rule: a domain marker plus an extractor that pulls
/// (content type, id) out of the URL. Rules are evaluated in order and the
/// first full match wins, so new providers slot in without touching callers.
struct Rule {
    domain_marker: &'static str,
    extract: fn(&str) -> Option<(ContentType, String)>,
}

const RULES: &[Rule] = &[
    Rule {
        domain_marker: "open.spotify.com",
        extract: extract_spotify,
    },
    Rule {
        domain_marker: "youtube.com",
        extract: extract_youtube_playlist,
    },
    Rule {
        domain_marker: "youtu.be",
        extract: extract_youtube_playlist,
    },
];

fn extract_spotify(url: &str) -> Option<(ContentType, String)> {
    let segments: [(&str, ContentType); 3] = [
        ("playlist/", ContentType::Playlist),
        ("album/", ContentType::Album),
        ("track/", ContentType::Track),
    ];

    for (segment, content_type) in segments {
        if let Some(pos) = url.find(segment) {
            let rest = &url[pos + segment.len()..];
            let id: String = rest
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric())
                .collect();
            if !id.is_empty() {
                return Some((content_type, id));
            }
        }
    }
    None
}

fn extract_youtube_playlist(url: &str) -> Option<(ContentType, String)> {
    let pos = url.find("list=")?;
    let rest = &url[pos + 5..];
    let id: String = rest
        .chars()
        .take_while(|c| *c != '&' && *c != '#')
        .collect();
    if id.is_empty() {
        None
    } else {
        Some((ContentType::Playlist, id))
    }
}

/// Classify a raw URL into a `SourceReference`. Pure parse; no network
/// activity happens before this returns successfully.
pub fn detect(url: &str) -> Result<SourceReference> {
    for rule in RULES {
        if !url.contains(rule.domain_marker) {
            continue;
        }
        if let Some((content_type, id)) = (rule.extract)(url) {
            let provider = if rule.domain_marker == "open.spotify.com" {
                Provider::Spotify
            } else {
                Provider::YouTube
            };
            return Ok(SourceReference {
                provider,
                content_type,
                id,
            });
        }
    }
    Err(Error::UnsupportedUrl(url.to_string()))
}
