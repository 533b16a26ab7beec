// Track resolution loop - maps track records to downloadable watch URLs
// through a primary search backend with a sticky fallback.

use tracing::{info, warn};

use crate::error::{Result, SearchError};
use crate::ledger::LedgerWriter;
use crate::services::{SearchBackend, TrackRecord};
use crate::signal::{Signal, SignalSource};

// ============================================================================
// Types
// ============================================================================

/// Which backend the resolver is currently using. The transition
/// Primary -> Fallback happens at most once per run and is never
/// reversed (quota does not come back mid-run).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendMode {
    Primary,
    Fallback,
}

/// How a loop ended. Returned explicitly instead of being signalled
/// through ambient state, so callers decide what each exit means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopOutcome {
    Completed,
    Restarted,
    Quit,
}

/// One successfully resolved track. Unresolved tracks produce no entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntry {
    pub target_url: String,
    pub source_index: usize,
}

#[derive(Debug)]
pub struct ResolutionSummary {
    pub entries: Vec<ResolvedEntry>,
    pub found: usize,
    pub failed: usize,
    pub total: usize,
    pub outcome: LoopOutcome,
}

// ============================================================================
// Resolver
// ============================================================================

pub struct Resolver {
    primary: Option<Box<dyn SearchBackend>>,
    fallback: Option<Box<dyn SearchBackend>>,
    mode: BackendMode,
}

impl Resolver {
    /// Backends are constructor-injected; `None` for the primary starts
    /// the run in fallback-only mode.
    pub fn new(
        primary: Option<Box<dyn SearchBackend>>,
        fallback: Option<Box<dyn SearchBackend>>,
    ) -> Self {
        let mode = if primary.is_some() {
            BackendMode::Primary
        } else {
            BackendMode::Fallback
        };
        Self {
            primary,
            fallback,
            mode,
        }
    }

    pub fn mode(&self) -> BackendMode {
        self.mode
    }

    /// Resolve every track in order, appending each match to the ledger
    /// as soon as it is found. Per-item misses never stop the loop; the
    /// signal source is polled before each item.
    pub async fn resolve_all(
        &mut self,
        tracks: &[TrackRecord],
        ledger: &mut LedgerWriter,
        signals: &mut dyn SignalSource,
    ) -> Result<ResolutionSummary> {
        let total = tracks.len();
        let mut entries = Vec::new();
        let mut failed = 0usize;

        for (index, track) in tracks.iter().enumerate() {
            match signals.poll() {
                Some(Signal::Restart) => {
                    info!("resolve: restart requested, keeping {} entries on disk", entries.len());
                    return Ok(summary(entries, failed, total, LoopOutcome::Restarted));
                }
                Some(Signal::Quit) => {
                    return Ok(summary(entries, failed, total, LoopOutcome::Quit));
                }
                // Format/numbering choices belong to the download stage
                _ => {}
            }

            let query = track.search_query();
            match self.resolve_one(&query).await {
                Some(url) => {
                    ledger.append(&url)?;
                    entries.push(ResolvedEntry {
                        target_url: url,
                        source_index: index,
                    });
                }
                None => {
                    warn!("resolve: no match for '{}' ({}/{})", query, index + 1, total);
                    failed += 1;
                }
            }
        }

        let found = entries.len();
        ledger.finish(found, failed, total)?;
        info!("resolve: done, {}/{} found, {} failed", found, total, failed);
        Ok(summary(entries, failed, total, LoopOutcome::Completed))
    }

    /// Resolve a single query to at most one watch URL. A quota signal
    /// from the primary flips the mode permanently and the current item
    /// immediately falls through to the fallback.
    async fn resolve_one(&mut self, query: &str) -> Option<String> {
        if self.mode == BackendMode::Primary {
            if let Some(primary) = &self.primary {
                match primary.search(query).await {
                    Ok(found) => return found,
                    Err(SearchError::QuotaExhausted) => {
                        warn!("resolve: search API quota exhausted, switching to fallback for the rest of this run");
                        self.mode = BackendMode::Fallback;
                    }
                    Err(SearchError::Failed(message)) => {
                        warn!("resolve: primary search failed for '{}': {}", query, message);
                        return None;
                    }
                }
            }
        }

        let fallback = self.fallback.as_ref()?;
        match fallback.search(query).await {
            Ok(found) => found,
            Err(e) => {
                warn!("resolve: fallback search failed for '{}': {}", query, e);
                None
            }
        }
    }
}

/// Pass-through recording for sources whose targets are already known
/// (native YouTube playlists). Same signal and append discipline as the
/// search loop, minus the search.
pub async fn record_passthrough(
    urls: &[String],
    ledger: &mut LedgerWriter,
    signals: &mut dyn SignalSource,
) -> Result<ResolutionSummary> {
    let total = urls.len();
    let mut entries = Vec::new();

    for (index, url) in urls.iter().enumerate() {
        match signals.poll() {
            Some(Signal::Restart) => {
                return Ok(summary(entries, 0, total, LoopOutcome::Restarted));
            }
            Some(Signal::Quit) => {
                return Ok(summary(entries, 0, total, LoopOutcome::Quit));
            }
            _ => {}
        }

        ledger.append(url)?;
        entries.push(ResolvedEntry {
            target_url: url.clone(),
            source_index: index,
        });
    }

    let found = entries.len();
    ledger.finish(found, 0, total)?;
    Ok(summary(entries, 0, total, LoopOutcome::Completed))
}

fn summary(
    entries: Vec<ResolvedEntry>,
    failed: usize,
    total: usize,
    outcome: LoopOutcome,
) -> ResolutionSummary {
    ResolutionSummary {
        found: entries.len(),
        entries,
        failed,
        total,
        outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Ledger;
    use crate::signal::NullSignals;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    struct FakeBackend {
        responses: Mutex<VecDeque<std::result::Result<Option<String>, SearchError>>>,
        calls: Arc<AtomicUsize>,
    }

    impl FakeBackend {
        fn new(
            responses: Vec<std::result::Result<Option<String>, SearchError>>,
        ) -> (Box<Self>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Box::new(Self {
                    responses: Mutex::new(responses.into()),
                    calls: calls.clone(),
                }),
                calls,
            )
        }
    }

    #[async_trait]
    impl SearchBackend for FakeBackend {
        async fn search(&self, _query: &str) -> std::result::Result<Option<String>, SearchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(None))
        }
    }

    fn track(name: &str) -> TrackRecord {
        TrackRecord {
            name: name.to_string(),
            artists_joined: "Artist".to_string(),
            album: None,
            artwork_url: None,
            year: None,
        }
    }

    fn watch(id: &str) -> String {
        format!("https://www.youtube.com/watch?v={}", id)
    }

    #[tokio::test]
    async fn all_primary_hits_fill_the_ledger() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let mut ledger = LedgerWriter::create(&path, "P", 3).unwrap();

        let (primary, _) = FakeBackend::new(vec![
            Ok(Some(watch("a"))),
            Ok(Some(watch("b"))),
            Ok(Some(watch("c"))),
        ]);
        let mut resolver = Resolver::new(Some(primary), None);

        let tracks = vec![track("one"), track("two"), track("three")];
        let summary = resolver
            .resolve_all(&tracks, &mut ledger, &mut NullSignals)
            .await
            .unwrap();

        assert_eq!(summary.found, 3);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.outcome, LoopOutcome::Completed);
        assert_eq!(Ledger::read(&path).unwrap().entries.len(), 3);
    }

    #[tokio::test]
    async fn quota_flip_is_sticky_and_retries_current_item() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let mut ledger = LedgerWriter::create(&path, "P", 3).unwrap();

        let (primary, primary_calls) = FakeBackend::new(vec![
            Ok(Some(watch("a"))),
            Err(SearchError::QuotaExhausted),
        ]);
        let (fallback, fallback_calls) =
            FakeBackend::new(vec![Ok(Some(watch("b"))), Ok(Some(watch("c")))]);
        let mut resolver = Resolver::new(Some(primary), Some(fallback));
        assert_eq!(resolver.mode(), BackendMode::Primary);

        let tracks = vec![track("one"), track("two"), track("three")];
        let summary = resolver
            .resolve_all(&tracks, &mut ledger, &mut NullSignals)
            .await
            .unwrap();

        // primary saw items 1 and 2 only; item 2 fell through to the
        // fallback, item 3 never touched the primary again
        assert_eq!(primary_calls.load(Ordering::SeqCst), 2);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 2);
        assert_eq!(resolver.mode(), BackendMode::Fallback);
        assert_eq!(summary.found, 3);
        assert_eq!(
            Ledger::read(&path).unwrap().entries,
            vec![watch("a"), watch("b"), watch("c")]
        );
    }

    #[tokio::test]
    async fn no_primary_credential_starts_in_fallback() {
        let (fallback, fallback_calls) = FakeBackend::new(vec![Ok(Some(watch("x")))]);
        let mut resolver = Resolver::new(None, Some(fallback));
        assert_eq!(resolver.mode(), BackendMode::Fallback);

        let dir = tempdir().unwrap();
        let mut ledger = LedgerWriter::create(&dir.path().join("o.txt"), "P", 1).unwrap();
        resolver
            .resolve_all(&[track("one")], &mut ledger, &mut NullSignals)
            .await
            .unwrap();
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn misses_are_counted_not_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let mut ledger = LedgerWriter::create(&path, "P", 3).unwrap();

        let (primary, _) = FakeBackend::new(vec![
            Ok(None),
            Err(SearchError::Failed("boom".to_string())),
            Ok(Some(watch("c"))),
        ]);
        let mut resolver = Resolver::new(Some(primary), None);

        let tracks = vec![track("one"), track("two"), track("three")];
        let summary = resolver
            .resolve_all(&tracks, &mut ledger, &mut NullSignals)
            .await
            .unwrap();

        assert_eq!(summary.found, 1);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.outcome, LoopOutcome::Completed);
        // entry keeps its original source position
        assert_eq!(summary.entries[0].source_index, 2);
    }

    struct OneShot(Option<Signal>);
    impl SignalSource for OneShot {
        fn poll(&mut self) -> Option<Signal> {
            self.0.take()
        }
    }

    #[tokio::test]
    async fn restart_keeps_prior_entries_and_skips_footer() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let mut ledger = LedgerWriter::create(&path, "P", 2).unwrap();

        let (primary, _) = FakeBackend::new(vec![Ok(Some(watch("a")))]);
        let mut resolver = Resolver::new(Some(primary), None);

        // First poll passes, second poll restarts before item 2
        struct SecondPoll(usize);
        impl SignalSource for SecondPoll {
            fn poll(&mut self) -> Option<Signal> {
                self.0 += 1;
                (self.0 == 2).then_some(Signal::Restart)
            }
        }

        let tracks = vec![track("one"), track("two")];
        let summary = resolver
            .resolve_all(&tracks, &mut ledger, &mut SecondPoll(0))
            .await
            .unwrap();

        assert_eq!(summary.outcome, LoopOutcome::Restarted);
        assert_eq!(summary.found, 1);
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains(&watch("a")));
        assert!(!contents.contains("Final Summary"));
    }

    #[tokio::test]
    async fn quit_signal_stops_immediately() {
        let dir = tempdir().unwrap();
        let mut ledger = LedgerWriter::create(&dir.path().join("o.txt"), "P", 1).unwrap();
        let (primary, calls) = FakeBackend::new(vec![Ok(Some(watch("a")))]);
        let mut resolver = Resolver::new(Some(primary), None);

        let summary = resolver
            .resolve_all(&[track("one")], &mut ledger, &mut OneShot(Some(Signal::Quit)))
            .await
            .unwrap();

        assert_eq!(summary.outcome, LoopOutcome::Quit);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn passthrough_records_known_urls() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let mut ledger = LedgerWriter::create(&path, "YT", 2).unwrap();

        let urls = vec![watch("x"), watch("y")];
        let summary = record_passthrough(&urls, &mut ledger, &mut NullSignals)
            .await
            .unwrap();

        assert_eq!(summary.found, 2);
        assert_eq!(summary.outcome, LoopOutcome::Completed);
        assert_eq!(Ledger::read(&path).unwrap().entries, urls);
    }
}
