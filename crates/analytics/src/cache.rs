//! TTL snapshot cache with single-flight refresh.
//!
//! The current entry sits behind an `RwLock<Option<Arc<..>>>` and is only
//! ever replaced whole. A separate async mutex serializes refreshes; the
//! entry lock is held just long enough to clone or swap the `Arc`, never
//! across the network fetch. Every finished refresh attempt, failed or
//! not, bumps an attempt counter so callers queued behind it take its
//! outcome instead of fetching again.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{Error, Result};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::snapshot::{MarketSnapshot, SnapshotAssembler};

#[derive(Debug)]
struct CacheEntry {
    snapshot: Arc<MarketSnapshot>,
    created_at: Instant,
    /// Bumped on every install.
    generation: u64,
    invalidated: bool,
}

impl CacheEntry {
    fn is_fresh(&self, ttl: Duration) -> bool {
        !self.invalidated && self.created_at.elapsed() < ttl
    }
}

/// Outcome of the most recent refresh attempt, guarded by the refresh lock.
#[derive(Debug, Default)]
struct RefreshState {
    last_failure: Option<Error>,
}

/// Rebuild a stored failure for a caller that joined the failed attempt.
fn replay(err: &Error) -> Error {
    match err {
        Error::FeedUnavailable { failed } => Error::FeedUnavailable { failed: *failed },
        other => Error::Other(other.to_string()),
    }
}

pub struct SnapshotCache {
    assembler: SnapshotAssembler,
    ttl: Duration,
    entry: RwLock<Option<Arc<CacheEntry>>>,
    refresh: Mutex<RefreshState>,
    /// Finished refresh attempts. Only written while `refresh` is held.
    attempts: AtomicU64,
}

impl SnapshotCache {
    pub fn new(assembler: SnapshotAssembler, ttl: Duration) -> Self {
        Self {
            assembler,
            ttl,
            entry: RwLock::new(None),
            refresh: Mutex::new(RefreshState::default()),
            attempts: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    async fn current(&self) -> Option<Arc<CacheEntry>> {
        self.entry.read().await.clone()
    }

    /// Return the cached snapshot, refreshing when expired or forced.
    ///
    /// At most one refresh runs at a time. Callers that queue behind an
    /// in-flight refresh take its outcome instead of fetching again: the
    /// new snapshot on success, otherwise the older snapshot if one exists,
    /// otherwise the same error.
    pub async fn get_or_refresh(&self, force: bool) -> Result<Arc<MarketSnapshot>> {
        let seen_attempt = self.attempts.load(Ordering::Acquire);
        if let Some(entry) = self.current().await {
            if !force && entry.is_fresh(self.ttl) {
                return Ok(entry.snapshot.clone());
            }
        }

        let mut state = self.refresh.lock().await;

        let latest = self.current().await;
        let attempt = self.attempts.load(Ordering::Acquire);
        if attempt > seen_attempt {
            debug!("Joining refresh attempt {}", attempt);
            match (&latest, &state.last_failure) {
                (Some(entry), _) => return Ok(entry.snapshot.clone()),
                (None, Some(err)) => return Err(replay(err)),
                (None, None) => {}
            }
        }
        if let Some(entry) = &latest {
            if !force && entry.is_fresh(self.ttl) {
                return Ok(entry.snapshot.clone());
            }
        }

        let started = Instant::now();
        let outcome = self.assembler.assemble().await;
        self.attempts.fetch_add(1, Ordering::Release);

        match outcome {
            Ok(snapshot) => {
                state.last_failure = None;
                let generation = latest.map_or(0, |e| e.generation) + 1;
                let snapshot = Arc::new(snapshot);
                let entry = Arc::new(CacheEntry {
                    snapshot: snapshot.clone(),
                    created_at: Instant::now(),
                    generation,
                    invalidated: false,
                });
                *self.entry.write().await = Some(entry);
                info!(
                    "Cache refreshed (generation {}, {}ms, forced={})",
                    generation,
                    started.elapsed().as_millis(),
                    force
                );
                Ok(snapshot)
            }
            Err(e) => {
                let result = match &latest {
                    Some(stale) => {
                        warn!(
                            "Refresh failed, serving snapshot from {}: {}",
                            stale.snapshot.fetched_at, e
                        );
                        Ok(stale.snapshot.clone())
                    }
                    None => {
                        warn!("Refresh failed with no cached snapshot: {}", e);
                        Err(replay(&e))
                    }
                };
                state.last_failure = Some(e);
                result
            }
        }
    }

    /// Mark the current entry expired. It stays available as a fallback
    /// until the next successful refresh replaces it.
    pub async fn invalidate(&self) {
        let mut guard = self.entry.write().await;
        if let Some(entry) = guard.clone() {
            *guard = Some(Arc::new(CacheEntry {
                snapshot: entry.snapshot.clone(),
                created_at: entry.created_at,
                generation: entry.generation,
                invalidated: true,
            }));
            debug!("Cache invalidated at generation {}", entry.generation);
        }
    }

    /// Current snapshot regardless of age, without fetching.
    pub async fn peek(&self) -> Option<Arc<MarketSnapshot>> {
        self.current().await.map(|e| e.snapshot.clone())
    }
}
