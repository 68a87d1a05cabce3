use crate::fingerprint::fingerprint;
use issuegraph_core::{AnalysisConfig, CancellationToken, Issue};
use issuegraph_graph::{analyze, GraphStats};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Results older than this are treated as misses.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

struct CacheSlot {
    key: String,
    stats: Arc<GraphStats>,
    computed_at: Instant,
}

/// Hit/miss counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        if self.hits + self.misses == 0 {
            0.0
        } else {
            self.hits as f64 / (self.hits + self.misses) as f64
        }
    }
}

/// Single-slot, content-addressed cache of analysis results.
///
/// The read path takes a shared lock and never blocks on an analysis in
/// flight; writers briefly take the exclusive lock. Tests construct their
/// own instances; production code shares [`global_cache`].
pub struct AnalysisCache {
    slot: RwLock<Option<CacheSlot>>,
    ttl: RwLock<Duration>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for AnalysisCache {
    fn default() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            slot: RwLock::new(None),
            ttl: RwLock::new(ttl),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// The stored stats, iff `key` matches and the entry is younger than
    /// the TTL.
    pub fn get(&self, key: &str) -> Option<Arc<GraphStats>> {
        let ttl = *self.ttl.read();
        let slot = self.slot.read();
        let hit = slot
            .as_ref()
            .filter(|entry| entry.key == key && entry.computed_at.elapsed() < ttl)
            .map(|entry| entry.stats.clone());
        if hit.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(key, "analysis cache hit");
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!(key, "analysis cache miss");
        }
        hit
    }

    /// Store `stats` under `key`, replacing whatever was cached.
    pub fn set(&self, key: &str, stats: Arc<GraphStats>) {
        let mut slot = self.slot.write();
        *slot = Some(CacheSlot {
            key: key.to_string(),
            stats,
            computed_at: Instant::now(),
        });
    }

    /// Drop the cached entry.
    pub fn invalidate(&self) {
        self.slot.write().take();
    }

    pub fn set_ttl(&self, ttl: Duration) {
        *self.ttl.write() = ttl;
    }

    /// The key currently occupying the slot, expired or not.
    pub fn hash(&self) -> Option<String> {
        self.slot.read().as_ref().map(|entry| entry.key.clone())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: usize::from(self.slot.read().is_some()),
        }
    }
}

static GLOBAL_CACHE: Lazy<AnalysisCache> = Lazy::new(AnalysisCache::default);

/// Process-wide default cache instance.
pub fn global_cache() -> &'static AnalysisCache {
    &GLOBAL_CACHE
}

/// Fingerprint the snapshot, serve from `cache` when possible, otherwise
/// analyze, wait for the centrality bundle and publish the finished handle.
///
/// Storing only after readiness means readers of a cached handle never see
/// partial state. Two racing callers may both compute; the slot keeps the
/// later write.
pub fn analyze_cached(
    issues: &[Issue],
    config: Option<AnalysisConfig>,
    token: CancellationToken,
    cache: &AnalysisCache,
) -> (Arc<GraphStats>, bool) {
    let fp = fingerprint(issues, config.as_ref());
    if let Some(stats) = cache.get(&fp.key) {
        return (stats, true);
    }

    let stats = analyze(issues, config.unwrap_or_default(), token);
    stats.wait_ready();
    cache.set(&fp.key, stats.clone());
    info!(key = %fp.key, "analysis cached");
    (stats, false)
}
