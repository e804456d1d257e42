use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tracing::debug;

use crate::core::error::StorageError;
use crate::core::types::{MediaId, ViewLogEntry};
use crate::storage::MetadataStore;

// ---------------------------------------------------------------------------
// Analytics aggregator with invalidation-aware cache
// ---------------------------------------------------------------------------

/// Derived per-asset view statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalyticsSnapshot {
    pub total_views: u64,
    pub unique_ips: u64,
    /// Views per calendar day, keyed `YYYY-MM-DD`. BTreeMap keeps the
    /// serialized output date-sorted.
    pub views_per_day: BTreeMap<String, u64>,
}

/// Whether a snapshot came from the cache or was just computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

/// Per-asset cache slot. `gen` increments on every invalidation; a
/// snapshot computed against an older generation is never stored, which
/// is what makes read-after-invalidate-after-write observe the write.
#[derive(Debug, Default)]
struct CacheSlot {
    gen: u64,
    snapshot: Option<AnalyticsSnapshot>,
}

/// Computes view analytics from the view log, cached per asset with no
/// expiry other than explicit invalidation from the view tracker.
///
/// The cache is a sharded map, so invalidating one asset never blocks
/// reads of another.
pub struct AnalyticsAggregator<M> {
    store: Arc<M>,
    cache: DashMap<MediaId, CacheSlot>,
}

impl<M: MetadataStore> AnalyticsAggregator<M> {
    pub fn new(store: Arc<M>) -> Self {
        Self {
            store,
            cache: DashMap::new(),
        }
    }

    /// Return the snapshot for an asset, recomputing from the view log on
    /// a cache miss.
    pub async fn get(&self, id: MediaId) -> Result<(AnalyticsSnapshot, CacheStatus), StorageError> {
        // Fast path: cached snapshot. The guard is dropped before any await.
        let observed_gen = match self.cache.get(&id) {
            Some(slot) => {
                if let Some(snapshot) = &slot.snapshot {
                    return Ok((snapshot.clone(), CacheStatus::Hit));
                }
                slot.gen
            }
            None => 0,
        };

        let logs = self.store.views_for(id).await?;
        let snapshot = compute_snapshot(&logs);

        // Store only if no invalidation happened while we were computing;
        // otherwise the snapshot may miss a concurrent write.
        let mut slot = self.cache.entry(id).or_default();
        if slot.gen == observed_gen {
            slot.snapshot = Some(snapshot.clone());
        } else {
            debug!(media_id = %id, "snapshot raced an invalidation, not cached");
        }

        Ok((snapshot, CacheStatus::Miss))
    }

    /// Drop the cached snapshot for an asset. Called synchronously by the
    /// view tracker after every admitted write.
    pub fn invalidate(&self, id: MediaId) {
        let mut slot = self.cache.entry(id).or_default();
        slot.gen += 1;
        slot.snapshot = None;
    }

    /// Number of populated cache entries (for the metrics gauge).
    pub fn entry_count(&self) -> usize {
        self.cache.len()
    }
}

fn compute_snapshot(logs: &[ViewLogEntry]) -> AnalyticsSnapshot {
    let unique_ips = logs
        .iter()
        .map(|l| l.viewed_by.as_str())
        .collect::<HashSet<_>>()
        .len() as u64;

    let mut views_per_day: BTreeMap<String, u64> = BTreeMap::new();
    for log in logs {
        *views_per_day.entry(log.day()).or_insert(0) += 1;
    }

    AnalyticsSnapshot {
        total_views: logs.len() as u64,
        unique_ips,
        views_per_day,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::InMemoryMetadataStore;
    use chrono::{Duration, Utc};

    async fn seed_view(store: &InMemoryMetadataStore, id: MediaId, client: &str, days_ago: i64) {
        let mut entry = ViewLogEntry::new(id, client.to_string());
        entry.timestamp = Utc::now() - Duration::days(days_ago);
        store.append_view(entry).await.unwrap();
    }

    #[tokio::test]
    async fn test_counts_uniques_and_days() {
        let store = Arc::new(InMemoryMetadataStore::new());
        let agg = AnalyticsAggregator::new(store.clone());
        let id = MediaId::new();

        // 5 views, 3 unique clients, 2 distinct days.
        seed_view(&store, id, "1.1.1.1", 0).await;
        seed_view(&store, id, "1.1.1.1", 0).await;
        seed_view(&store, id, "2.2.2.2", 0).await;
        seed_view(&store, id, "3.3.3.3", 1).await;
        seed_view(&store, id, "2.2.2.2", 1).await;

        let (snap, status) = agg.get(id).await.unwrap();
        assert_eq!(status, CacheStatus::Miss);
        assert_eq!(snap.total_views, 5);
        assert_eq!(snap.unique_ips, 3);
        assert_eq!(snap.views_per_day.len(), 2);
        assert_eq!(snap.views_per_day.values().sum::<u64>(), 5);
    }

    #[tokio::test]
    async fn test_second_read_hits_cache_with_identical_snapshot() {
        let store = Arc::new(InMemoryMetadataStore::new());
        let agg = AnalyticsAggregator::new(store.clone());
        let id = MediaId::new();
        seed_view(&store, id, "1.1.1.1", 0).await;

        let (first, s1) = agg.get(id).await.unwrap();
        let (second, s2) = agg.get(id).await.unwrap();
        assert_eq!(s1, CacheStatus::Miss);
        assert_eq!(s2, CacheStatus::Hit);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_read_after_invalidate_after_write_observes_write() {
        let store = Arc::new(InMemoryMetadataStore::new());
        let agg = AnalyticsAggregator::new(store.clone());
        let id = MediaId::new();

        seed_view(&store, id, "1.1.1.1", 0).await;
        let (snap, _) = agg.get(id).await.unwrap();
        assert_eq!(snap.total_views, 1);

        // Write then synchronous invalidation, as the tracker does.
        seed_view(&store, id, "2.2.2.2", 0).await;
        agg.invalidate(id);

        let (snap, status) = agg.get(id).await.unwrap();
        assert_eq!(status, CacheStatus::Miss);
        assert_eq!(snap.total_views, 2);
        assert_eq!(snap.unique_ips, 2);
    }

    #[tokio::test]
    async fn test_stale_snapshot_not_cached_past_invalidation() {
        let store = Arc::new(InMemoryMetadataStore::new());
        let agg = AnalyticsAggregator::new(store.clone());
        let id = MediaId::new();
        seed_view(&store, id, "1.1.1.1", 0).await;

        // Simulate a computation that raced an invalidation: the observed
        // generation is stale by the time the result would be stored.
        let observed_gen = 0u64;
        let logs = store.views_for(id).await.unwrap();
        let stale = compute_snapshot(&logs);

        seed_view(&store, id, "2.2.2.2", 0).await;
        agg.invalidate(id);

        {
            let mut slot = agg.cache.entry(id).or_default();
            if slot.gen == observed_gen {
                slot.snapshot = Some(stale);
            }
        }

        // The stale snapshot must not have been accepted.
        let (snap, status) = agg.get(id).await.unwrap();
        assert_eq!(status, CacheStatus::Miss);
        assert_eq!(snap.total_views, 2);
    }

    #[tokio::test]
    async fn test_empty_log_snapshot() {
        let store = Arc::new(InMemoryMetadataStore::new());
        let agg = AnalyticsAggregator::new(store.clone());
        let (snap, _) = agg.get(MediaId::new()).await.unwrap();
        assert_eq!(snap.total_views, 0);
        assert_eq!(snap.unique_ips, 0);
        assert!(snap.views_per_day.is_empty());
    }
}
