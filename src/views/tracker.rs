use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderMap;
use tracing::debug;

use crate::core::ratelimit::{Decision, RateKey, RateLimiter};
use crate::core::error::StorageError;
use crate::core::types::{MediaId, ViewLogEntry};
use crate::storage::MetadataStore;

use super::analytics::AnalyticsAggregator;

// ---------------------------------------------------------------------------
// View tracker
// ---------------------------------------------------------------------------

/// Outcome of recording a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewOutcome {
    Admitted,
    RateLimited { retry_after_secs: u64 },
}

/// Records admitted views and keeps the analytics cache coherent.
///
/// The append and the cache invalidation are one synchronous step; an
/// analytics read issued after `record_view` returns is guaranteed to
/// observe the new entry. Invalidation stays a direct call rather than
/// an event, which is what preserves that guarantee.
pub struct ViewTracker<M> {
    limiter: Arc<RateLimiter>,
    store: Arc<M>,
    analytics: Arc<AnalyticsAggregator<M>>,
}

impl<M: MetadataStore> ViewTracker<M> {
    pub fn new(
        limiter: Arc<RateLimiter>,
        store: Arc<M>,
        analytics: Arc<AnalyticsAggregator<M>>,
    ) -> Self {
        Self {
            limiter,
            store,
            analytics,
        }
    }

    /// Rate-limit check only, no write. The streaming path calls this
    /// before opening the file and `log_view` after the body is set up.
    pub fn admit(&self, media_id: MediaId, client: &str) -> Decision {
        self.limiter.admit(RateKey::new(media_id, client))
    }

    /// Append a view-log entry and synchronously invalidate the analytics
    /// cache entry for the asset. Assumes admission already happened.
    pub async fn log_view(&self, media_id: MediaId, client: &str) -> Result<(), StorageError> {
        self.store
            .append_view(ViewLogEntry::new(media_id, client.to_string()))
            .await?;
        self.analytics.invalidate(media_id);
        debug!(%media_id, client, "view recorded");
        Ok(())
    }

    /// Full record path: admit, then append and invalidate. On denial
    /// nothing is written.
    pub async fn record_view(
        &self,
        media_id: MediaId,
        client: &str,
    ) -> Result<ViewOutcome, StorageError> {
        match self.admit(media_id, client) {
            Decision::Denied { retry_after_secs } => {
                Ok(ViewOutcome::RateLimited { retry_after_secs })
            }
            Decision::Allowed => {
                self.log_view(media_id, client).await?;
                Ok(ViewOutcome::Admitted)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Client identity
// ---------------------------------------------------------------------------

/// Derive the client identity for rate limiting and the view log.
///
/// Priority: first entry of `X-Forwarded-For`, then `X-Real-IP`, then the
/// raw connection address. First non-empty wins.
pub fn client_identity(headers: &HeaderMap, remote: Option<SocketAddr>) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }
    match remote {
        Some(addr) => addr.ip().to_string(),
        None => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::RateLimitConfig;
    use crate::storage::memory::InMemoryMetadataStore;
    use axum::http::HeaderValue;

    fn tracker(
        max_requests: u32,
    ) -> (
        Arc<InMemoryMetadataStore>,
        Arc<AnalyticsAggregator<InMemoryMetadataStore>>,
        ViewTracker<InMemoryMetadataStore>,
    ) {
        let store = Arc::new(InMemoryMetadataStore::new());
        let analytics = Arc::new(AnalyticsAggregator::new(store.clone()));
        let limiter = Arc::new(RateLimiter::new(&RateLimitConfig {
            max_requests,
            window_secs: 60,
            sweep_interval_secs: 60,
        }));
        let t = ViewTracker::new(limiter, store.clone(), analytics.clone());
        (store, analytics, t)
    }

    #[tokio::test]
    async fn test_admitted_view_is_logged_and_visible_to_analytics() {
        let (store, analytics, tracker) = tracker(5);
        let id = MediaId::new();

        // Warm the cache with the empty state first.
        let (snap, _) = analytics.get(id).await.unwrap();
        assert_eq!(snap.total_views, 0);

        let outcome = tracker.record_view(id, "10.0.0.1").await.unwrap();
        assert_eq!(outcome, ViewOutcome::Admitted);
        assert_eq!(store.view_count().await, 1);

        // The write invalidated the cached empty snapshot.
        let (snap, _) = analytics.get(id).await.unwrap();
        assert_eq!(snap.total_views, 1);
    }

    #[tokio::test]
    async fn test_denied_view_writes_nothing() {
        let (store, _analytics, tracker) = tracker(1);
        let id = MediaId::new();

        assert_eq!(
            tracker.record_view(id, "10.0.0.1").await.unwrap(),
            ViewOutcome::Admitted
        );
        match tracker.record_view(id, "10.0.0.1").await.unwrap() {
            ViewOutcome::RateLimited { retry_after_secs } => assert!(retry_after_secs > 0),
            ViewOutcome::Admitted => panic!("second view must be rate limited"),
        }
        assert_eq!(store.view_count().await, 1);
    }

    #[test]
    fn test_client_identity_priority() {
        let remote: SocketAddr = "192.0.2.7:4242".parse().unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.5, 10.0.0.1"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(client_identity(&headers, Some(remote)), "203.0.113.5");

        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(client_identity(&headers, Some(remote)), "198.51.100.2");

        let headers = HeaderMap::new();
        assert_eq!(client_identity(&headers, Some(remote)), "192.0.2.7");
        assert_eq!(client_identity(&headers, None), "unknown");
    }

    #[test]
    fn test_client_identity_skips_empty_entries() {
        let remote: SocketAddr = "192.0.2.7:4242".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("  , 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static(""));
        assert_eq!(client_identity(&headers, Some(remote)), "192.0.2.7");
    }
}
