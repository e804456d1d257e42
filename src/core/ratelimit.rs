use dashmap::DashMap;
use tracing::debug;

use super::config::RateLimitConfig;
use super::types::{now_epoch_millis, MediaId};

// ---------------------------------------------------------------------------
// Sliding-window (reset variant) rate limiter
// ---------------------------------------------------------------------------

/// Limiter key: one window per (asset, client identity) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateKey {
    pub media_id: MediaId,
    pub client: String,
}

impl RateKey {
    pub fn new(media_id: MediaId, client: impl Into<String>) -> Self {
        Self {
            media_id,
            client: client.into(),
        }
    }
}

/// Per-key window state. Replaced wholesale once the window elapses.
#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    started_at_ms: i64,
}

/// Admission decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied { retry_after_secs: u64 },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

/// Counts requests in a fixed-duration window anchored to the first
/// request in a key, resetting wholesale once the window elapses.
///
/// The per-key read-modify-write happens under the `DashMap` entry lock,
/// so two concurrent requests racing for the last slot cannot both be
/// admitted. Unrelated keys hit different shards and never serialize on
/// a common lock.
///
/// The key space grows with distinct (asset, client) pairs; `sweep`
/// evicts windows older than one window duration and is driven by a
/// periodic task.
pub struct RateLimiter {
    windows: DashMap<RateKey, Window>,
    max_requests: u32,
    window_ms: i64,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            windows: DashMap::new(),
            max_requests: config.max_requests,
            window_ms: (config.window_secs as i64) * 1000,
        }
    }

    /// Admit or deny one request for `key`.
    pub fn admit(&self, key: RateKey) -> Decision {
        self.admit_at(now_epoch_millis(), key)
    }

    fn admit_at(&self, now_ms: i64, key: RateKey) -> Decision {
        let mut entry = self.windows.entry(key).or_insert(Window {
            count: 0,
            started_at_ms: now_ms,
        });

        let elapsed = now_ms - entry.started_at_ms;
        if elapsed >= self.window_ms {
            // Window elapsed: reset wholesale, this request opens it.
            entry.count = 1;
            entry.started_at_ms = now_ms;
            return Decision::Allowed;
        }

        if entry.count < self.max_requests {
            entry.count += 1;
            return Decision::Allowed;
        }

        // count == max_requests denies; the count is not incremented further.
        let remaining_ms = (self.window_ms - elapsed).max(0);
        let retry_after_secs = ((remaining_ms + 999) / 1000) as u64;
        debug!(retry_after_secs, "rate limit exceeded");
        Decision::Denied { retry_after_secs }
    }

    /// Evict windows older than one window duration. Called periodically
    /// to keep memory bounded under sustained key diversity.
    pub fn sweep(&self) {
        self.sweep_at(now_epoch_millis());
    }

    fn sweep_at(&self, now_ms: i64) {
        self.windows
            .retain(|_key, window| now_ms - window.started_at_ms < self.window_ms);
    }

    /// Number of live windows (for the metrics gauge).
    pub fn window_count(&self) -> usize {
        self.windows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: u32, window_secs: u64) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            max_requests,
            window_secs,
            sweep_interval_secs: 60,
        })
    }

    fn key() -> RateKey {
        RateKey::new(MediaId::new(), "203.0.113.9")
    }

    #[test]
    fn test_five_admitted_sixth_denied() {
        let rl = limiter(5, 60);
        let k = key();
        let t0 = 1_700_000_000_000;

        for i in 0..5 {
            assert!(
                rl.admit_at(t0 + i * 1000, k.clone()).is_allowed(),
                "request {} should be admitted",
                i + 1
            );
        }
        match rl.admit_at(t0 + 5_000, k.clone()) {
            Decision::Denied { retry_after_secs } => assert!(retry_after_secs > 0),
            Decision::Allowed => panic!("sixth request must be denied"),
        }
    }

    #[test]
    fn test_window_reset_admits_again() {
        let rl = limiter(5, 60);
        let k = key();
        let t0 = 1_700_000_000_000;

        for i in 0..6 {
            rl.admit_at(t0 + i, k.clone());
        }
        // One full window after the window start, a fresh window opens.
        assert!(rl.admit_at(t0 + 60_000, k.clone()).is_allowed());
        // And it has max_requests - 1 slots left.
        for i in 1..5 {
            assert!(rl.admit_at(t0 + 60_000 + i, k.clone()).is_allowed());
        }
        assert!(!rl.admit_at(t0 + 60_005, k.clone()).is_allowed());
    }

    #[test]
    fn test_boundary_count_denies() {
        let rl = limiter(1, 60);
        let k = key();
        let t0 = 1_700_000_000_000;
        assert!(rl.admit_at(t0, k.clone()).is_allowed());
        // count == max_requests: deny, not admit.
        assert!(!rl.admit_at(t0 + 1, k.clone()).is_allowed());
    }

    #[test]
    fn test_denial_does_not_consume_slots() {
        let rl = limiter(2, 60);
        let k = key();
        let t0 = 1_700_000_000_000;
        rl.admit_at(t0, k.clone());
        rl.admit_at(t0, k.clone());
        for _ in 0..50 {
            assert!(!rl.admit_at(t0 + 10, k.clone()).is_allowed());
        }
        // The window still resets on schedule despite the denied burst.
        assert!(rl.admit_at(t0 + 60_000, k.clone()).is_allowed());
    }

    #[test]
    fn test_keys_are_independent() {
        let rl = limiter(1, 60);
        let id = MediaId::new();
        let t0 = 1_700_000_000_000;
        assert!(rl
            .admit_at(t0, RateKey::new(id, "10.0.0.1"))
            .is_allowed());
        assert!(rl
            .admit_at(t0, RateKey::new(id, "10.0.0.2"))
            .is_allowed());
        assert!(!rl
            .admit_at(t0 + 1, RateKey::new(id, "10.0.0.1"))
            .is_allowed());
    }

    #[test]
    fn test_retry_after_reflects_remaining_window() {
        let rl = limiter(1, 60);
        let k = key();
        let t0 = 1_700_000_000_000;
        rl.admit_at(t0, k.clone());
        match rl.admit_at(t0 + 45_000, k.clone()) {
            Decision::Denied { retry_after_secs } => assert_eq!(retry_after_secs, 15),
            Decision::Allowed => panic!("must deny within the window"),
        }
    }

    #[test]
    fn test_sweep_evicts_stale_windows_only() {
        let rl = limiter(5, 60);
        let t0 = 1_700_000_000_000;
        let old = key();
        let fresh = key();
        rl.admit_at(t0, old.clone());
        rl.admit_at(t0 + 59_000, fresh.clone());
        assert_eq!(rl.window_count(), 2);

        rl.sweep_at(t0 + 61_000);
        assert_eq!(rl.window_count(), 1);
    }

    #[test]
    fn test_concurrent_admits_never_exceed_limit() {
        use std::sync::Arc;

        let rl = Arc::new(limiter(5, 60));
        let k = key();
        let mut handles = Vec::new();
        for _ in 0..16 {
            let rl = rl.clone();
            let k = k.clone();
            handles.push(std::thread::spawn(move || {
                let mut admitted = 0u32;
                for _ in 0..4 {
                    if rl.admit(k.clone()).is_allowed() {
                        admitted += 1;
                    }
                }
                admitted
            }));
        }
        let total: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 5, "exactly max_requests must be admitted");
    }
}
