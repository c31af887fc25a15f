use axum::http::HeaderMap;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::interval;

use crate::config::RateLimitConfig;
use crate::metrics::RATE_LIMIT_KEYS;

/// Key shared by every client that sends no forwarding header.
pub const UNKNOWN_CLIENT: &str = "unknown";

// Rate limit entry - tracks requests per client key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub count: u32,
    pub reset_time: Instant,
}

impl RateLimitEntry {
    fn open(now: Instant, window: Duration) -> Self {
        Self {
            count: 1,
            reset_time: now + window,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        now > self.reset_time
    }
}

/// Storage behind a [`RateLimiter`].
///
/// `hit` must perform the check and the increment as one step per key, so
/// two concurrent requests from the same client cannot both slip under the
/// limit.
pub trait RateLimitStore: Send + Sync {
    /// Counts one request for `key`. Returns `false` when the window is full.
    fn hit(&self, key: &str, now: Instant, limit: u32, window: Duration) -> bool;

    /// Gives back one request for `key` if its window is still open.
    fn release(&self, key: &str, now: Instant);

    /// Drops entries whose window has passed. Returns how many were removed.
    fn evict_expired(&self, now: Instant) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local store. State is lost on restart and not shared between
/// instances.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: DashMap<String, RateLimitEntry>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<RateLimitEntry> {
        self.entries.get(key).map(|entry| *entry)
    }
}

impl RateLimitStore for InMemoryStore {
    fn hit(&self, key: &str, now: Instant, limit: u32, window: Duration) -> bool {
        if limit == 0 {
            return false;
        }

        // the entry guard holds the shard lock for the whole check
        match self.entries.entry(key.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(RateLimitEntry::open(now, window));
                true
            }
            Entry::Occupied(mut slot) => {
                let entry = slot.get_mut();

                // window expired..? start over
                if entry.is_expired(now) {
                    *entry = RateLimitEntry::open(now, window);
                    return true;
                }

                if entry.count < limit {
                    entry.count += 1;
                    return true;
                }

                false
            }
        }
    }

    fn release(&self, key: &str, now: Instant) {
        if let Some(mut entry) = self.entries.get_mut(key) {
            if !entry.is_expired(now) && entry.count > 0 {
                entry.count -= 1;
            }
        }
    }

    fn evict_expired(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Fixed-window limiter for one endpoint.
#[derive(Clone)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    store: Arc<dyn RateLimitStore>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_store(config, Arc::new(InMemoryStore::new()))
    }

    pub fn with_store(config: RateLimitConfig, store: Arc<dyn RateLimitStore>) -> Self {
        Self {
            limit: config.limit,
            window: config.window,
            store,
        }
    }

    pub fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now())
    }

    pub fn allow_at(&self, key: &str, now: Instant) -> bool {
        self.store.hit(key, now, self.limit, self.window)
    }

    pub fn release(&self, key: &str) {
        self.store.release(key, Instant::now());
    }

    pub fn evict_expired(&self, now: Instant) -> usize {
        self.store.evict_expired(now)
    }

    pub fn tracked_keys(&self) -> usize {
        self.store.len()
    }
}

/// Derives the rate-limit key from proxy headers.
///
/// Uses `x-forwarded-for` as-is, then `x-real-ip`, then [`UNKNOWN_CLIENT`].
pub fn client_key(headers: &HeaderMap) -> String {
    ["x-forwarded-for", "x-real-ip"]
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|value| value.to_str().ok())
        .map(str::trim)
        .find(|value| !value.is_empty())
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

// Sweeper - drops expired windows so the maps do not grow forever
pub async fn sweeper(limiters: Vec<RateLimiter>, sweep_interval: Duration) {
    let mut interval = interval(sweep_interval);

    tracing::info!(interval = ?sweep_interval, "rate limit sweeper started");

    loop {
        interval.tick().await;

        let now = Instant::now();
        let evicted: usize = limiters.iter().map(|l| l.evict_expired(now)).sum();
        let tracked: usize = limiters.iter().map(RateLimiter::tracked_keys).sum();

        RATE_LIMIT_KEYS.set(tracked as i64);
        if evicted > 0 {
            tracing::debug!(evicted, tracked, "evicted expired rate limit windows");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn limiter(limit: u32) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            limit,
            window: Duration::from_secs(60),
        })
    }

    #[test]
    fn test_allows_up_to_limit_then_denies() {
        let limiter = limiter(10);
        let now = Instant::now();

        for i in 0..10 {
            assert!(limiter.allow_at("1.2.3.4", now), "request {} should pass", i + 1);
        }
        assert!(!limiter.allow_at("1.2.3.4", now));
        assert!(!limiter.allow_at("1.2.3.4", now + Duration::from_secs(59)));
    }

    #[test]
    fn test_denied_requests_are_not_counted() {
        let store = Arc::new(InMemoryStore::new());
        let limiter = RateLimiter::with_store(RateLimitConfig::per_minute(2), store.clone());
        let now = Instant::now();

        assert!(limiter.allow_at("k", now));
        assert!(limiter.allow_at("k", now));
        assert!(!limiter.allow_at("k", now));
        assert!(!limiter.allow_at("k", now));
        assert_eq!(store.get("k").unwrap().count, 2);
    }

    #[test]
    fn test_window_resets_after_reset_time() {
        let store = Arc::new(InMemoryStore::new());
        let limiter = RateLimiter::with_store(RateLimitConfig::per_minute(5), store.clone());
        let start = Instant::now();

        for _ in 0..5 {
            assert!(limiter.allow_at("k", start));
        }
        assert!(!limiter.allow_at("k", start));

        // exactly at reset_time the window is still closed
        assert!(!limiter.allow_at("k", start + Duration::from_secs(60)));

        let later = start + Duration::from_secs(61);
        assert!(limiter.allow_at("k", later));
        let entry = store.get("k").unwrap();
        assert_eq!(entry.count, 1);
        assert_eq!(entry.reset_time, later + Duration::from_secs(60));
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = limiter(1);
        let now = Instant::now();

        assert!(limiter.allow_at("a", now));
        assert!(!limiter.allow_at("a", now));
        assert!(limiter.allow_at("b", now));
    }

    #[test]
    fn test_zero_limit_denies_everything() {
        let limiter = limiter(0);
        assert!(!limiter.allow("a"));
        assert!(!limiter.allow("a"));
    }

    #[test]
    fn test_release_returns_quota_inside_window() {
        let limiter = limiter(1);

        assert!(limiter.allow("k"));
        assert!(!limiter.allow("k"));
        limiter.release("k");
        assert!(limiter.allow("k"));
    }

    #[test]
    fn test_release_unknown_key_is_noop() {
        let store = Arc::new(InMemoryStore::new());
        let limiter = RateLimiter::with_store(RateLimitConfig::per_minute(1), store.clone());
        limiter.release("nobody");
        assert!(store.is_empty());
    }

    #[test]
    fn test_evict_expired_keeps_live_windows() {
        let store = Arc::new(InMemoryStore::new());
        let limiter = RateLimiter::with_store(RateLimitConfig::per_minute(3), store.clone());
        let start = Instant::now();

        limiter.allow_at("old", start);
        limiter.allow_at("new", start + Duration::from_secs(30));

        let evicted = limiter.evict_expired(start + Duration::from_secs(61));
        assert_eq!(evicted, 1);
        assert!(store.get("old").is_none());
        assert!(store.get("new").is_some());
    }

    #[test]
    fn test_concurrent_hits_never_exceed_limit() {
        let limiter = limiter(50);
        let now = Instant::now();

        let allowed: usize = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let limiter = limiter.clone();
                    s.spawn(move || (0..25).filter(|_| limiter.allow_at("shared", now)).count())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });

        assert_eq!(allowed, 50);
    }

    #[test]
    fn test_client_key_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));

        assert_eq!(client_key(&headers), "203.0.113.7, 10.0.0.1");
    }

    #[test]
    fn test_client_key_falls_back_to_real_ip_then_unknown() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(""));
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_key(&headers), "10.0.0.2");

        assert_eq!(client_key(&HeaderMap::new()), UNKNOWN_CLIENT);
    }
}
