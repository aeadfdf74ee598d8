//! Explicit memoization of fetched entity lists
//!
//! The cache is owned by the API-client component and passed by reference to
//! consumers; there is no module-level state. Writes invalidate by key, and
//! entries expire after a TTL so a long-lived process does not serve stale
//! views forever.

use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::Result;

struct CacheEntry {
    value: Value,
    fetched_at: Instant,
}

/// Keyed cache of remote entity lists with manual invalidation.
pub struct EntityCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl EntityCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached value for `key`, fetching and storing it when the
    /// entry is missing or expired.
    ///
    /// Fetch errors are returned without caching, so the next call retries.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetch: F) -> Result<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        {
            let entries = self.entries.lock().await;
            if let Some(entry) = entries.get(key) {
                if entry.fetched_at.elapsed() < self.ttl {
                    return Ok(entry.value.clone());
                }
            }
        }

        let value = fetch().await?;

        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            CacheEntry {
                value: value.clone(),
                fetched_at: Instant::now(),
            },
        );

        Ok(value)
    }

    /// Drop the cached value for one key.
    pub async fn invalidate(&self, key: &str) {
        let mut entries = self.entries.lock().await;
        entries.remove(key);
    }

    /// Drop every cached value; used when the sync engine signals that
    /// server state may have changed.
    pub async fn invalidate_all(&self) {
        let mut entries = self.entries.lock().await;
        entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use serde_json::json;

    fn counting_fetch(counter: &Arc<AtomicUsize>) -> impl Future<Output = Result<Value>> {
        let counter = Arc::clone(counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(json!([{"id": 1}]))
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn second_read_is_served_from_cache() {
        let cache = EntityCache::new(Duration::from_secs(60));
        let fetches = Arc::new(AtomicUsize::new(0));

        let first = cache
            .get_or_fetch("patients", || counting_fetch(&fetches))
            .await
            .unwrap();
        let second = cache
            .get_or_fetch("patients", || counting_fetch(&fetches))
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn invalidate_forces_a_refetch() {
        let cache = EntityCache::new(Duration::from_secs(60));
        let fetches = Arc::new(AtomicUsize::new(0));

        cache
            .get_or_fetch("patients", || counting_fetch(&fetches))
            .await
            .unwrap();
        cache.invalidate("patients").await;
        cache
            .get_or_fetch("patients", || counting_fetch(&fetches))
            .await
            .unwrap();

        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn keys_are_cached_independently() {
        let cache = EntityCache::new(Duration::from_secs(60));
        let fetches = Arc::new(AtomicUsize::new(0));

        cache
            .get_or_fetch("patients", || counting_fetch(&fetches))
            .await
            .unwrap();
        cache
            .get_or_fetch("appointments", || counting_fetch(&fetches))
            .await
            .unwrap();

        assert_eq!(fetches.load(Ordering::SeqCst), 2);

        cache.invalidate_all().await;
        cache
            .get_or_fetch("patients", || counting_fetch(&fetches))
            .await
            .unwrap();
        assert_eq!(fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn expired_entries_are_refetched() {
        let cache = EntityCache::new(Duration::from_millis(0));
        let fetches = Arc::new(AtomicUsize::new(0));

        cache
            .get_or_fetch("patients", || counting_fetch(&fetches))
            .await
            .unwrap();
        cache
            .get_or_fetch("patients", || counting_fetch(&fetches))
            .await
            .unwrap();

        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fetch_errors_are_not_cached() {
        let cache = EntityCache::new(Duration::from_secs(60));
        let fetches = Arc::new(AtomicUsize::new(0));

        let failed: Result<Value> = cache
            .get_or_fetch("patients", || async {
                Err(crate::Error::Api("HTTP 500".to_string()))
            })
            .await;
        assert!(failed.is_err());

        cache
            .get_or_fetch("patients", || counting_fetch(&fetches))
            .await
            .unwrap();
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }
}
