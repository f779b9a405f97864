//! Process-wide TTL cache with in-flight load de-duplication.
//!
//! Values are stored in a `moka` cache with a fixed time-to-live. Loads that
//! are already running are shared: a second caller asking for the same key
//! awaits the first caller's loader instead of starting its own. Failed
//! loads are never stored, and every waiter sees the same error.
//!
//! A TTL of zero disables the cache entirely and every call runs its loader.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use moka::future::Cache;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

/// Upper bound on stored entries; expiry is the primary eviction policy.
const MAX_CAPACITY: u64 = 10_000;

type PendingLoad<V, E> = Shared<BoxFuture<'static, Result<V, Arc<E>>>>;

/// Generic key/value cache with TTL and shared in-flight loads.
///
/// Cheaply cloneable; clones share entries and in-flight loads.
pub struct TtlCache<V, E> {
    inner: Arc<TtlCacheInner<V, E>>,
}

struct TtlCacheInner<V, E> {
    ttl: Duration,
    entries: Option<Cache<String, V>>,
    pending: Mutex<HashMap<String, (u64, PendingLoad<V, E>)>>,
    next_load_id: AtomicU64,
}

impl<V, E> Clone for TtlCache<V, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V, E> TtlCache<V, E> {
    /// Whether values are retained between calls.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.entries.is_some()
    }

    /// Configured time-to-live.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }
}

impl<V, E> std::fmt::Debug for TtlCache<V, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("ttl", &self.inner.ttl)
            .field("enabled", &self.is_enabled())
            .finish_non_exhaustive()
    }
}

impl<V, E> TtlCache<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Create a cache whose entries live for `ttl`. `Duration::ZERO` disables it.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        let entries = (!ttl.is_zero()).then(|| {
            Cache::builder()
                .max_capacity(MAX_CAPACITY)
                .time_to_live(ttl)
                .build()
        });

        Self {
            inner: Arc::new(TtlCacheInner {
                ttl,
                entries,
                pending: Mutex::new(HashMap::new()),
                next_load_id: AtomicU64::new(0),
            }),
        }
    }

    /// Create a cache from a millisecond TTL. Zero or negative disables it.
    #[must_use]
    pub fn from_millis(ttl_ms: i64) -> Self {
        let ttl = u64::try_from(ttl_ms).map_or(Duration::ZERO, Duration::from_millis);
        Self::new(ttl)
    }

    /// Get a value, running `loader` only on a miss with no load in flight.
    ///
    /// # Errors
    ///
    /// Returns the loader's error, shared between every caller that awaited
    /// the same in-flight load.
    pub async fn get<F, Fut>(&self, key: &str, loader: F) -> Result<V, Arc<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        self.get_with_policy(key, loader, |_| true).await
    }

    /// Like [`get`](Self::get), but only stores values `should_cache` accepts.
    ///
    /// Rejected values are still returned to every waiter of the load.
    ///
    /// # Errors
    ///
    /// Returns the loader's error, shared between every caller that awaited
    /// the same in-flight load.
    pub async fn get_with_policy<F, Fut, P>(
        &self,
        key: &str,
        loader: F,
        should_cache: P,
    ) -> Result<V, Arc<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        P: Fn(&V) -> bool + Send + 'static,
    {
        let Some(entries) = self.inner.entries.clone() else {
            return loader().await.map_err(Arc::new);
        };

        if let Some(value) = entries.get(key).await {
            debug!(key, "Cache hit");
            return Ok(value);
        }

        let load = {
            let mut pending = self.inner.pending.lock().await;
            // A load may have finished between the lookup above and the lock.
            if let Some(value) = entries.get(key).await {
                debug!(key, "Cache hit");
                return Ok(value);
            }
            if let Some((_, load)) = pending.get(key) {
                debug!(key, "Joining in-flight load");
                load.clone()
            } else {
                let load_id = self.inner.next_load_id.fetch_add(1, Ordering::Relaxed);
                let load = self.spawn_load(key.to_string(), load_id, entries, loader(), should_cache);
                pending.insert(key.to_string(), (load_id, load.clone()));
                load
            }
        };

        load.await
    }

    fn spawn_load<Fut, P>(
        &self,
        key: String,
        load_id: u64,
        entries: Cache<String, V>,
        fut: Fut,
        should_cache: P,
    ) -> PendingLoad<V, E>
    where
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        P: Fn(&V) -> bool + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        async move {
            let outcome = fut.await.map_err(Arc::new);

            if let Ok(value) = &outcome
                && should_cache(value)
            {
                entries.insert(key.clone(), value.clone()).await;
            }

            // A `clear()` may have let a newer load register under this key.
            let mut pending = inner.pending.lock().await;
            if pending.get(&key).is_some_and(|(id, _)| *id == load_id) {
                pending.remove(&key);
            }

            outcome
        }
        .boxed()
        .shared()
    }

    /// Drop the stored value for `key`. In-flight loads are unaffected.
    pub async fn invalidate(&self, key: &str) {
        if let Some(entries) = &self.inner.entries {
            entries.invalidate(key).await;
        }
    }

    /// Drop every stored value and forget in-flight loads.
    pub async fn clear(&self) {
        if let Some(entries) = &self.inner.entries {
            entries.invalidate_all();
        }
        self.inner.pending.lock().await.clear();
    }
}

/// Canonicalize a JSON value so structurally equal inputs compare equal.
///
/// Object keys are sorted, and array elements are sorted by their canonical
/// text. `null` is preserved; omitted fields never reach this point.
#[must_use]
pub fn normalize_for_key(value: Value) -> Value {
    match value {
        Value::Array(items) => {
            let mut items: Vec<Value> = items.into_iter().map(normalize_for_key).collect();
            items.sort_by_cached_key(|item| item.to_string());
            Value::Array(items)
        }
        Value::Object(map) => {
            // Sorted even when serde_json's `preserve_order` feature is on.
            let sorted: serde_json::Map<String, Value> = map
                .into_iter()
                .map(|(key, value)| (key, normalize_for_key(value)))
                .collect::<std::collections::BTreeMap<_, _>>()
                .into_iter()
                .collect();
            Value::Object(sorted)
        }
        other => other,
    }
}

/// Serialize a payload into a normalized cache key.
///
/// Fields the payload skips during serialization (`None` with
/// `skip_serializing_if`) are absent from the key.
///
/// # Errors
///
/// Returns an error if the payload cannot be represented as JSON.
pub fn serialize_cache_key<T: Serialize + ?Sized>(payload: &T) -> Result<String, serde_json::Error> {
    let value = serde_json::to_value(payload)?;
    Ok(normalize_for_key(value).to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use serde_json::json;

    use super::*;

    fn counting_loader(
        calls: &Arc<AtomicUsize>,
        value: u32,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<u32, String>> + use<> {
        let calls = Arc::clone(calls);
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(value)
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn test_hit_within_ttl_loads_once() {
        let cache: TtlCache<u32, String> = TtlCache::new(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));

        assert_eq!(cache.get("k", counting_loader(&calls, 1)).await.unwrap(), 1);
        assert_eq!(cache.get("k", counting_loader(&calls, 2)).await.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_reloads() {
        let cache: TtlCache<u32, String> = TtlCache::new(Duration::from_millis(50));
        let calls = Arc::new(AtomicUsize::new(0));

        cache.get("k", counting_loader(&calls, 1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(cache.get("k", counting_loader(&calls, 2)).await.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_loads_are_shared() {
        let cache: TtlCache<u32, String> = TtlCache::new(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            cache.get("k", counting_loader(&calls, 7)),
            cache.get("k", counting_loader(&calls, 8)),
        );

        assert_eq!(a.unwrap(), 7);
        assert_eq!(b.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_ttl_disables_cache() {
        let cache: TtlCache<u32, String> = TtlCache::new(Duration::ZERO);
        let calls = Arc::new(AtomicUsize::new(0));

        cache.get("k", counting_loader(&calls, 1)).await.unwrap();
        cache.get("k", counting_loader(&calls, 1)).await.unwrap();
        assert!(!cache.is_enabled());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_negative_millis_disables_cache() {
        let cache: TtlCache<u32, String> = TtlCache::from_millis(-5);
        assert!(!cache.is_enabled());
    }

    #[tokio::test]
    async fn test_failures_are_shared_and_not_cached() {
        let cache: TtlCache<u32, String> = TtlCache::new(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));

        let failing = || {
            let calls = Arc::clone(&calls);
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Err::<u32, String>("boom".to_string())
                }
            }
        };

        let (a, b) = tokio::join!(cache.get("k", failing()), cache.get("k", failing()));
        assert_eq!(a.unwrap_err().as_str(), "boom");
        assert_eq!(b.unwrap_err().as_str(), "boom");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert_eq!(cache.get("k", counting_loader(&calls, 3)).await.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_policy_rejects_value() {
        let cache: TtlCache<u32, String> = TtlCache::new(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));

        let value = cache
            .get_with_policy("k", counting_loader(&calls, 0), |v| *v > 0)
            .await
            .unwrap();
        assert_eq!(value, 0);

        cache.get("k", counting_loader(&calls, 5)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_reload() {
        let cache: TtlCache<u32, String> = TtlCache::new(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));

        cache.get("k", counting_loader(&calls, 1)).await.unwrap();
        cache.invalidate("k").await;
        assert_eq!(cache.get("k", counting_loader(&calls, 2)).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_value_stored_while_waiting_for_pending_lock_is_used() {
        let cache: TtlCache<u32, String> = TtlCache::new(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));

        // Hold the pending map so the caller misses the entry and then waits.
        let guard = cache.inner.pending.lock().await;
        let task = tokio::spawn({
            let cache = cache.clone();
            let loader = counting_loader(&calls, 2);
            async move { cache.get("k", loader).await }
        });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        // A load completing in that window stores its value.
        let entries = cache.inner.entries.clone().unwrap();
        entries.insert("k".to_string(), 1).await;
        drop(guard);

        assert_eq!(task.await.unwrap().unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_debug_reports_ttl_and_enabled() {
        let cache: TtlCache<u32, String> = TtlCache::new(Duration::from_secs(3));
        let rendered = format!("{cache:?}");
        assert!(rendered.contains("ttl: 3s"), "{rendered}");
        assert!(rendered.contains("enabled: true"), "{rendered}");
    }

    #[test]
    fn test_normalize_sorts_keys_and_arrays() {
        let a = json!({"b": [3, 1, 2], "a": {"y": 1, "x": null}});
        let b = json!({"a": {"x": null, "y": 1}, "b": [1, 2, 3]});
        assert_eq!(normalize_for_key(a), normalize_for_key(b));
    }

    #[test]
    fn test_serialize_cache_key_drops_skipped_fields() {
        #[derive(Serialize)]
        struct Payload {
            ids: Vec<&'static str>,
            #[serde(skip_serializing_if = "Option::is_none")]
            collection: Option<&'static str>,
        }

        let key = serialize_cache_key(&Payload {
            ids: vec!["b", "a"],
            collection: None,
        })
        .unwrap();
        assert_eq!(key, r#"{"ids":["a","b"]}"#);
    }

    #[test]
    fn test_null_is_distinct_from_absent() {
        let with_null = serialize_cache_key(&json!({"a": 1, "c": null})).unwrap();
        let absent = serialize_cache_key(&json!({"a": 1})).unwrap();
        assert_ne!(with_null, absent);
    }
}
