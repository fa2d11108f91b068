//! Time-bounded response cache with per-key single-flight.
//!
//! Entries expire `ttl` after insertion and are evicted least-recently-used
//! first once `max_entries` is exceeded, whatever their remaining TTL.
//! [`ResponseCache::lock_key`] serializes upstream work per key: while one
//! caller holds the guard, other callers for the same key wait and then
//! find the value it stored.

use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    future::Future,
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::{sync::OwnedMutexGuard, time::Instant};
use tracing::debug;

use crate::config::CacheConfig;

pub fn get_root_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("pageon")
}

/// Stable key for a set of lookup parameters. Object fields are sorted and
/// null fields dropped before hashing, so equivalent requests collide
/// regardless of field order or omitted optionals.
pub fn cache_key<T: Serialize + ?Sized>(params: &T) -> String {
    let normalized = serde_json::to_value(params)
        .map(normalize)
        .unwrap_or(serde_json::Value::Null);
    let canonical = serde_json::to_string(&normalized).unwrap_or_default();
    Sha256::digest(canonical.as_bytes())
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

fn normalize(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let sorted: BTreeMap<String, serde_json::Value> = map
                .into_iter()
                .filter(|(_, value)| !value.is_null())
                .map(|(key, value)| (key, normalize(value)))
                .collect();
            serde_json::Value::Object(sorted.into_iter().collect())
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(normalize).collect())
        }
        other => other,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub size: usize,
    pub max_entries: usize,
    pub ttl_seconds: u64,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug)]
struct CachedEntry<V> {
    value: V,
    expires_at: Instant,
}

#[derive(Debug)]
struct CacheState<V> {
    entries: HashMap<String, CachedEntry<V>>,
    order: VecDeque<String>,
    hits: u64,
    misses: u64,
}

impl<V> Default for CacheState<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            hits: 0,
            misses: 0,
        }
    }
}

impl<V> CacheState<V> {
    fn drop_order_key(&mut self, key: &str) {
        self.order.retain(|cached| cached != key);
    }

    fn prune_expired(&mut self, now: Instant) {
        self.entries.retain(|_, entry| now < entry.expires_at);
        let entries = &self.entries;
        self.order.retain(|key| entries.contains_key(key));
    }
}

type Gate = Arc<tokio::sync::Mutex<()>>;

#[derive(Debug)]
pub struct ResponseCache<V> {
    config: CacheConfig,
    state: Mutex<CacheState<V>>,
    gates: Mutex<HashMap<String, Gate>>,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config: CacheConfig {
                max_entries: config.max_entries.max(1),
                ..config
            },
            state: Mutex::new(CacheState::default()),
            gates: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.lookup(key, true)
    }

    /// Like [`get`](Self::get), but leaves the hit and miss counters alone.
    pub fn peek(&self, key: &str) -> Option<V> {
        self.lookup(key, false)
    }

    /// Stores `value`, using the configured TTL unless one is given.
    pub fn put(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        let key = key.into();
        let now = Instant::now();
        let ttl = ttl.unwrap_or_else(|| self.config.ttl());
        let mut state = self.lock_state();

        state.prune_expired(now);
        state.drop_order_key(&key);
        state.entries.insert(
            key.clone(),
            CachedEntry {
                value,
                expires_at: now + ttl,
            },
        );
        state.order.push_back(key);

        while state.entries.len() > self.config.max_entries {
            let Some(oldest) = state.order.pop_front() else {
                break;
            };
            state.entries.remove(&oldest);
            debug!(key = %oldest, "evicted cache entry under capacity pressure");
        }
    }

    pub fn clear(&self) {
        let mut state = self.lock_state();
        state.entries.clear();
        state.order.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let mut state = self.lock_state();
        state.prune_expired(Instant::now());
        CacheStats {
            size: state.entries.len(),
            max_entries: self.config.max_entries,
            ttl_seconds: self.config.ttl_seconds,
            hits: state.hits,
            misses: state.misses,
        }
    }

    /// Waits until no other caller holds `key`, then holds it until the
    /// returned guard is dropped.
    pub async fn lock_key(&self, key: &str) -> KeyGuard<'_> {
        let gate = {
            let mut gates = lock(&self.gates);
            Arc::clone(gates.entry(key.to_string()).or_default())
        };
        let guard = Arc::clone(&gate).lock_owned().await;
        KeyGuard {
            key: key.to_string(),
            gate,
            guard: Some(guard),
            gates: &self.gates,
        }
    }

    /// Returns the cached value for `key`, or runs `fetch` and caches its
    /// success. Concurrent callers for the same key share one `fetch`;
    /// failures are not cached, so the next waiter retries.
    pub async fn get_or_try_insert_with<F, Fut, E>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        fetch: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.peek(key) {
            self.lock_state().hits += 1;
            return Ok(value);
        }

        let _guard = self.lock_key(key).await;
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        let value = fetch().await?;
        self.put(key, value.clone(), ttl);
        Ok(value)
    }

    fn lookup(&self, key: &str, count: bool) -> Option<V> {
        let now = Instant::now();
        let mut guard = self.lock_state();
        let state = &mut *guard;
        let hit = match state.entries.get(key) {
            Some(entry) if now < entry.expires_at => Some(entry.value.clone()),
            Some(_) => {
                state.entries.remove(key);
                state.drop_order_key(key);
                None
            }
            None => None,
        };

        if hit.is_some() {
            state.drop_order_key(key);
            state.order.push_back(key.to_string());
        }
        if count {
            match hit {
                Some(_) => state.hits += 1,
                None => state.misses += 1,
            }
        }
        hit
    }

    fn lock_state(&self) -> MutexGuard<'_, CacheState<V>> {
        lock(&self.state)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Exclusive hold on one cache key. Dropping it wakes the next waiter.
#[derive(Debug)]
pub struct KeyGuard<'a> {
    key: String,
    gate: Gate,
    guard: Option<OwnedMutexGuard<()>>,
    gates: &'a Mutex<HashMap<String, Gate>>,
}

impl KeyGuard<'_> {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut gates = lock(self.gates);
        let idle = gates
            .get(&self.key)
            .is_some_and(|gate| Arc::ptr_eq(gate, &self.gate) && Arc::strong_count(gate) <= 2);
        if idle {
            gates.remove(&self.key);
        }
    }
}
