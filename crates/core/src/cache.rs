//! Injected time-to-live cache.
//!
//! Callers hold a `TtlCache` through an `Arc` handed to them at
//! construction; nothing here is process-global. [`MemoryTtlCache`] stores
//! `(value, inserted_at)` pairs and expires them lazily.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Key/value cache whose entries expire after a fixed TTL.
pub trait TtlCache<K, V>: Send + Sync {
    /// Return a live entry, or `None` if absent or expired.
    fn get(&self, key: &K) -> Option<V>;

    /// Insert or replace an entry, restarting its TTL.
    fn insert(&self, key: K, value: V);

    /// Number of stored entries, including ones not yet purged.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory [`TtlCache`] guarded by a mutex.
pub struct MemoryTtlCache<K, V> {
    ttl: Duration,
    entries: Mutex<HashMap<K, (V, Instant)>>,
}

impl<K, V> MemoryTtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<K, (V, Instant)>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<K, V> TtlCache<K, V> for MemoryTtlCache<K, V>
where
    K: Eq + Hash + Send,
    V: Clone + Send,
{
    fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some((value, inserted)) if inserted.elapsed() < self.ttl => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn insert(&self, key: K, value: V) {
        let ttl = self.ttl;
        let mut entries = self.lock();
        entries.retain(|_, (_, inserted)| inserted.elapsed() < ttl);
        entries.insert(key, (value, Instant::now()));
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}
