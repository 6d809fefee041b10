use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Result;

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().expect("manual clock lock poisoned");
        *guard += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().expect("manual clock lock poisoned")
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

/// Keyed cache whose entries go stale after a caller-supplied TTL.
///
/// Stale entries are dropped when they are next looked up. The producer runs without the lock
/// held, so two callers missing the same key both compute it and the last write wins.
pub struct TtlCache<K, V> {
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<K, CacheEntry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &K, ttl: Duration) -> Option<V> {
        let now = self.clock.now();
        let mut guard = self.entries.lock().expect("ttl cache lock poisoned");
        let stale = match guard.get(key) {
            Some(entry) if now.saturating_duration_since(entry.stored_at) < ttl => {
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if stale {
            guard.remove(key);
        }
        None
    }

    pub fn insert(&self, key: K, value: V) {
        let entry = CacheEntry {
            value,
            stored_at: self.clock.now(),
        };
        let mut guard = self.entries.lock().expect("ttl cache lock poisoned");
        guard.insert(key, entry);
    }

    /// Return the cached value for `key`, or run `producer` and cache its result. Errors are
    /// passed through and leave the cache untouched.
    pub fn get_or_compute<F>(&self, key: &K, ttl: Duration, producer: F) -> Result<V>
    where
        F: FnOnce() -> Result<V>,
    {
        if let Some(v) = self.get(key, ttl) {
            tracing::trace!("cache hit");
            return Ok(v);
        }
        tracing::trace!("cache miss");
        let value = producer()?;
        self.insert(key.clone(), value.clone());
        Ok(value)
    }

    pub fn invalidate(&self, key: &K) {
        let mut guard = self.entries.lock().expect("ttl cache lock poisoned");
        guard.remove(key);
    }

    pub fn clear(&self) {
        let mut guard = self.entries.lock().expect("ttl cache lock poisoned");
        guard.clear();
    }

    /// Number of stored entries, stale ones included.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("ttl cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::sync::Arc;
    use std::time::Duration;

    use super::{ManualClock, TtlCache};

    const TTL: Duration = Duration::from_secs(600);

    #[test]
    fn serves_cached_value_until_ttl() {
        let clock = Arc::new(ManualClock::new());
        let cache: TtlCache<String, u32> = TtlCache::new(clock.clone());
        let calls = Cell::new(0);
        let produce = || -> anyhow::Result<u32> {
            calls.set(calls.get() + 1);
            Ok(calls.get())
        };

        let key = "2026txhou".to_string();
        assert_eq!(cache.get_or_compute(&key, TTL, produce).unwrap(), 1);
        clock.advance(Duration::from_secs(599));
        assert_eq!(cache.get_or_compute(&key, TTL, produce).unwrap(), 1);
        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get_or_compute(&key, TTL, produce).unwrap(), 2);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn stale_entries_are_evicted_on_lookup() {
        let clock = Arc::new(ManualClock::new());
        let cache: TtlCache<&str, u32> = TtlCache::new(clock.clone());
        cache.insert("a", 1);
        cache.insert("b", 2);
        clock.advance(TTL);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"a", TTL), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn producer_errors_are_not_cached() {
        let cache: TtlCache<&str, u32> = TtlCache::new(Arc::new(ManualClock::new()));
        let err = cache.get_or_compute(&"k", TTL, || Err(anyhow::anyhow!("upstream down")));
        assert!(err.is_err());
        assert!(cache.is_empty());
        assert_eq!(cache.get_or_compute(&"k", TTL, || Ok(7)).unwrap(), 7);
    }

    #[test]
    fn invalidate_and_clear() {
        let cache: TtlCache<&str, u32> = TtlCache::new(Arc::new(ManualClock::new()));
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.invalidate(&"a");
        assert_eq!(cache.get(&"a", TTL), None);
        assert_eq!(cache.get(&"b", TTL), Some(2));
        cache.clear();
        assert!(cache.is_empty());
    }
}
