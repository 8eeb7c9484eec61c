//! Bounded in-process cache store.
//!
//! Entries carry an absolute expiry instant and are purged lazily when a read
//! finds them expired. The LRU bound evicts the least recently used entry once
//! capacity is reached.

use std::any::Any;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use lru::LruCache;
use metrics::counter;

use super::lock::mutex_lock;

const SOURCE: &str = "cache::store";

pub(crate) type CachedValue = Arc<dyn Any + Send + Sync>;

#[derive(Clone)]
pub(crate) struct CacheEntry {
    pub(crate) data: CachedValue,
    pub(crate) expires: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires > now
    }
}

pub struct LocalStore {
    entries: Mutex<LruCache<String, CacheEntry>>,
}

impl LocalStore {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Return the live entry for `key`, dropping it if it has expired.
    pub(crate) fn get(&self, key: &str, now: Instant) -> Option<CachedValue> {
        let mut entries = mutex_lock(&self.entries, SOURCE, "get");
        let live = entries.get(key).map(|entry| entry.is_live(now))?;
        if live {
            entries.get(key).map(|entry| entry.data.clone())
        } else {
            entries.pop(key);
            None
        }
    }

    pub(crate) fn insert(&self, key: String, entry: CacheEntry) {
        let mut entries = mutex_lock(&self.entries, SOURCE, "insert");
        if let Some((evicted, _)) = entries.push(key.clone(), entry)
            && evicted != key
        {
            counter!("whelmed_cache_local_evict_total").increment(1);
        }
    }

    pub fn remove(&self, key: &str) -> bool {
        mutex_lock(&self.entries, SOURCE, "remove")
            .pop(key)
            .is_some()
    }

    /// Remove every key starting with `prefix`, returning how many were dropped.
    pub fn remove_prefix(&self, prefix: &str) -> usize {
        let mut entries = mutex_lock(&self.entries, SOURCE, "remove_prefix");
        let doomed: Vec<String> = entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            entries.pop(key);
        }
        doomed.len()
    }

    /// Entries currently held, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        mutex_lock(&self.entries, SOURCE, "clear").clear();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn entry(value: u32, expires: Instant) -> CacheEntry {
        CacheEntry {
            data: Arc::new(value),
            expires,
        }
    }

    fn read(store: &LocalStore, key: &str, now: Instant) -> Option<u32> {
        store
            .get(key, now)
            .and_then(|value| value.downcast_ref::<u32>().copied())
    }

    #[test]
    fn expired_entries_are_purged_on_read() {
        let store = LocalStore::new(NonZeroUsize::new(4).expect("non-zero"));
        let now = Instant::now();
        store.insert("short".into(), entry(1, now + Duration::from_secs(1)));

        assert_eq!(read(&store, "short", now), Some(1));
        assert_eq!(read(&store, "short", now + Duration::from_secs(1)), None);
        assert!(store.is_empty());
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let store = LocalStore::new(NonZeroUsize::new(2).expect("non-zero"));
        let now = Instant::now();
        let later = now + Duration::from_secs(60);
        store.insert("a".into(), entry(1, later));
        store.insert("b".into(), entry(2, later));

        assert_eq!(read(&store, "a", now), Some(1));
        store.insert("c".into(), entry(3, later));

        assert_eq!(read(&store, "a", now), Some(1));
        assert_eq!(read(&store, "b", now), None);
        assert_eq!(read(&store, "c", now), Some(3));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn prefix_removal_keeps_other_keys() {
        let store = LocalStore::new(NonZeroUsize::new(8).expect("non-zero"));
        let later = Instant::now() + Duration::from_secs(60);
        store.insert("blog:list:1".into(), entry(1, later));
        store.insert("blog:list:2".into(), entry(2, later));
        store.insert("other:1".into(), entry(3, later));

        assert_eq!(store.remove_prefix("blog:"), 2);
        assert_eq!(store.len(), 1);
        assert_eq!(read(&store, "other:1", Instant::now()), Some(3));
    }
}
