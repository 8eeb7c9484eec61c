//! Two-tier cache manager.
//!
//! Reads consult the remote tier first when one is configured and fall back to
//! the bounded local store. Writes always land in the local store and are
//! mirrored to the remote tier on a best-effort basis. Remote failures are
//! logged and counted but never surface to callers.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::counter;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, info, warn};

use super::config::{CacheConfig, MAX_TTL_SECONDS};
use super::keys::CacheKey;
use super::remote::{RedisCache, RemoteCache};
use super::store::{CacheEntry, LocalStore};

const SOURCE: &str = "cache::manager";

/// Snapshot of the cache configuration and occupancy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheInfo {
    pub cache_enabled: bool,
    pub cache_expire_time: u64,
    #[serde(rename = "redis_enabled")]
    pub remote_enabled: bool,
    pub cache_type: &'static str,
    pub memory_cache_entries: usize,
}

/// Keys removed by [`CacheManager::clear_prefix`], per tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClearedKeys {
    pub local: usize,
    pub remote: usize,
}

pub struct CacheManager {
    config: CacheConfig,
    local: LocalStore,
    remote: Option<Arc<dyn RemoteCache>>,
}

impl CacheManager {
    /// Build a manager with no remote tier.
    pub fn local(config: CacheConfig) -> Self {
        let local = LocalStore::new(config.local_capacity_non_zero());
        Self {
            config,
            local,
            remote: None,
        }
    }

    /// Build a manager around an already-connected remote tier.
    pub fn with_remote(config: CacheConfig, remote: Arc<dyn RemoteCache>) -> Self {
        let local = LocalStore::new(config.local_capacity_non_zero());
        Self {
            config,
            local,
            remote: Some(remote),
        }
    }

    /// Connect the remote tier when enabled, degrading to local-only on failure.
    pub async fn connect(config: CacheConfig) -> Self {
        if !config.use_remote {
            info!(target = SOURCE, "Remote cache disabled; using in-memory store");
            return Self::local(config);
        }

        let remote = match RedisCache::connect(&config.remote_url).await {
            Ok(remote) => remote,
            Err(err) => {
                warn!(
                    target = SOURCE,
                    error = %err,
                    "Remote cache connection failed; using in-memory store"
                );
                return Self::local(config);
            }
        };

        if let Err(err) = remote.ping().await {
            warn!(
                target = SOURCE,
                error = %err,
                "Remote cache did not answer PING; using in-memory store"
            );
            return Self::local(config);
        }

        Self::with_remote(config, Arc::new(remote))
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Start a key for `operation` under the configured prefix.
    pub fn key(&self, operation: &str) -> CacheKey {
        CacheKey::new(self.config.key_prefix.as_str(), operation)
    }

    pub async fn get<T>(&self, key: &str) -> Option<T>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        if let Some(remote) = self.remote.as_ref() {
            match remote.get(key).await {
                Ok(Some(raw)) => match serde_json::from_str::<T>(&raw) {
                    Ok(value) => {
                        counter!("whelmed_cache_remote_hit_total").increment(1);
                        return Some(value);
                    }
                    Err(err) => {
                        remote_failure("get.decode", key, &err);
                    }
                },
                Ok(None) => {
                    counter!("whelmed_cache_remote_miss_total").increment(1);
                }
                Err(err) => remote_failure("get", key, &err),
            }
        }

        let value = self.local.get(key, Instant::now()).and_then(|data| {
            let typed = data.downcast_ref::<T>().cloned();
            if typed.is_none() {
                warn!(
                    target = SOURCE,
                    key,
                    "Cached entry holds a different type; treating as miss"
                );
            }
            typed
        });

        match value {
            Some(value) => {
                counter!("whelmed_cache_local_hit_total").increment(1);
                Some(value)
            }
            None => {
                counter!("whelmed_cache_local_miss_total").increment(1);
                None
            }
        }
    }

    /// Store `value` for `ttl_seconds`. A TTL of zero stores the entry already expired.
    /// TTLs above [`MAX_TTL_SECONDS`] are clamped.
    ///
    /// Returns `true` once the local write has happened; remote failures are only logged.
    pub async fn set<T>(&self, key: &str, value: T, ttl_seconds: u64) -> bool
    where
        T: Serialize + Send + Sync + 'static,
    {
        let ttl_seconds = ttl_seconds.min(MAX_TTL_SECONDS);
        if let Some(remote) = self.remote.as_ref() {
            if ttl_seconds == 0 {
                if let Err(err) = remote.del(&[key.to_string()]).await {
                    remote_failure("set.expire", key, &err);
                }
            } else {
                match serde_json::to_string(&value) {
                    Ok(raw) => {
                        if let Err(err) = remote.set_ex(key, raw, ttl_seconds).await {
                            remote_failure("set", key, &err);
                        }
                    }
                    Err(err) => remote_failure("set.encode", key, &err),
                }
            }
        }

        let data: Arc<dyn Any + Send + Sync> = Arc::new(value);
        self.local.insert(
            key.to_string(),
            CacheEntry {
                data,
                expires: expiry_after(Instant::now(), ttl_seconds),
            },
        );
        true
    }

    pub async fn delete(&self, key: &str) {
        if let Some(remote) = self.remote.as_ref()
            && let Err(err) = remote.del(&[key.to_string()]).await
        {
            remote_failure("delete", key, &err);
        }
        self.local.remove(key);
    }

    /// Drop every key starting with `prefix` from both tiers.
    pub async fn clear_prefix(&self, prefix: &str) -> ClearedKeys {
        let mut remote_removed = 0;
        if let Some(remote) = self.remote.as_ref() {
            let pattern = format!("{}*", escape_glob(prefix));
            match remote.keys(&pattern).await {
                Ok(keys) if keys.is_empty() => {}
                Ok(keys) => match remote.del(&keys).await {
                    Ok(()) => remote_removed = keys.len(),
                    Err(err) => remote_failure("clear_prefix.del", prefix, &err),
                },
                Err(err) => remote_failure("clear_prefix.keys", prefix, &err),
            }
        }

        let local_removed = self.local.remove_prefix(prefix);
        debug!(
            target = SOURCE,
            prefix,
            local = local_removed,
            remote = remote_removed,
            "Cleared cache prefix"
        );
        ClearedKeys {
            local: local_removed,
            remote: remote_removed,
        }
    }

    pub fn info(&self) -> CacheInfo {
        CacheInfo {
            cache_enabled: self.config.enabled,
            cache_expire_time: self.config.expire_seconds,
            remote_enabled: self.remote.is_some(),
            cache_type: if self.remote.is_some() {
                "Redis"
            } else {
                "In-Memory"
            },
            memory_cache_entries: self.local.len(),
        }
    }

    /// Read-through: return the cached value for `key` or await `loader` and cache its `Ok` result.
    ///
    /// When caching is disabled the loader is always awaited.
    pub async fn cached<T, E, F, Fut>(&self, key: String, ttl_seconds: u64, loader: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.config.enabled {
            return loader().await;
        }

        if let Some(value) = self.get::<T>(&key).await {
            return Ok(value);
        }

        let value = loader().await?;
        self.set(&key, value.clone(), ttl_seconds).await;
        Ok(value)
    }

    /// [`CacheManager::cached`] with the configured default TTL.
    pub async fn cached_default<T, E, F, Fut>(&self, key: String, loader: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.cached(key, self.config.expire_seconds, loader).await
    }

    /// Drop all local entries. The remote tier keeps its keys until they expire.
    pub fn shutdown(&self) {
        let entries = self.local.len();
        self.local.clear();
        info!(target = SOURCE, entries, "Cache manager shut down");
    }
}

fn remote_failure(op: &'static str, key: &str, err: &dyn std::error::Error) {
    counter!("whelmed_cache_remote_error_total").increment(1);
    warn!(
        target = SOURCE,
        op,
        key,
        error = %err,
        "Remote cache operation failed; continuing with in-memory store"
    );
}

/// `now + ttl`; an unrepresentable instant leaves the entry already expired.
fn expiry_after(now: Instant, ttl_seconds: u64) -> Instant {
    now.checked_add(Duration::from_secs(ttl_seconds))
        .unwrap_or(now)
}

fn escape_glob(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
