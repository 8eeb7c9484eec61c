//! Cache configuration.
//!
//! Controls the local LRU store and the optional remote (Redis) tier via the
//! `[cache]` settings group.

use std::num::NonZeroUsize;

use serde::Deserialize;

use crate::config::CacheSettings;

const DEFAULT_EXPIRE_SECONDS: u64 = 86_400;
const DEFAULT_REMOTE_URL: &str = "redis://localhost:6379/0";
const DEFAULT_LOCAL_CAPACITY: usize = 10_000;
const DEFAULT_KEY_PREFIX: &str = "blog";

/// Longest TTL the manager honours; longer requests are clamped to it.
pub const MAX_TTL_SECONDS: u64 = 10 * 365 * 86_400;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Master switch for read-through caching.
    pub enabled: bool,
    /// Default TTL applied by [`super::CacheManager::cached_default`].
    pub expire_seconds: u64,
    /// Consult Redis before the local store.
    pub use_remote: bool,
    pub remote_url: String,
    /// Maximum entries held by the local LRU.
    pub local_capacity: usize,
    /// Prefix for keys derived by application services.
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            expire_seconds: DEFAULT_EXPIRE_SECONDS,
            use_remote: false,
            remote_url: DEFAULT_REMOTE_URL.to_string(),
            local_capacity: DEFAULT_LOCAL_CAPACITY,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

impl From<&CacheSettings> for CacheConfig {
    fn from(settings: &CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            expire_seconds: settings.expire_seconds,
            use_remote: settings.use_remote,
            remote_url: settings.remote_url.clone(),
            local_capacity: settings.local_capacity.get(),
            key_prefix: settings.key_prefix.clone(),
        }
    }
}

impl CacheConfig {
    /// Returns the local capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn local_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.local_capacity).unwrap_or(NonZeroUsize::MIN)
    }
}
