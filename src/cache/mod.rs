//! Response-data cache for the blog services.
//!
//! A [`CacheManager`] owns a bounded in-memory store and, optionally, a Redis
//! connection. Services wrap their reads with [`CacheManager::cached`] using
//! keys built by [`CacheKey`].

mod config;
mod keys;
mod lock;
mod manager;
mod remote;
mod store;

pub use config::{CacheConfig, MAX_TTL_SECONDS};
pub use keys::CacheKey;
pub use manager::{CacheInfo, CacheManager, ClearedKeys};
pub use remote::{RedisCache, RemoteCache, RemoteError};
pub use store::LocalStore;
