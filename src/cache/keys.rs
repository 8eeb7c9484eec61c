//! Cache key derivation.
//!
//! Keys have the shape `prefix:operation:hash`. The hash is a truncated
//! SHA-256 over the positional arguments in call order followed by the
//! keyword arguments sorted by name, so it is stable across processes and
//! independent of keyword order.

use std::collections::BTreeMap;
use std::fmt::Display;

use sha2::{Digest, Sha256};

/// Bytes of the SHA-256 digest kept in the key (hex-encoded to twice as many chars).
const HASH_BYTES: usize = 16;

/// Builder for a cache key over one logical operation call.
#[derive(Debug, Clone)]
pub struct CacheKey {
    prefix: String,
    operation: String,
    args: Vec<String>,
    kwargs: BTreeMap<String, String>,
}

impl CacheKey {
    pub fn new(prefix: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            operation: operation.into(),
            args: Vec::new(),
            kwargs: BTreeMap::new(),
        }
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Display) -> Self {
        self.args.push(value.to_string());
        self
    }

    /// Set a keyword argument. Later values for the same name replace earlier ones.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Display) -> Self {
        self.kwargs.insert(name.into(), value.to_string());
        self
    }

    /// The `prefix:operation:` portion shared by every call of this operation.
    pub fn operation_prefix(&self) -> String {
        format!("{}:{}:", self.prefix, self.operation)
    }

    pub fn build(&self) -> String {
        format!("{}{}", self.operation_prefix(), self.digest())
    }

    fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for arg in &self.args {
            update_part(&mut hasher, b'a', arg);
        }
        for (name, value) in &self.kwargs {
            update_part(&mut hasher, b'k', name);
            update_part(&mut hasher, b'v', value);
        }
        let digest = hasher.finalize();
        hex::encode(&digest[..HASH_BYTES])
    }
}

// Tag plus length prefix keeps ["a:b"] distinct from ["a", "b"].
fn update_part(hasher: &mut Sha256, tag: u8, value: &str) {
    hasher.update([tag]);
    hasher.update((value.len() as u64).to_be_bytes());
    hasher.update(value.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_has_prefix_operation_and_hash() {
        let key = CacheKey::new("blog", "get_post_by_id").arg(7).build();
        let parts: Vec<&str> = key.split(':').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "blog");
        assert_eq!(parts[1], "get_post_by_id");
        assert_eq!(parts[2].len(), HASH_BYTES * 2);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn keyword_order_does_not_matter() {
        let forward = CacheKey::new("p", "op")
            .arg("a")
            .kwarg("x", 1)
            .kwarg("y", 2)
            .build();
        let reversed = CacheKey::new("p", "op")
            .arg("a")
            .kwarg("y", 2)
            .kwarg("x", 1)
            .build();
        let swapped_values = CacheKey::new("p", "op")
            .arg("a")
            .kwarg("x", 2)
            .kwarg("y", 1)
            .build();

        assert_eq!(forward, reversed);
        assert_ne!(forward, swapped_values);
    }

    #[test]
    fn positional_order_matters() {
        let ab = CacheKey::new("p", "op").arg("a").arg("b").build();
        let ba = CacheKey::new("p", "op").arg("b").arg("a").build();
        assert_ne!(ab, ba);
    }

    #[test]
    fn argument_boundaries_are_preserved() {
        let joined = CacheKey::new("p", "op").arg("a:b").build();
        let split = CacheKey::new("p", "op").arg("a").arg("b").build();
        assert_ne!(joined, split);
    }

    #[test]
    fn positional_and_keyword_arguments_are_distinct() {
        let positional = CacheKey::new("p", "op").arg("x").arg("1").build();
        let keyword = CacheKey::new("p", "op").kwarg("x", "1").build();
        assert_ne!(positional, keyword);
    }

    #[test]
    fn digest_is_stable() {
        let first = CacheKey::new("blog", "search_posts").arg("rust").build();
        let second = CacheKey::new("blog", "search_posts").arg("rust").build();
        assert_eq!(first, second);
    }
}
