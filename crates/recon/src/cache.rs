//! Caller-owned memo of extraction results.
//!
//! Entries are keyed by a SHA-256 over the source kind, the raw input
//! bytes and the filter parameters, so any change to the bytes or the
//! filter is a different key. Nothing here is global; a cache lives as
//! long as the value that owns it.

use std::collections::HashMap;

use sha2::{Digest, Sha256};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    /// `source` names the extractor ("settlement", "log"); `params` are the
    /// filter parameters in a stable text form.
    pub fn new(source: &str, bytes: &[u8], params: &[&str]) -> Self {
        let mut hasher = Sha256::new();
        for part in [source.as_bytes(), bytes] {
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part);
        }
        for param in params {
            hasher.update((param.len() as u64).to_le_bytes());
            hasher.update(param.as_bytes());
        }
        Self(hasher.finalize().into())
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// Memo of extraction outputs. `V` defaults to the bare code list; callers
/// that report counters or diagnostics alongside the codes store the whole
/// extraction so a hit reproduces all of it.
#[derive(Debug)]
pub struct ExtractionCache<V = Vec<String>> {
    entries: HashMap<CacheKey, V>,
    hits: usize,
    misses: usize,
}

impl<V> Default for ExtractionCache<V> {
    fn default() -> Self {
        Self { entries: HashMap::new(), hits: 0, misses: 0 }
    }
}

impl<V: Clone> ExtractionCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value for `key`, or run `extract` and remember its
    /// result. Errors are not cached.
    pub fn get_or_try_insert<E>(&mut self, key: CacheKey, extract: impl FnOnce() -> Result<V, E>) -> Result<V, E> {
        if let Some(value) = self.entries.get(&key) {
            self.hits += 1;
            trace!(key = %key.to_hex(), "extraction cache hit");
            return Ok(value.clone());
        }
        self.misses += 1;
        let value = extract()?;
        self.entries.insert(key, value.clone());
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_depends_on_bytes_and_params() {
        let a = CacheKey::new("log", b"abc", &["date=2025-07-03"]);
        assert_eq!(a, CacheKey::new("log", b"abc", &["date=2025-07-03"]));
        assert_ne!(a, CacheKey::new("log", b"abd", &["date=2025-07-03"]));
        assert_ne!(a, CacheKey::new("log", b"abc", &["date=2025-07-04"]));
        assert_ne!(a, CacheKey::new("settlement", b"abc", &["date=2025-07-03"]));
        assert_eq!(a.to_hex().len(), 64);
    }

    #[test]
    fn boundaries_are_unambiguous() {
        assert_ne!(CacheKey::new("ab", b"c", &[]), CacheKey::new("a", b"bc", &[]));
    }

    #[test]
    fn second_lookup_hits() {
        let mut cache = ExtractionCache::new();
        let key = CacheKey::new("log", b"Approval ID: A1", &[]);
        let mut calls = 0;
        for _ in 0..2 {
            let codes = cache
                .get_or_try_insert(key, || -> Result<_, ()> {
                    calls += 1;
                    Ok(vec!["A1".to_string()])
                })
                .unwrap();
            assert_eq!(codes, vec!["A1"]);
        }
        assert_eq!(calls, 1);
        assert_eq!((cache.hits(), cache.misses()), (1, 1));
    }

    #[test]
    fn errors_not_cached() {
        let mut cache = ExtractionCache::new();
        let key = CacheKey::new("settlement", b"garbage", &[]);
        assert!(cache.get_or_try_insert(key, || Err::<Vec<String>, _>("bad")).is_err());
        assert!(cache.is_empty());
        cache.get_or_try_insert(key, || Ok::<_, ()>(vec![])).unwrap();
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
