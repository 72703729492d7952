//! Result cache keyed by request fingerprint.
//!
//! Values are replaced whole, never patched, and live as long as the
//! process. The cache also covers for durable storage: when persisting a
//! computed result fails, the cached value is still the last correct one.
//!
//! ## Example
//!
//! ```
//! use qf_kernel::cache::{CacheLookup, Fingerprint, MemoryCache, ResultCache};
//!
//! let cache: MemoryCache<u64> = MemoryCache::new();
//! let key = Fingerprint::round_summary("1", "0xround");
//!
//! assert_eq!(cache.get(&key), CacheLookup::Miss);
//! cache.set(key.clone(), 7);
//! cache.set(key.clone(), 8);
//! assert_eq!(cache.get(&key), CacheLookup::Hit(8));
//! ```

use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;
use serde::Serialize;

use crate::tree::CommitmentReport;
use crate::types::{QFContributionSummary, QFDistributionResults};

/// What a cached value was computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResultKind {
    Summary,
    Match,
    Commitment,
}

impl ResultKind {
    fn as_str(&self) -> &'static str {
        match self {
            ResultKind::Summary => "summary",
            ResultKind::Match => "match",
            ResultKind::Commitment => "commitment",
        }
    }
}

/// Deterministic cache key derived from request parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint {
    pub kind: ResultKind,
    pub chain_id: String,
    pub round_id: String,
    pub project_id: Option<String>,
}

impl Fingerprint {
    pub fn new(kind: ResultKind, chain_id: &str, round_id: &str, project_id: Option<&str>) -> Self {
        Self {
            kind,
            chain_id: chain_id.trim().to_string(),
            round_id: round_id.trim().to_lowercase(),
            project_id: project_id.map(|p| p.trim().to_string()),
        }
    }

    pub fn round_summary(chain_id: &str, round_id: &str) -> Self {
        Self::new(ResultKind::Summary, chain_id, round_id, None)
    }

    pub fn project_summary(chain_id: &str, round_id: &str, project_id: &str) -> Self {
        Self::new(ResultKind::Summary, chain_id, round_id, Some(project_id))
    }

    pub fn round_match(chain_id: &str, round_id: &str) -> Self {
        Self::new(ResultKind::Match, chain_id, round_id, None)
    }

    pub fn commitment(chain_id: &str, round_id: &str) -> Self {
        Self::new(ResultKind::Commitment, chain_id, round_id, None)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cache_/{}/{}/{}", self.kind.as_str(), self.chain_id, self.round_id)?;
        if let Some(project_id) = &self.project_id {
            write!(f, "/{project_id}")?;
        }
        Ok(())
    }
}

/// Result of a cache lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup<V> {
    Hit(V),
    Miss,
}

impl<V> CacheLookup<V> {
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheLookup::Hit(_))
    }

    pub fn into_option(self) -> Option<V> {
        match self {
            CacheLookup::Hit(v) => Some(v),
            CacheLookup::Miss => None,
        }
    }
}

/// Get/set capability. A distributed store can implement this in place of
/// [`MemoryCache`].
pub trait ResultCache<V>: Send + Sync {
    fn get(&self, key: &Fingerprint) -> CacheLookup<V>;

    /// Unconditional overwrite; the last write wins.
    fn set(&self, key: Fingerprint, value: V);
}

/// Values the round service caches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CachedResult {
    Summary(QFContributionSummary),
    Distribution(QFDistributionResults),
    Commitment(CommitmentReport),
}

/// In-process cache with no expiry.
#[derive(Debug)]
pub struct MemoryCache<V> {
    entries: RwLock<HashMap<Fingerprint, V>>,
}

impl<V> Default for MemoryCache<V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<V> MemoryCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<V: Clone + Send + Sync> ResultCache<V> for MemoryCache<V> {
    fn get(&self, key: &Fingerprint) -> CacheLookup<V> {
        match self.entries.read().get(key) {
            Some(value) => CacheLookup::Hit(value.clone()),
            None => CacheLookup::Miss,
        }
    }

    fn set(&self, key: Fingerprint, value: V) {
        self.entries.write().insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_miss_then_hit() {
        let cache: MemoryCache<String> = MemoryCache::new();
        let key = Fingerprint::round_match("1", "0xabc");

        assert!(!cache.get(&key).is_hit());
        cache.set(key.clone(), "v1".to_string());
        assert_eq!(cache.get(&key), CacheLookup::Hit("v1".to_string()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_last_write_wins() {
        let cache: MemoryCache<u32> = MemoryCache::new();
        let key = Fingerprint::commitment("1", "0xabc");
        cache.set(key.clone(), 1);
        cache.set(key.clone(), 2);
        assert_eq!(cache.get(&key).into_option(), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_fingerprint_distinguishes_kind_and_project() {
        let round = Fingerprint::round_summary("1", "0xABC");
        let project = Fingerprint::project_summary("1", "0xabc", "p1");
        let matched = Fingerprint::round_match("1", "0xabc");

        assert_ne!(round, project);
        assert_ne!(round, matched);
        assert_eq!(round, Fingerprint::round_summary("1", "0xabc"));
        assert_eq!(project.to_string(), "cache_/summary/1/0xabc/p1");
        assert_eq!(matched.to_string(), "cache_/match/1/0xabc");
    }

    #[test]
    fn test_concurrent_writers() {
        let cache: Arc<MemoryCache<usize>> = Arc::new(MemoryCache::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for round in 0..50 {
                        cache.set(Fingerprint::round_match("1", &format!("r{round}")), i);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(cache.len(), 50);
        assert!(cache.get(&Fingerprint::round_match("1", "r7")).is_hit());
    }
}
