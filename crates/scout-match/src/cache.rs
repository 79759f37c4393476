use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

/// Namespace the orchestrator stores verdict blobs under.
pub const ANALYSIS_NAMESPACE: &str = "analysis";

/// Advisory key-value cache consulted before re-analyzing identical job
/// text. Absence must never block analysis.
pub trait AnalysisCache: Send + Sync {
    /// Fetch a value, or `None` when absent or expired.
    fn get(&self, namespace: &str, key: &str) -> Option<String>;
    /// Store a value for `ttl`.
    fn set(&self, namespace: &str, key: &str, value: String, ttl: Duration);
}

/// Cache key for a job description: hex SHA-256 of the text.
///
/// # Examples
///
/// ```
/// use scout_match::cache::description_key;
///
/// let a = description_key("build the platform");
/// let b = description_key("build the platform");
/// assert_eq!(a, b);
/// assert_ne!(a, description_key("different posting"));
/// ```
pub fn description_key(description: &str) -> String {
    let digest = Sha256::digest(description.as_bytes());
    format!("{digest:x}")
}

/// In-process TTL cache.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use scout_match::cache::{AnalysisCache, MemoryCache};
///
/// let cache = MemoryCache::default();
/// cache.set("analysis", "k", "v".into(), Duration::from_secs(60));
/// assert_eq!(cache.get("analysis", "k").as_deref(), Some("v"));
/// assert_eq!(cache.get("analysis", "missing"), None);
/// ```
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<(String, String), (String, Instant)>>,
}

impl AnalysisCache for MemoryCache {
    fn get(&self, namespace: &str, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let map_key = (namespace.to_string(), key.to_string());
        match entries.get(&map_key) {
            Some((value, deadline)) if *deadline > Instant::now() => Some(value.clone()),
            Some(_) => {
                entries.remove(&map_key);
                None
            }
            None => None,
        }
    }

    fn set(&self, namespace: &str, key: &str, value: String, ttl: Duration) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            (namespace.to_string(), key.to_string()),
            (value, Instant::now() + ttl),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_entries_are_dropped() {
        let cache = MemoryCache::default();
        cache.set("analysis", "k", "v".into(), Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("analysis", "k"), None);
    }

    #[test]
    fn namespaces_are_isolated() {
        let cache = MemoryCache::default();
        cache.set("analysis", "k", "a".into(), Duration::from_secs(60));
        cache.set("other", "k", "b".into(), Duration::from_secs(60));
        assert_eq!(cache.get("analysis", "k").as_deref(), Some("a"));
        assert_eq!(cache.get("other", "k").as_deref(), Some("b"));
    }

    #[test]
    fn overwrite_refreshes_value() {
        let cache = MemoryCache::default();
        cache.set("analysis", "k", "old".into(), Duration::from_secs(60));
        cache.set("analysis", "k", "new".into(), Duration::from_secs(60));
        assert_eq!(cache.get("analysis", "k").as_deref(), Some("new"));
    }

    #[test]
    fn description_key_is_stable_hex() {
        let key = description_key("text");
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
