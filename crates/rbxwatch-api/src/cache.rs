// In-memory response cache keyed by URL plus canonicalized query parameters.

use std::collections::BTreeMap;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::time::Instant;

struct CachedResponse {
    body: Value,
    stored_at: Instant,
}

/// TTL-bounded cache of decoded JSON responses.
///
/// Each lookup supplies its own TTL, so the same entry can be fresh for a
/// caller that tolerates an hour of staleness and stale for one that
/// wants ten minutes.
#[derive(Default)]
pub struct ResponseCache {
    entries: DashMap<String, CachedResponse>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonical cache key: `url:{sorted params as JSON}`.
    pub fn key(url: &str, params: &[(String, String)]) -> String {
        let sorted: BTreeMap<&str, &str> = params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let params = serde_json::to_string(&sorted).unwrap_or_default();
        format!("{url}:{params}")
    }

    /// Return the cached body if it was stored less than `ttl` ago.
    pub fn get(&self, key: &str, ttl: Duration) -> Option<Value> {
        let entry = self.entries.get(key)?;
        (entry.stored_at.elapsed() < ttl).then(|| entry.body.clone())
    }

    pub fn insert(&self, key: String, body: Value) {
        self.entries.insert(
            key,
            CachedResponse {
                body,
                stored_at: Instant::now(),
            },
        );
    }

    /// Drop entries older than `max_age`. Returns how many were removed.
    pub fn purge_older_than(&self, max_age: Duration) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.stored_at.elapsed() < max_age);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
