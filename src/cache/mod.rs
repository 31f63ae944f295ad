//! Session-scoped connection state cache.
//!
//! Keyed by integration key. Readers tolerate eventual consistency: a
//! patched value may later be overwritten by a fresher fetch, and
//! last-writer-wins is acceptable because writes are rare and user
//! triggered.

use crate::client::types::{ConnectionState, ConnectionSummary};
use crate::client::{ApiClient, ApiError};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: ConnectionSummary,
    fetched_at: DateTime<Utc>,
    /// Stale entries are still readable but force a re-fetch on the
    /// read-through path.
    stale: bool,
}

/// Partial connection state for optimistic merges.
#[derive(Debug, Clone, Default)]
pub struct ConnectionPatch {
    pub state: Option<ConnectionState>,
    pub last_active_at: Option<DateTime<Utc>>,
    pub disconnected: Option<bool>,
}

/// In-memory cache of last-known connection state, one entry per
/// integration. Cheap to clone; clones share the underlying map.
#[derive(Clone)]
pub struct ConnectionCache {
    entries: Arc<DashMap<String, CacheEntry>>,
}

impl ConnectionCache {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
        }
    }

    /// Last-known value for a key, stale or not.
    pub fn get(&self, key: &str) -> Option<ConnectionSummary> {
        self.entries.get(key).map(|e| e.value.clone())
    }

    /// Stores a freshly fetched value.
    pub fn insert(&self, key: &str, value: ConnectionSummary) {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                fetched_at: Utc::now(),
                stale: false,
            },
        );
    }

    /// Marks the entry stale so the next read-through re-fetches. The stale
    /// value stays readable via `get` until then.
    pub fn invalidate(&self, key: &str) {
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.stale = true;
        }
    }

    /// Drops the entry entirely.
    pub fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Optimistically merges fields onto a cached entry without waiting for
    /// a re-fetch. Returns false when nothing was cached under the key (the
    /// next read-through will fetch the real state anyway).
    pub fn patch(&self, key: &str, patch: ConnectionPatch) -> bool {
        let Some(mut entry) = self.entries.get_mut(key) else {
            debug!(key = %key, "Patch skipped, no cached connection");
            return false;
        };

        if let Some(state) = patch.state {
            entry.value.state = state;
        }
        if let Some(last_active_at) = patch.last_active_at {
            entry.value.last_active_at = Some(last_active_at);
        }
        if let Some(disconnected) = patch.disconnected {
            entry.value.disconnected = disconnected;
        }
        true
    }

    /// Read-through: serves the cached value unless absent or invalidated,
    /// otherwise fetches the integration's connection from the remote.
    pub async fn get_or_fetch(
        &self,
        client: &ApiClient,
        integration_key: &str,
    ) -> Result<Option<ConnectionSummary>, ApiError> {
        if let Some(entry) = self.entries.get(integration_key) {
            if !entry.stale {
                return Ok(Some(entry.value.clone()));
            }
        }

        debug!(integration = %integration_key, "Fetching connection state");
        match client.integration_connection(integration_key).await? {
            Some(summary) => {
                self.insert(integration_key, summary.clone());
                Ok(Some(summary))
            }
            None => {
                self.remove(integration_key);
                Ok(None)
            }
        }
    }

    /// Age of the cached entry, for display.
    pub fn fetched_at(&self, key: &str) -> Option<DateTime<Utc>> {
        self.entries.get(key).map(|e| e.fetched_at)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ConnectionCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(state: ConnectionState) -> ConnectionSummary {
        ConnectionSummary {
            id: "conn-1".to_string(),
            key: "salesforce".to_string(),
            name: "Salesforce".to_string(),
            state,
            last_active_at: None,
            disconnected: false,
        }
    }

    #[test]
    fn test_patch_merges_fields() {
        let cache = ConnectionCache::new();
        cache.insert("salesforce", summary(ConnectionState::Pending));

        let patched = cache.patch(
            "salesforce",
            ConnectionPatch {
                state: Some(ConnectionState::Ready),
                ..ConnectionPatch::default()
            },
        );
        assert!(patched);

        let value = cache.get("salesforce").unwrap();
        assert_eq!(value.state, ConnectionState::Ready);
        // Untouched fields survive the merge
        assert_eq!(value.id, "conn-1");
    }

    #[test]
    fn test_patch_on_missing_key_is_noop() {
        let cache = ConnectionCache::new();
        assert!(!cache.patch("salesforce", ConnectionPatch::default()));
        assert!(cache.get("salesforce").is_none());
    }

    #[test]
    fn test_invalidate_keeps_value_readable() {
        let cache = ConnectionCache::new();
        cache.insert("salesforce", summary(ConnectionState::Ready));
        cache.invalidate("salesforce");

        // get still serves the stale value; only the read-through re-fetches
        assert!(cache.get("salesforce").is_some());
    }

    #[tokio::test]
    async fn test_get_or_fetch_serves_fresh_entry_without_network() {
        let cache = ConnectionCache::new();
        cache.insert("salesforce", summary(ConnectionState::Ready));

        // Unroutable base URL: any network call would error
        let client = ApiClient::new("http://127.0.0.1:1");
        let value = cache.get_or_fetch(&client, "salesforce").await.unwrap();
        assert_eq!(value.unwrap().state, ConnectionState::Ready);
    }

    #[tokio::test]
    async fn test_get_or_fetch_after_invalidate_hits_network() {
        let cache = ConnectionCache::new();
        cache.insert("salesforce", summary(ConnectionState::Ready));
        cache.invalidate("salesforce");

        let client = ApiClient::new("http://127.0.0.1:1");
        let result = cache.get_or_fetch(&client, "salesforce").await;
        assert!(result.is_err(), "stale entry must force a re-fetch");
    }
}
