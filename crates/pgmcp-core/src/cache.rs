//! Compaction cache: a bounded in-memory map from (message sequence,
//! budget, recent-window) to a previously computed compaction response.

use crate::compactor::CompactionResponse;
use pgmcp_util::fingerprint;
use std::collections::HashMap;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;

/// A cached compaction result plus its lifetime bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub response: CompactionResponse,
    pub created_at: SystemTime,
    pub expires_at: Option<SystemTime>,
}

impl CacheEntry {
    fn is_expired(&self, now: SystemTime) -> bool {
        matches!(self.expires_at, Some(expiry) if expiry <= now)
    }
}

/// Computes the cache key for a message sequence and budget parameters.
///
/// Mirrors `pgmcp_util::fingerprint`'s delimiter discipline: one chunk per
/// message's canonical JSON encoding, followed by the ASCII encoding of
/// `max_tokens:recent_window` as a final chunk.
pub fn cache_key(messages: &[crate::message::Message], max_tokens: u32, recent_window: u32) -> String {
    let mut chunks: Vec<String> = messages
        .iter()
        .map(|m| serde_json::to_string(m).unwrap_or_default())
        .collect();
    chunks.push(format!("{max_tokens}:{recent_window}"));
    fingerprint(chunks)
}

/// Reader/writer-guarded compaction result cache with optional TTL.
pub struct CompactionCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Option<Duration>,
}

impl CompactionCache {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Looks up a cached response. Returns `None` on miss or if the entry
    /// has expired (an expired entry is treated as absent but not evicted
    /// eagerly; the sweep or a subsequent `set` removes it).
    pub async fn get(
        &self,
        messages: &[crate::message::Message],
        max_tokens: u32,
        recent_window: u32,
    ) -> Option<CompactionResponse> {
        let key = cache_key(messages, max_tokens, recent_window);
        let entries = self.entries.read().await;
        let entry = entries.get(&key)?;
        if entry.is_expired(SystemTime::now()) {
            return None;
        }
        Some(entry.response.clone())
    }

    /// Inserts or overwrites a cached response for the given inputs.
    pub async fn set(
        &self,
        messages: &[crate::message::Message],
        max_tokens: u32,
        recent_window: u32,
        response: CompactionResponse,
    ) {
        let key = cache_key(messages, max_tokens, recent_window);
        let now = SystemTime::now();
        let expires_at = self.ttl.map(|d| now + d);
        let mut entries = self.entries.write().await;
        entries.insert(
            key,
            CacheEntry {
                response,
                created_at: now,
                expires_at,
            },
        );
    }

    /// Drops every entry.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Number of entries currently stored, including any not yet swept.
    pub async fn size(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Evicts all expired entries. Intended to run on a coarse-grained
    /// timer (e.g. once a minute) when a TTL is configured.
    pub async fn sweep(&self) {
        let now = SystemTime::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| !entry.is_expired(now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compactor::CompactionInfo;
    use crate::message::Message;

    fn sample_response() -> CompactionResponse {
        CompactionResponse {
            messages: vec![Message::user("hi")],
            summary: None,
            token_estimate: 10,
            compaction_info: CompactionInfo {
                original_count: 1,
                compacted_count: 1,
                dropped_count: 0,
                anchor_count: 1,
                tokens_saved: 0,
                compression_ratio: 1.0,
            },
        }
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let cache = CompactionCache::new(None);
        let messages = vec![Message::user("hi")];
        assert!(cache.get(&messages, 1000, 10).await.is_none());
        cache.set(&messages, 1000, 10, sample_response()).await;
        assert!(cache.get(&messages, 1000, 10).await.is_some());
        assert_eq!(cache.size().await, 1);
    }

    #[tokio::test]
    async fn test_key_sensitive_to_budget() {
        let messages = vec![Message::user("hi")];
        let key_a = cache_key(&messages, 1000, 10);
        let key_b = cache_key(&messages, 2000, 10);
        assert_ne!(key_a, key_b);
    }

    #[tokio::test]
    async fn test_key_deterministic() {
        let messages = vec![Message::user("hi"), Message::assistant("there")];
        assert_eq!(cache_key(&messages, 500, 5), cache_key(&messages, 500, 5));
    }

    #[tokio::test]
    async fn test_expired_entry_treated_as_absent() {
        let cache = CompactionCache::new(Some(Duration::from_millis(1)));
        let messages = vec![Message::user("hi")];
        cache.set(&messages, 1000, 10, sample_response()).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cache.get(&messages, 1000, 10).await.is_none());
    }

    #[tokio::test]
    async fn test_clear_empties_cache() {
        let cache = CompactionCache::new(None);
        let messages = vec![Message::user("hi")];
        cache.set(&messages, 1000, 10, sample_response()).await;
        cache.clear().await;
        assert_eq!(cache.size().await, 0);
    }

    #[tokio::test]
    async fn test_sweep_removes_expired_only() {
        let cache = CompactionCache::new(Some(Duration::from_millis(1)));
        let fresh = vec![Message::user("fresh")];
        cache.set(&fresh, 1000, 10, sample_response()).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        cache.sweep().await;
        assert_eq!(cache.size().await, 0);
    }
}
