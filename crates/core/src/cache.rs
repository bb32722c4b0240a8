use crate::config::CacheConfig;
use crate::models::Embedding;
use lru::LruCache;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub fn cache_key(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

#[derive(Debug)]
struct CachedEmbedding {
    vector: Embedding,
    stored_at: Instant,
}

/// Bounded LRU map from chunk-text digest to embedding vector.
///
/// Safe to share between concurrent requests. Entries older than the
/// configured TTL are treated as misses and dropped on lookup.
#[derive(Debug)]
pub struct EmbeddingCache {
    entries: Mutex<LruCache<String, CachedEmbedding>>,
    ttl: Option<Duration>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl EmbeddingCache {
    pub fn new(capacity: NonZeroUsize, ttl: Option<Duration>) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// `None` when caching is disabled or the capacity is zero.
    pub fn from_config(config: &CacheConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let ttl = (!config.ttl.is_zero()).then_some(config.ttl);
        NonZeroUsize::new(config.capacity).map(|capacity| Self::new(capacity, ttl))
    }

    pub async fn get(&self, key: &str) -> Option<Embedding> {
        let mut guard = self.entries.lock().await;

        let expired = match guard.get(key) {
            Some(entry) if self.is_fresh(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.vector.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            guard.pop(key);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub async fn put(&self, key: String, vector: Embedding) {
        let mut guard = self.entries.lock().await;
        guard.put(
            key,
            CachedEmbedding {
                vector,
                stored_at: Instant::now(),
            },
        );
    }

    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.lock().await.len();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries,
        }
    }

    fn is_fresh(&self, entry: &CachedEmbedding) -> bool {
        self.ttl
            .map(|ttl| entry.stored_at.elapsed() <= ttl)
            .unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capacity(value: usize) -> NonZeroUsize {
        NonZeroUsize::new(value).expect("non-zero capacity")
    }

    #[test]
    fn keys_are_content_digests() {
        assert_eq!(cache_key("same text"), cache_key("same text"));
        assert_ne!(cache_key("same text"), cache_key("same text "));
        assert_eq!(cache_key("").len(), 64);
    }

    #[tokio::test]
    async fn second_lookup_is_a_hit() {
        let cache = EmbeddingCache::new(capacity(4), None);
        let key = cache_key("pump");

        assert!(cache.get(&key).await.is_none());
        cache.put(key.clone(), vec![0.5, -0.5]).await;
        assert_eq!(cache.get(&key).await, Some(vec![0.5, -0.5]));

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[tokio::test]
    async fn least_recently_used_entry_is_evicted() {
        let cache = EmbeddingCache::new(capacity(2), None);
        cache.put("a".to_string(), vec![1.0]).await;
        cache.put("b".to_string(), vec![2.0]).await;
        assert!(cache.get("a").await.is_some());
        cache.put("c".to_string(), vec![3.0]).await;

        assert!(cache.get("b").await.is_none());
        assert!(cache.get("a").await.is_some());
        assert!(cache.get("c").await.is_some());
        assert_eq!(cache.stats().await.entries, 2);
    }

    #[tokio::test]
    async fn expired_entries_are_misses() {
        let cache = EmbeddingCache::new(capacity(2), Some(Duration::from_millis(10)));
        cache.put("a".to_string(), vec![1.0]).await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(cache.get("a").await.is_none());
        assert_eq!(cache.stats().await.entries, 0);
    }

    #[test]
    fn disabled_config_builds_no_cache() {
        let config = CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        };
        assert!(EmbeddingCache::from_config(&config).is_none());
        assert!(EmbeddingCache::from_config(&CacheConfig::default()).is_some());
    }
}
