//! mnemo — privacy-tiered memory engine for multi-tenant assistants.
//! Dual lifecycle (persistent vs humanized decay), dedup on write,
//! focus-boosted hybrid recall.

pub mod api;
pub mod decay;
pub mod embed;
pub mod error;
pub mod recall;
pub mod scoring;
pub mod store;
pub mod thresholds;

use std::sync::Arc;

pub type SharedStore = Arc<store::MemoryStore>;

#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub embed: Option<embed::EmbedConfig>,
    pub api_key: Option<String>,
    pub embed_cache: EmbedCache,
    pub started_at: std::time::Instant,
}

use lru::LruCache;
use std::num::NonZeroUsize;

/// Small LRU cache for query embeddings to avoid repeated API calls.
/// Key = query text, value = embedding vector.
#[derive(Clone)]
pub struct EmbedCache {
    inner: std::sync::Arc<parking_lot::Mutex<EmbedCacheInner>>,
}

struct EmbedCacheInner {
    cache: LruCache<String, Vec<f32>>,
    hits: u64,
    misses: u64,
}

impl EmbedCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: std::sync::Arc::new(parking_lot::Mutex::new(EmbedCacheInner {
                cache: LruCache::new(
                    NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(128).unwrap()),
                ),
                hits: 0,
                misses: 0,
            })),
        }
    }

    pub fn get(&self, key: &str) -> Option<Vec<f32>> {
        let mut inner = self.inner.lock();
        let val = inner.cache.get(key).cloned();
        if val.is_some() {
            inner.hits += 1;
        } else {
            inner.misses += 1;
        }
        val
    }

    pub fn insert(&self, key: String, value: Vec<f32>) {
        let mut inner = self.inner.lock();
        inner.cache.put(key, value);
    }

    pub fn stats(&self) -> (usize, usize, u64, u64) {
        let inner = self.inner.lock();
        (inner.cache.len(), inner.cache.cap().get(), inner.hits, inner.misses)
    }
}
