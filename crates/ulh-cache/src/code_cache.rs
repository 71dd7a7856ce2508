//! Content-addressed code cache (C6, spec §4.6).

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use ulh_repository::{ObjectStore, RepositoryError};

/// Candidate entry filenames tried, in order, on a cache miss.
pub const CANDIDATE_FILENAMES: &[&str] = &["index.tsx", "index.ts", "index.jsx", "index.js"];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    app_id: String,
    storage_key: String,
}

/// A cached app source blob.
#[derive(Debug, Clone)]
pub struct CodeCacheEntry {
    pub filename: String,
    pub source_text: String,
    pub loaded_at: DateTime<Utc>,
}

type Slot = Arc<OnceCell<Arc<CodeCacheEntry>>>;

/// Bounded LRU of app source text, keyed by `(app_id, storage_key)`.
///
/// `storage_key` is content-addressed (two app versions never share a key),
/// so entries never need invalidation — only eviction once the cache is
/// over capacity. Concurrent misses for the same key single-flight: only
/// one caller actually calls the object store, the rest await the same
/// [`tokio::sync::OnceCell`].
pub struct CodeCache {
    slots: DashMap<CacheKey, Slot>,
    order: Mutex<VecDeque<CacheKey>>,
    capacity: usize,
}

impl CodeCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            capacity,
        }
    }

    /// Fetch `(app_id, storage_key)`, consulting the cache first and the
    /// object store on miss. All concurrent callers for the same key
    /// observe exactly one object-store fetch.
    pub async fn get(
        &self,
        app_id: &str,
        storage_key: &str,
        object_store: &dyn ObjectStore,
    ) -> Result<Arc<CodeCacheEntry>, RepositoryError> {
        let key = CacheKey { app_id: app_id.to_string(), storage_key: storage_key.to_string() };

        let slot = self
            .slots
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let entry = slot
            .get_or_try_init(|| async {
                let found = object_store.fetch_first(storage_key, CANDIDATE_FILENAMES).await?;
                let (filename, source_text) = found.ok_or(RepositoryError::NotFound)?;
                Ok::<_, RepositoryError>(Arc::new(CodeCacheEntry {
                    filename,
                    source_text,
                    loaded_at: Utc::now(),
                }))
            })
            .await?
            .clone();

        self.touch(key).await;
        Ok(entry)
    }

    async fn touch(&self, key: CacheKey) {
        let mut order = self.order.lock().await;
        order.retain(|k| k != &key);
        order.push_back(key);
        while order.len() > self.capacity {
            if let Some(evicted) = order.pop_front() {
                self.slots.remove(&evicted);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use ulh_repository::memory::InMemoryStore;

    struct CountingStore {
        inner: InMemoryStore,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl ObjectStore for CountingStore {
        async fn fetch_first(
            &self,
            storage_key: &str,
            candidates: &[&str],
        ) -> Result<Option<(String, String)>, RepositoryError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch_first(storage_key, candidates).await
        }
    }

    fn store_with(storage_key: &str, filename: &str, text: &str) -> CountingStore {
        let inner = InMemoryStore::new();
        let mut files = BTreeMap::new();
        files.insert(filename.to_string(), text.to_string());
        inner.put_object(storage_key, files);
        CountingStore { inner, fetches: AtomicUsize::new(0) }
    }

    #[tokio::test]
    async fn miss_then_hit_fetches_once() {
        let store = store_with("sha256:a", "index.ts", "export default {}");
        let cache = CodeCache::new(10);

        let first = cache.get("app-1", "sha256:a", &store).await.unwrap();
        let second = cache.get("app-1", "sha256:a", &store).await.unwrap();

        assert_eq!(first.source_text, second.source_text);
        assert_eq!(store.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let store = InMemoryStore::new();
        let cache = CodeCache::new(10);
        let err = cache.get("app-1", "sha256:ghost", &store).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn eviction_respects_capacity() {
        let inner = InMemoryStore::new();
        for i in 0..3 {
            let mut files = BTreeMap::new();
            files.insert("index.js".to_string(), format!("v{i}"));
            inner.put_object(&format!("sha256:{i}"), files);
        }
        let cache = CodeCache::new(2);
        cache.get("app", "sha256:0", &inner).await.unwrap();
        cache.get("app", "sha256:1", &inner).await.unwrap();
        cache.get("app", "sha256:2", &inner).await.unwrap();

        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn concurrent_misses_single_flight() {
        let store = Arc::new(store_with("sha256:a", "index.ts", "code"));
        let cache = Arc::new(CodeCache::new(10));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                cache.get("app-1", "sha256:a", store.as_ref()).await.unwrap()
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(store.fetches.load(Ordering::SeqCst), 1);
    }
}
