//! Process-local store-of-record for a scrape run.
//!
//! Four typed namespaces coordinate the pipeline phases: article details,
//! the media download queue, the retry queue, and the redirect cache.
//! Workers receive values by clone during batch iteration and write back
//! through the store API; per-key access is serialised by the underlying
//! concurrent map.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};

use crate::wiki_client::types::{ArticleDetail, Redirect};

/// A pending media download.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileTask {
    /// Archive-local path (unique key inside the target namespace).
    pub path: String,
    /// Upstream URL to fetch.
    pub url: String,
    /// Target archive namespace (`'I'` for media, `'-'` for assets).
    pub namespace: char,
    /// Pixel width when known (thumbnails).
    pub width: Option<u32>,
    /// Device scale multiplier when known (`@2x` variants).
    pub mult: Option<f64>,
}

/// One typed key–value namespace.
///
/// Batch iteration snapshots the key set, splits it into one disjoint slice
/// per worker, and drives the slices concurrently.
pub struct KvStore<V: Clone + Send + Sync + 'static> {
    map: DashMap<String, V>,
}

impl<V: Clone + Send + Sync + 'static> Default for KvStore<V> {
    fn default() -> Self {
        Self {
            map: DashMap::new(),
        }
    }
}

impl<V: Clone + Send + Sync + 'static> KvStore<V> {
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.map.insert(key.into(), value);
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<V> {
        self.map.get(key).map(|entry| entry.value().clone())
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn delete(&self, key: &str) -> Option<V> {
        self.map.remove(key).map(|(_, v)| v)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&self) {
        self.map.clear();
    }

    /// Snapshot of all keys, sorted for deterministic dispatch.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.map.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Update the value under `key` in place, inserting the default produced
    /// by `make` when absent. The closure runs under the key's shard lock.
    pub fn upsert_with<F, M>(&self, key: impl Into<String>, make: M, update: F)
    where
        F: FnOnce(&mut V),
        M: FnOnce() -> V,
    {
        let mut entry = self.map.entry(key.into()).or_insert_with(make);
        update(entry.value_mut());
    }

    /// Iterate every item with `workers` concurrent tasks.
    ///
    /// Items are cloned out of the store before being handed to `handler`;
    /// handlers that need to mutate state write back through the store.
    /// Items inserted after the snapshot are not visited.
    pub async fn iterate<F, Fut>(&self, workers: usize, handler: F)
    where
        F: Fn(String, V) -> Fut,
        Fut: Future<Output = ()>,
    {
        let workers = workers.max(1);
        let keys = self.keys();
        stream::iter(keys)
            .map(|key| {
                let item = self.get(&key);
                (key, item)
            })
            .for_each_concurrent(workers, |(key, item)| {
                let handler = &handler;
                async move {
                    // Deleted between snapshot and dispatch: nothing to do.
                    if let Some(item) = item {
                        handler(key, item).await;
                    }
                }
            })
            .await;
    }
}

/// The four namespaces threaded through the orchestrator context.
#[derive(Default)]
pub struct Stores {
    pub article_detail: KvStore<ArticleDetail>,
    pub files_to_download: KvStore<FileTask>,
    pub files_to_retry: KvStore<FileTask>,
    pub redirects: KvStore<Redirect>,
}

impl Stores {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a media download. Re-enqueues for the same archive path keep
    /// `max(width)` and `max(mult)` across all insertions, maxed
    /// independently; the stored URL follows the widest variant.
    pub fn enqueue_file(&self, task: FileTask) {
        self.files_to_download.upsert_with(
            task.path.clone(),
            || task.clone(),
            |existing| {
                if task.width > existing.width
                    || (task.width == existing.width && task.mult > existing.mult)
                {
                    existing.url = task.url.clone();
                }
                existing.width = existing.width.max(task.width);
                existing.mult = match (existing.mult, task.mult) {
                    (Some(a), Some(b)) => Some(a.max(b)),
                    (a, b) => a.or(b),
                };
            },
        );
    }

    /// Whether `article_id` will be present in the archive, either directly
    /// or as a redirect to a mirrored article.
    #[must_use]
    pub fn is_mirrored(&self, article_id: &str) -> bool {
        self.article_detail.contains(article_id)
    }

    /// Resolve a redirect source to its target, single hop.
    #[must_use]
    pub fn redirect_target(&self, article_id: &str) -> Option<String> {
        self.redirects.get(article_id).map(|r| r.to)
    }

    /// Drop all run state. Called once at the end of the run.
    pub fn clear(&self) {
        self.article_detail.clear();
        self.files_to_download.clear();
        self.files_to_retry.clear();
        self.redirects.clear();
    }
}
