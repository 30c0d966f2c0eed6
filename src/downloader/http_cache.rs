//! Run-local HTTP response cache.
//!
//! Bodies are cached under the first 20 hex characters of `SHA-1(url)`,
//! with a `.h` sidecar holding the serialized response headers. A `ref`
//! marker is written when the cache opens; at shutdown, entries whose
//! mtime predates the marker are swept unless cleaning is skipped.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::SystemTime;

use anyhow::{Context, Result};
use sha1::{Digest, Sha1};

const REF_MARKER: &str = "ref";

pub struct HttpCache {
    dir: PathBuf,
}

impl HttpCache {
    /// Open (creating if needed) the cache directory and stamp the `ref`
    /// marker for this run.
    pub async fn open(dir: PathBuf) -> Result<Self> {
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("creating cache dir {}", dir.display()))?;
        tokio::fs::write(dir.join(REF_MARKER), b"")
            .await
            .context("writing cache ref marker")?;
        Ok(Self { dir })
    }

    /// Cache key: first 20 hex chars of `SHA-1(url)`.
    #[must_use]
    pub fn key(url: &str) -> String {
        let digest = Sha1::digest(url.as_bytes());
        hex::encode(digest)[..20].to_string()
    }

    fn body_path(&self, url: &str) -> PathBuf {
        self.dir.join(Self::key(url))
    }

    fn header_path(&self, url: &str) -> PathBuf {
        self.dir.join(format!("{}.h", Self::key(url)))
    }

    /// Return the cached body and headers, refreshing the entry's mtime so
    /// the shutdown sweep keeps it.
    pub async fn lookup(&self, url: &str) -> Option<(Vec<u8>, HashMap<String, String>)> {
        let body = tokio::fs::read(self.body_path(url)).await.ok()?;
        let raw_headers = tokio::fs::read(self.header_path(url)).await.ok()?;
        let headers: HashMap<String, String> = serde_json::from_slice(&raw_headers).ok()?;

        // Rewriting bumps the mtime past the ref marker.
        let _ = tokio::fs::write(self.body_path(url), &body).await;
        let _ = tokio::fs::write(self.header_path(url), &raw_headers).await;
        Some((body, headers))
    }

    pub async fn store(&self, url: &str, body: &[u8], headers: &HashMap<String, String>) {
        if let Err(e) = tokio::fs::write(self.body_path(url), body).await {
            log::warn!("failed to cache response body for {url}: {e}");
            return;
        }
        match serde_json::to_vec(headers) {
            Ok(serialized) => {
                if let Err(e) = tokio::fs::write(self.header_path(url), serialized).await {
                    log::warn!("failed to cache response headers for {url}: {e}");
                }
            }
            Err(e) => log::warn!("failed to serialize headers for {url}: {e}"),
        }
    }

    /// Delete entries not touched during this run (mtime older than the
    /// `ref` marker).
    pub async fn sweep(&self) -> Result<()> {
        let ref_mtime = tokio::fs::metadata(self.dir.join(REF_MARKER))
            .await
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .with_context(|| format!("reading cache dir {}", self.dir.display()))?;
        let mut removed = 0usize;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_name() == REF_MARKER {
                continue;
            }
            let stale = entry
                .metadata()
                .await
                .and_then(|m| m.modified())
                .map(|mtime| mtime < ref_mtime)
                .unwrap_or(false);
            if stale {
                if tokio::fs::remove_file(entry.path()).await.is_ok() {
                    removed += 1;
                }
            }
        }
        if removed > 0 {
            log::info!("swept {removed} stale cache entries");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_twenty_hex_chars() {
        let key = HttpCache::key("https://host/a.png");
        assert_eq!(key.len(), 20);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(key, HttpCache::key("https://host/a.png"));
        assert_ne!(key, HttpCache::key("https://host/b.png"));
    }

    #[tokio::test]
    async fn store_then_lookup_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = HttpCache::open(dir.path().to_path_buf()).await.unwrap();

        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "image/png".to_string());
        cache.store("https://host/a.png", b"bytes", &headers).await;

        let (body, read_headers) = cache.lookup("https://host/a.png").await.unwrap();
        assert_eq!(body, b"bytes");
        assert_eq!(read_headers.get("content-type").unwrap(), "image/png");
        assert!(cache.lookup("https://host/missing.png").await.is_none());
    }

    #[tokio::test]
    async fn sweep_removes_entries_older_than_ref() {
        let dir = tempfile::tempdir().unwrap();

        // Pre-existing entry from a previous run.
        let stale = dir.path().join("deadbeefdeadbeefdead");
        tokio::fs::write(&stale, b"old").await.unwrap();
        let old = SystemTime::now() - std::time::Duration::from_secs(3600);
        let file = std::fs::File::options().write(true).open(&stale).unwrap();
        file.set_times(std::fs::FileTimes::new().set_modified(old))
            .unwrap();

        let cache = HttpCache::open(dir.path().to_path_buf()).await.unwrap();
        cache
            .store("https://host/fresh.png", b"new", &HashMap::new())
            .await;
        cache.sweep().await.unwrap();

        assert!(!stale.exists());
        assert!(cache.lookup("https://host/fresh.png").await.is_some());
    }
}
