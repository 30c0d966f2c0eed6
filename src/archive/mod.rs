//! Archive writer contract and the directory-backed implementation.
//!
//! The scrape pipeline only ever consumes the `add entry` / `finalize`
//! contract; the bit layout of a packaged archive belongs to the writer.
//! `DirWriter` lays entries out as `<namespace>/<url>` files, which is also
//! the layout the `nozim` format flag requests.

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;

/// One addressable archive entry.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    /// Reserved namespace: `A` articles, `I` media, `-` assets, `U` category
    /// pages, `M` metadata.
    pub namespace: char,
    /// Key within the namespace; unique per run.
    pub url: String,
    /// Display title (articles only).
    pub title: String,
    pub mime_type: String,
    pub data: Vec<u8>,
    /// Whether search indexers may index the entry.
    pub indexable: bool,
}

impl ArchiveEntry {
    /// An HTML article entry in namespace `A`/`U`.
    #[must_use]
    pub fn article(namespace: char, url: impl Into<String>, title: impl Into<String>, html: String) -> Self {
        Self {
            namespace,
            url: url.into(),
            title: title.into(),
            mime_type: "text/html".into(),
            data: html.into_bytes(),
            indexable: true,
        }
    }

    /// A binary entry (media, asset or metadata).
    #[must_use]
    pub fn binary(
        namespace: char,
        url: impl Into<String>,
        mime_type: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        Self {
            namespace,
            url: url.into(),
            title: String::new(),
            mime_type: mime_type.into(),
            data,
            indexable: false,
        }
    }
}

/// A redirect entry: `url` resolves to the article stored at `target_url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveRedirect {
    pub namespace: char,
    pub url: String,
    pub title: String,
    pub target_url: String,
}

/// The consumed archive-writer contract.
///
/// Implementations must be safe to call from many workers; `add_entry` is
/// idempotent per `(namespace, url)` and `finalize` is called exactly once.
#[async_trait]
pub trait ArchiveWriter: Send + Sync {
    async fn add_entry(&self, entry: ArchiveEntry) -> Result<()>;
    async fn add_redirect(&self, redirect: ArchiveRedirect) -> Result<()>;
    async fn finalize(&self) -> Result<()>;
}

/// Writes entries as plain files under `<root>/<namespace>/<url>`.
pub struct DirWriter {
    root: PathBuf,
}

impl DirWriter {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn entry_path(&self, namespace: char, url: &str) -> PathBuf {
        let mut path = self.root.join(namespace.to_string());
        for segment in url.split('/') {
            path.push(segment);
        }
        path
    }
}

#[async_trait]
impl ArchiveWriter for DirWriter {
    async fn add_entry(&self, entry: ArchiveEntry) -> Result<()> {
        let path = self.entry_path(entry.namespace, &entry.url);
        let parent = path
            .parent()
            .context("archive entry path has no parent directory")?;
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
        tokio::fs::write(&path, &entry.data)
            .await
            .with_context(|| format!("writing archive entry {}", path.display()))?;
        Ok(())
    }

    async fn add_redirect(&self, redirect: ArchiveRedirect) -> Result<()> {
        // Directory layout has no native redirects; emit a meta-refresh stub.
        let depth = redirect.url.matches('/').count() + 1;
        let target = format!(
            "{}{}/{}",
            "../".repeat(depth),
            redirect.namespace,
            crate::utils::encode_article_id_for_html_url(&redirect.target_url)
        );
        let html = format!(
            "<!DOCTYPE html><html><head><meta charset=\"UTF-8\">\
             <meta http-equiv=\"refresh\" content=\"0;url={target}\">\
             <title>{}</title></head><body></body></html>",
            html_escape::encode_text(&redirect.title)
        );
        self.add_entry(ArchiveEntry::article(
            redirect.namespace,
            redirect.url,
            redirect.title,
            html,
        ))
        .await
    }

    async fn finalize(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("creating {}", self.root.display()))?;
        Ok(())
    }
}

pub mod testing {
    //! In-memory writer used across the test suite.

    use std::collections::HashMap;

    use parking_lot::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct MemoryWriter {
        pub entries: Mutex<HashMap<(char, String), ArchiveEntry>>,
        pub redirects: Mutex<Vec<ArchiveRedirect>>,
        pub finalized: Mutex<bool>,
    }

    impl MemoryWriter {
        #[must_use]
        pub fn get(&self, namespace: char, url: &str) -> Option<ArchiveEntry> {
            self.entries
                .lock()
                .get(&(namespace, url.to_string()))
                .cloned()
        }
    }

    #[async_trait]
    impl ArchiveWriter for MemoryWriter {
        async fn add_entry(&self, entry: ArchiveEntry) -> Result<()> {
            self.entries
                .lock()
                .insert((entry.namespace, entry.url.clone()), entry);
            Ok(())
        }

        async fn add_redirect(&self, redirect: ArchiveRedirect) -> Result<()> {
            self.redirects.lock().push(redirect);
            Ok(())
        }

        async fn finalize(&self) -> Result<()> {
            *self.finalized.lock() = true;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dir_writer_lays_out_namespace_paths() {
        let dir = tempfile::tempdir().unwrap();
        let writer = DirWriter::new(dir.path().to_path_buf());
        writer
            .add_entry(ArchiveEntry::article('A', "London", "London", "<html></html>".into()))
            .await
            .unwrap();
        writer
            .add_entry(ArchiveEntry::binary('I', "Tower.png", "image/png", vec![1, 2, 3]))
            .await
            .unwrap();
        writer.finalize().await.unwrap();

        assert!(dir.path().join("A/London").is_file());
        assert_eq!(
            tokio::fs::read(dir.path().join("I/Tower.png")).await.unwrap(),
            vec![1, 2, 3]
        );
    }
}
