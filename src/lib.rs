//! wikiscrape: offline MediaWiki archiver.
//!
//! Discovers the set of articles on a wiki, fetches each article's rendered
//! HTML plus its transitive media and style/script dependencies, rewrites
//! every reference to an archive-local path, and hands the result to an
//! append-only archive writer.

pub mod archive;
pub mod config;
pub mod downloader;
pub mod error;
pub mod renderer;
pub mod rewriter;
pub mod scrape_engine;
pub mod store;
pub mod templates;
pub mod utils;
pub mod wiki_client;

pub use archive::{ArchiveEntry, ArchiveRedirect, ArchiveWriter, DirWriter};
pub use config::{ScrapeConfig, ScrapeConfigBuilder, ScrapeFormat};
pub use downloader::Downloader;
pub use error::{Result, ScrapeError};
pub use scrape_engine::{ScrapeStatus, Scraper};
pub use store::{FileTask, Stores};
pub use wiki_client::WikiClient;
pub use wiki_client::types::{ArticleDetail, Namespace, Redirect, WikiMetadata};

#[cfg(test)]
pub(crate) mod test_support {
    use crate::wiki_client::types::{Namespace, NamespaceMap, TextDirection, WikiMetadata};

    /// A fixed metadata record for unit tests.
    pub(crate) fn metadata() -> WikiMetadata {
        let mut namespaces = NamespaceMap::default();
        namespaces.register(Namespace {
            id: 0,
            canonical: String::new(),
            localized: String::new(),
            is_content: true,
            allowed_subpages: true,
        });
        // Real installs do not flag the category namespace as content.
        namespaces.register(Namespace {
            id: 14,
            canonical: "Category".into(),
            localized: "Category".into(),
            is_content: false,
            allowed_subpages: false,
        });
        WikiMetadata {
            base_url: "https://wiki.test/".into(),
            api_url: "https://wiki.test/w/api.php".into(),
            rest_url: "https://wiki.test/api/rest_v1/".into(),
            ve_url: "https://wiki.test/w/api.php".into(),
            web_url: "https://wiki.test/wiki/".into(),
            main_page: "Main_Page".into(),
            site_name: "Test Wiki".into(),
            text_dir: TextDirection::Ltr,
            lang_iso2: "en".into(),
            lang_iso3: "eng".into(),
            namespaces,
        }
    }
}
