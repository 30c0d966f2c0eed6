//! Core configuration types for a scrape run.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::utils::constants::{DEFAULT_REQ_TIMEOUT_SECS, DEFAULT_SPEED};

/// Orthogonal format flags derived from the requested format token.
///
/// The flags are independent booleans; a token such as `"nopic,nodet"`
/// switches two of them on by substring match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeFormat {
    /// Strip pictures (and image maps).
    pub nopic: bool,
    /// Strip videos and audio.
    pub novid: bool,
    /// Strip detail boxes (navboxes, reference blocks).
    pub nodet: bool,
    /// Produce the flat directory layout instead of a packaged archive.
    pub nozim: bool,
}

impl ScrapeFormat {
    /// Derive the flags from a format token by substring match.
    #[must_use]
    pub fn from_token(token: &str) -> Self {
        Self {
            nopic: token.contains("nopic"),
            novid: token.contains("novid"),
            nodet: token.contains("nodet"),
            nozim: token.contains("nozim"),
        }
    }
}

/// Configuration for one scrape run.
///
/// Built through [`super::ScrapeConfigBuilder`]; validation happens at build
/// time so the pipeline never re-checks these fields.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// Root URL of the wiki to mirror (normalised with a trailing slash).
    pub(crate) wiki_url: String,
    /// Output directory for the produced archive.
    pub(crate) output_dir: PathBuf,
    /// Run-local scratch directory for the HTTP response cache.
    pub(crate) cache_dir: PathBuf,
    /// Base concurrency for the worker phases.
    pub(crate) speed: usize,
    /// Format flags.
    pub(crate) format: ScrapeFormat,
    /// Operator contact address, embedded in the User-Agent and the footer.
    pub(crate) admin_email: String,
    /// Override for the main-page article id.
    pub(crate) main_page: Option<String>,
    /// Optional line-per-title article list file.
    pub(crate) article_list: Option<PathBuf>,
    /// Optional base URL of the etag-addressed blob cache.
    pub(crate) blob_cache_url: Option<String>,
    /// Optional base URL of a locally deployed parser, used when both remote
    /// render endpoints are unavailable.
    pub(crate) local_parser_url: Option<String>,
    /// Optional credentials for `action=login`.
    pub(crate) login: Option<(String, String)>,
    /// Per-request timeout.
    pub(crate) req_timeout: Duration,
    /// Leave the scratch cache in place at shutdown.
    pub(crate) skip_cache_cleaning: bool,
    /// Disable the empty-paragraph removal pass.
    pub(crate) keep_empty_paragraphs: bool,
    /// Apply the conservative whitespace minification to produced HTML.
    pub(crate) minify_html: bool,
    /// Custom archive description ("about" metadata entry).
    pub(crate) description: String,
    /// Publisher recorded in the archive metadata.
    pub(crate) publisher: String,
}

impl ScrapeConfig {
    pub fn wiki_url(&self) -> &str {
        &self.wiki_url
    }

    pub fn output_dir(&self) -> &PathBuf {
        &self.output_dir
    }

    pub fn cache_dir(&self) -> &PathBuf {
        &self.cache_dir
    }

    pub fn speed(&self) -> usize {
        self.speed
    }

    pub fn format(&self) -> ScrapeFormat {
        self.format
    }

    pub fn admin_email(&self) -> &str {
        &self.admin_email
    }

    pub fn main_page(&self) -> Option<&str> {
        self.main_page.as_deref()
    }

    pub fn article_list(&self) -> Option<&PathBuf> {
        self.article_list.as_ref()
    }

    pub fn blob_cache_url(&self) -> Option<&str> {
        self.blob_cache_url.as_deref()
    }

    pub fn local_parser_url(&self) -> Option<&str> {
        self.local_parser_url.as_deref()
    }

    pub fn login(&self) -> Option<(&str, &str)> {
        self.login.as_ref().map(|(u, p)| (u.as_str(), p.as_str()))
    }

    pub fn req_timeout(&self) -> Duration {
        self.req_timeout
    }

    pub fn skip_cache_cleaning(&self) -> bool {
        self.skip_cache_cleaning
    }

    pub fn keep_empty_paragraphs(&self) -> bool {
        self.keep_empty_paragraphs
    }

    pub fn minify_html(&self) -> bool {
        self.minify_html
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn publisher(&self) -> &str {
        &self.publisher
    }

    /// User-Agent sent on every outbound request.
    #[must_use]
    pub fn user_agent(&self) -> String {
        format!(
            "wikiscrape/{} ({})",
            env!("CARGO_PKG_VERSION"),
            self.admin_email
        )
    }
}

pub(crate) fn default_speed() -> usize {
    DEFAULT_SPEED
}

pub(crate) fn default_req_timeout() -> Duration {
    Duration::from_secs(DEFAULT_REQ_TIMEOUT_SECS)
}
