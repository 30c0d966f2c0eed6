//! Fluent builder for `ScrapeConfig` with build-time validation.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ScrapeError;
use crate::utils::constants::EMAIL_RE;
use crate::utils::with_trailing_slash;

use super::types::{ScrapeConfig, ScrapeFormat, default_req_timeout, default_speed};

/// Builder for [`ScrapeConfig`].
///
/// `wiki_url`, `output_dir` and `admin_email` are required; everything else
/// has a default. Validation failures are fatal configuration errors.
#[derive(Debug, Default)]
pub struct ScrapeConfigBuilder {
    wiki_url: Option<String>,
    output_dir: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    speed: Option<usize>,
    format: ScrapeFormat,
    admin_email: Option<String>,
    main_page: Option<String>,
    article_list: Option<PathBuf>,
    blob_cache_url: Option<String>,
    local_parser_url: Option<String>,
    login: Option<(String, String)>,
    req_timeout: Option<Duration>,
    skip_cache_cleaning: bool,
    keep_empty_paragraphs: bool,
    minify_html: bool,
    description: Option<String>,
    publisher: Option<String>,
}

impl ScrapeConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn wiki_url(mut self, url: impl Into<String>) -> Self {
        self.wiki_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn speed(mut self, speed: usize) -> Self {
        self.speed = Some(speed);
        self
    }

    /// Parse the format token into the orthogonal flags.
    #[must_use]
    pub fn format_token(mut self, token: &str) -> Self {
        self.format = ScrapeFormat::from_token(token);
        self
    }

    #[must_use]
    pub fn admin_email(mut self, email: impl Into<String>) -> Self {
        self.admin_email = Some(email.into());
        self
    }

    #[must_use]
    pub fn main_page(mut self, id: impl Into<String>) -> Self {
        self.main_page = Some(id.into());
        self
    }

    #[must_use]
    pub fn article_list(mut self, path: impl Into<PathBuf>) -> Self {
        self.article_list = Some(path.into());
        self
    }

    #[must_use]
    pub fn blob_cache_url(mut self, url: impl Into<String>) -> Self {
        self.blob_cache_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn local_parser_url(mut self, url: impl Into<String>) -> Self {
        self.local_parser_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn login(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.login = Some((user.into(), password.into()));
        self
    }

    #[must_use]
    pub fn req_timeout(mut self, timeout: Duration) -> Self {
        self.req_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn skip_cache_cleaning(mut self, skip: bool) -> Self {
        self.skip_cache_cleaning = skip;
        self
    }

    #[must_use]
    pub fn keep_empty_paragraphs(mut self, keep: bool) -> Self {
        self.keep_empty_paragraphs = keep;
        self
    }

    #[must_use]
    pub fn minify_html(mut self, minify: bool) -> Self {
        self.minify_html = minify;
        self
    }

    #[must_use]
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    #[must_use]
    pub fn publisher(mut self, name: impl Into<String>) -> Self {
        self.publisher = Some(name.into());
        self
    }

    /// Validate and produce the immutable config.
    pub fn build(self) -> Result<ScrapeConfig, ScrapeError> {
        let wiki_url = self
            .wiki_url
            .ok_or_else(|| ScrapeError::Config("wiki_url is required".into()))?;
        url::Url::parse(&wiki_url)
            .map_err(|e| ScrapeError::Config(format!("invalid wiki_url '{wiki_url}': {e}")))?;

        let output_dir = self
            .output_dir
            .ok_or_else(|| ScrapeError::Config("output_dir is required".into()))?;

        let admin_email = self
            .admin_email
            .ok_or_else(|| ScrapeError::Config("admin_email is required".into()))?;
        if !EMAIL_RE.is_match(&admin_email) {
            return Err(ScrapeError::Config(format!(
                "invalid admin email '{admin_email}'"
            )));
        }

        let speed = self.speed.unwrap_or_else(default_speed);
        if speed == 0 {
            return Err(ScrapeError::Config("speed must be at least 1".into()));
        }

        let cache_dir = self.cache_dir.unwrap_or_else(|| output_dir.join(".cache"));

        Ok(ScrapeConfig {
            wiki_url: with_trailing_slash(&wiki_url),
            output_dir,
            cache_dir,
            speed,
            format: self.format,
            admin_email,
            main_page: self.main_page,
            article_list: self.article_list,
            blob_cache_url: self.blob_cache_url.map(|u| with_trailing_slash(&u)),
            local_parser_url: self.local_parser_url.map(|u| with_trailing_slash(&u)),
            login: self.login,
            req_timeout: self.req_timeout.unwrap_or_else(default_req_timeout),
            skip_cache_cleaning: self.skip_cache_cleaning,
            keep_empty_paragraphs: self.keep_empty_paragraphs,
            minify_html: self.minify_html,
            description: self.description.unwrap_or_default(),
            publisher: self.publisher.unwrap_or_else(|| "wikiscrape".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> ScrapeConfigBuilder {
        ScrapeConfigBuilder::new()
            .wiki_url("https://en.wikipedia.org")
            .output_dir("/tmp/out")
            .admin_email("ops@example.org")
    }

    #[test]
    fn build_applies_defaults_and_normalisation() {
        let cfg = base().build().unwrap();
        assert_eq!(cfg.wiki_url(), "https://en.wikipedia.org/");
        assert_eq!(cfg.speed(), crate::utils::constants::DEFAULT_SPEED);
        assert!(cfg.cache_dir().starts_with(cfg.output_dir()));
        assert!(cfg.user_agent().contains("ops@example.org"));
    }

    #[test]
    fn invalid_email_is_a_config_error() {
        let err = base().admin_email("not-an-email").build().unwrap_err();
        assert!(matches!(err, ScrapeError::Config(_)));
    }

    #[test]
    fn zero_speed_is_rejected() {
        let err = base().speed(0).build().unwrap_err();
        assert!(matches!(err, ScrapeError::Config(_)));
    }
}
