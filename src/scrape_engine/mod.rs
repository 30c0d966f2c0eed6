//! Scrape orchestration.
//!
//! Drives the phases in order, each draining before the next begins:
//! metadata and capability probing, article enumeration, the redirect
//! cache, the article scrape, module and site-asset fetching, the two
//! media download passes, and archive finalization.

mod articles;
mod assets;
mod files;
pub mod status;

use std::sync::Arc;

use dashmap::DashSet;
use parking_lot::Mutex;

use crate::archive::ArchiveWriter;
use crate::config::ScrapeConfig;
use crate::downloader::Downloader;
use crate::error::{Result, ScrapeError};
use crate::store::Stores;
use crate::utils::title_to_id;
use crate::wiki_client::WikiClient;

pub use status::ScrapeStatus;

pub struct Scraper {
    config: ScrapeConfig,
    downloader: Arc<Downloader>,
    wiki: Arc<WikiClient>,
    stores: Arc<Stores>,
    writer: Arc<dyn ArchiveWriter>,
    status: Arc<ScrapeStatus>,
    /// Run-wide module dependency sets, order-insensitive.
    js_modules: DashSet<String>,
    css_modules: DashSet<String>,
    /// Taken from the first article reporting a non-empty value.
    js_config_vars: Mutex<Option<String>>,
    /// First archive-writer failure observed by a worker; fatal after the
    /// phase drains.
    writer_failure: Mutex<Option<String>>,
}

impl Scraper {
    pub async fn new(
        config: ScrapeConfig,
        writer: Arc<dyn ArchiveWriter>,
    ) -> anyhow::Result<Self> {
        let downloader = Arc::new(Downloader::new(&config).await?);
        let wiki = Arc::new(WikiClient::new(Arc::clone(&downloader), config.wiki_url()));
        Ok(Self {
            config,
            downloader,
            wiki,
            stores: Stores::new(),
            writer,
            status: Arc::new(ScrapeStatus::default()),
            js_modules: DashSet::new(),
            css_modules: DashSet::new(),
            js_config_vars: Mutex::new(None),
            writer_failure: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn status(&self) -> &ScrapeStatus {
        &self.status
    }

    #[must_use]
    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    /// Run the whole scrape. On success the archive has been finalized and
    /// the stores cleared.
    pub async fn run(&self) -> Result<()> {
        // Phase 1: login, metadata, capabilities, directories.
        if let Some((user, password)) = self.config.login() {
            self.wiki.login(user, password).await?;
        }
        let metadata = self.wiki.get_metadata().await?;
        self.downloader
            .probe_capabilities(&metadata, self.config.local_parser_url())
            .await?;
        tokio::fs::create_dir_all(self.config.output_dir())
            .await
            .map_err(|e| ScrapeError::Fatal(format!("creating output directory: {e}")))?;

        let mut main_page = self
            .config
            .main_page()
            .map(title_to_id)
            .unwrap_or_else(|| metadata.main_page.clone());

        // Phase 2: enumeration (articles, category members, redirects).
        articles::enumerate(self, &metadata, &main_page).await?;

        // Phase 3: the configured main page may itself be a redirect.
        if let Some(target) = self.stores.redirect_target(&main_page) {
            log::info!("main page {main_page} is a redirect; following to {target}");
            main_page = target;
        }

        // Phase 4: article scrape.
        articles::scrape_articles(self, &metadata, &main_page).await?;

        // Phase 5: module fetch, with the offline start-up hacks.
        assets::fetch_modules(self, &metadata).await?;

        // Phase 6: stylesheets, favicon, metadata entries.
        assets::fetch_site_assets(self, &metadata, &main_page).await?;
        assets::write_metadata(self, &metadata).await?;

        // Phases 7 and 8: media downloads, strictly sequenced passes.
        files::download_files(self).await?;

        // Redirect entries for sources whose target was mirrored.
        articles::write_redirect_entries(self, &metadata).await?;

        // Phase 9: finalize and tear down run state.
        self.writer
            .finalize()
            .await
            .map_err(|e| ScrapeError::Fatal(format!("archive finalize failed: {e}")))?;
        if !self.config.skip_cache_cleaning() {
            if let Err(e) = self.downloader.cleanup_cache().await {
                log::warn!("cache cleaning failed: {e}");
            }
        }
        self.stores.clear();

        let (article_ok, article_fail) = self.status.articles();
        let (file_ok, file_fail) = self.status.files();
        log::info!(
            "scrape finished: {article_ok} articles ({article_fail} failed), \
             {file_ok} files ({file_fail} failed)"
        );
        Ok(())
    }

    /// Record a writer failure observed inside a worker.
    pub(crate) fn record_writer_failure(&self, error: &anyhow::Error) {
        let mut slot = self.writer_failure.lock();
        if slot.is_none() {
            *slot = Some(format!("{error:#}"));
        }
    }

    /// Surface a recorded writer failure as the fatal error it is.
    pub(crate) fn check_writer(&self) -> Result<()> {
        match self.writer_failure.lock().take() {
            Some(message) => Err(ScrapeError::Fatal(format!(
                "archive writer failed: {message}"
            ))),
            None => Ok(()),
        }
    }

    pub(crate) fn capture_module_dependencies(
        &self,
        deps: &crate::downloader::ModuleDependencies,
    ) {
        for module in &deps.js {
            self.js_modules.insert(module.clone());
        }
        for module in &deps.css {
            self.css_modules.insert(module.clone());
        }
        if let Some(vars) = &deps.js_config_vars {
            let mut slot = self.js_config_vars.lock();
            if slot.is_none() {
                *slot = Some(vars.clone());
            }
        }
    }

    pub(crate) fn has_js_config_vars(&self) -> bool {
        self.js_config_vars.lock().is_some()
    }

    pub(crate) fn config(&self) -> &ScrapeConfig {
        &self.config
    }

    pub(crate) fn downloader(&self) -> &Arc<Downloader> {
        &self.downloader
    }

    pub(crate) fn wiki(&self) -> &Arc<WikiClient> {
        &self.wiki
    }

    pub(crate) fn writer(&self) -> &Arc<dyn ArchiveWriter> {
        &self.writer
    }

    pub(crate) fn sorted_js_modules(&self) -> Vec<String> {
        let mut modules: Vec<String> = self.js_modules.iter().map(|m| m.key().clone()).collect();
        modules.sort();
        modules
    }

    pub(crate) fn sorted_css_modules(&self) -> Vec<String> {
        let mut modules: Vec<String> =
            self.css_modules.iter().map(|m| m.key().clone()).collect();
        modules.sort();
        modules
    }

    pub(crate) fn js_config_vars_script(&self) -> Option<String> {
        self.js_config_vars.lock().clone()
    }
}
