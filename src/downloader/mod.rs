//! Adaptive-concurrency HTTP layer.
//!
//! Every outbound request of the pipeline goes through here: JSON queries,
//! byte-stream downloads with blob-cache revalidation and image
//! optimisation, the startup capability probe, and the article fetch that
//! feeds the renderer.

pub mod backoff;
pub mod blob_cache;
pub mod http_cache;
pub mod optim;
pub mod slots;
pub mod url_cache;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use reqwest::header;
use serde_json::Value;

use crate::config::ScrapeConfig;
use crate::error::{Result, ScrapeError};
use crate::utils::constants::{FAIL_AFTER, IMAGE_URL_RE};
use crate::utils::strip_http;
use crate::wiki_client::types::WikiMetadata;

use backoff::with_backoff;
use blob_cache::BlobCacheClient;
use http_cache::HttpCache;
use optim::ImageOptimizer;
use slots::SlotGate;
use url_cache::UrlPartCache;

/// Probed capability bits, shared between the downloader and the wiki
/// client (which may switch coordinates off on an upstream warning).
#[derive(Debug)]
pub struct CapabilityFlags {
    rest_api: AtomicBool,
    ve_api: AtomicBool,
    coordinates: AtomicBool,
}

impl Default for CapabilityFlags {
    fn default() -> Self {
        Self {
            rest_api: AtomicBool::new(false),
            ve_api: AtomicBool::new(false),
            coordinates: AtomicBool::new(true),
        }
    }
}

impl CapabilityFlags {
    #[must_use]
    pub fn rest_api_available(&self) -> bool {
        self.rest_api.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn ve_api_available(&self) -> bool {
        self.ve_api.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn coordinates_available(&self) -> bool {
        self.coordinates.load(Ordering::Acquire)
    }

    pub fn set_rest_api(&self, available: bool) {
        self.rest_api.store(available, Ordering::Release);
    }

    pub fn set_ve_api(&self, available: bool) {
        self.ve_api.store(available, Ordering::Release);
    }

    pub fn disable_coordinates(&self) {
        self.coordinates.store(false, Ordering::Release);
    }
}

/// JS/CSS modules (and the config-vars script) one article depends on.
#[derive(Debug, Clone, Default)]
pub struct ModuleDependencies {
    pub js: Vec<String>,
    pub css: Vec<String>,
    pub js_config_vars: Option<String>,
}

/// Outcome of one conditional fetch attempt.
enum FetchOutcome {
    NotModified,
    Fresh {
        bytes: Vec<u8>,
        headers: HashMap<String, String>,
    },
}

pub struct Downloader {
    client: reqwest::Client,
    slots: SlotGate,
    url_cache: UrlPartCache,
    blob_cache: Option<Arc<BlobCacheClient>>,
    http_cache: Option<HttpCache>,
    optimizer: ImageOptimizer,
    pub caps: Arc<CapabilityFlags>,
    speed: usize,
    /// Article fetch prefix chosen by the capability probe.
    base_url: RwLock<String>,
    /// Prefix used for the main page (desktop rendering path).
    base_url_main_page: RwLock<String>,
}

impl Downloader {
    /// Build the shared HTTP layer for a run. The scratch cache directory is
    /// created eagerly; the blob cache client is configured when the run has
    /// one.
    pub async fn new(config: &ScrapeConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.req_timeout())
            .user_agent(config.user_agent())
            .build()?;

        let blob_cache = config
            .blob_cache_url()
            .map(|base| Arc::new(BlobCacheClient::new(base.to_string(), client.clone())));
        let http_cache = Some(HttpCache::open(config.cache_dir().clone()).await?);

        Ok(Self {
            client,
            slots: SlotGate::new(config.speed() * 10),
            url_cache: UrlPartCache::new(),
            blob_cache,
            http_cache,
            optimizer: ImageOptimizer::discover(),
            caps: Arc::new(CapabilityFlags::default()),
            speed: config.speed(),
            base_url: RwLock::new(String::new()),
            base_url_main_page: RwLock::new(String::new()),
        })
    }

    #[must_use]
    pub fn speed(&self) -> usize {
        self.speed
    }

    #[must_use]
    pub fn slot_gate(&self) -> &SlotGate {
        &self.slots
    }

    /// Compress a URL for storage in the file queue.
    #[must_use]
    pub fn serialize_url(&self, url: &str) -> String {
        self.url_cache.serialize_url(url)
    }

    fn resolve_url(&self, url: &str) -> String {
        self.url_cache.deserialize_url(url)
    }

    fn check_status(&self, url: &str, status: reqwest::StatusCode) -> Result<()> {
        if status.as_u16() == 429 {
            self.slots.shrink_on_throttle();
            return Err(ScrapeError::Throttled(url.to_string()));
        }
        if !status.is_success() {
            return Err(ScrapeError::from_status(url, status.as_u16()));
        }
        Ok(())
    }

    /// GET a JSON document, with slot gating and backoff.
    pub async fn get_json(&self, url: &str) -> Result<Value> {
        let url = self.resolve_url(url);
        with_backoff(&url, FAIL_AFTER, || {
            let url = url.clone();
            async move {
                let _slot = self.slots.claim().await;
                let resp = self
                    .client
                    .get(&url)
                    .header(header::ACCEPT, "application/json")
                    .send()
                    .await
                    .map_err(|e| ScrapeError::from_transport(&url, &e))?;
                self.check_status(&url, resp.status())?;
                resp.json::<Value>().await.map_err(|e| ScrapeError::Malformed {
                    url: url.clone(),
                    reason: e.to_string(),
                })
            }
        })
        .await
    }

    /// POST a form (login flow), with slot gating and backoff.
    pub async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<Value> {
        let url = self.resolve_url(url);
        let owned: Vec<(String, String)> = form
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        with_backoff(&url, FAIL_AFTER, || {
            let url = url.clone();
            let owned = owned.clone();
            async move {
                let _slot = self.slots.claim().await;
                let resp = self
                    .client
                    .post(&url)
                    .form(&owned)
                    .send()
                    .await
                    .map_err(|e| ScrapeError::from_transport(&url, &e))?;
                self.check_status(&url, resp.status())?;
                resp.json::<Value>().await.map_err(|e| ScrapeError::Malformed {
                    url: url.clone(),
                    reason: e.to_string(),
                })
            }
        })
        .await
    }

    /// Download raw bytes, consulting the blob cache for image URLs and
    /// running bitmap responses through the optimisation pipeline.
    pub async fn download_content(
        &self,
        raw_url: &str,
    ) -> Result<(Vec<u8>, HashMap<String, String>)> {
        let url = self.resolve_url(raw_url);

        if let Some(cache) = &self.http_cache {
            if let Some(hit) = cache.lookup(&url).await {
                return Ok(hit);
            }
        }

        let is_image = IMAGE_URL_RE.is_match(&url);
        let cached = match (&self.blob_cache, is_image) {
            (Some(blob), true) => match blob.get(&strip_http(&url)).await {
                Ok(hit) => hit,
                Err(e) => {
                    log::warn!("blob cache lookup failed for {url}: {e}");
                    None
                }
            },
            _ => None,
        };
        let cached_etag = cached.as_ref().and_then(|c| c.etag.clone());

        let outcome = with_backoff(&url, FAIL_AFTER, || {
            let url = url.clone();
            let etag = cached_etag.clone();
            async move {
                let _slot = self.slots.claim().await;
                let mut req = self.client.get(&url);
                if let Some(etag) = &etag {
                    req = req.header(header::IF_NONE_MATCH, etag.clone());
                }
                let resp = req
                    .send()
                    .await
                    .map_err(|e| ScrapeError::from_transport(&url, &e))?;
                let status = resp.status();
                if status == reqwest::StatusCode::NOT_MODIFIED {
                    return Ok(FetchOutcome::NotModified);
                }
                self.check_status(&url, status)?;
                let headers = header_map(resp.headers());
                let bytes = resp
                    .bytes()
                    .await
                    .map_err(|e| ScrapeError::from_transport(&url, &e))?
                    .to_vec();
                Ok(FetchOutcome::Fresh { bytes, headers })
            }
        })
        .await?;

        let (bytes, headers) = match outcome {
            FetchOutcome::NotModified => {
                // Contract: a 304 can only happen when we sent an etag from
                // the cached object.
                let cached = cached.ok_or_else(|| ScrapeError::Malformed {
                    url: url.clone(),
                    reason: "304 without a cached object".into(),
                })?;
                let mut headers = HashMap::new();
                if let Some(ct) = &cached.content_type {
                    headers.insert("content-type".to_string(), ct.clone());
                }
                if let Some(etag) = &cached.etag {
                    headers.insert("etag".to_string(), etag.clone());
                }
                (cached.body, headers)
            }
            FetchOutcome::Fresh { bytes, headers } => {
                let etag = headers.get("etag").cloned().unwrap_or_default();
                if is_image && !etag.is_empty() {
                    if let Some(blob) = &self.blob_cache {
                        let blob = Arc::clone(blob);
                        let key = strip_http(&url);
                        let body = bytes.clone();
                        let content_type = headers.get("content-type").cloned();
                        tokio::spawn(async move {
                            if let Err(e) =
                                blob.put(&key, body, &etag, content_type.as_deref()).await
                            {
                                log::warn!("blob cache upload failed for {key}: {e}");
                            }
                        });
                    }
                }

                let content_type = headers.get("content-type").cloned().unwrap_or_default();
                let bytes = if ImageOptimizer::handles(&content_type) {
                    self.optimizer.optimise(&content_type, bytes).await
                } else {
                    bytes
                };
                (bytes, headers)
            }
        };

        if let Some(cache) = &self.http_cache {
            cache.store(&url, &bytes, &headers).await;
        }
        Ok((bytes, headers))
    }

    /// Probe the REST and visual-editor endpoints with the main page and
    /// pick the article base URLs.
    ///
    /// When both remote renderers fail: re-point at the configured local
    /// parser if fallback is enabled, otherwise fail the run.
    pub async fn probe_capabilities(
        &self,
        metadata: &WikiMetadata,
        local_parser_url: Option<&str>,
    ) -> Result<()> {
        let main = urlencoding::encode(&metadata.main_page).into_owned();

        let rest_probe = format!("{}page/mobile-sections/{main}", metadata.rest_url);
        let rest_ok = self.probe(&rest_probe).await;
        self.caps.set_rest_api(rest_ok);

        let ve_prefix = format!(
            "{}?action=visualeditor&mobileformat=html&format=json&paction=parse&page=",
            metadata.ve_url.trim_end_matches('/')
        );
        let ve_ok = self.probe(&format!("{ve_prefix}{main}")).await;
        self.caps.set_ve_api(ve_ok);

        log::info!("capabilities: rest={rest_ok} ve={ve_ok}");

        let parse_prefix = format!(
            "{}?action=parse&format=json&prop=text&page=",
            metadata.api_url.trim_end_matches('/')
        );

        if !rest_ok && !ve_ok {
            let Some(local) = local_parser_url else {
                return Err(ScrapeError::Fatal(
                    "no renderer available: REST and visual-editor probes failed \
                     and local parser fallback is disabled"
                        .into(),
                ));
            };
            log::warn!("both remote renderers unavailable; using local parser at {local}");
            let local_prefix = format!("{local}v3/page/pagebundle/");
            *self.base_url.write() = local_prefix.clone();
            *self.base_url_main_page.write() = local_prefix;
            return Ok(());
        }

        *self.base_url.write() = if rest_ok {
            format!("{}page/mobile-sections/", metadata.rest_url)
        } else {
            ve_prefix.clone()
        };
        *self.base_url_main_page.write() = if ve_ok { ve_prefix } else { parse_prefix };
        Ok(())
    }

    async fn probe(&self, url: &str) -> bool {
        match self.client.get(url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                log::debug!("probe failed for {url}: {e}");
                false
            }
        }
    }

    /// Fetch the raw render payload for one article.
    pub async fn get_article(&self, article_id: &str, is_main_page: bool) -> Result<Value> {
        let base = if is_main_page {
            self.base_url_main_page.read().clone()
        } else {
            self.base_url.read().clone()
        };
        let url = format!("{base}{}", urlencoding::encode(article_id));
        self.get_json(&url).await
    }

    /// Fetch the JS/CSS module names (and config vars) an article needs.
    pub async fn get_module_dependencies(
        &self,
        api_url: &str,
        article_id: &str,
    ) -> Result<ModuleDependencies> {
        let url = format!(
            "{}?action=parse&format=json&prop=modules%7Cjsconfigvars%7Cheadhtml&page={}",
            api_url.trim_end_matches('/'),
            urlencoding::encode(article_id)
        );
        let body = self.get_json(&url).await?;
        let parse = &body["parse"];

        let names = |v: &Value| -> Vec<String> {
            v.as_array()
                .map(|a| {
                    a.iter()
                        .filter_map(|m| m.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default()
        };
        let mut js = names(&parse["modules"]);
        js.extend(names(&parse["modulescripts"]));
        let css = names(&parse["modulestyles"]);

        let js_config_vars = parse["jsconfigvars"]
            .as_object()
            .filter(|vars| !vars.is_empty())
            .map(|vars| {
                format!(
                    "window.RLQ = window.RLQ || []; mw.config.set({});",
                    Value::Object(vars.clone())
                )
            });

        Ok(ModuleDependencies {
            js,
            css,
            js_config_vars,
        })
    }

    /// Sweep stale entries out of the run-local response cache.
    pub async fn cleanup_cache(&self) -> anyhow::Result<()> {
        match &self.http_cache {
            Some(cache) => cache.sweep().await,
            None => Ok(()),
        }
    }

    /// Fetch one `load.php` module source.
    pub async fn get_module_source(
        &self,
        base_url: &str,
        lang: &str,
        module: &str,
        scripts: bool,
    ) -> Result<Vec<u8>> {
        let only = if scripts { "scripts" } else { "styles" };
        let url = format!(
            "{base_url}w/load.php?modules={}&only={only}&skin=vector&lang={lang}",
            urlencoding::encode(module)
        );
        let (bytes, _headers) = self.download_content(&url).await?;
        Ok(bytes)
    }
}

fn header_map(headers: &header::HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
        })
        .collect()
}
