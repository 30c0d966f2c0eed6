//! Client for the optional etag-addressed blob cache.
//!
//! Objects are keyed by the scheme-stripped media URL. `GET` returns the
//! stored body with its entity-tag; `PUT` stores a body together with the
//! etag observed upstream, so a later run can revalidate with
//! `If-None-Match` instead of re-downloading.

use reqwest::{Client, StatusCode};

use crate::error::{Result, ScrapeError};

/// An object fetched from the blob cache.
#[derive(Debug, Clone)]
pub struct CachedObject {
    pub body: Vec<u8>,
    pub etag: Option<String>,
    pub content_type: Option<String>,
}

pub struct BlobCacheClient {
    base_url: String,
    client: Client,
}

impl BlobCacheClient {
    /// `base_url` must carry a trailing slash; keys are appended verbatim.
    #[must_use]
    pub fn new(base_url: String, client: Client) -> Self {
        Self { base_url, client }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}{key}", self.base_url)
    }

    /// Fetch the object under `key`, or `None` when the cache has no entry.
    pub async fn get(&self, key: &str) -> Result<Option<CachedObject>> {
        let url = self.object_url(key);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ScrapeError::from_transport(&url, &e))?;

        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let etag = header_string(&resp, reqwest::header::ETAG);
                let content_type = header_string(&resp, reqwest::header::CONTENT_TYPE);
                let body = resp
                    .bytes()
                    .await
                    .map_err(|e| ScrapeError::from_transport(&url, &e))?
                    .to_vec();
                Ok(Some(CachedObject {
                    body,
                    etag,
                    content_type,
                }))
            }
            status => Err(ScrapeError::from_status(&url, status.as_u16())),
        }
    }

    /// Store `body` under `key` with its upstream etag.
    pub async fn put(
        &self,
        key: &str,
        body: Vec<u8>,
        etag: &str,
        content_type: Option<&str>,
    ) -> Result<()> {
        let url = self.object_url(key);
        let mut req = self
            .client
            .put(&url)
            .header(reqwest::header::ETAG, etag)
            .body(body);
        if let Some(ct) = content_type {
            req = req.header(reqwest::header::CONTENT_TYPE, ct);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| ScrapeError::from_transport(&url, &e))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ScrapeError::from_status(&url, resp.status().as_u16()))
        }
    }
}

fn header_string(resp: &reqwest::Response, name: reqwest::header::HeaderName) -> Option<String> {
    resp.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
