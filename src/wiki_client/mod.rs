//! Typed read access to the remote wiki's query API.

pub mod continuation;
pub mod types;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::downloader::Downloader;
use crate::error::{Result, ScrapeError};
use crate::utils::{title_to_id, with_trailing_slash};

use continuation::{extract_cursors, filter_continued_props, merge_values};
use types::{ArticleDetail, Namespace, NamespaceMap, PageRef, TextDirection, Thumbnail, WikiMetadata};

pub struct WikiClient {
    downloader: Arc<Downloader>,
    /// Wiki root, trailing slash.
    base_url: String,
    /// `api.php` endpoint.
    api_url: String,
}

impl WikiClient {
    #[must_use]
    pub fn new(downloader: Arc<Downloader>, base_url: &str) -> Self {
        let base_url = with_trailing_slash(base_url);
        let api_url = format!("{base_url}w/api.php");
        Self {
            downloader,
            base_url,
            api_url,
        }
    }

    #[must_use]
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn query_url(&self, pairs: &[(&str, &str)]) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in pairs {
            query.append_pair(key, value);
        }
        format!("{}?{}", self.api_url, query.finish())
    }

    /// Inspect the response envelope: fatal on a wiki database error, log
    /// other errors and warnings. Returns `false` when the caller should
    /// stop its loop and keep the partial data.
    fn handle_envelope(&self, response: &Value) -> Result<bool> {
        if let Some(warnings) = response["warnings"].as_object() {
            for (section, body) in warnings {
                let text = body["*"]
                    .as_str()
                    .or_else(|| body["warnings"].as_str())
                    .unwrap_or_default();
                log::warn!("api warning [{section}]: {text}");
                if section == "query" && text.contains("coordinates") {
                    self.downloader.caps.disable_coordinates();
                    log::warn!("coordinates prop unsupported; disabling coordinate queries");
                }
            }
        }
        if let Some(error) = response.get("error") {
            let code = error["code"].as_str().unwrap_or_default();
            if code == "DB_ERROR" {
                return Err(ScrapeError::WikiDatabase(
                    error["info"].as_str().unwrap_or(code).to_string(),
                ));
            }
            log::error!(
                "api error [{code}]: {}",
                error["info"].as_str().unwrap_or_default()
            );
            return Ok(false);
        }
        Ok(true)
    }

    fn detail_props(&self, include_thumbnail: bool) -> String {
        let mut props = vec!["revisions", "redirects", "categories"];
        if self.downloader.caps.coordinates_available() {
            props.push("coordinates");
        }
        if include_thumbnail {
            props.push("pageimages");
        }
        props.join("|")
    }

    /// Fetch site-wide metadata: general info, namespaces, aliases.
    pub async fn get_metadata(&self) -> Result<WikiMetadata> {
        let url = self.query_url(&[
            ("action", "query"),
            ("meta", "siteinfo"),
            (
                "siprop",
                "general|namespaces|namespacealiases|statistics",
            ),
            ("format", "json"),
        ]);
        let response = self.downloader.get_json(&url).await?;
        self.handle_envelope(&response)?;

        let general = &response["query"]["general"];
        let main_page_raw = general["mainpage"].as_str().ok_or_else(|| {
            ScrapeError::Malformed {
                url: url.clone(),
                reason: "siteinfo without general.mainpage".into(),
            }
        })?;

        let lang_iso2 = general["lang"].as_str().unwrap_or("en").to_string();
        let explicit_iso3 = general["lang3"].as_str();

        let mut namespaces = NamespaceMap::default();
        if let Some(ns_map) = response["query"]["namespaces"].as_object() {
            for ns in ns_map.values() {
                let Some(id) = ns["id"].as_i64() else { continue };
                if id < 0 {
                    continue;
                }
                let canonical = ns["canonical"].as_str().unwrap_or_default().to_string();
                let localized = ns["*"].as_str().unwrap_or(&canonical).to_string();
                namespaces.register(Namespace {
                    id,
                    canonical,
                    localized,
                    is_content: ns.get("content").is_some(),
                    allowed_subpages: ns.get("subpages").is_some(),
                });
            }
        }
        if let Some(aliases) = response["query"]["namespacealiases"].as_array() {
            for alias in aliases {
                if let (Some(name), Some(id)) = (alias["*"].as_str(), alias["id"].as_i64()) {
                    namespaces.register_alias(name, id);
                }
            }
        }

        let article_path = general["articlepath"].as_str().unwrap_or("/wiki/$1");
        let web_path = article_path.trim_start_matches('/').replace("$1", "");
        let web_url = with_trailing_slash(&format!("{}{web_path}", self.base_url));

        Ok(WikiMetadata {
            base_url: self.base_url.clone(),
            api_url: self.api_url.clone(),
            rest_url: format!("{}api/rest_v1/", self.base_url),
            ve_url: self.api_url.clone(),
            web_url,
            main_page: title_to_id(main_page_raw),
            site_name: general["sitename"].as_str().unwrap_or_default().to_string(),
            text_dir: if general.get("rtl").is_some() {
                TextDirection::Rtl
            } else {
                TextDirection::Ltr
            },
            lang_iso3: WikiMetadata::derive_iso3(&lang_iso2, explicit_iso3),
            lang_iso2,
            namespaces,
        })
    }

    /// Fetch details for a batch of titles, draining every continuation
    /// cursor and deep-merging the partial pages.
    pub async fn get_article_details_by_ids(
        &self,
        ids: &[String],
        include_thumbnail: bool,
    ) -> Result<HashMap<String, ArticleDetail>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let titles = ids.join("|");
        let props = self.detail_props(include_thumbnail);

        let mut pages_acc: Map<String, Value> = Map::new();
        let mut sent_cursors: BTreeMap<String, String> = BTreeMap::new();

        loop {
            let mut pairs: Vec<(&str, &str)> = vec![
                ("action", "query"),
                ("format", "json"),
                ("prop", &props),
                ("titles", &titles),
                ("rdlimit", "max"),
                ("colimit", "max"),
                ("cllimit", "max"),
            ];
            if include_thumbnail {
                pairs.push(("pilimit", "max"));
                pairs.push(("pithumbsize", "300"));
            }
            for (key, value) in &sent_cursors {
                pairs.push((key.as_str(), value.as_str()));
            }

            let response = self.downloader.get_json(&self.query_url(&pairs)).await?;
            let keep_going = self.handle_envelope(&response)?;
            merge_page_window(&mut pages_acc, &response, &sent_cursors);
            if !keep_going {
                break;
            }

            let cursors = extract_cursors(&response);
            if cursors.is_empty() {
                break;
            }
            sent_cursors = cursors;
        }

        Ok(normalize_pages(pages_acc))
    }

    /// Enumerate one content namespace through `generator=allpages`.
    ///
    /// The outer `gapcontinue` cursor is handed back so the caller can
    /// resume; inner prop continuations are drained before returning.
    pub async fn get_article_details_by_namespace(
        &self,
        namespace: i64,
        gapcontinue: &str,
    ) -> Result<(HashMap<String, ArticleDetail>, Option<String>)> {
        let ns = namespace.to_string();
        let props = self.detail_props(false);

        let mut pages_acc: Map<String, Value> = Map::new();
        let mut sent_cursors: BTreeMap<String, String> = BTreeMap::new();
        let mut next_gap: Option<String> = None;
        let mut first = true;

        loop {
            let mut pairs: Vec<(&str, &str)> = vec![
                ("action", "query"),
                ("format", "json"),
                ("generator", "allpages"),
                ("gapnamespace", &ns),
                ("gapfilterredir", "nonredirects"),
                ("gaplimit", "max"),
                ("rawcontinue", "true"),
                ("prop", &props),
                ("colimit", "max"),
            ];
            if !gapcontinue.is_empty() {
                pairs.push(("gapcontinue", gapcontinue));
            }
            for (key, value) in &sent_cursors {
                pairs.push((key.as_str(), value.as_str()));
            }

            let response = self.downloader.get_json(&self.query_url(&pairs)).await?;
            let keep_going = self.handle_envelope(&response)?;
            if first {
                merge_page_window(&mut pages_acc, &response, &BTreeMap::new());
            } else {
                merge_page_window(&mut pages_acc, &response, &sent_cursors);
            }

            let mut cursors = extract_cursors(&response);
            if let Some(gap) = cursors.remove("gapcontinue") {
                next_gap = Some(gap);
            }
            first = false;
            if !keep_going || cursors.is_empty() {
                break;
            }
            sent_cursors = cursors;
        }

        Ok((normalize_pages(pages_acc), next_gap))
    }

    /// List the members of a category, following `cmcontinue` until
    /// exhausted.
    pub async fn get_sub_categories(&self, title: &str) -> Result<Vec<PageRef>> {
        let mut members = Vec::new();
        let mut cmcontinue = String::new();

        loop {
            let mut pairs: Vec<(&str, &str)> = vec![
                ("action", "query"),
                ("format", "json"),
                ("list", "categorymembers"),
                ("cmtitle", title),
                ("cmlimit", "max"),
            ];
            if !cmcontinue.is_empty() {
                pairs.push(("cmcontinue", &cmcontinue));
            }

            let response = self.downloader.get_json(&self.query_url(&pairs)).await?;
            let keep_going = self.handle_envelope(&response)?;
            members.extend(page_refs(&response["query"]["categorymembers"]));
            if !keep_going {
                break;
            }
            match extract_cursors(&response).remove("cmcontinue") {
                Some(next) => cmcontinue = next,
                None => break,
            }
        }
        Ok(members)
    }

    /// Redirect pages pointing at `title`. One query per call.
    pub async fn get_backlink_redirects(&self, title: &str) -> Result<Vec<PageRef>> {
        let url = self.query_url(&[
            ("action", "query"),
            ("format", "json"),
            ("list", "backlinks"),
            ("bltitle", title),
            ("blfilterredir", "redirects"),
            ("bllimit", "max"),
        ]);
        let response = self.downloader.get_json(&url).await?;
        self.handle_envelope(&response)?;
        Ok(page_refs(&response["query"]["backlinks"]))
    }

    /// Bot login through `action=login`.
    pub async fn login(&self, user: &str, password: &str) -> Result<()> {
        let token_url = self.query_url(&[
            ("action", "query"),
            ("format", "json"),
            ("meta", "tokens"),
            ("type", "login"),
        ]);
        let response = self.downloader.get_json(&token_url).await?;
        let token = response["query"]["tokens"]["logintoken"]
            .as_str()
            .ok_or_else(|| ScrapeError::Malformed {
                url: token_url.clone(),
                reason: "missing login token".into(),
            })?
            .to_string();

        let response = self
            .downloader
            .post_form(
                &self.api_url,
                &[
                    ("action", "login"),
                    ("format", "json"),
                    ("lgname", user),
                    ("lgpassword", password),
                    ("lgtoken", &token),
                ],
            )
            .await?;
        if response["login"]["result"].as_str() == Some("Success") {
            log::info!("logged in as {user}");
            Ok(())
        } else {
            Err(ScrapeError::Fatal(format!(
                "login failed for {user}: {}",
                response["login"]["result"].as_str().unwrap_or("unknown")
            )))
        }
    }
}

/// Merge one response's `query.pages` window into the accumulator,
/// restricting continuation pages to the props whose cursor was echoed.
fn merge_page_window(
    acc: &mut Map<String, Value>,
    response: &Value,
    sent_cursors: &BTreeMap<String, String>,
) {
    let Some(pages) = response["query"]["pages"].as_object() else {
        return;
    };
    for (page_id, page) in pages {
        let contribution = if sent_cursors.is_empty() {
            page.clone()
        } else {
            filter_continued_props(page, sent_cursors)
        };
        match acc.get_mut(page_id) {
            Some(slot) => merge_values(slot, contribution),
            None => {
                acc.insert(page_id.clone(), contribution);
            }
        }
    }
}

/// Re-key pages by article id, drop `missing` entries, flatten the
/// canonical revision.
fn normalize_pages(pages: Map<String, Value>) -> HashMap<String, ArticleDetail> {
    let mut out = HashMap::new();
    for page in pages.values() {
        if page.get("missing").is_some() {
            continue;
        }
        let Some(title) = page["title"].as_str() else {
            continue;
        };
        let id = title_to_id(title);
        out.insert(id.clone(), detail_from_page(&id, page));
    }
    out
}

fn detail_from_page(id: &str, page: &Value) -> ArticleDetail {
    let coordinates = page["coordinates"][0].as_object().and_then(|c| {
        match (c.get("lat").and_then(Value::as_f64), c.get("lon").and_then(Value::as_f64)) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    });
    let thumbnail = page["thumbnail"].as_object().and_then(|t| {
        t.get("source").and_then(Value::as_str).map(|source| Thumbnail {
            source: source.to_string(),
            width: t.get("width").and_then(Value::as_u64).unwrap_or(0) as u32,
            height: t.get("height").and_then(Value::as_u64).unwrap_or(0) as u32,
        })
    });

    ArticleDetail {
        title: id.to_string(),
        page_id: page["pageid"].as_u64().unwrap_or(0),
        ns: page["ns"].as_i64().unwrap_or(0),
        revision_id: page["revisions"][0]["revid"].as_u64().unwrap_or(0),
        coordinates,
        redirects: page_refs(&page["redirects"]),
        categories: page_refs(&page["categories"]),
        thumbnail,
        ..Default::default()
    }
}

fn page_refs(value: &Value) -> Vec<PageRef> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    item["title"].as_str().map(|title| PageRef {
                        title: title.to_string(),
                        page_id: item["pageid"].as_u64().unwrap_or(0),
                        ns: item["ns"].as_i64().unwrap_or(0),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}
