//! Typed records produced by the wiki client.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::utils::{iso2_to_iso3, lcfirst, title_to_id, ucfirst};

/// Reading direction of the wiki's content language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextDirection {
    Ltr,
    Rtl,
}

impl TextDirection {
    #[must_use]
    pub fn as_html(&self) -> &'static str {
        match self {
            Self::Ltr => "ltr",
            Self::Rtl => "rtl",
        }
    }
}

/// One wiki namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    pub id: i64,
    pub canonical: String,
    pub localized: String,
    pub is_content: bool,
    pub allowed_subpages: bool,
}

/// Registry mapping every name variant of a namespace to its record.
#[derive(Debug, Clone, Default)]
pub struct NamespaceMap {
    by_name: HashMap<String, Namespace>,
}

impl NamespaceMap {
    /// Register a namespace under its lowercased-first, uppercased-first,
    /// canonical and localized name variants.
    pub fn register(&mut self, ns: Namespace) {
        for variant in [
            ns.canonical.clone(),
            ns.localized.clone(),
            ucfirst(&ns.localized),
            lcfirst(&ns.localized),
        ] {
            self.by_name.insert(title_to_id(&variant), ns.clone());
        }
    }

    /// Register an alias name for an already-known namespace id.
    pub fn register_alias(&mut self, alias: &str, id: i64) {
        if let Some(ns) = self.by_name.values().find(|n| n.id == id).cloned() {
            self.by_name.insert(title_to_id(alias), ns);
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Namespace> {
        self.by_name.get(&title_to_id(name))
    }

    /// Namespace of an article id, read from its `Prefix:` part.
    #[must_use]
    pub fn of_article(&self, article_id: &str) -> Option<&Namespace> {
        article_id
            .split_once(':')
            .and_then(|(prefix, _)| self.get(prefix))
    }

    /// All distinct content namespaces.
    #[must_use]
    pub fn content_namespaces(&self) -> Vec<Namespace> {
        let mut seen = std::collections::HashSet::new();
        let mut out: Vec<Namespace> = self
            .by_name
            .values()
            .filter(|ns| ns.is_content && seen.insert(ns.id))
            .cloned()
            .collect();
        out.sort_by_key(|ns| ns.id);
        out
    }

    /// Namespaces walked by the default enumeration: every content
    /// namespace plus the category namespace. `$wgContentNamespaces` on a
    /// live install almost never includes categories, yet category pages
    /// are mirrored like any other article.
    #[must_use]
    pub fn enumeration_namespaces(&self) -> Vec<Namespace> {
        let mut seen = std::collections::HashSet::new();
        let mut out: Vec<Namespace> = self
            .by_name
            .values()
            .filter(|ns| ns.is_content || ns.id == CATEGORY_NAMESPACE || ns.canonical == "Category")
            .filter(|ns| seen.insert(ns.id))
            .cloned()
            .collect();
        out.sort_by_key(|ns| ns.id);
        out
    }
}

/// The well-known id of the category namespace.
pub const CATEGORY_NAMESPACE: i64 = 14;

/// Site-wide metadata fetched once at startup.
#[derive(Debug, Clone)]
pub struct WikiMetadata {
    /// Root of the wiki (trailing slash).
    pub base_url: String,
    /// `api.php` endpoint (trailing slash).
    pub api_url: String,
    /// `rest_v1` endpoint (trailing slash).
    pub rest_url: String,
    /// Visual-editor endpoint (trailing slash).
    pub ve_url: String,
    /// Public page URL prefix, e.g. `https://host/wiki/` (trailing slash).
    pub web_url: String,
    /// Main-page article id (spaces already replaced by the delimiter).
    pub main_page: String,
    pub site_name: String,
    pub text_dir: TextDirection,
    pub lang_iso2: String,
    pub lang_iso3: String,
    pub namespaces: NamespaceMap,
}

impl WikiMetadata {
    /// Derive iso-3 from iso-2 when the site info does not carry it.
    #[must_use]
    pub fn derive_iso3(iso2: &str, explicit: Option<&str>) -> String {
        explicit
            .map(str::to_string)
            .unwrap_or_else(|| iso2_to_iso3(iso2))
    }
}

/// A page reference as returned by list queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRef {
    pub title: String,
    #[serde(default)]
    pub page_id: u64,
    #[serde(default)]
    pub ns: i64,
}

/// Thumbnail hint from `prop=pageimages`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thumbnail {
    pub source: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

/// Everything known about one article to mirror.
///
/// Pagination shards reference their neighbours through
/// `prev_article_id`/`next_article_id`; the graph stays acyclic in memory
/// because shards are always dereferenced through the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArticleDetail {
    pub title: String,
    #[serde(default)]
    pub page_id: u64,
    #[serde(default)]
    pub ns: i64,
    /// Canonical revision (`revisions[0].revid` flattened).
    #[serde(default)]
    pub revision_id: u64,
    #[serde(default)]
    pub coordinates: Option<(f64, f64)>,
    #[serde(default)]
    pub redirects: Vec<PageRef>,
    #[serde(default)]
    pub categories: Vec<PageRef>,
    #[serde(default)]
    pub sub_categories: Vec<PageRef>,
    #[serde(default)]
    pub pages: Vec<PageRef>,
    #[serde(default)]
    pub thumbnail: Option<Thumbnail>,
    #[serde(default)]
    pub prev_article_id: Option<String>,
    #[serde(default)]
    pub next_article_id: Option<String>,
}

/// A stored redirect record. The source title is never itself an article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirect {
    pub from: String,
    pub to: String,
}

/// Probed upstream capabilities gating request shapes.
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    pub rest_api_available: bool,
    pub ve_api_available: bool,
    pub coordinates_available: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            rest_api_available: false,
            ve_api_available: false,
            coordinates_available: true,
        }
    }
}
