//! Final page assembly.
//!
//! Merges a rewritten body fragment into the page template: module
//! references, direction and title, the subpage breadcrumb, the footer,
//! and the optional conservative minification.

use lazy_static::lazy_static;
use regex::Regex;

use crate::templates;
use crate::utils::{encode_article_id_for_html_url, relative_path};
use crate::wiki_client::types::{ArticleDetail, WikiMetadata};

/// Inputs for one page assembly.
pub struct AssembleParams<'a> {
    pub article_id: &'a str,
    pub display_title: &'a str,
    pub body: &'a str,
    pub metadata: &'a WikiMetadata,
    pub detail: &'a ArticleDetail,
    /// JS module names accumulated for this article.
    pub js_modules: &'a [String],
    /// CSS module names accumulated for this article.
    pub css_modules: &'a [String],
    /// Whether the run captured a jsConfigVars script entry.
    pub has_js_config_vars: bool,
    pub minify: bool,
}

/// Produce the final archive HTML for one article.
#[must_use]
pub fn assemble_page(p: &AssembleParams<'_>) -> String {
    let mut css_links = vec![relative_path(p.article_id, '-', "style.css")];
    css_links.extend(
        p.css_modules
            .iter()
            .map(|module| relative_path(p.article_id, '-', &format!("mw/{module}.css"))),
    );

    let mut js_scripts = Vec::new();
    if p.has_js_config_vars {
        js_scripts.push(relative_path(p.article_id, '-', "mw/jsConfigVars.js"));
    }
    js_scripts.extend(
        p.js_modules
            .iter()
            .map(|module| relative_path(p.article_id, '-', &format!("mw/{module}.js"))),
    );

    let breadcrumb = if p.article_id.contains('/') && subpages_allowed(p) {
        Some(templates::subpage_breadcrumb(p.article_id))
    } else {
        None
    };

    let source_url = format!(
        "{}{}",
        p.metadata.web_url,
        encode_article_id_for_html_url(p.article_id)
    );
    let date = chrono::Utc::now().format("%Y-%m-%d").to_string();
    let footer = templates::footer(&p.metadata.site_name, &source_url, p.display_title, &date);

    let html = templates::html_page(&templates::PageParams {
        article_id: p.article_id,
        display_title: p.display_title,
        direction: p.metadata.text_dir.as_html(),
        lang: &p.metadata.lang_iso2,
        css_links: &css_links,
        js_scripts: &js_scripts,
        body: p.body,
        breadcrumb,
        footer: Some(footer),
        coordinates: p.detail.coordinates,
    });

    if p.minify { minify(&html) } else { html }
}

fn subpages_allowed(p: &AssembleParams<'_>) -> bool {
    p.metadata
        .namespaces
        .of_article(p.article_id)
        .map(|ns| ns.allowed_subpages)
        // Untagged ids live in the main namespace, which has no prefix to
        // look up; treat subpages as allowed there.
        .unwrap_or(true)
}

lazy_static! {
    static ref BLANK_LINES_RE: Regex = Regex::new(r"\n[ \t]*\n+").expect("blank line pattern");
    static ref INTER_TAG_RE: Regex = Regex::new(r">[ \t]*\n[ \t]*<").expect("inter-tag pattern");
}

/// Conservative whitespace minification: collapse blank lines and the
/// indentation between adjacent tags. Text content is left untouched.
#[must_use]
pub fn minify(html: &str) -> String {
    let collapsed = BLANK_LINES_RE.replace_all(html, "\n");
    INTER_TAG_RE.replace_all(&collapsed, ">\n<").into_owned()
}
