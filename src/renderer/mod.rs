//! Article rendering.
//!
//! Turns the raw payload of one article into one or more body fragments,
//! choosing the rendering path by probed capability and paginating
//! oversized category listings.

pub mod desktop;
pub mod mobile;
pub mod pagination;

use kuchiki::traits::TendrilSink;
use serde_json::Value;

use crate::error::{Result, ScrapeError};
use crate::templates::{self, ListingItem};
use crate::wiki_client::types::{ArticleDetail, PageRef};

/// One rendered fragment, possibly a pagination shard.
#[derive(Debug, Clone)]
pub struct RenderedArticle {
    pub article_id: String,
    /// Body fragment; final page assembly happens after the DOM rewrite.
    pub html: String,
    pub display_title: String,
    /// Shard-local detail. The orchestrator stores these back so shard
    /// cross-references stay resolvable.
    pub detail: ArticleDetail,
}

/// Archive namespace an article of wiki namespace `ns` lives in.
#[must_use]
pub fn archive_namespace(ns: i64) -> char {
    if ns == crate::wiki_client::types::CATEGORY_NAMESPACE {
        'U'
    } else {
        'A'
    }
}

/// Render one article payload.
///
/// `use_desktop` is true for the main page and whenever REST is
/// unavailable; otherwise the payload is a mobile-sections document.
pub fn render(
    raw: &Value,
    article_id: &str,
    detail: &ArticleDetail,
    use_desktop: bool,
) -> Result<Vec<RenderedArticle>> {
    let (body, lead_display_title) = if use_desktop {
        let html = desktop::extract_html(raw).ok_or_else(|| ScrapeError::Malformed {
            url: article_id.to_string(),
            reason: "no renderable content in desktop payload".into(),
        })?;
        (html, None)
    } else {
        mobile::assemble(raw)?
    };

    let shards = pagination::paginate(article_id, detail);
    let multi = shards.len() > 1;
    let ns_char = archive_namespace(detail.ns);

    let mut rendered = Vec::with_capacity(shards.len());
    for (index, (shard_id, shard_detail)) in shards.into_iter().enumerate() {
        let mut html = if index == 0 { body.clone() } else { String::new() };

        let subcats = listing_items(&shard_detail.sub_categories, 'U', true);
        if !subcats.is_empty() {
            html.push_str(&templates::grouped_listing("Subcategories", &subcats, &shard_id));
        }
        let pages = listing_items(&shard_detail.pages, 'A', false);
        if !pages.is_empty() {
            html.push_str(&templates::grouped_listing("Pages", &pages, &shard_id));
        }
        if multi {
            html.push_str(&templates::shard_navigation(
                &shard_id,
                ns_char,
                shard_detail.prev_article_id.as_deref(),
                shard_detail.next_article_id.as_deref(),
            ));
        }

        let display_title =
            display_title(&html, lead_display_title.as_deref(), &shard_id);
        rendered.push(RenderedArticle {
            article_id: shard_id,
            html,
            display_title,
            detail: shard_detail,
        });
    }
    Ok(rendered)
}

/// Sorted, alphabetically groupable listing items for a slice of members.
fn listing_items(members: &[PageRef], namespace: char, strip_prefix: bool) -> Vec<ListingItem> {
    let mut items: Vec<ListingItem> = members
        .iter()
        .map(|member| {
            let display = if strip_prefix {
                member
                    .title
                    .split_once(':')
                    .map(|(_, rest)| rest)
                    .unwrap_or(&member.title)
                    .replace('_', " ")
            } else {
                member.title.replace('_', " ")
            };
            ListingItem {
                article_id: crate::utils::title_to_id(&member.title),
                display,
                namespace,
            }
        })
        .collect();
    items.sort_by(|a, b| a.display.cmp(&b.display));
    items
}

/// Display title: the rendered document's `<title>` when present, else the
/// lead's `displaytitle`, else the id with underscores as spaces.
#[must_use]
pub fn display_title(html: &str, lead_display_title: Option<&str>, article_id: &str) -> String {
    if html.contains("<title") {
        let document = kuchiki::parse_html().one(html.to_string());
        if let Ok(title) = document.select_first("title") {
            let text = title.text_contents();
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
    }
    if let Some(lead) = lead_display_title {
        let stripped = strip_tags(lead);
        if !stripped.is_empty() {
            return stripped;
        }
    }
    article_id.replace('_', " ")
}

/// Drop markup from a `displaytitle` value (it may carry formatting spans).
fn strip_tags(html: &str) -> String {
    if !html.contains('<') {
        return html.trim().to_string();
    }
    let document = kuchiki::parse_html().one(html.to_string());
    document.text_contents().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn desktop_payload_renders_single_fragment() {
        let raw = json!({"visualeditor": {"content": "<p>body</p>"}});
        let detail = ArticleDetail {
            title: "London".into(),
            ..Default::default()
        };
        let rendered = render(&raw, "London", &detail, true).unwrap();
        assert_eq!(rendered.len(), 1);
        assert_eq!(rendered[0].article_id, "London");
        assert!(rendered[0].html.contains("<p>body</p>"));
        assert_eq!(rendered[0].display_title, "London");
    }

    #[test]
    fn display_title_prefers_document_title() {
        let html = "<html><head><title>Proper Title</title></head><body></body></html>";
        assert_eq!(display_title(html, Some("Lead"), "Id_here"), "Proper Title");
        assert_eq!(display_title("<p>x</p>", Some("<i>Lead</i>"), "Id"), "Lead");
        assert_eq!(display_title("<p>x</p>", None, "Id_here"), "Id here");
    }

    #[test]
    fn category_render_emits_listing_and_shards() {
        let raw = json!({"visualeditor": {"content": "<p>category intro</p>"}});
        let detail = ArticleDetail {
            title: "Category:Big".into(),
            ns: 14,
            sub_categories: (0..273)
                .map(|i| PageRef {
                    title: format!("Category:Sub {i:03}"),
                    page_id: i,
                    ns: 14,
                })
                .collect(),
            ..Default::default()
        };
        let rendered = render(&raw, "Category:Big", &detail, true).unwrap();
        assert_eq!(rendered.len(), 2);
        assert!(rendered[0].html.contains("category intro"));
        assert!(rendered[0].html.contains("Subcategories"));
        assert!(rendered[0].html.contains("Category%3ASub_000"));
        // Shard 1 carries only its slice and the back link.
        assert!(!rendered[1].html.contains("category intro"));
        assert!(rendered[1].html.contains("Sub 200"));
        assert!(rendered[1].html.contains("Category%3ABig"));
        assert_eq!(rendered[1].detail.prev_article_id.as_deref(), Some("Category:Big"));
    }
}
