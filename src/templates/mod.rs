//! Pure template functions mapping data to HTML fragments.
//!
//! The pipeline consumes these as plain functions; nothing here touches the
//! network, the stores or the DOM.

use crate::utils::{encode_article_id_for_html_url, group_letter, relative_path};

/// Placeholder anchor consumed by the mobile section walk.
#[must_use]
pub fn section_placeholder(index: usize) -> String {
    format!("__SUB_LEVEL_SECTION_{index}__")
}

/// Lead section wrapper, ending in the first placeholder anchor.
#[must_use]
pub fn lead_section(text: &str) -> String {
    format!(
        "<div id=\"mw-content-text\">{text}{}</div>",
        section_placeholder(0)
    )
}

/// A collapsible section. Top-level sections are appended to the document;
/// deeper sections replace the placeholder inside their parent. Both carry
/// the next placeholder so the walk can continue inside them.
#[must_use]
pub fn section(toclevel: u32, anchor: &str, line: &str, text: &str, next_index: usize) -> String {
    format!(
        "<details data-level=\"{toclevel}\" id=\"{anchor}\" open><summary>{line}</summary>\
         {text}{}</details>",
        section_placeholder(next_index)
    )
}

/// Parameters for the final page assembly.
#[derive(Debug, Default)]
pub struct PageParams<'a> {
    pub article_id: &'a str,
    pub display_title: &'a str,
    pub direction: &'a str,
    pub lang: &'a str,
    /// Archive-relative stylesheet hrefs, already depth-adjusted.
    pub css_links: &'a [String],
    /// Archive-relative script srcs, already depth-adjusted.
    pub js_scripts: &'a [String],
    pub body: &'a str,
    pub breadcrumb: Option<String>,
    pub footer: Option<String>,
    pub coordinates: Option<(f64, f64)>,
}

/// The full article page.
#[must_use]
pub fn html_page(p: &PageParams<'_>) -> String {
    let title = html_escape::encode_text(p.display_title);
    let geo_meta = p
        .coordinates
        .map(|(lat, lon)| format!("<meta name=\"geo.position\" content=\"{lat};{lon}\">\n"))
        .unwrap_or_default();
    let css_list: String = p
        .css_links
        .iter()
        .map(|href| format!("<link href=\"{href}\" rel=\"stylesheet\" type=\"text/css\">\n"))
        .collect();
    let js_list: String = p
        .js_scripts
        .iter()
        .map(|src| format!("<script src=\"{src}\"></script>\n"))
        .collect();
    let breadcrumb = p.breadcrumb.as_deref().unwrap_or("");
    let footer = p.footer.as_deref().unwrap_or("");

    format!(
        "<!DOCTYPE html>\n\
         <html class=\"client-js\" dir=\"{dir}\" lang=\"{lang}\">\n\
         <head>\n\
         <meta charset=\"UTF-8\">\n\
         <title>{title}</title>\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         {geo_meta}{css_list}</head>\n\
         <body class=\"mw-body mw-body-content mediawiki\" dir=\"{dir}\">\n\
         <div id=\"container\"><div id=\"mw-content\" class=\"page\">\n\
         <h1 id=\"titleHeading\" class=\"firstHeading\">{title}</h1>\n\
         {breadcrumb}{body}\n\
         {footer}\
         </div></div>\n\
         {js_list}</body>\n\
         </html>\n",
        dir = p.direction,
        lang = p.lang,
        body = p.body,
    )
}

/// Footer carrying provenance, wrapped in indexer-exclusion delimiters.
#[must_use]
pub fn footer(site_name: &str, source_url: &str, display_title: &str, date: &str) -> String {
    format!(
        "<!--htdig_noindex--><div id=\"mw-footer\" class=\"footer\">\
         This article is issued from <a class=\"external text\" href=\"{source_url}\">{site}</a>. \
         The text is licensed under Creative Commons - Attribution - Sharealike. \
         Retrieved {date} for the article \u{201c}{title}\u{201d}.\
         </div><!--/htdig_noindex-->",
        site = html_escape::encode_text(site_name),
        title = html_escape::encode_text(display_title),
    )
}

/// Breadcrumb for subpages: each ancestor of `a/b/c` links to its own entry.
#[must_use]
pub fn subpage_breadcrumb(article_id: &str) -> String {
    let segments: Vec<&str> = article_id.split('/').collect();
    let depth = segments.len() - 1;
    let mut parts = Vec::with_capacity(depth);
    for (i, segment) in segments[..depth].iter().enumerate() {
        let ancestor = segments[..=i].join("/");
        let href = format!(
            "{}{}",
            "../".repeat(depth - i),
            encode_article_id_for_html_url(
                ancestor.rsplit('/').next().unwrap_or(ancestor.as_str())
            )
        );
        parts.push(format!(
            "<a href=\"{href}\">{}</a>",
            html_escape::encode_text(&segment.replace('_', " "))
        ));
    }
    format!(
        "<div class=\"subpages\">&lt; {}</div>",
        parts.join(" | ")
    )
}

/// An entry of a category listing.
#[derive(Debug, Clone)]
pub struct ListingItem {
    pub article_id: String,
    pub display: String,
    /// Archive namespace the target lives in.
    pub namespace: char,
}

/// Alphabetically grouped listing used for both subcategories and subpages.
///
/// Items must already be sorted; grouping keys off the upper-cased first
/// character of the display text.
#[must_use]
pub fn grouped_listing(heading: &str, items: &[ListingItem], from_article_id: &str) -> String {
    if items.is_empty() {
        return String::new();
    }
    let mut out = format!("<h2 class=\"listing-heading\">{}</h2>", html_escape::encode_text(heading));
    let mut current_letter: Option<String> = None;
    for item in items {
        let letter = group_letter(&item.display);
        if current_letter.as_deref() != Some(letter.as_str()) {
            if current_letter.is_some() {
                out.push_str("</ul></div>");
            }
            out.push_str(&format!(
                "<div class=\"mw-category-group\"><h3>{}</h3><ul>",
                html_escape::encode_text(&letter)
            ));
            current_letter = Some(letter);
        }
        let href = relative_path(
            from_article_id,
            item.namespace,
            &encode_article_id_for_html_url(&item.article_id),
        );
        out.push_str(&format!(
            "<li><a href=\"{href}\">{}</a></li>",
            html_escape::encode_text(&item.display)
        ));
    }
    out.push_str("</ul></div>");
    out
}

/// Previous/next navigation between pagination shards.
#[must_use]
pub fn shard_navigation(
    from_article_id: &str,
    namespace: char,
    prev: Option<&str>,
    next: Option<&str>,
) -> String {
    if prev.is_none() && next.is_none() {
        return String::new();
    }
    let link = |id: &str, label: &str| {
        let href = relative_path(
            from_article_id,
            namespace,
            &encode_article_id_for_html_url(id),
        );
        format!("<a href=\"{href}\">{label}</a>")
    };
    let prev_html = prev.map(|id| link(id, "&#8592; previous")).unwrap_or_default();
    let next_html = next.map(|id| link(id, "next &#8594;")).unwrap_or_default();
    format!("<div class=\"shard-nav\">{prev_html} {next_html}</div>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lead_carries_first_placeholder() {
        let html = lead_section("<p>intro</p>");
        assert!(html.contains("<p>intro</p>"));
        assert!(html.ends_with("__SUB_LEVEL_SECTION_0__</div>"));
    }

    #[test]
    fn page_injects_module_references() {
        let css = vec!["../-/style.css".to_string()];
        let js = vec!["../-/mw/startup.js".to_string()];
        let page = html_page(&PageParams {
            article_id: "London",
            display_title: "London",
            direction: "ltr",
            lang: "en",
            css_links: &css,
            js_scripts: &js,
            body: "<p>x</p>",
            ..Default::default()
        });
        assert!(page.contains("<title>London</title>"));
        assert!(page.contains("<link href=\"../-/style.css\""));
        assert!(page.contains("<script src=\"../-/mw/startup.js\"></script>"));
        assert!(page.contains("dir=\"ltr\""));
    }

    #[test]
    fn footer_is_wrapped_in_noindex_delimiters() {
        let f = footer("Wikipedia", "https://en.wikipedia.org/wiki/London", "London", "2024-01-01");
        assert!(f.starts_with("<!--htdig_noindex-->"));
        assert!(f.ends_with("<!--/htdig_noindex-->"));
        assert!(f.contains("https://en.wikipedia.org/wiki/London"));
    }

    #[test]
    fn listing_groups_by_first_letter() {
        let items = vec![
            ListingItem {
                article_id: "Category:Alpha".into(),
                display: "Alpha".into(),
                namespace: 'U',
            },
            ListingItem {
                article_id: "Category:Axe".into(),
                display: "Axe".into(),
                namespace: 'U',
            },
            ListingItem {
                article_id: "Category:Beta".into(),
                display: "beta".into(),
                namespace: 'U',
            },
        ];
        let html = grouped_listing("Subcategories", &items, "Category:Root");
        assert_eq!(html.matches("mw-category-group").count(), 2);
        assert!(html.contains("<h3>A</h3>"));
        assert!(html.contains("<h3>B</h3>"));
        assert!(html.contains("../U/Category%3AAlpha"));
    }

    #[test]
    fn geo_meta_present_when_coordinates_known() {
        let page = html_page(&PageParams {
            article_id: "Paris",
            display_title: "Paris",
            direction: "ltr",
            lang: "fr",
            body: "",
            coordinates: Some((48.85, 2.35)),
            ..Default::default()
        });
        assert!(page.contains("geo.position"));
        assert!(page.contains("48.85;2.35"));
    }
}
