//! Modules, stylesheets, favicon and metadata entries.

use futures::stream::{self, StreamExt};
use lazy_static::lazy_static;
use scraper::{Html, Selector};

use crate::archive::ArchiveEntry;
use crate::error::Result;
use crate::utils::constants::{
    CSS_URL_RE, MEDIAWIKI_HACK_SUFFIX, STARTUP_HACK_RE, STARTUP_HACK_REPLACEMENT,
};
use crate::utils::{encode_article_id_for_html_url, resolve_against};
use crate::wiki_client::types::WikiMetadata;

use super::Scraper;

lazy_static! {
    static ref STYLESHEET_SELECTOR: Selector =
        Selector::parse("link[rel=\"stylesheet\"]").expect("stylesheet selector");
}

/// Phase 5: fetch every accumulated module from `load.php`.
///
/// The `startup` and `mediawiki` scripts get the offline start-up hack:
/// `load.php` cannot be re-invoked offline, so start-up is deferred onto a
/// custom event fired once the `mediawiki` module has loaded.
pub(super) async fn fetch_modules(scraper: &Scraper, metadata: &WikiMetadata) -> Result<()> {
    let js = scraper.sorted_js_modules();
    let css = scraper.sorted_css_modules();
    log::info!("fetching {} js and {} css modules", js.len(), css.len());

    let speed = scraper.config().speed();
    let jobs = js
        .iter()
        .map(|m| (m.clone(), true))
        .chain(css.iter().map(|m| (m.clone(), false)))
        .collect::<Vec<_>>();

    stream::iter(jobs)
        .for_each_concurrent(speed, |(module, scripts)| async move {
            let fetched = scraper
                .downloader()
                .get_module_source(&metadata.base_url, &metadata.lang_iso2, &module, scripts)
                .await;
            let bytes = match fetched {
                Ok(bytes) => bytes,
                Err(e) => {
                    log::warn!("module {module} failed: {e}");
                    return;
                }
            };
            let (path, mime, bytes) = if scripts {
                let source = String::from_utf8_lossy(&bytes).into_owned();
                let hacked = apply_module_hacks(&module, source);
                (
                    format!("mw/{module}.js"),
                    "text/javascript",
                    hacked.into_bytes(),
                )
            } else {
                (format!("mw/{module}.css"), "text/css", bytes)
            };
            let entry = ArchiveEntry::binary('-', path, mime, bytes);
            if let Err(e) = scraper.writer().add_entry(entry).await {
                scraper.record_writer_failure(&e);
            }
        })
        .await;

    if let Some(vars) = scraper.js_config_vars_script() {
        let entry = ArchiveEntry::binary(
            '-',
            "mw/jsConfigVars.js",
            "text/javascript",
            vars.into_bytes(),
        );
        if let Err(e) = scraper.writer().add_entry(entry).await {
            scraper.record_writer_failure(&e);
        }
    }
    scraper.check_writer()
}

/// The two source-text edits, applied exactly once per run because each
/// module is fetched exactly once.
pub(crate) fn apply_module_hacks(module: &str, source: String) -> String {
    match module {
        "startup" => STARTUP_HACK_RE
            .replace(&source, STARTUP_HACK_REPLACEMENT)
            .into_owned(),
        "mediawiki" => {
            let mut hacked = source;
            hacked.push_str(MEDIAWIKI_HACK_SUFFIX);
            hacked
        }
        _ => source,
    }
}

/// Phase 6: fetch the main page's stylesheets, dereference their `url(...)`
/// references into the asset namespace, and append everything into one
/// `style.css` entry; then the favicon.
pub(super) async fn fetch_site_assets(
    scraper: &Scraper,
    metadata: &WikiMetadata,
    main_page: &str,
) -> Result<()> {
    let page_url = format!(
        "{}{}",
        metadata.web_url,
        encode_article_id_for_html_url(main_page)
    );
    let stylesheet_urls = match scraper.downloader().download_content(&page_url).await {
        Ok((bytes, _)) => {
            let html = String::from_utf8_lossy(&bytes).into_owned();
            extract_stylesheet_urls(&html, &metadata.base_url)
        }
        Err(e) => {
            log::warn!("main page fetch for stylesheet discovery failed: {e}");
            Vec::new()
        }
    };
    log::info!("fetching {} stylesheets", stylesheet_urls.len());

    let speed = scraper.config().speed();
    let sheets: Vec<String> = stream::iter(stylesheet_urls)
        .map(|css_url| async move {
            match scraper.downloader().download_content(&css_url).await {
                Ok((bytes, _)) => {
                    let css = String::from_utf8_lossy(&bytes).into_owned();
                    Some(rewrite_css_urls(scraper, &css_url, css))
                }
                Err(e) => {
                    log::warn!("stylesheet {css_url} failed: {e}");
                    None
                }
            }
        })
        .buffered(speed.max(1))
        .filter_map(|sheet| async move { sheet })
        .collect()
        .await;

    let combined = sheets.join("\n");
    let entry = ArchiveEntry::binary('-', "style.css", "text/css", combined.into_bytes());
    if let Err(e) = scraper.writer().add_entry(entry).await {
        scraper.record_writer_failure(&e);
    }

    let favicon_url = format!("{}favicon.ico", metadata.base_url);
    match scraper.downloader().download_content(&favicon_url).await {
        Ok((bytes, headers)) => {
            let mime = headers
                .get("content-type")
                .cloned()
                .unwrap_or_else(|| "image/x-icon".to_string());
            let entry = ArchiveEntry::binary('-', "favicon", mime, bytes);
            if let Err(e) = scraper.writer().add_entry(entry).await {
                scraper.record_writer_failure(&e);
            }
        }
        Err(e) => log::warn!("favicon fetch failed: {e}"),
    }
    scraper.check_writer()
}

/// `<link rel=stylesheet>` hrefs of a page, resolved absolute.
fn extract_stylesheet_urls(html: &str, base_url: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(&STYLESHEET_SELECTOR)
        .filter_map(|link| link.value().attr("href"))
        .filter_map(|href| resolve_against(base_url, href))
        .collect()
}

/// Rewrite `url(...)` references inside a stylesheet to archive-local
/// names and queue the referenced assets for download.
fn rewrite_css_urls(scraper: &Scraper, stylesheet_url: &str, css: String) -> String {
    let rewritten = CSS_URL_RE.replace_all(&css, |caps: &regex::Captures<'_>| {
        let reference = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        if reference.starts_with("data:") || reference.starts_with('#') {
            return caps.get(0).map(|m| m.as_str().to_string()).unwrap_or_default();
        }
        let Some(absolute) = resolve_against(stylesheet_url, reference) else {
            return caps.get(0).map(|m| m.as_str().to_string()).unwrap_or_default();
        };
        let name = asset_name(&absolute);
        if name.is_empty() {
            return caps.get(0).map(|m| m.as_str().to_string()).unwrap_or_default();
        }
        scraper.stores().enqueue_file(crate::store::FileTask {
            path: name.clone(),
            url: scraper.downloader().serialize_url(&absolute),
            namespace: '-',
            width: None,
            mult: None,
        });
        format!("url(\"{name}\")")
    });
    rewritten.into_owned()
}

/// Flat archive name for a stylesheet asset (fonts, background images).
fn asset_name(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
                .map(str::to_string)
        })
        .unwrap_or_default()
}

/// Standard metadata entries under the `M` namespace.
pub(super) async fn write_metadata(scraper: &Scraper, metadata: &WikiMetadata) -> Result<()> {
    let date = chrono::Utc::now().format("%Y-%m-%d").to_string();
    let entries = [
        ("Title", metadata.site_name.clone()),
        ("Description", scraper.config().description().to_string()),
        ("Language", metadata.lang_iso3.clone()),
        ("Creator", metadata.site_name.clone()),
        ("Publisher", scraper.config().publisher().to_string()),
        ("Date", date),
        (
            "Counter",
            scraper.stores().article_detail.len().to_string(),
        ),
    ];
    for (name, value) in entries {
        let entry = ArchiveEntry::binary('M', name, "text/plain", value.into_bytes());
        if let Err(e) = scraper.writer().add_entry(entry).await {
            scraper.record_writer_failure(&e);
        }
    }
    scraper.check_writer()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_hack_defers_self_invocation() {
        let source = "var x;script=document.createElement('script');x();".to_string();
        let hacked = apply_module_hacks("startup", source);
        assert!(hacked.contains("fireStartUp"));
        assert!(hacked.contains("return;script=document.createElement('script');"));
    }

    #[test]
    fn mediawiki_hack_appends_dispatcher() {
        let hacked = apply_module_hacks("mediawiki", "core();".to_string());
        assert!(hacked.starts_with("core();"));
        assert!(hacked.contains("dispatchEvent(startUpEvent)"));
    }

    #[test]
    fn other_modules_are_untouched() {
        let source = "whatever();".to_string();
        assert_eq!(apply_module_hacks("site", source.clone()), source);
    }

    #[test]
    fn stylesheet_extraction_resolves_relative() {
        let html = "<html><head>\
            <link rel=\"stylesheet\" href=\"/w/load.php?modules=site.styles\">\
            <link rel=\"icon\" href=\"/favicon.ico\">\
            </head><body></body></html>";
        let urls = extract_stylesheet_urls(html, "https://wiki.test/");
        assert_eq!(urls.len(), 1);
        assert!(urls[0].starts_with("https://wiki.test/w/load.php"));
    }

    #[test]
    fn asset_names_flatten_to_basename() {
        assert_eq!(asset_name("https://h/a/b/font.woff2?v=3"), "font.woff2");
        assert_eq!(asset_name("not a url"), "");
    }
}
