//! Enumeration and the article scrape phase.

use std::sync::atomic::{AtomicUsize, Ordering};

use futures::stream::{self, StreamExt};

use crate::archive::{ArchiveEntry, ArchiveRedirect};
use crate::error::{Result, ScrapeError};
use crate::renderer::{self, archive_namespace};
use crate::rewriter::{self, RewriteContext, template::AssembleParams};
use crate::store::Stores;
use crate::utils::title_to_id;
use crate::wiki_client::types::{ArticleDetail, CATEGORY_NAMESPACE, Redirect, WikiMetadata};

use super::{Scraper, status};

/// Titles per detail query; the API caps `titles=` at 50 for anonymous
/// clients.
const DETAIL_BATCH: usize = 50;

/// Phase 2: populate `articleDetail`, enrich category members, discover
/// redirects.
pub(super) async fn enumerate(
    scraper: &Scraper,
    metadata: &WikiMetadata,
    main_page: &str,
) -> Result<()> {
    match scraper.config().article_list() {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
                ScrapeError::Config(format!("reading article list {}: {e}", path.display()))
            })?;
            let titles: Vec<String> = raw
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(title_to_id)
                .collect();
            log::info!("enumerating {} articles from list", titles.len());
            for batch in titles.chunks(DETAIL_BATCH) {
                let details = scraper
                    .wiki()
                    .get_article_details_by_ids(batch, true)
                    .await?;
                for (id, detail) in details {
                    scraper.stores().article_detail.set(id, detail);
                }
            }
        }
        None => {
            for namespace in metadata.namespaces.enumeration_namespaces() {
                log::info!(
                    "enumerating namespace {} ({})",
                    namespace.id,
                    namespace.localized
                );
                let mut gapcontinue = String::new();
                loop {
                    let (details, next) = scraper
                        .wiki()
                        .get_article_details_by_namespace(namespace.id, &gapcontinue)
                        .await?;
                    for (id, detail) in details {
                        scraper.stores().article_detail.set(id, detail);
                    }
                    match next {
                        Some(cursor) => gapcontinue = cursor,
                        None => break,
                    }
                }
            }
            if !scraper.stores().article_detail.contains(main_page) {
                let details = scraper
                    .wiki()
                    .get_article_details_by_ids(&[main_page.to_string()], true)
                    .await?;
                for (id, detail) in details {
                    scraper.stores().article_detail.set(id, detail);
                }
            }
            seed_referenced_categories(scraper).await?;
        }
    }
    log::info!(
        "enumeration found {} articles",
        scraper.stores().article_detail.len()
    );

    enrich_categories(scraper).await?;
    discover_redirects(scraper).await;
    Ok(())
}

/// Categories referenced by stored articles but absent from the store.
///
/// The namespace walk misses categories on wikis that restrict
/// `allpages` over the category namespace; the articles' own
/// `categories[]` props close that gap.
fn referenced_category_ids(stores: &Stores) -> Vec<String> {
    let mut missing = std::collections::BTreeSet::new();
    for id in stores.article_detail.keys() {
        let Some(detail) = stores.article_detail.get(&id) else {
            continue;
        };
        for category in &detail.categories {
            let category_id = title_to_id(&category.title);
            if !stores.article_detail.contains(&category_id) {
                missing.insert(category_id);
            }
        }
    }
    missing.into_iter().collect()
}

async fn seed_referenced_categories(scraper: &Scraper) -> Result<()> {
    let missing = referenced_category_ids(scraper.stores());
    if missing.is_empty() {
        return Ok(());
    }
    log::info!("seeding {} categories referenced by articles", missing.len());
    for batch in missing.chunks(DETAIL_BATCH) {
        let details = scraper
            .wiki()
            .get_article_details_by_ids(batch, false)
            .await?;
        for (id, detail) in details {
            scraper.stores().article_detail.set(id, detail);
        }
    }
    Ok(())
}

/// Fill `sub_categories`/`pages` for every category article.
async fn enrich_categories(scraper: &Scraper) -> Result<()> {
    let category_ids: Vec<String> = scraper
        .stores()
        .article_detail
        .keys()
        .into_iter()
        .filter(|id| {
            scraper
                .stores()
                .article_detail
                .get(id)
                .is_some_and(|detail| detail.ns == CATEGORY_NAMESPACE)
        })
        .collect();

    let speed = scraper.config().speed();
    stream::iter(category_ids)
        .for_each_concurrent(speed, |id| async move {
            match scraper.wiki().get_sub_categories(&id).await {
                Ok(members) => {
                    scraper.stores().article_detail.upsert_with(
                        id.clone(),
                        ArticleDetail::default,
                        |detail| {
                            detail.sub_categories = members
                                .iter()
                                .filter(|m| m.ns == CATEGORY_NAMESPACE)
                                .cloned()
                                .collect();
                            detail.pages = members
                                .iter()
                                .filter(|m| m.ns != CATEGORY_NAMESPACE)
                                .cloned()
                                .collect();
                        },
                    );
                }
                Err(e) => log::warn!("listing members of {id} failed: {e}"),
            }
        })
        .await;
    Ok(())
}

/// Store every redirect pointing at an article in scope, keyed by source.
async fn discover_redirects(scraper: &Scraper) {
    let ids = scraper.stores().article_detail.keys();
    let concurrency = scraper.config().speed() * 3;
    stream::iter(ids)
        .for_each_concurrent(concurrency, |id| async move {
            match scraper.wiki().get_backlink_redirects(&id).await {
                Ok(sources) => {
                    for source in sources {
                        let from = title_to_id(&source.title);
                        if !scraper.stores().is_mirrored(&from) {
                            scraper.stores().redirects.set(
                                from.clone(),
                                Redirect {
                                    from,
                                    to: id.clone(),
                                },
                            );
                        }
                    }
                }
                Err(e) => log::warn!("redirect discovery for {id} failed: {e}"),
            }
        })
        .await;
    log::info!(
        "redirect cache holds {} entries",
        scraper.stores().redirects.len()
    );
}

/// Phase 4: fetch, render, rewrite and archive every article.
pub(super) async fn scrape_articles(
    scraper: &Scraper,
    metadata: &WikiMetadata,
    main_page: &str,
) -> Result<()> {
    let total = scraper.stores().article_detail.len();
    let done = AtomicUsize::new(0);
    let speed = scraper.config().speed();
    log::info!("scraping {total} articles with {speed} workers");

    scraper
        .stores()
        .article_detail
        .iterate(speed, |id, detail| {
            let done = &done;
            async move {
                match process_article(scraper, metadata, main_page, &id, detail).await {
                    Ok(()) => scraper.status().article_success(),
                    Err(e) => {
                        scraper.status().article_fail();
                        log::warn!("article {id} failed: {e}");
                    }
                }
                let k = done.fetch_add(1, Ordering::Relaxed) + 1;
                status::report_progress("articles", k, total, 10);
            }
        })
        .await;

    scraper.check_writer()
}

async fn process_article(
    scraper: &Scraper,
    metadata: &WikiMetadata,
    main_page: &str,
    article_id: &str,
    detail: ArticleDetail,
) -> Result<()> {
    let is_main_page = article_id == main_page;
    let use_desktop = is_main_page || !scraper.downloader().caps.rest_api_available();

    let raw = scraper
        .downloader()
        .get_article(article_id, is_main_page)
        .await?;
    let rendered = renderer::render(&raw, article_id, &detail, use_desktop)?;

    // Module dependencies are per-article but accumulate run-wide; a probe
    // failure only costs this article its module list.
    match scraper
        .downloader()
        .get_module_dependencies(scraper.wiki().api_url(), article_id)
        .await
    {
        Ok(deps) => scraper.capture_module_dependencies(&deps),
        Err(e) => log::debug!("module probe for {article_id} failed: {e}"),
    }

    let js_modules = scraper.sorted_js_modules();
    let css_modules = scraper.sorted_css_modules();

    for shard in rendered {
        // Pagination shards are their own store records, dereferenced by id.
        scraper
            .stores()
            .article_detail
            .set(shard.article_id.clone(), shard.detail.clone());

        let ctx = RewriteContext {
            article_id: &shard.article_id,
            metadata,
            stores: scraper.stores(),
            format: scraper.config().format(),
            keep_empty_paragraphs: scraper.config().keep_empty_paragraphs(),
        };
        let (body, media_dependencies) = rewriter::rewrite_document(&shard.html, &ctx)
            .map_err(|e| ScrapeError::Malformed {
                url: shard.article_id.clone(),
                reason: format!("{e:#}"),
            })?;

        for mut task in media_dependencies {
            task.url = scraper.downloader().serialize_url(&task.url);
            scraper.stores().enqueue_file(task);
        }

        let html = rewriter::template::assemble_page(&AssembleParams {
            article_id: &shard.article_id,
            display_title: &shard.display_title,
            body: &body,
            metadata,
            detail: &shard.detail,
            js_modules: &js_modules,
            css_modules: &css_modules,
            has_js_config_vars: scraper.has_js_config_vars(),
            minify: scraper.config().minify_html(),
        });

        let entry = ArchiveEntry::article(
            archive_namespace(shard.detail.ns),
            shard.article_id.clone(),
            shard.display_title.clone(),
            html,
        );
        if let Err(e) = scraper.writer().add_entry(entry).await {
            scraper.record_writer_failure(&e);
            return Err(ScrapeError::Fatal(format!(
                "archive write failed for {}",
                shard.article_id
            )));
        }
    }
    Ok(())
}

/// Redirect sources whose target was mirrored become archive redirects.
pub(super) async fn write_redirect_entries(
    scraper: &Scraper,
    metadata: &WikiMetadata,
) -> Result<()> {
    for from in scraper.stores().redirects.keys() {
        let Some(redirect) = scraper.stores().redirects.get(&from) else {
            continue;
        };
        if !scraper.stores().is_mirrored(&redirect.to) {
            continue;
        }
        let namespace = metadata
            .namespaces
            .of_article(&redirect.to)
            .map(|ns| archive_namespace(ns.id))
            .unwrap_or('A');
        let entry = ArchiveRedirect {
            namespace,
            url: redirect.from.clone(),
            title: redirect.from.replace('_', " "),
            target_url: redirect.to.clone(),
        };
        if let Err(e) = scraper.writer().add_redirect(entry).await {
            scraper.record_writer_failure(&e);
        }
    }
    scraper.check_writer()
}
