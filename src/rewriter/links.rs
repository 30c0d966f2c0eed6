//! Pass B: URL rewriting over `<a>` and `<area>`.

use kuchiki::{ElementData, NodeDataRef, NodeRef};

use crate::utils::{encode_article_id_for_html_url, relative_path, resolve_against, title_to_id};
use crate::wiki_client::types::WikiMetadata;

use super::{RewriteContext, geo, snapshot_select, unwrap_node};

pub fn rewrite_urls(document: &NodeRef, ctx: &RewriteContext<'_>) {
    for anchor in snapshot_select(document, "a, area") {
        let href = anchor
            .attributes
            .borrow()
            .get("href")
            .map(str::to_string)
            .unwrap_or_default();

        if href.is_empty() {
            anchor.as_node().detach();
            continue;
        }
        if href.starts_with('#') {
            continue;
        }
        // Already archive-local or already a geo URI: nothing to do.
        if href.starts_with("../") || href.starts_with("geo:") {
            continue;
        }

        if let Some((lat, lon)) = geo::extract_geo(&href) {
            anchor
                .attributes
                .borrow_mut()
                .insert("href", format!("geo:{lat},{lon}"));
            continue;
        }

        let rel = anchor
            .attributes
            .borrow()
            .get("rel")
            .map(str::to_string)
            .unwrap_or_default();

        if rel.contains("mw:WikiLink/Interwiki") {
            append_class(&anchor, "external");
            continue;
        }
        if rel.contains("mw:ExtLink") || rel.contains("nofollow") {
            if href.starts_with('/') {
                if let Some(absolute) = resolve_against(&ctx.metadata.base_url, &href) {
                    anchor.attributes.borrow_mut().insert("href", absolute);
                }
            } else if href.starts_with("./") {
                unwrap_node(anchor.as_node());
            }
            continue;
        }
        if rel.contains("mw:WikiLink") || rel.contains("mw:referencedBy") {
            rewrite_wiki_link(&anchor, &href, ctx);
            continue;
        }
        if rel.is_empty() {
            // MediaWiki-native HTML: only links whose target resolves to a
            // wiki title get the mirrored/redirect/unwrap decision.
            if extract_link_target(&href, ctx.metadata).is_some() {
                rewrite_wiki_link(&anchor, &href, ctx);
            }
        }
    }
}

/// The mirrored/redirect/unwrap decision for an article link.
fn rewrite_wiki_link(anchor: &NodeDataRef<ElementData>, href: &str, ctx: &RewriteContext<'_>) {
    let Some((title, fragment)) = extract_link_target(href, ctx.metadata) else {
        unwrap_node(anchor.as_node());
        return;
    };

    let target = if ctx.stores.is_mirrored(&title) {
        Some(title)
    } else {
        ctx.stores
            .redirect_target(&title)
            .filter(|redirect_target| ctx.stores.is_mirrored(redirect_target))
    };

    match target {
        Some(target) => {
            let ns_char = ctx
                .metadata
                .namespaces
                .of_article(&target)
                .map(|ns| crate::renderer::archive_namespace(ns.id))
                .unwrap_or('A');
            let mut local = relative_path(
                ctx.article_id,
                ns_char,
                &encode_article_id_for_html_url(&target),
            );
            if let Some(fragment) = fragment {
                local.push('#');
                local.push_str(&fragment);
            }
            anchor.attributes.borrow_mut().insert("href", local);
        }
        None => unwrap_node(anchor.as_node()),
    }
}

/// Resolve a link target to an article id.
///
/// Recognised shapes: Parsoid `./Title`, site-absolute `/wiki/Title`, and
/// full URLs under the wiki's article path. Anything else is not an
/// article link.
pub(crate) fn extract_link_target(
    href: &str,
    metadata: &WikiMetadata,
) -> Option<(String, Option<String>)> {
    let (path, fragment) = match href.split_once('#') {
        Some((path, fragment)) => (path, Some(fragment.to_string())),
        None => (href, None),
    };
    if path.is_empty() {
        return None;
    }

    let raw_title = if let Some(rest) = path.strip_prefix("./") {
        rest.to_string()
    } else {
        let absolute = resolve_against(&metadata.base_url, path)?;
        absolute.strip_prefix(&metadata.web_url)?.to_string()
    };
    if raw_title.is_empty() {
        return None;
    }

    let decoded = urlencoding::decode(&raw_title)
        .map(|c| c.into_owned())
        .unwrap_or(raw_title);
    Some((title_to_id(&decoded), fragment))
}

fn append_class(anchor: &NodeDataRef<ElementData>, class: &str) {
    let mut attrs = anchor.attributes.borrow_mut();
    let updated = match attrs.get("class") {
        Some(existing) if !existing.split_whitespace().any(|c| c == class) => {
            format!("{existing} {class}")
        }
        Some(existing) => existing.to_string(),
        None => class.to_string(),
    };
    attrs.insert("class", updated);
}
