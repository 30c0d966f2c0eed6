//! DOM rewriting.
//!
//! Three passes over a parsed article document: media treatment, URL
//! rewriting, structural cleanup. The rewriter is a pure transform: it
//! reads the stores to decide link fates but only reports the media it
//! depends on; enqueuing is the orchestrator's job.

pub mod cleanup;
pub mod geo;
pub mod links;
pub mod media;
pub mod template;

use anyhow::{Context, Result};
use kuchiki::traits::TendrilSink;
use kuchiki::{ElementData, NodeDataRef, NodeRef};

use crate::config::ScrapeFormat;
use crate::store::{FileTask, Stores};
use crate::wiki_client::types::WikiMetadata;

/// Everything the passes need to decide rewrites.
pub struct RewriteContext<'a> {
    pub article_id: &'a str,
    pub metadata: &'a WikiMetadata,
    pub stores: &'a Stores,
    pub format: ScrapeFormat,
    pub keep_empty_paragraphs: bool,
}

/// Run the three passes and return the rewritten body fragment plus the
/// media the document now depends on.
pub fn rewrite_document(html: &str, ctx: &RewriteContext<'_>) -> Result<(String, Vec<FileTask>)> {
    let document = parse_document(html);
    let mut media_dependencies = Vec::new();

    media::treat_medias(&document, ctx, &mut media_dependencies);
    links::rewrite_urls(&document, ctx);
    cleanup::clean_up(&document, ctx);

    let body = body_fragment(&document)?;
    Ok((body, media_dependencies))
}

/// Parse an HTML string (fragment or document) into a DOM.
#[must_use]
pub(crate) fn parse_document(html: &str) -> NodeRef {
    kuchiki::parse_html().one(html.to_string())
}

/// Snapshot a selection into a vector so passes can detach members while
/// walking.
#[must_use]
pub(crate) fn snapshot_select(root: &NodeRef, selector: &str) -> Vec<NodeDataRef<ElementData>> {
    root.select(selector)
        .map(Iterator::collect)
        .unwrap_or_default()
}

/// Serialize one node including its own tag.
#[must_use]
pub(crate) fn serialize_node(node: &NodeRef) -> String {
    let mut out = Vec::new();
    if node.serialize(&mut out).is_err() {
        return String::new();
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Serialize the children of a node.
#[must_use]
pub(crate) fn inner_html(node: &NodeRef) -> String {
    node.children().map(|child| serialize_node(&child)).collect()
}

/// The inner HTML of the document's `<body>`.
pub(crate) fn body_fragment(document: &NodeRef) -> Result<String> {
    let body = document
        .select_first("body")
        .map_err(|()| anyhow::anyhow!("document has no body"))
        .context("serializing rewritten document")?;
    Ok(inner_html(body.as_node()))
}

/// Parse a fragment and return the nodes it produced (head and body
/// children, in order).
#[must_use]
pub(crate) fn fragment_nodes(html: &str) -> Vec<NodeRef> {
    let document = kuchiki::parse_html().one(html.to_string());
    let mut nodes = Vec::new();
    for part in ["head", "body"] {
        if let Ok(container) = document.select_first(part) {
            nodes.extend(container.as_node().children());
        }
    }
    nodes
}

/// Replace `node` with the nodes parsed from `html`.
pub(crate) fn replace_with_fragment(node: &NodeRef, html: &str) {
    for new_node in fragment_nodes(html) {
        node.insert_before(new_node);
    }
    node.detach();
}

/// Promote a node's children into its place and delete it.
pub(crate) fn unwrap_node(node: &NodeRef) {
    for child in node.children().collect::<Vec<_>>() {
        node.insert_before(child);
    }
    node.detach();
}

/// Lower-case local tag name of an element node.
#[must_use]
pub(crate) fn element_name(node: &NodeRef) -> Option<String> {
    node.as_element()
        .map(|el| el.name.local.to_string().to_ascii_lowercase())
}

/// The next sibling that is an element.
#[must_use]
pub(crate) fn next_element_sibling(node: &NodeRef) -> Option<NodeRef> {
    node.following_siblings()
        .find(|sibling| sibling.as_element().is_some())
}
