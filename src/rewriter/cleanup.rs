//! Pass C: structural cleanup.
//!
//! Runs after media and link rewriting. Deletes chrome that is useless
//! offline, applies the configured blacklists, collapses empty headings,
//! and scrubs Parsoid bookkeeping attributes from every element.

use kuchiki::NodeRef;

use crate::utils::constants::{
    CLASS_CALL_BLACKLIST, CSS_CLASS_BLACKLIST, CSS_CLASS_BLACKLIST_IF_NO_LINK,
    CSS_CLASS_DISPLAY_LIST, ID_BLACKLIST, NODET_CSS_CLASS_BLACKLIST,
};

use super::{
    RewriteContext, element_name, inner_html, next_element_sibling, replace_with_fragment,
    snapshot_select,
};

pub fn clean_up(document: &NodeRef, ctx: &RewriteContext<'_>) {
    delete_nodes(document, "link, input");
    if ctx.format.nopic {
        delete_nodes(document, "map");
    }

    delete_empty(document, "li");
    delete_empty(document, "span");

    clean_galleries(document);
    apply_class_blacklists(document, ctx);
    convert_reference_spans(document);

    for id in ID_BLACKLIST {
        delete_nodes(document, &format!("#{id}"));
    }

    force_display(document);

    if !ctx.keep_empty_paragraphs {
        remove_empty_headings(document);
    }

    scrub_attributes(document);
}

fn delete_nodes(document: &NodeRef, selector: &str) {
    for node in snapshot_select(document, selector) {
        node.as_node().detach();
    }
}

/// An element is empty when it has no element children and no text.
fn is_empty(node: &NodeRef) -> bool {
    node.children().next().is_none()
        || (node.text_contents().trim().is_empty()
            && !node.children().any(|child| child.as_element().is_some()))
}

fn delete_empty(document: &NodeRef, selector: &str) {
    for node in snapshot_select(document, selector) {
        if is_empty(node.as_node()) {
            node.as_node().detach();
        }
    }
}

fn has_descendant(node: &NodeRef, selector: &str) -> bool {
    node.select(selector)
        .map(|mut matches| matches.next().is_some())
        .unwrap_or(false)
}

fn clean_galleries(document: &NodeRef) {
    for bx in snapshot_select(document, ".gallerybox") {
        if !has_descendant(bx.as_node(), "img, audio, video") {
            bx.as_node().detach();
        }
    }
    for gallery in snapshot_select(document, ".gallery") {
        if !has_descendant(gallery.as_node(), ".gallerybox") {
            gallery.as_node().detach();
        }
    }
}

fn apply_class_blacklists(document: &NodeRef, ctx: &RewriteContext<'_>) {
    for class in CSS_CLASS_BLACKLIST {
        delete_nodes(document, &format!(".{class}"));
    }
    for class in CSS_CLASS_BLACKLIST_IF_NO_LINK {
        for node in snapshot_select(document, &format!(".{class}")) {
            if !has_descendant(node.as_node(), "a") {
                node.as_node().detach();
            }
        }
    }
    if ctx.format.nodet {
        for class in NODET_CSS_CLASS_BLACKLIST {
            delete_nodes(document, &format!(".{class}"));
        }
    }
}

/// `<span rel="dc:references">` becomes `<sup>` with the same id and
/// content; empty ones vanish.
fn convert_reference_spans(document: &NodeRef) {
    for span in snapshot_select(document, "span[rel=\"dc:references\"]") {
        let content = inner_html(span.as_node());
        if content.trim().is_empty() {
            span.as_node().detach();
            continue;
        }
        let id = span
            .attributes
            .borrow()
            .get("id")
            .map(|id| format!(" id=\"{id}\""))
            .unwrap_or_default();
        replace_with_fragment(span.as_node(), &format!("<sup{id}>{content}</sup>"));
    }
}

/// Elements in the display-forcing class list must not stay hidden.
fn force_display(document: &NodeRef) {
    for class in CSS_CLASS_DISPLAY_LIST {
        for node in snapshot_select(document, &format!(".{class}")) {
            let mut attrs = node.attributes.borrow_mut();
            let Some(style) = attrs.get("style") else {
                continue;
            };
            if !style.contains("display:") {
                continue;
            }
            let cleaned: String = style
                .split(';')
                .filter(|declaration| {
                    !declaration.replace(' ', "").starts_with("display:none")
                })
                .collect::<Vec<_>>()
                .join(";");
            if cleaned.trim().is_empty() {
                attrs.remove("style");
            } else {
                attrs.insert("style", cleaned);
            }
        }
    }
}

/// Heading level of an element node (`h1`..`h6`).
fn heading_level(node: &NodeRef) -> Option<u8> {
    let name = element_name(node)?;
    let mut chars = name.chars();
    if chars.next() != Some('h') {
        return None;
    }
    let level = chars.next()?.to_digit(10)? as u8;
    if chars.next().is_none() && (1..=6).contains(&level) {
        Some(level)
    } else {
        None
    }
}

/// Drop headings that head no content: nothing after them, or immediately
/// another heading of equal-or-lower level. Walks levels 5 down to 1 so
/// emptied subsections expose their parents.
fn remove_empty_headings(document: &NodeRef) {
    for level in (1..=5u8).rev() {
        for heading in snapshot_select(document, &format!("h{level}")) {
            let node = heading.as_node();
            if node
                .parent()
                .and_then(|parent| element_name(&parent))
                .as_deref()
                == Some("summary")
            {
                continue;
            }
            match next_element_sibling(node) {
                None => node.detach(),
                Some(next) => {
                    if heading_level(&next).is_some_and(|next_level| next_level <= level) {
                        node.detach();
                    }
                }
            }
        }
    }
}

/// Remove Parsoid bookkeeping from every element.
fn scrub_attributes(document: &NodeRef) {
    let elements: Vec<NodeRef> = document
        .descendants()
        .filter(|node| node.as_element().is_some())
        .collect();
    for node in elements {
        let Some(element) = node.as_element() else {
            continue;
        };
        let mut attrs = element.attributes.borrow_mut();
        for name in ["data-parsoid", "typeof", "about", "data-mw"] {
            attrs.remove(name);
        }
        let mw_rel = attrs
            .get("rel")
            .is_some_and(|rel| rel.starts_with("mw:"));
        if mw_rel {
            attrs.remove("rel");
        }
        let class = attrs.get("class").map(str::to_string);
        if let Some(class) = class {
            let kept: Vec<&str> = class
                .split_whitespace()
                .filter(|token| {
                    !CLASS_CALL_BLACKLIST
                        .iter()
                        .any(|banned| token.contains(banned))
                })
                .collect();
            let joined = kept.join(" ");
            if joined.is_empty() {
                attrs.remove("class");
            } else if joined != class {
                attrs.insert("class", joined);
            }
        }
    }
}
