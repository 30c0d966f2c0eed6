//! Pass A: media treatment.
//!
//! Rewrites `<video>`/`<audio>`, `<img>` and figure containers to
//! archive-local references, reporting every media URL the document now
//! depends on.

use kuchiki::{ElementData, NodeDataRef, NodeRef};

use crate::store::FileTask;
use crate::utils::{get_media_base, relative_path, resolve_against};

use super::{
    RewriteContext, element_name, inner_html, links, replace_with_fragment, serialize_node,
    snapshot_select, unwrap_node,
};

pub fn treat_medias(document: &NodeRef, ctx: &RewriteContext<'_>, deps: &mut Vec<FileTask>) {
    treat_videos(document, ctx, deps);
    treat_images(document, ctx, deps);
    treat_figures(document, ctx);
}

/// Queue `url` for download into the `I` namespace and return the
/// archive-local reference the attribute should carry.
fn rewrite_media_url(
    ctx: &RewriteContext<'_>,
    url: &str,
    deps: &mut Vec<FileTask>,
) -> Option<String> {
    let absolute = resolve_against(&ctx.metadata.base_url, url)?;
    let media = get_media_base(&absolute)?;
    let local = relative_path(ctx.article_id, 'I', &media.path);
    deps.push(FileTask {
        path: media.path,
        url: absolute,
        namespace: 'I',
        width: media.width,
        mult: media.mult,
    });
    Some(local)
}

fn treat_videos(document: &NodeRef, ctx: &RewriteContext<'_>, deps: &mut Vec<FileTask>) {
    for video in snapshot_select(document, "video, audio") {
        if ctx.format.nopic || ctx.format.novid || ctx.format.nodet {
            video.as_node().detach();
            continue;
        }

        {
            let mut attrs = video.attributes.borrow_mut();
            attrs.insert("controls", String::new());
            // Chromium refuses to show controls below 40 CSS pixels.
            if let Some(height) = attrs.get("height").and_then(|h| h.parse::<u32>().ok()) {
                if height < 40 {
                    attrs.insert("height", "40".to_string());
                }
            }
            let poster = attrs.get("poster").map(str::to_string);
            if let Some(poster) = poster {
                match rewrite_media_url(ctx, &poster, deps) {
                    Some(local) => {
                        attrs.insert("poster", local);
                    }
                    None => {
                        attrs.remove("poster");
                    }
                }
            }
        }

        // Keep only the lowest-resolution source.
        let mut sources: Vec<NodeDataRef<ElementData>> =
            snapshot_select(video.as_node(), "source");
        sources.sort_by_key(|source| source_area(source));
        let mut kept = false;
        for (index, source) in sources.iter().enumerate() {
            if index > 0 {
                source.as_node().detach();
                continue;
            }
            let src = source.attributes.borrow().get("src").map(str::to_string);
            match src.and_then(|src| rewrite_media_url(ctx, &src, deps)) {
                Some(local) => {
                    source.attributes.borrow_mut().insert("src", local);
                    kept = true;
                }
                None => source.as_node().detach(),
            }
        }

        let has_poster = video.attributes.borrow().contains("poster");
        if !kept && !has_poster {
            video.as_node().detach();
        }
    }
}

/// Sort key for `<source>` elements: rendered file area, with the
/// display-size attributes as fallback and unknown sizes last.
fn source_area(source: &NodeDataRef<ElementData>) -> u64 {
    let attrs = source.attributes.borrow();
    let dim = |name: &str| attrs.get(name).and_then(|v| v.parse::<u64>().ok());
    match (dim("data-file-width"), dim("data-file-height")) {
        (Some(w), Some(h)) => w * h,
        _ => match (dim("data-width"), dim("data-height")) {
            (Some(w), Some(h)) => w * h,
            _ => u64::MAX,
        },
    }
}

fn treat_images(document: &NodeRef, ctx: &RewriteContext<'_>, deps: &mut Vec<FileTask>) {
    for img in snapshot_select(document, "img") {
        if ctx.format.nopic {
            img.as_node().detach();
            continue;
        }
        let src = img.attributes.borrow().get("src").map(str::to_string);
        let Some(src) = src else {
            img.as_node().detach();
            continue;
        };
        if src.starts_with("./Special:FilePath/") {
            continue;
        }
        if is_math_image(&img) {
            continue;
        }

        unwrap_dead_link(&img, ctx);

        match rewrite_media_url(ctx, &src, deps) {
            Some(local) => {
                let mut attrs = img.attributes.borrow_mut();
                attrs.insert("src", local);
                attrs.remove("resource");
                attrs.remove("srcset");
            }
            None => img.as_node().detach(),
        }
    }
}

/// Math rendering fallbacks are kept untouched.
fn is_math_image(img: &NodeDataRef<ElementData>) -> bool {
    let attrs = img.attributes.borrow();
    let math_class = attrs
        .get("class")
        .is_some_and(|class| class.contains("mwe-math-fallback-image"));
    let math_typeof = attrs
        .get("typeof")
        .is_some_and(|t| t.contains("mw:Extension/math"));
    math_class || math_typeof
}

/// When the image is wrapped in a link to an unmirrored, unredirected
/// article, the link is dead offline: promote the image out of it.
fn unwrap_dead_link(img: &NodeDataRef<ElementData>, ctx: &RewriteContext<'_>) {
    let Some(parent) = img.as_node().parent() else {
        return;
    };
    if element_name(&parent).as_deref() != Some("a") {
        return;
    }
    let href = parent
        .as_element()
        .and_then(|el| el.attributes.borrow().get("href").map(str::to_string))
        .unwrap_or_default();
    let Some((title, _fragment)) = links::extract_link_target(&href, ctx.metadata) else {
        return;
    };
    let mirrored = ctx.stores.is_mirrored(&title)
        || ctx
            .stores
            .redirect_target(&title)
            .is_some_and(|target| ctx.stores.is_mirrored(&target));
    if !mirrored {
        unwrap_node(&parent);
    }
}

fn treat_figures(document: &NodeRef, ctx: &RewriteContext<'_>) {
    for figure in snapshot_select(document, "figure, span[typeof=\"mw:Image/Frameless\"]") {
        let node = figure.as_node();
        let Some(media) = node.descendants().find(|descendant| {
            matches!(
                element_name(descendant).as_deref(),
                Some("img" | "video" | "audio")
            )
        }) else {
            node.detach();
            continue;
        };

        let class = figure
            .attributes
            .borrow()
            .get("class")
            .unwrap_or_default()
            .to_string();
        let (thumb_classes, center) = if class.contains("mw-halign-right") {
            ("thumb tright", false)
        } else if class.contains("mw-halign-left") {
            ("thumb tleft", false)
        } else if class.contains("mw-halign-center") {
            ("thumb tnone", true)
        } else {
            match ctx.metadata.text_dir {
                crate::wiki_client::types::TextDirection::Ltr => ("thumb tright", false),
                crate::wiki_client::types::TextDirection::Rtl => ("thumb tleft", false),
            }
        };

        let image_width = media
            .as_element()
            .and_then(|el| el.attributes.borrow().get("width").and_then(|w| w.parse::<u32>().ok()))
            .unwrap_or(320);
        let caption = node
            .select_first("figcaption, .thumbcaption")
            .map(|cap| inner_html(cap.as_node()))
            .unwrap_or_default();

        let thumb = format!(
            "<div class=\"{thumb_classes}\"><div class=\"thumbinner\" style=\"width:{}px\">\
             {}<div class=\"thumbcaption\">{caption}</div></div></div>",
            image_width + 2,
            serialize_node(&media),
        );
        let replacement = if center {
            format!("<center>{thumb}</center>")
        } else {
            thumb
        };
        replace_with_fragment(node, &replacement);
    }
}
