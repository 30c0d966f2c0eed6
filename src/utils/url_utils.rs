//! URL and archive-path manipulation utilities.
//!
//! Everything that converts between upstream URLs, article ids and
//! archive-local paths lives here so the rewriter, the renderer and the
//! orchestrator agree on one scheme.

use url::Url;

use super::constants::{SCALE_MULT_RE, SPACE_DELIMITER, THUMB_WIDTH_RE};

/// Ensure a URL string ends with exactly one trailing slash.
#[must_use]
pub fn with_trailing_slash(url: &str) -> String {
    let mut s = url.trim_end_matches('/').to_string();
    s.push('/');
    s
}

/// Drop the scheme from a URL, leaving `host/path…`.
///
/// Blob-cache objects are keyed by this form so that http/https variants of
/// the same media URL share one cache entry.
#[must_use]
pub fn strip_http(url: &str) -> String {
    url.trim_start_matches("https://")
        .trim_start_matches("http://")
        .to_string()
}

/// Normalise a wiki title into an article id (spaces → delimiter).
#[must_use]
pub fn title_to_id(title: &str) -> String {
    title.replace(' ', &SPACE_DELIMITER.to_string())
}

/// Percent-encode an article id for use inside an archive-local `href`.
///
/// `/` separates path segments and is preserved; every segment is encoded
/// independently.
#[must_use]
pub fn encode_article_id_for_html_url(id: &str) -> String {
    id.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Inverse of [`encode_article_id_for_html_url`].
#[must_use]
pub fn decode_article_id_from_html_url(encoded: &str) -> String {
    encoded
        .split('/')
        .map(|segment| {
            urlencoding::decode(segment)
                .map(|c| c.into_owned())
                .unwrap_or_else(|_| segment.to_string())
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Relative path from the article `from_id` (living under its own archive
/// namespace) to `target` inside namespace `ns`.
///
/// An id with `k` slashes sits `k + 1` directories below the archive root.
#[must_use]
pub fn relative_path(from_id: &str, ns: char, target: &str) -> String {
    let ups = from_id.matches('/').count() + 1;
    let mut out = "../".repeat(ups);
    out.push(ns);
    out.push('/');
    out.push_str(target);
    out
}

/// Resolution information recovered from a media URL.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaBase {
    /// Archive-local file name (unique key inside the `I` namespace).
    pub path: String,
    /// Pixel width when the URL is a `<width>px-` thumbnail.
    pub width: Option<u32>,
    /// Device scale multiplier when the name carries an `@<n>x` suffix.
    pub mult: Option<f64>,
}

/// Derive the archive path and resolution hints for a media URL.
///
/// Thumbnail URLs (`…/thumb/a/ab/Name.png/320px-Name.png`) collapse onto the
/// original file name so that differently-sized requests for the same image
/// share one archive entry; the width and `@2x` multiplier are reported so the
/// file store can keep the highest-resolution variant.
#[must_use]
pub fn get_media_base(raw_url: &str) -> Option<MediaBase> {
    let parsed = Url::parse(raw_url).ok()?;
    let segments: Vec<&str> = parsed.path_segments()?.filter(|s| !s.is_empty()).collect();
    let last = *segments.last()?;

    let mult = SCALE_MULT_RE
        .captures(last)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok());

    let (name, width) = if segments.iter().any(|s| *s == "thumb") {
        // Inside a thumb tree the last segment is `<width>px-<name>` and the
        // one before it is the original file name.
        let width = THUMB_WIDTH_RE
            .captures(last)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok());
        let original = if segments.len() >= 2 {
            segments[segments.len() - 2]
        } else {
            last
        };
        (original, width)
    } else {
        (last, None)
    };

    let decoded = urlencoding::decode(name)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| name.to_string());
    if decoded.is_empty() {
        return None;
    }

    Some(MediaBase {
        path: decoded,
        width,
        mult,
    })
}

/// Resolve `href` against `base`, tolerating protocol-relative references.
pub fn resolve_against(base: &str, href: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    base.join(href).ok().map(|u| u.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_idempotent() {
        assert_eq!(with_trailing_slash("https://w/api"), "https://w/api/");
        assert_eq!(with_trailing_slash("https://w/api/"), "https://w/api/");
    }

    #[test]
    fn strip_http_drops_scheme_only() {
        assert_eq!(strip_http("https://host/a/b.png"), "host/a/b.png");
        assert_eq!(strip_http("http://host/a"), "host/a");
        assert_eq!(strip_http("host/a"), "host/a");
    }

    #[test]
    fn article_id_codec_round_trips() {
        for id in ["London", "Category:Foo_bar", "A \"quoted\" name", "Café"] {
            let encoded = encode_article_id_for_html_url(id);
            assert_eq!(decode_article_id_from_html_url(&encoded), id);
            // encode(decode(x)) == x for ids whose segments contain no '/'
            assert_eq!(encode_article_id_for_html_url(&decode_article_id_from_html_url(&encoded)), encoded);
        }
    }

    #[test]
    fn relative_path_counts_subpage_depth() {
        assert_eq!(relative_path("London", 'I', "a.png"), "../I/a.png");
        assert_eq!(relative_path("A/B", 'A', "X"), "../../A/X");
        assert_eq!(relative_path("A/B/C", '-', "style.css"), "../../../-/style.css");
    }

    #[test]
    fn media_base_collapses_thumbs() {
        let m = get_media_base(
            "https://upload.wikimedia.org/wikipedia/commons/thumb/a/ab/Tower.png/320px-Tower.png",
        )
        .unwrap();
        assert_eq!(m.path, "Tower.png");
        assert_eq!(m.width, Some(320));
        assert_eq!(m.mult, None);
    }

    #[test]
    fn media_base_reads_scale_suffix() {
        let m = get_media_base("https://host/w/skins/logo@2x.png").unwrap();
        assert_eq!(m.path, "logo@2x.png");
        assert_eq!(m.mult, Some(2.0));
    }

    #[test]
    fn media_base_rejects_garbage() {
        assert!(get_media_base("not a url").is_none());
    }
}
