//! Compiled constants shared across the pipeline.

use lazy_static::lazy_static;
use regex::Regex;

/// Default base concurrency when none is configured.
pub const DEFAULT_SPEED: usize = 3;

/// Default per-request timeout in seconds.
pub const DEFAULT_REQ_TIMEOUT_SECS: u64 = 60;

/// Maximum retry attempts per logical request.
pub const FAIL_AFTER: u32 = 7;

/// Polling interval while waiting for a request slot.
pub const SLOT_POLL_MS: u64 = 200;

/// Subcategory entries per pagination shard.
pub const CATEGORY_PAGE_SIZE: usize = 200;

/// Space delimiter used in article ids.
pub const SPACE_DELIMITER: char = '_';

/// Classes whose elements are dropped outright in the cleanup pass.
pub const CSS_CLASS_BLACKLIST: &[&str] = &[
    "noprint",
    "metadata",
    "ambox",
    "stub",
    "topicon",
    "magnify",
    "navbar",
    "mw-editsection",
    "mw-kartographer-container",
];

/// Classes dropped only when the element contains no link.
pub const CSS_CLASS_BLACKLIST_IF_NO_LINK: &[&str] =
    &["mainarticle", "seealso", "dablink", "rellink", "hatnote"];

/// Classes additionally dropped when the `nodet` format flag is active.
pub const NODET_CSS_CLASS_BLACKLIST: &[&str] = &["navbox", "reference", "mw-ref"];

/// Element ids dropped in the cleanup pass.
pub const ID_BLACKLIST: &[&str] = &["purgelink"];

/// Classes whose inline `display:none` must be removed.
pub const CSS_CLASS_DISPLAY_LIST: &[&str] = &["thumb"];

/// Class substrings stripped from every element's `class` attribute.
pub const CLASS_CALL_BLACKLIST: &[&str] = &["plainlinks", "mw-headline-anchor"];

lazy_static! {
    /// File extensions treated as images for blob-cache revalidation.
    pub static ref IMAGE_URL_RE: Regex =
        Regex::new(r"(?i)\.(jpe?g|png|gif|svg|webp|ico|bmp|tiff?)(\?.*)?$")
            .expect("image extension pattern");

    /// Content types run through the bitmap optimisation pipeline.
    pub static ref BITMAP_CONTENT_TYPE_RE: Regex =
        Regex::new(r"(?i)^image/(png|jpe?g|gif)").expect("bitmap content-type pattern");

    /// `<width>px-` prefix on thumbnail file names.
    pub static ref THUMB_WIDTH_RE: Regex =
        Regex::new(r"^(\d+)px-").expect("thumb width pattern");

    /// `@1.5x` / `@2x` scale suffix on media file names.
    pub static ref SCALE_MULT_RE: Regex =
        Regex::new(r"@(\d+(?:\.\d+)?)x").expect("scale multiplier pattern");

    /// `url(...)` references inside a stylesheet.
    pub static ref CSS_URL_RE: Regex =
        Regex::new(r#"url\(\s*['"]?([^'")]+?)['"]?\s*\)"#).expect("css url pattern");

    /// Geo pattern 1: wikivoyage poi map.
    pub static ref GEO_POIMAP_RE: Regex =
        Regex::new(r"poimap2\.php\?.*?lat=([-\d.]+).*?lon=([-\d.]+)").expect("poimap pattern");

    /// Geo pattern 2: the geohack redirector.
    pub static ref GEO_GEOHACK_RE: Regex =
        Regex::new(r"geohack\.php\?.*?params=([^&]+)").expect("geohack pattern");

    /// Geo pattern 3: `Special:Map/<zoom>/<lat>/<lon>` deep links.
    pub static ref GEO_SPECIAL_MAP_RE: Regex =
        Regex::new(r"Special:Map/\d+/(-?[\d.]+)/(-?[\d.]+)").expect("special map pattern");

    /// Email shape accepted for the operator contact address.
    pub static ref EMAIL_RE: Regex =
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern");

    /// Self-invocation in the `startup` module that must be deferred offline.
    pub static ref STARTUP_HACK_RE: Regex =
        Regex::new(r"script=document\.createElement\('script'\);").expect("startup hack pattern");
}

/// Replacement installed into the `startup` module: wait for the event the
/// `mediawiki` module fires once it has loaded.
pub const STARTUP_HACK_REPLACEMENT: &str =
    "document.body.addEventListener('fireStartUp', function () { startUp() }, false);\
     return;script=document.createElement('script');";

/// Suffix appended to the `mediawiki` module: fire the deferred start-up.
pub const MEDIAWIKI_HACK_SUFFIX: &str = "\n(function () {\n  \
var startUpEvent = new CustomEvent('fireStartUp');\n  \
document.body.dispatchEvent(startUpEvent);\n})();\n";
