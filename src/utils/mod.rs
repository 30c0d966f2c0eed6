pub mod constants;
pub mod string_utils;
pub mod url_utils;

pub use string_utils::{group_letter, iso2_to_iso3, lcfirst, ucfirst};
pub use url_utils::{
    MediaBase, decode_article_id_from_html_url, encode_article_id_for_html_url, get_media_base,
    relative_path, resolve_against, strip_http, title_to_id, with_trailing_slash,
};
