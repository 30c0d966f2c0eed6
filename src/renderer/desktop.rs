//! Desktop rendering path.
//!
//! Used for the main page and whenever the REST endpoint is unavailable.
//! The payload is one of three shapes depending on which endpoint answered.

use serde_json::Value;

/// Pull the rendered HTML out of a desktop-path payload: prefer the
/// visual-editor content, then `parse.text['*']`, then a pagebundle body.
#[must_use]
pub fn extract_html(raw: &Value) -> Option<String> {
    if let Some(content) = raw["visualeditor"]["content"].as_str() {
        return Some(content.to_string());
    }
    if let Some(text) = raw["parse"]["text"]["*"].as_str() {
        return Some(text.to_string());
    }
    if let Some(body) = raw["html"]["body"].as_str() {
        return Some(body.to_string());
    }
    None
}
