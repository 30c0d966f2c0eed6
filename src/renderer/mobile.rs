//! Mobile-sections rendering path.
//!
//! The payload carries a lead section and an ordered list of remaining
//! sections, each with a `toclevel`. Assembly threads a placeholder anchor
//! through the document: a top-level section clears the current placeholder
//! and appends itself, a deeper section replaces the placeholder inside its
//! parent, so subsections nest.

use serde_json::Value;

use crate::error::{Result, ScrapeError};
use crate::templates;

/// Assemble the body HTML. Returns the fragment and the lead's
/// `displaytitle` when present.
pub fn assemble(raw: &Value) -> Result<(String, Option<String>)> {
    let lead = &raw["lead"];
    if lead.is_null() {
        return Err(ScrapeError::Malformed {
            url: String::new(),
            reason: "mobile-sections payload without lead".into(),
        });
    }

    let lead_text: String = lead["sections"]
        .as_array()
        .map(|sections| {
            sections
                .iter()
                .filter_map(|s| s["text"].as_str())
                .collect::<Vec<_>>()
                .concat()
        })
        .unwrap_or_default();
    let display_title = lead["displaytitle"].as_str().map(str::to_string);

    let mut html = templates::lead_section(&lead_text);

    let empty = Vec::new();
    let sections = raw["remaining"]["sections"].as_array().unwrap_or(&empty);
    for (index, section) in sections.iter().enumerate() {
        let toclevel = section["toclevel"].as_u64().unwrap_or(1) as u32;
        let anchor = section["anchor"].as_str().unwrap_or_default();
        let line = section["line"].as_str().unwrap_or_default();
        let text = section["text"].as_str().unwrap_or_default();

        let placeholder = templates::section_placeholder(index);
        let rendered = templates::section(toclevel, anchor, line, text, index + 1);
        if toclevel <= 1 {
            html = html.replace(&placeholder, "");
            html.push_str(&rendered);
        } else {
            html = html.replace(&placeholder, &rendered);
        }
    }

    // Clear the trailing placeholder left by the last section (or the lead).
    html = html.replace(&templates::section_placeholder(sections.len()), "");
    Ok((html, display_title))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload() -> Value {
        json!({
            "lead": {
                "displaytitle": "London",
                "sections": [{"text": "<p>lead text</p>"}]
            },
            "remaining": {
                "sections": [
                    {"id": 1, "toclevel": 1, "anchor": "History", "line": "History",
                     "text": "<p>history</p>"},
                    {"id": 2, "toclevel": 2, "anchor": "Roman", "line": "Roman era",
                     "text": "<p>roman</p>"},
                    {"id": 3, "toclevel": 1, "anchor": "Geography", "line": "Geography",
                     "text": "<p>geo</p>"}
                ]
            }
        })
    }

    #[test]
    fn sections_nest_by_toclevel() {
        let (html, title) = assemble(&payload()).unwrap();
        assert_eq!(title.as_deref(), Some("London"));
        assert!(html.contains("<p>lead text</p>"));
        assert!(!html.contains("__SUB_LEVEL_SECTION_"));

        // The toclevel-2 section sits inside the History details element.
        let history_start = html.find("id=\"History\"").unwrap();
        let roman_start = html.find("id=\"Roman\"").unwrap();
        let history_end = html[history_start..].find("</details>").unwrap() + history_start;
        assert!(roman_start > history_start && roman_start < history_end);

        // The following top-level section is appended after it.
        let geo_start = html.find("id=\"Geography\"").unwrap();
        assert!(geo_start > history_end);
    }

    #[test]
    fn lead_only_payload_clears_placeholder() {
        let raw = json!({
            "lead": {"sections": [{"text": "<p>only</p>"}]},
            "remaining": {"sections": []}
        });
        let (html, title) = assemble(&raw).unwrap();
        assert!(title.is_none());
        assert!(html.contains("<p>only</p>"));
        assert!(!html.contains("__SUB_LEVEL_SECTION_"));
    }

    #[test]
    fn missing_lead_is_malformed() {
        assert!(assemble(&json!({})).is_err());
    }
}
