//! Continuation-cursor bookkeeping for the query API.
//!
//! One query can carry several independent cursors (`clcontinue`,
//! `cocontinue`, `picontinue`, `rdcontinue`, `rvcontinue`) besides the
//! outer generator cursor. Partial pages are deep-merged; on continuation
//! pages only the props whose cursor was being followed are retained,
//! because the server re-emits the others in full.

use std::collections::{BTreeMap, HashSet};

use serde_json::Value;

/// Deep-merge `new` into `acc`: objects merge key-wise, arrays append,
/// scalars overwrite.
pub fn merge_values(acc: &mut Value, new: Value) {
    match (acc, new) {
        (Value::Object(a), Value::Object(b)) => {
            for (key, value) in b {
                match a.get_mut(&key) {
                    Some(slot) => merge_values(slot, value),
                    None => {
                        a.insert(key, value);
                    }
                }
            }
        }
        (Value::Array(a), Value::Array(b)) => a.extend(b),
        (slot, value) => *slot = value,
    }
}

/// The page-object keys contributed by the prop a cursor belongs to.
#[must_use]
pub fn props_for_cursor(cursor: &str) -> &'static [&'static str] {
    match cursor {
        "clcontinue" => &["categories"],
        "cocontinue" => &["coordinates"],
        "rdcontinue" => &["redirects"],
        "picontinue" => &["thumbnail", "pageimage"],
        "rvcontinue" => &["revisions"],
        _ => &[],
    }
}

/// Keys always kept from a page object (identity fields).
const IDENTITY_KEYS: &[&str] = &["pageid", "ns", "title", "missing"];

/// Restrict a continuation page to the props named by the cursors that were
/// echoed in the request.
#[must_use]
pub fn filter_continued_props(page: &Value, cursors: &BTreeMap<String, String>) -> Value {
    let Some(object) = page.as_object() else {
        return page.clone();
    };
    let retained: HashSet<&str> = cursors
        .keys()
        .flat_map(|cursor| props_for_cursor(cursor).iter().copied())
        .chain(IDENTITY_KEYS.iter().copied())
        .collect();
    Value::Object(
        object
            .iter()
            .filter(|(key, _)| retained.contains(key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
    )
}

/// Extract the continuation cursors from a response, across both the modern
/// `continue` object and the legacy `query-continue` nesting. The
/// bookkeeping `continue` entry and the outer generator cursor are kept out
/// of the inner set.
#[must_use]
pub fn extract_cursors(response: &Value) -> BTreeMap<String, String> {
    let mut cursors = BTreeMap::new();

    if let Some(modern) = response["continue"].as_object() {
        for (key, value) in modern {
            if key == "continue" {
                continue;
            }
            if let Some(v) = cursor_value(value) {
                cursors.insert(key.clone(), v);
            }
        }
    }
    if let Some(legacy) = response["query-continue"].as_object() {
        for sub in legacy.values() {
            if let Some(sub) = sub.as_object() {
                for (key, value) in sub {
                    if let Some(v) = cursor_value(value) {
                        cursors.insert(key.clone(), v);
                    }
                }
            }
        }
    }
    cursors
}

fn cursor_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
