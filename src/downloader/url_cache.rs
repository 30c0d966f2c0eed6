//! URL prefix interning.
//!
//! Media URLs queued for download overwhelmingly share a host-and-path
//! prefix. `serialize_url` swaps the prefix (everything up to and including
//! the last `/`) for a short `_<n>_` key; `deserialize_url` restores it.

use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Default)]
pub struct UrlPartCache {
    inner: RwLock<Interner>,
}

#[derive(Default)]
struct Interner {
    ids: HashMap<String, usize>,
    prefixes: Vec<String>,
}

impl UrlPartCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compress `url` into `_<n>_<tail>`.
    ///
    /// URLs without a `/` (or already serialized ones) are returned as-is.
    #[must_use]
    pub fn serialize_url(&self, url: &str) -> String {
        if url.starts_with('_') {
            return url.to_string();
        }
        let Some(split) = url.rfind('/') else {
            return url.to_string();
        };
        let (prefix, tail) = url.split_at(split + 1);

        if let Some(&id) = self.inner.read().ids.get(prefix) {
            return format!("_{id}_{tail}");
        }
        let mut interner = self.inner.write();
        let id = match interner.ids.get(prefix) {
            Some(&id) => id,
            None => {
                let id = interner.prefixes.len();
                interner.prefixes.push(prefix.to_string());
                interner.ids.insert(prefix.to_string(), id);
                id
            }
        };
        format!("_{id}_{tail}")
    }

    /// Expand a `_<n>_<tail>` key back into the full URL.
    ///
    /// Strings that do not carry a known key come back unchanged.
    #[must_use]
    pub fn deserialize_url(&self, serialized: &str) -> String {
        let Some(rest) = serialized.strip_prefix('_') else {
            return serialized.to_string();
        };
        let Some(end) = rest.find('_') else {
            return serialized.to_string();
        };
        let Ok(id) = rest[..end].parse::<usize>() else {
            return serialized.to_string();
        };
        let interner = self.inner.read();
        match interner.prefixes.get(id) {
            Some(prefix) => format!("{prefix}{}", &rest[end + 1..]),
            None => serialized.to_string(),
        }
    }
}
