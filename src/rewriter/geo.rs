//! Geographic link recognition.
//!
//! Three upstream URL families resolve to plain `geo:` URIs: the
//! wikivoyage poi map, the geohack redirector, and `Special:Map` deep
//! links. Geohack `params=` values come in two encodings: semicolon
//! separated decimal degrees, or underscore-separated
//! degree/minute/second tokens closed by a compass letter.

use crate::utils::constants::{GEO_GEOHACK_RE, GEO_POIMAP_RE, GEO_SPECIAL_MAP_RE};

/// DMS positional factors: degrees, minutes, seconds.
const FACTORS: [f64; 3] = [1.0, 60.0, 3600.0];

/// Recognise a geo URL and extract its coordinates.
#[must_use]
pub fn extract_geo(href: &str) -> Option<(f64, f64)> {
    if let Some(caps) = GEO_POIMAP_RE.captures(href) {
        let lat = caps.get(1)?.as_str().parse().ok()?;
        let lon = caps.get(2)?.as_str().parse().ok()?;
        return Some((lat, lon));
    }
    if let Some(caps) = GEO_GEOHACK_RE.captures(href) {
        let raw = caps.get(1)?.as_str();
        let decoded = urlencoding::decode(raw)
            .map(|c| c.into_owned())
            .unwrap_or_else(|_| raw.to_string());
        return parse_geohack_params(&decoded);
    }
    if let Some(caps) = GEO_SPECIAL_MAP_RE.captures(href) {
        let lat = caps.get(1)?.as_str().parse().ok()?;
        let lon = caps.get(2)?.as_str().parse().ok()?;
        return Some((lat, lon));
    }
    None
}

/// Decode a geohack `params=` value.
#[must_use]
pub fn parse_geohack_params(params: &str) -> Option<(f64, f64)> {
    if params.contains(';') {
        let mut parts = params.split(';');
        let lat: f64 = parts.next()?.trim().parse().ok()?;
        // The longitude may carry trailing `_type:city`-style qualifiers.
        let lon_token = parts.next()?.split('_').next()?.trim();
        let lon: f64 = lon_token.parse().ok()?;
        return Some((lat, lon));
    }

    let mut coords: Vec<f64> = Vec::with_capacity(2);
    let mut parts: Vec<f64> = Vec::with_capacity(3);
    for token in params.split('_') {
        if let Ok(value) = token.parse::<f64>() {
            if parts.len() < FACTORS.len() {
                parts.push(value);
            }
            continue;
        }
        match token {
            "N" | "E" | "S" | "W" | "O" => {
                let magnitude: f64 = parts
                    .iter()
                    .zip(FACTORS.iter())
                    .map(|(part, factor)| part / factor)
                    .sum();
                let sign = if matches!(token, "S" | "W" | "O") {
                    -1.0
                } else {
                    1.0
                };
                coords.push(sign * magnitude);
                parts.clear();
            }
            // Anything else ends the coordinate list (`type:city` etc.).
            _ => break,
        }
    }
    if coords.len() >= 2 {
        Some((coords[0], coords[1]))
    } else {
        None
    }
}
