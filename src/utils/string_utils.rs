//! Small string helpers shared by the renderer and the wiki client.

/// Upper-case the first character of a title, locale-aware.
///
/// Used both for namespace-variant registration and for the alphabetical
/// group headers on category listings.
#[must_use]
pub fn ucfirst(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Lower-case the first character of a title, locale-aware.
#[must_use]
pub fn lcfirst(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// The upper-cased first character used as an alphabetical group key.
#[must_use]
pub fn group_letter(title: &str) -> String {
    title
        .chars()
        .next()
        .map(|c| c.to_uppercase().collect())
        .unwrap_or_default()
}

/// Map an ISO 639-1 code to its ISO 639-3 equivalent.
///
/// Falls back to the two-letter code itself when the language is not in the
/// table; callers treat the result as opaque metadata.
#[must_use]
pub fn iso2_to_iso3(iso2: &str) -> String {
    let mapped = match iso2 {
        "en" => "eng",
        "fr" => "fra",
        "de" => "deu",
        "es" => "spa",
        "it" => "ita",
        "pt" => "por",
        "nl" => "nld",
        "pl" => "pol",
        "ru" => "rus",
        "ja" => "jpn",
        "zh" => "zho",
        "ar" => "ara",
        "sv" => "swe",
        "fa" => "fas",
        "he" => "heb",
        "ko" => "kor",
        "tr" => "tur",
        "uk" => "ukr",
        "vi" => "vie",
        "bm" => "bam",
        "hi" => "hin",
        "bn" => "ben",
        "sw" => "swa",
        _ => return iso2.to_string(),
    };
    mapped.to_string()
}
