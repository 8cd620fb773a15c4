use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

pub const DEFAULT_KEY: &str = "default";

/// English baseline keys, in lookup priority order.
pub const BASELINE_KEYS: [&str; 3] = ["en-US", "en", DEFAULT_KEY];

static LANG_KEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z]{2}(?:[-_](?:[A-Za-z]{2}|[A-Za-z]{4}|[0-9]{3}))?$")
        .expect("lang key regex")
});

/// Canonical form of a language code: `es_co` / `ES-CO` -> `es-CO`.
pub fn normalize_lang(code: &str) -> String {
    let code = code.trim();
    if code.eq_ignore_ascii_case(DEFAULT_KEY) {
        return DEFAULT_KEY.to_string();
    }
    let code = code.replace('_', "-");
    let mut parts = code.splitn(2, '-');
    let lang = parts.next().unwrap_or("").to_ascii_lowercase();
    match parts.next() {
        Some(region) if region.len() == 2 => format!("{lang}-{}", region.to_ascii_uppercase()),
        Some(script) if script.len() == 4 && script.chars().all(|c| c.is_ascii_alphabetic()) => {
            let lower = script.to_ascii_lowercase();
            format!("{lang}-{}{}", lower[..1].to_ascii_uppercase(), &lower[1..])
        }
        Some(rest) => format!("{lang}-{rest}"),
        None => lang,
    }
}

pub fn is_language_key(key: &str) -> bool {
    key.eq_ignore_ascii_case(DEFAULT_KEY) || LANG_KEY_RE.is_match(key)
}

pub fn is_protected(lang: &str) -> bool {
    let lang = normalize_lang(lang);
    BASELINE_KEYS.contains(&lang.as_str())
}

/// A map is a localizable node when it holds text under `default` or a language-shaped
/// key and carries no nested objects or arrays. Other scalar keys may ride along.
pub fn is_localizable(map: &Map<String, Value>) -> bool {
    map.iter().any(|(k, v)| is_language_key(k) && v.is_string())
        && !map.values().any(|v| v.is_object() || v.is_array())
}

/// The key actually used in `map` for `lang`, matching surface forms such as `es_co`
/// for `es-CO`. Keys holding non-string values are ignored.
pub fn find_lang_key<'m>(map: &'m Map<String, Value>, lang: &str) -> Option<&'m str> {
    let wanted = normalize_lang(lang);
    let strings = move || map.iter().filter(|(_, v)| v.is_string()).map(|(k, _)| k.as_str());
    strings()
        .find(|k| *k == wanted)
        .or_else(|| strings().find(|k| is_language_key(k) && normalize_lang(k) == wanted))
}

/// Text stored for `lang` under any spelling of its key.
pub fn lang_value<'m>(map: &'m Map<String, Value>, lang: &str) -> Option<&'m str> {
    find_lang_key(map, lang).and_then(|k| map.get(k)).and_then(Value::as_str)
}

/// The node's English text: `en-US`, then `en`, then `default`, under any key spelling.
pub fn english_baseline(map: &Map<String, Value>) -> Option<&str> {
    BASELINE_KEYS.iter().find_map(|k| lang_value(map, k))
}
