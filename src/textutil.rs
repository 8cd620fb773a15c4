use encoding_rs::{Encoding, UTF_8};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static NON_ALNUM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("slug regex"));
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag regex"));
static ENTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[A-Za-z]+);").expect("entity regex"));
static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("ws regex"));
static BLANK_LINES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]*\r?\n(?:[ \t]*\r?\n)+[ \t]*").expect("blank lines regex"));
static NEWLINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]*\r?\n[ \t]*").expect("newline regex"));
static LEADING_MARKUP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:<[^>]+>\s*)+").expect("leading markup regex"));

pub const PARAGRAPH_BREAK: &str = "<br><br>";
pub const UNNAMED: &str = "unnamed";

/// Lowercase, collapse non-alphanumeric runs to `_`, trim underscores.
pub fn slugify(text: &str) -> String {
    let lower = text.to_lowercase();
    NON_ALNUM_RE
        .replace_all(&lower, "_")
        .trim_matches('_')
        .to_string()
}

/// Like [`slugify`], but never returns an empty segment.
pub fn slug_or_unnamed(text: &str) -> String {
    let slug = slugify(text);
    if slug.is_empty() {
        UNNAMED.to_string()
    } else {
        slug
    }
}

/// Comparison form for English-text tie-breaks: tags and entities removed,
/// whitespace collapsed, lowercased.
pub fn normalize_for_match(text: &str) -> String {
    let no_tags = TAG_RE.replace_all(text, " ");
    let no_entities = ENTITY_RE.replace_all(&no_tags, " ");
    WS_RE
        .replace_all(&no_entities, " ")
        .trim()
        .to_lowercase()
}

/// Decodes the XML named entities, `&nbsp;`, and numeric character references.
/// Unknown entities are left untouched.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    ENTITY_RE
        .replace_all(text, |caps: &Captures<'_>| {
            let body = &caps[1];
            let decoded = match body {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ if body.starts_with("#x") || body.starts_with("#X") => {
                    u32::from_str_radix(&body[2..], 16).ok().and_then(char::from_u32)
                }
                _ if body.starts_with('#') => body[1..].parse::<u32>().ok().and_then(char::from_u32),
                _ => None,
            };
            match decoded {
                Some(ch) => ch.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

pub fn strip_cdata(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("<![CDATA[")
        .and_then(|s| s.strip_suffix("]]>"))
        .unwrap_or(text)
}

/// Final cleanup of already-decoded bundle text: CDATA unwrapping, trimming.
pub fn clean_bundle_text(decoded: &str) -> String {
    strip_cdata(decoded).trim().to_string()
}

/// Normalizes text destined for an HTML field. Blank-line runs become a paragraph
/// break, single newlines become spaces, and the baseline's leading markup is carried
/// over when the translation has none.
pub fn normalize_html(text: &str, baseline: Option<&str>) -> String {
    let out = BLANK_LINES_RE.replace_all(text, PARAGRAPH_BREAK);
    let out = NEWLINE_RE.replace_all(&out, " ");
    let out = out.trim();
    if LEADING_MARKUP_RE.is_match(out) {
        return out.to_string();
    }
    match baseline.and_then(|b| LEADING_MARKUP_RE.find(b)) {
        Some(m) => format!("{}{out}", m.as_str().trim()),
        None => out.to_string(),
    }
}

/// Decodes file bytes by BOM (UTF-8 / UTF-16 spreadsheet exports), defaulting to UTF-8.
pub fn decode_text_bytes(bytes: &[u8]) -> String {
    let (encoding, bom_len) = Encoding::for_bom(bytes).unwrap_or((UTF_8, 0));
    let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
    text.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_and_trims() {
        assert_eq!(slugify("School Page Slug"), "school_page_slug");
        assert_eq!(slugify("SchoolFun"), "schoolfun");
        assert_eq!(slugify("  --Yes, always!-- "), "yes_always");
        assert_eq!(slugify("¿?"), "");
        assert_eq!(slug_or_unnamed("¿?"), "unnamed");
    }

    #[test]
    fn match_normalization_ignores_markup_and_case() {
        assert_eq!(
            normalize_for_match("<b>Yes,</b>&nbsp;  ALWAYS\n"),
            "yes, always"
        );
        assert_eq!(normalize_for_match("What is   your age?"), "what is your age?");
    }

    #[test]
    fn decodes_entities() {
        assert_eq!(
            decode_entities("a &amp; b &lt;c&gt; &quot;d&quot; &apos;e&apos;"),
            "a & b <c> \"d\" 'e'"
        );
        assert_eq!(decode_entities("x&nbsp;y"), "x\u{a0}y");
        assert_eq!(decode_entities("&#191;Qu&#xE9;?"), "¿Qué?");
        assert_eq!(decode_entities("&copy; stays"), "&copy; stays");
    }

    #[test]
    fn bundle_text_strips_cdata() {
        assert_eq!(clean_bundle_text("  <![CDATA[ <b>Hi</b> ]]>  "), "<b>Hi</b>");
        assert_eq!(clean_bundle_text(&decode_entities("&lt;![CDATA[Hola]]&gt;")), "Hola");
        assert_eq!(clean_bundle_text("  plain  "), "plain");
    }

    #[test]
    fn html_normalization() {
        assert_eq!(
            normalize_html("Uno\n\n\nDos\ntres", None),
            "Uno<br><br>Dos tres"
        );
        assert_eq!(
            normalize_html("Hola", Some("<h3><b>Hello</b>")),
            "<h3><b>Hola"
        );
        assert_eq!(normalize_html("<p>Hola</p>", Some("<h3>Hello</h3>")), "<p>Hola</p>");
    }

    #[test]
    fn decodes_utf16_with_bom() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "id,es".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode_text_bytes(&bytes), "id,es");
        assert_eq!(decode_text_bytes(b"\xEF\xBB\xBFabc"), "abc");
        assert_eq!(decode_text_bytes(b"abc"), "abc");
    }
}
