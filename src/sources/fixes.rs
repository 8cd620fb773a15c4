use std::path::Path;

use anyhow::{anyhow, Context};
use serde_json::Value;

use crate::lang::normalize_lang;
use crate::sources::record::{RecordKey, TranslationRecord};
use crate::textutil::decode_text_bytes;

/// Hand-authored corrections: `{ "<identifier>": { "<lang>": "text", ... }, ... }`.
pub fn read_fixes(path: &Path) -> anyhow::Result<Vec<TranslationRecord>> {
    let bytes = std::fs::read(path).with_context(|| format!("read fixes: {}", path.display()))?;
    parse_fixes(&decode_text_bytes(&bytes))
        .with_context(|| format!("parse fixes: {}", path.display()))
}

pub fn parse_fixes(text: &str) -> anyhow::Result<Vec<TranslationRecord>> {
    let root: Value = serde_json::from_str(text).context("parse fixes json")?;
    let entries = root
        .as_object()
        .ok_or_else(|| anyhow!("fixes file must be a JSON object keyed by identifier"))?;

    let mut records = Vec::new();
    for (identifier, langs) in entries {
        let langs = langs
            .as_object()
            .ok_or_else(|| anyhow!("fix {identifier}: expected an object of language -> text"))?;
        for (lang, text) in langs {
            let text = text
                .as_str()
                .ok_or_else(|| anyhow!("fix {identifier}.{lang}: expected a string"))?;
            if text.trim().is_empty() {
                continue;
            }
            records.push(TranslationRecord {
                key: RecordKey::Identifier(identifier.clone()),
                language: normalize_lang(lang),
                source: None,
                target: text.to_string(),
            });
        }
    }
    Ok(records)
}
