use std::path::Path;

use anyhow::{anyhow, Context};
use serde_json::Value;

use crate::textutil::decode_text_bytes;

pub fn read_document(path: &Path) -> anyhow::Result<Value> {
    let bytes =
        std::fs::read(path).with_context(|| format!("read survey: {}", path.display()))?;
    parse_document(&decode_text_bytes(&bytes))
        .with_context(|| format!("parse survey: {}", path.display()))
}

pub fn parse_document(text: &str) -> anyhow::Result<Value> {
    let doc: Value = serde_json::from_str(text).context("parse survey json")?;
    if !doc.is_object() {
        return Err(anyhow!("survey document must be a JSON object"));
    }
    Ok(doc)
}

/// Two-space pretty JSON with a trailing newline. Object keys keep insertion order.
pub fn render_document(doc: &Value) -> anyhow::Result<String> {
    let mut text = serde_json::to_string_pretty(doc).context("serialize survey")?;
    text.push('\n');
    Ok(text)
}
