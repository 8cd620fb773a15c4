use serde_json::Value;

use crate::lang::{english_baseline, lang_value, normalize_lang};
use crate::sources::table::{TableRow, TextTable};
use crate::survey::walker::collect_localizable;

/// Builds an `identifier,source,<languages...>` table from a document, one row per
/// localizable node.
pub fn export_table(doc: &Value, languages: &[String]) -> TextTable {
    let languages: Vec<String> = languages.iter().map(|l| normalize_lang(l)).collect();
    let mut headers = vec!["identifier".to_string(), "source".to_string()];
    headers.extend(languages.iter().cloned());

    let mut rows = Vec::new();
    for node in collect_localizable(doc) {
        let Some(map) = doc.pointer(&node.pointer).and_then(Value::as_object) else {
            continue;
        };
        let mut row = TableRow::new();
        row.insert("identifier".to_string(), node.identifier.clone());
        row.insert(
            "source".to_string(),
            english_baseline(map).unwrap_or_default().to_string(),
        );
        for lang in &languages {
            let text = lang_value(map, lang).unwrap_or_default();
            row.insert(lang.clone(), text.to_string());
        }
        rows.push(row);
    }
    TextTable { headers, rows }
}
