use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Context};

use crate::lang::{is_language_key, normalize_lang};
use crate::sources::record::{RecordKey, TranslationRecord};
use crate::textutil::decode_text_bytes;

const IDENTIFIER_COLUMNS: [&str; 2] = ["identifier", "key"];
const SOURCE_COLUMNS: [&str; 4] = ["source", "en-US", "en", "default"];
const TRANSLATION_COLUMN: &str = "translation";

pub type TableRow = HashMap<String, String>;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TextTable {
    pub headers: Vec<String>,
    pub rows: Vec<TableRow>,
}

impl TextTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn find_column(&self, canonical: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| normalize_lang(h) == canonical)
            .map(String::as_str)
    }
}

pub fn read_table(path: &Path) -> anyhow::Result<TextTable> {
    let bytes = std::fs::read(path).with_context(|| format!("read table: {}", path.display()))?;
    parse_table(&decode_text_bytes(&bytes))
        .with_context(|| format!("parse table: {}", path.display()))
}

/// Parses CSV text whose first non-blank line is the header. Blank lines emit no
/// row; short rows are padded with empty strings. Text without any non-blank line
/// yields an empty table.
pub fn parse_table(text: &str) -> anyhow::Result<TextTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut table = TextTable::default();
    let mut have_header = false;
    for (idx, rec) in reader.records().enumerate() {
        let rec = rec.with_context(|| format!("csv record {}", idx + 1))?;
        if rec.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        if !have_header {
            table.headers = rec.iter().map(|h| h.trim().to_string()).collect();
            have_header = true;
            continue;
        }
        let row: TableRow = table
            .headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), rec.get(i).unwrap_or("").to_string()))
            .collect();
        table.rows.push(row);
    }
    Ok(table)
}

pub fn write_table(table: &TextTable) -> anyhow::Result<String> {
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    writer
        .write_record(&table.headers)
        .context("write csv header")?;
    for row in &table.rows {
        writer
            .write_record(
                table
                    .headers
                    .iter()
                    .map(|h| row.get(h).map(String::as_str).unwrap_or("")),
            )
            .context("write csv row")?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow!("flush csv: {}", e.error()))?;
    String::from_utf8(bytes).context("csv output is not utf-8")
}

/// Converts table rows to translation records.
///
/// Layouts:
/// - `identifier,labels?,<language columns...>`: one record per non-empty language cell.
/// - `identifier,source,translation`: single-language; `language` must be given.
///
/// Without an identifier column, records are keyed by row index. When `language` is
/// given for a multi-language table, only that column is read.
pub fn records_from_table(
    table: &TextTable,
    language: Option<&str>,
) -> anyhow::Result<Vec<TranslationRecord>> {
    let language = language.map(normalize_lang);
    let id_col = IDENTIFIER_COLUMNS.iter().find_map(|c| table.find_column(c));
    let source_col = SOURCE_COLUMNS.iter().find_map(|c| table.find_column(c));

    let targets: Vec<(&str, String)> = match table.find_column(TRANSLATION_COLUMN) {
        Some(col) => {
            let lang = language
                .clone()
                .ok_or_else(|| anyhow!("single-language table needs an explicit language"))?;
            vec![(col, lang)]
        }
        None => table
            .headers
            .iter()
            .map(String::as_str)
            .filter(|h| Some(*h) != source_col && Some(*h) != id_col && is_language_key(h))
            .map(|h| (h, normalize_lang(h)))
            .filter(|(_, lang)| language.as_ref().map_or(true, |want| want == lang))
            .collect(),
    };

    let mut records = Vec::new();
    for (idx, row) in table.rows.iter().enumerate() {
        let key = id_col
            .and_then(|c| row.get(c))
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(|v| RecordKey::Identifier(v.to_string()))
            .unwrap_or(RecordKey::Row(idx));
        let source = source_col
            .and_then(|c| row.get(c))
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        for (col, lang) in &targets {
            let Some(target) = row.get(*col).map(|v| v.trim()).filter(|v| !v.is_empty()) else {
                continue;
            };
            records.push(TranslationRecord {
                key: key.clone(),
                language: lang.clone(),
                source: source.clone(),
                target: target.to_string(),
            });
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_fields_round_trip() {
        let text = "identifier,source,es-CO\n\
                    q.a.title,\"Hello, world\",\"Hola, mundo\"\n\
                    q.b.title,\"Say \"\"hi\"\"\",\"Di \"\"hola\"\"\"\n\
                    q.c.html,\"Line one\nLine two\",\"Línea uno\nLínea dos\"\n";
        let first = parse_table(text).expect("parse");
        assert_eq!(first.rows.len(), 3);
        assert_eq!(first.rows[0]["source"], "Hello, world");
        assert_eq!(first.rows[1]["es-CO"], "Di \"hola\"");
        assert_eq!(first.rows[2]["source"], "Line one\nLine two");

        let written = write_table(&first).expect("write");
        let second = parse_table(&written).expect("reparse");
        assert_eq!(first, second);
    }

    #[test]
    fn ragged_rows_and_blank_lines() {
        let text = "\n\nidentifier,source,fr\n\nq.a.title,Hello\n\n\nq.b.title,Bye,Au revoir\n";
        let table = parse_table(text).expect("parse");
        assert_eq!(table.headers, vec!["identifier", "source", "fr"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0]["fr"], "");
        assert_eq!(table.rows[1]["fr"], "Au revoir");
    }

    #[test]
    fn blank_input_is_empty_table() {
        let table = parse_table("\n   \n\n").expect("parse");
        assert!(table.is_empty());
        assert!(table.headers.is_empty());
        assert!(records_from_table(&table, None).expect("records").is_empty());
    }

    #[test]
    fn multi_language_records() {
        let text = "identifier,labels,source,es_co,FR,en-GH\n\
                    q.age.title,survey,What is your age?,¿Cuál es tu edad?,,What is your age?\n";
        let table = parse_table(text).expect("parse");
        let records = records_from_table(&table, None).expect("records");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].language, "es-CO");
        assert_eq!(records[0].key, RecordKey::Identifier("q.age.title".into()));
        assert_eq!(records[0].source.as_deref(), Some("What is your age?"));
        assert_eq!(records[1].language, "en-GH");

        let only_es = records_from_table(&table, Some("es-CO")).expect("records");
        assert_eq!(only_es.len(), 1);
    }

    #[test]
    fn single_language_layout_requires_language() {
        let text = "identifier,source,translation\nq.a.title,Yes,Sí\n";
        let table = parse_table(text).expect("parse");
        assert!(records_from_table(&table, None).is_err());
        let records = records_from_table(&table, Some("es_co")).expect("records");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].language, "es-CO");
        assert_eq!(records[0].target, "Sí");
    }

    #[test]
    fn missing_identifier_column_keys_by_row() {
        let text = "source,fr\nNext,Suivant\nBack,Retour\n";
        let table = parse_table(text).expect("parse");
        let records = records_from_table(&table, None).expect("records");
        assert_eq!(records[1].key, RecordKey::Row(1));
        assert_eq!(records[1].source.as_deref(), Some("Back"));
    }
}
