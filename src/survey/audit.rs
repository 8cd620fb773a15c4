use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde_json::Value;

use crate::lang::{english_baseline, lang_value, normalize_lang};
use crate::survey::walker::collect_localizable;

#[derive(Clone, Debug, Default)]
pub struct AuditReport {
    pub nodes: usize,
    /// Nodes without any `en-US` / `en` / `default` text.
    pub missing_baseline: Vec<String>,
    /// Per language, identifiers with no (or empty) translation.
    pub missing: BTreeMap<String, Vec<String>>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.missing_baseline.is_empty() && self.missing.values().all(Vec::is_empty)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "localizable nodes: {}", self.nodes);
        let _ = writeln!(out, "missing English baseline: {}", self.missing_baseline.len());
        for id in &self.missing_baseline {
            let _ = writeln!(out, "  - {id}");
        }
        for (lang, ids) in &self.missing {
            let _ = writeln!(out, "missing {lang}: {}", ids.len());
            for id in ids {
                let _ = writeln!(out, "  - {id}");
            }
        }
        out
    }
}

pub fn audit_document(doc: &Value, languages: &[String]) -> AuditReport {
    let languages: Vec<String> = languages.iter().map(|l| normalize_lang(l)).collect();
    let mut report = AuditReport {
        missing: languages.iter().map(|l| (l.clone(), Vec::new())).collect(),
        ..AuditReport::default()
    };

    let nodes = collect_localizable(doc);
    report.nodes = nodes.len();
    for node in nodes {
        let Some(map) = doc.pointer(&node.pointer).and_then(Value::as_object) else {
            continue;
        };
        if english_baseline(map).map_or(true, |b| b.trim().is_empty()) {
            report.missing_baseline.push(node.identifier.clone());
        }
        for lang in &languages {
            let present = lang_value(map, lang).is_some_and(|v| !v.trim().is_empty());
            if !present {
                report
                    .missing
                    .entry(lang.clone())
                    .or_default()
                    .push(node.identifier.clone());
            }
        }
    }
    report
}
