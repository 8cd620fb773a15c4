use std::collections::{BTreeMap, HashMap};

use anyhow::anyhow;
use serde_json::{Map, Value};

use crate::lang::{english_baseline, find_lang_key, is_protected, normalize_lang};
use crate::pipeline::report::{MergeReport, SkipReason};
use crate::sources::record::TranslationRecord;
use crate::survey::walker::{visit_localizable_mut, LocalizableNode};
use crate::textutil::{normalize_for_match, normalize_html};

/// Survey-level button labels whose identifiers rarely line up between schemas.
pub const NAVIGATION_FIELDS: [&str; 6] = [
    "pagePrevText",
    "pageNextText",
    "completeText",
    "startSurveyText",
    "previewText",
    "editText",
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MatchStrategy {
    /// Identifier only; the first record wins when several share an identifier.
    Identifier,
    /// Identifier, with English-text tie-break among records sharing an identifier.
    #[default]
    IdentifierText,
    /// As `IdentifierText`, plus English-text matching for navigation labels.
    Navigation,
}

impl MatchStrategy {
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "identifier" => Ok(Self::Identifier),
            "identifier-text" => Ok(Self::IdentifierText),
            "navigation" => Ok(Self::Navigation),
            other => Err(anyhow!(
                "unknown match strategy {other:?} (expected identifier, identifier-text, navigation)"
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Identifier => "identifier",
            Self::IdentifierText => "identifier-text",
            Self::Navigation => "navigation",
        }
    }
}

/// Indexes translation records and writes them into survey documents.
pub struct Reconciler<'a> {
    strategy: MatchStrategy,
    /// language -> identifier -> records in source order
    by_identifier: HashMap<&'a str, HashMap<&'a str, Vec<&'a TranslationRecord>>>,
    by_language: BTreeMap<&'a str, Vec<&'a TranslationRecord>>,
}

impl<'a> Reconciler<'a> {
    pub fn new(records: &'a [TranslationRecord], strategy: MatchStrategy) -> Self {
        let mut by_identifier: HashMap<&str, HashMap<&str, Vec<&TranslationRecord>>> =
            HashMap::new();
        let mut by_language: BTreeMap<&str, Vec<&TranslationRecord>> = BTreeMap::new();
        for rec in records {
            by_language.entry(rec.language.as_str()).or_default().push(rec);
            if let Some(id) = rec.key.identifier() {
                by_identifier
                    .entry(rec.language.as_str())
                    .or_default()
                    .entry(id)
                    .or_default()
                    .push(rec);
            }
        }
        Self {
            strategy,
            by_identifier,
            by_language,
        }
    }

    pub fn languages(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.by_language.keys().copied()
    }

    /// Reconciles every localizable node of `doc` against every record language.
    pub fn apply(&self, doc: &mut Value, report: &mut MergeReport) {
        visit_localizable_mut(doc, |node, map| {
            for lang in self.by_language.keys() {
                self.reconcile_node(node, map, lang, report);
            }
        });
    }

    fn reconcile_node(
        &self,
        node: &LocalizableNode,
        map: &mut Map<String, Value>,
        lang: &str,
        report: &mut MergeReport,
    ) {
        let id = node.identifier.as_str();
        let baseline = english_baseline(map).map(str::to_string);
        let candidates = self.candidates(node, lang, baseline.as_deref());
        if candidates.is_empty() {
            report.push_skipped(id, lang, SkipReason::NoCandidate);
            return;
        }
        if is_protected(lang) {
            report.push_skipped(id, lang, SkipReason::Protected);
            return;
        }
        let Some(baseline) = baseline else {
            report.push_skipped(id, lang, SkipReason::MissingBaseline);
            return;
        };
        let chosen = match self.choose(&candidates, &baseline) {
            Ok(rec) => rec,
            Err(reason) => {
                report.push_skipped(id, lang, reason);
                return;
            }
        };

        let text = if id.ends_with(".html") {
            normalize_html(&chosen.target, Some(&baseline))
        } else {
            chosen.target.clone()
        };
        // Existing text may sit under a variant spelling (`es_co`); it is updated there.
        let key = find_lang_key(map, lang)
            .map(str::to_string)
            .unwrap_or_else(|| normalize_lang(lang));
        let existing = map.get(&key).and_then(Value::as_str).unwrap_or("");
        if existing == text {
            report.push_skipped(id, lang, SkipReason::UpToDate);
            return;
        }
        if !existing.trim().is_empty() && existing.trim() != baseline.trim() {
            report.push_skipped(id, lang, SkipReason::Divergent);
            return;
        }
        map.insert(key, Value::String(text));
        report.push_updated(id, lang);
    }

    fn candidates(
        &self,
        node: &LocalizableNode,
        lang: &str,
        baseline: Option<&str>,
    ) -> Vec<&'a TranslationRecord> {
        if let Some(found) = self
            .by_identifier
            .get(lang)
            .and_then(|ids| ids.get(node.identifier.as_str()))
        {
            return found.clone();
        }
        if self.strategy != MatchStrategy::Navigation
            || !NAVIGATION_FIELDS.contains(&node.field.as_str())
        {
            return Vec::new();
        }
        let Some(baseline) = baseline.map(normalize_for_match) else {
            return Vec::new();
        };
        self.by_language
            .get(lang)
            .map(|recs| {
                recs.iter()
                    .copied()
                    .filter(|r| {
                        r.source
                            .as_deref()
                            .is_some_and(|s| normalize_for_match(s) == baseline)
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn choose(
        &self,
        candidates: &[&'a TranslationRecord],
        baseline: &str,
    ) -> Result<&'a TranslationRecord, SkipReason> {
        match candidates {
            [] => Err(SkipReason::NoCandidate),
            [only] => Ok(*only),
            [first, ..] if self.strategy == MatchStrategy::Identifier => Ok(*first),
            _ => {
                let wanted = normalize_for_match(baseline);
                candidates
                    .iter()
                    .copied()
                    .find(|r| {
                        r.source
                            .as_deref()
                            .is_some_and(|s| normalize_for_match(s) == wanted)
                    })
                    .ok_or(SkipReason::Ambiguous {
                        candidates: candidates.len(),
                    })
            }
        }
    }
}

/// One-shot reconciliation of `records` into `doc`.
pub fn reconcile(
    doc: &mut Value,
    records: &[TranslationRecord],
    strategy: MatchStrategy,
) -> MergeReport {
    let mut report = MergeReport::default();
    Reconciler::new(records, strategy).apply(doc, &mut report);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::record::RecordKey;
    use crate::sources::table::{parse_table, records_from_table};
    use serde_json::json;

    fn rec(id: &str, lang: &str, source: Option<&str>, target: &str) -> TranslationRecord {
        TranslationRecord {
            key: RecordKey::Identifier(id.to_string()),
            language: lang.to_string(),
            source: source.map(str::to_string),
            target: target.to_string(),
        }
    }

    fn age_survey(title: Value) -> Value {
        json!({"elements": [{"type": "text", "name": "age", "title": title}]})
    }

    #[test]
    fn table_row_fills_missing_translation() {
        let table = parse_table(
            "identifier,source,es-CO\nq.age.title,What is your age?,¿Cuál es tu edad?\n",
        )
        .expect("parse");
        let records = records_from_table(&table, None).expect("records");
        let mut doc = age_survey(json!({"default": "What is your age?"}));

        let report = reconcile(&mut doc, &records, MatchStrategy::IdentifierText);
        assert_eq!(
            doc["elements"][0]["title"],
            json!({"default": "What is your age?", "es-CO": "¿Cuál es tu edad?"})
        );
        assert_eq!(report.counts().updated, 1);
    }

    #[test]
    fn divergent_translation_is_not_clobbered() {
        let records = vec![rec("q.age.title", "es-CO", None, "¿Cuál es tu edad?")];
        let mut doc = age_survey(json!({"default": "What is your age?", "es-CO": "¿Qué edad tienes?"}));

        let report = reconcile(&mut doc, &records, MatchStrategy::IdentifierText);
        assert_eq!(doc["elements"][0]["title"]["es-CO"], json!("¿Qué edad tienes?"));
        assert_eq!(report.outcomes[0].reason, Some(SkipReason::Divergent));
    }

    #[test]
    fn english_fallback_copy_is_overwritten() {
        let records = vec![rec("q.age.title", "es-CO", None, "¿Edad?")];
        let mut doc = age_survey(json!({"default": "Age", "es-CO": "Age"}));
        reconcile(&mut doc, &records, MatchStrategy::IdentifierText);
        assert_eq!(doc["elements"][0]["title"]["es-CO"], json!("¿Edad?"));

        let mut doc = age_survey(json!({"default": "Age", "es-CO": ""}));
        reconcile(&mut doc, &records, MatchStrategy::IdentifierText);
        assert_eq!(doc["elements"][0]["title"]["es-CO"], json!("¿Edad?"));
    }

    #[test]
    fn variant_spelled_translation_is_not_clobbered() {
        let records = vec![rec("q.age.title", "es-CO", None, "¿Cuál es tu edad?")];
        let original = json!({"default": "What is your age?", "es_co": "¿Qué edad tienes?"});
        let mut doc = age_survey(original.clone());

        let report = reconcile(&mut doc, &records, MatchStrategy::IdentifierText);
        assert_eq!(doc["elements"][0]["title"], original);
        assert_eq!(report.outcomes[0].reason, Some(SkipReason::Divergent));
    }

    #[test]
    fn variant_spelled_fallback_is_updated_in_place() {
        let records = vec![rec("q.age.title", "es-CO", None, "¿Edad?")];
        let mut doc = age_survey(json!({"default": "Age", "ES_CO": "Age"}));

        let report = reconcile(&mut doc, &records, MatchStrategy::IdentifierText);
        assert_eq!(report.counts().updated, 1);
        assert_eq!(
            doc["elements"][0]["title"],
            json!({"default": "Age", "ES_CO": "¿Edad?"})
        );
    }

    #[test]
    fn variant_spelled_baseline_is_found() {
        let records = vec![rec("q.age.title", "fr", None, "Âge")];
        let mut doc = age_survey(json!({"EN-us": "Age"}));

        let report = reconcile(&mut doc, &records, MatchStrategy::IdentifierText);
        assert_eq!(report.outcomes[0].reason, None);
        assert_eq!(doc["elements"][0]["title"]["fr"], json!("Âge"));
    }

    #[test]
    fn variant_spelled_protected_keys_never_change() {
        let records = vec![
            rec("q.age.title", "en_us", None, "Changed"),
            rec("q.age.title", "EN", None, "Changed"),
        ];
        let original = json!({"EN-us": "Age (US)", "En": "Age"});
        let mut doc = age_survey(original.clone());

        let report = reconcile(&mut doc, &records, MatchStrategy::Identifier);
        assert_eq!(doc["elements"][0]["title"], original);
        assert_eq!(report.counts().protected, 2);
    }

    #[test]
    fn regional_subtag_nodes_are_reconciled() {
        let records = vec![rec("q.age.title", "fr", None, "Âge")];
        let mut doc = age_survey(json!({"default": "Age", "es-419": "Edad"}));

        let report = reconcile(&mut doc, &records, MatchStrategy::IdentifierText);
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(doc["elements"][0]["title"]["fr"], json!("Âge"));
        assert_eq!(doc["elements"][0]["title"]["es-419"], json!("Edad"));
    }

    #[test]
    fn protected_keys_never_change() {
        let records = vec![
            rec("q.age.title", "default", None, "Changed"),
            rec("q.age.title", "en", None, "Changed"),
            rec("q.age.title", "en-US", None, "Changed"),
        ];
        let original = json!({"default": "Age", "en": "", "en-US": "Age (US)"});
        let mut doc = age_survey(original.clone());
        let report = reconcile(&mut doc, &records, MatchStrategy::Identifier);
        assert_eq!(doc["elements"][0]["title"], original);
        assert_eq!(report.counts().protected, 3);
        assert!(!report.has_changes());
    }

    #[test]
    fn text_tiebreak_picks_matching_candidate() {
        let doc_choice = |baseline: &str| {
            json!({"elements": [{"name": "freq", "choices": [
                {"value": "yes", "text": {"default": baseline}}
            ]}]})
        };
        let records = vec![
            rec("q.freq.choice.yes.text", "fr", Some("Yes"), "Oui"),
            rec("q.freq.choice.yes.text", "fr", Some("Yes, always"), "Oui, toujours"),
        ];

        let mut doc = doc_choice("Yes, always");
        reconcile(&mut doc, &records, MatchStrategy::IdentifierText);
        assert_eq!(
            doc["elements"][0]["choices"][0]["text"]["fr"],
            json!("Oui, toujours")
        );

        let mut doc = doc_choice("<b>YES,</b>  always ");
        reconcile(&mut doc, &records, MatchStrategy::IdentifierText);
        assert_eq!(
            doc["elements"][0]["choices"][0]["text"]["fr"],
            json!("Oui, toujours")
        );

        let mut doc = doc_choice("Never");
        let report = reconcile(&mut doc, &records, MatchStrategy::IdentifierText);
        assert!(doc["elements"][0]["choices"][0]["text"].get("fr").is_none());
        assert_eq!(
            report.outcomes[0].reason,
            Some(SkipReason::Ambiguous { candidates: 2 })
        );

        let mut doc = doc_choice("Never");
        reconcile(&mut doc, &records, MatchStrategy::Identifier);
        assert_eq!(doc["elements"][0]["choices"][0]["text"]["fr"], json!("Oui"));
    }

    #[test]
    fn single_candidate_ignores_text() {
        let records = vec![rec("q.age.title", "fr", Some("Something else"), "Âge")];
        let mut doc = age_survey(json!({"default": "Age"}));
        reconcile(&mut doc, &records, MatchStrategy::IdentifierText);
        assert_eq!(doc["elements"][0]["title"]["fr"], json!("Âge"));
    }

    #[test]
    fn misses_are_recorded_not_errors() {
        let records = vec![rec("q.other.title", "fr", None, "Autre")];
        let mut doc = age_survey(json!({"default": "Age"}));
        let report = reconcile(&mut doc, &records, MatchStrategy::IdentifierText);
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].identifier, "q.age.title");
        assert!(!report.outcomes[0].updated);
        assert_eq!(report.outcomes[0].reason, Some(SkipReason::NoCandidate));
    }

    #[test]
    fn missing_baseline_is_skipped() {
        let records = vec![rec("q.age.title", "fr", None, "Âge")];
        let mut doc = age_survey(json!({"de": "Alter"}));
        let report = reconcile(&mut doc, &records, MatchStrategy::IdentifierText);
        assert!(doc["elements"][0]["title"].get("fr").is_none());
        assert_eq!(report.outcomes[0].reason, Some(SkipReason::MissingBaseline));
    }

    #[test]
    fn html_fields_are_normalized() {
        let records = vec![rec("q.welcome.html", "fr", None, "Bienvenue\n\n\nMerci\nbeaucoup")];
        let mut doc = json!({"elements": [{"type": "html", "name": "welcome",
            "html": {"default": "<h3>Welcome</h3><p>Thanks</p>"}}]});
        reconcile(&mut doc, &records, MatchStrategy::IdentifierText);
        assert_eq!(
            doc["elements"][0]["html"]["fr"],
            json!("<h3>Bienvenue<br><br>Merci beaucoup")
        );
    }

    #[test]
    fn navigation_labels_match_by_text() {
        let records = vec![TranslationRecord {
            key: RecordKey::Row(4),
            language: "fr".into(),
            source: Some("Next".into()),
            target: "Suivant".into(),
        }];
        let doc0 = json!({"pageNextText": {"default": "Next"}, "title": {"default": "Next"}});

        let mut doc = doc0.clone();
        reconcile(&mut doc, &records, MatchStrategy::IdentifierText);
        assert_eq!(doc, doc0);

        let mut doc = doc0.clone();
        reconcile(&mut doc, &records, MatchStrategy::Navigation);
        assert_eq!(doc["pageNextText"]["fr"], json!("Suivant"));
        assert!(doc["title"].get("fr").is_none());
    }

    #[test]
    fn second_pass_is_a_fixed_point() {
        let records = vec![
            rec("q.age.title", "fr", None, "Âge"),
            rec("q.welcome.html", "fr", None, "Bonjour\nà tous"),
            rec("q.age.title", "es-CO", None, "Edad"),
        ];
        let mut doc = json!({"elements": [
            {"name": "age", "title": {"default": "Age", "es-CO": "¿Edad?"}},
            {"name": "welcome", "html": {"default": "<p>Hello</p>"}}
        ]});
        let first = reconcile(&mut doc, &records, MatchStrategy::IdentifierText);
        assert_eq!(first.counts().updated, 2);
        let after_first = doc.clone();

        let second = reconcile(&mut doc, &records, MatchStrategy::IdentifierText);
        assert_eq!(doc, after_first);
        assert_eq!(second.counts().updated, 0);
        assert_eq!(second.counts().up_to_date, 2);
    }

    #[test]
    fn strategy_names() {
        assert_eq!(
            MatchStrategy::parse("identifier_text").expect("parse"),
            MatchStrategy::IdentifierText
        );
        assert_eq!(MatchStrategy::parse(" Navigation ").expect("parse").as_str(), "navigation");
        assert!(MatchStrategy::parse("fuzzy").is_err());
    }
}
