use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::lang::normalize_lang;
use crate::pipeline::merger::SurveyMerger;
use crate::pipeline::report::MergeReport;
use crate::sources::{Bundle, TranslationRecord};
use crate::survey::document::read_document;
use crate::writer::WriteOutcome;

/// Survey documents in one directory, keyed by file stem.
#[derive(Clone, Debug, Default)]
pub struct SurveyIndex {
    documents: BTreeMap<String, PathBuf>,
}

impl SurveyIndex {
    /// Indexes `*.json` in `dir` (not recursive), skipping earlier merge outputs that
    /// end in `output_suffix`.
    pub fn scan(dir: &Path, output_suffix: &str) -> anyhow::Result<Self> {
        let mut documents = BTreeMap::new();
        for entry in
            std::fs::read_dir(dir).with_context(|| format!("list surveys: {}", dir.display()))?
        {
            let path = entry.context("survey dir entry")?.path();
            let is_json = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("json"));
            if !is_json || !path.is_file() {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if !output_suffix.is_empty() && stem.ends_with(output_suffix) {
                continue;
            }
            documents.insert(stem.to_string(), path.clone());
        }
        Ok(Self { documents })
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Exact stem match first, then case-insensitive.
    pub fn resolve(&self, stem: &str) -> Option<&Path> {
        if let Some(p) = self.documents.get(stem) {
            return Some(p.as_path());
        }
        self.documents
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(stem))
            .map(|(_, p)| p.as_path())
    }
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub documents_updated: usize,
    pub documents_unchanged: usize,
    pub documents_failed: usize,
    pub sections_skipped: usize,
    pub report: MergeReport,
}

impl BatchSummary {
    pub fn render(&self) -> String {
        format!(
            "documents: updated {}, unchanged {}, failed {}; sections skipped {}\n{}",
            self.documents_updated,
            self.documents_unchanged,
            self.documents_failed,
            self.sections_skipped,
            self.report.summary()
        )
    }
}

impl SurveyMerger {
    /// Applies every section of `bundle` to its survey document in `index`. Each document
    /// is loaded and written once; failures are logged and counted, never fatal.
    pub fn import_bundle(
        &self,
        bundle: &Bundle,
        index: &SurveyIndex,
        language: Option<&str>,
        in_place: bool,
    ) -> BatchSummary {
        let mut summary = BatchSummary::default();
        let wanted = language.map(normalize_lang);
        let mut by_document: BTreeMap<PathBuf, Vec<TranslationRecord>> = BTreeMap::new();

        for section in &bundle.sections {
            let Some(stem) = section.document_stem() else {
                self.progress
                    .warn(format!("Skip section without a file name: {:?}", section.original));
                summary.sections_skipped += 1;
                continue;
            };
            // `language` selects sections; it only labels sections that declare none.
            if let (Some(want), Some(declared)) =
                (wanted.as_deref(), section.target_language.as_deref())
            {
                if want != declared {
                    self.progress.info(format!(
                        "Skip section {} ({declared}): not {want}",
                        section.original
                    ));
                    summary.sections_skipped += 1;
                    continue;
                }
            }
            let Some(path) = index.resolve(&stem) else {
                self.progress
                    .warn(format!("Skip section {}: no survey named {stem}.json", section.original));
                summary.sections_skipped += 1;
                continue;
            };
            let converted = match section.records(wanted.as_deref(), &self.cfg.fallback_to_source) {
                Ok(c) => c,
                Err(e) => {
                    self.progress.warn(format!("Skip section: {e:#}"));
                    summary.sections_skipped += 1;
                    continue;
                }
            };
            self.progress.info(format!(
                "Section {} -> {}: {} records, {} unapproved, {} source fallbacks",
                section.original,
                path.display(),
                converted.records.len(),
                converted.unapproved,
                converted.fallbacks
            ));
            by_document
                .entry(path.to_path_buf())
                .or_default()
                .extend(converted.records);
        }

        let total = by_document.len();
        for (i, (path, records)) in by_document.iter().enumerate() {
            self.progress.progress("Documents", i + 1, total);
            match self.import_document(path, records, in_place) {
                Ok((report, written)) => {
                    let changed = report.has_changes()
                        && !matches!(written, Some(WriteOutcome::Unchanged));
                    if changed {
                        summary.documents_updated += 1;
                    } else {
                        summary.documents_unchanged += 1;
                    }
                    summary.report.extend(report);
                }
                Err(e) => {
                    self.progress
                        .warn(format!("Failed {}: {e:#}", path.display()));
                    summary.documents_failed += 1;
                }
            }
        }
        summary
    }

    fn import_document(
        &self,
        path: &Path,
        records: &[TranslationRecord],
        in_place: bool,
    ) -> anyhow::Result<(MergeReport, Option<WriteOutcome>)> {
        let mut doc = read_document(path)?;
        let report = self.merge_value(&mut doc, records);
        let output = self.cfg.output_for(path, in_place, None);
        let written = self.finish(&doc, &output, &report)?;
        Ok((report, written))
    }
}
