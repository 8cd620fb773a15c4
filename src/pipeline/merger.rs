use std::path::Path;

use serde_json::Value;

use crate::pipeline::config::MergeConfig;
use crate::pipeline::reconcile::Reconciler;
use crate::pipeline::report::MergeReport;
use crate::progress::ConsoleProgress;
use crate::sources::TranslationRecord;
use crate::survey::document::read_document;
use crate::writer::{write_document, WriteOutcome};

/// Result of merging one document.
#[derive(Debug)]
pub struct DocumentMerge {
    pub report: MergeReport,
    /// `None` on dry runs.
    pub written: Option<WriteOutcome>,
}

pub struct SurveyMerger {
    pub(crate) cfg: MergeConfig,
    pub(crate) progress: ConsoleProgress,
}

impl SurveyMerger {
    pub fn new(cfg: MergeConfig, progress: ConsoleProgress) -> Self {
        Self { cfg, progress }
    }

    pub fn config(&self) -> &MergeConfig {
        &self.cfg
    }

    pub fn progress(&self) -> &ConsoleProgress {
        &self.progress
    }

    /// Reads `input`, applies `records`, and writes the result to `output`.
    pub fn merge_file(
        &self,
        input: &Path,
        records: &[TranslationRecord],
        output: &Path,
    ) -> anyhow::Result<DocumentMerge> {
        self.progress.info(format!("Read survey: {}", input.display()));
        let mut doc = read_document(input)?;
        let report = self.merge_value(&mut doc, records);
        let written = self.finish(&doc, output, &report)?;
        Ok(DocumentMerge { report, written })
    }

    pub(crate) fn merge_value(&self, doc: &mut Value, records: &[TranslationRecord]) -> MergeReport {
        let reconciler = Reconciler::new(records, self.cfg.strategy);
        let languages: Vec<&str> = reconciler.languages().collect();
        self.progress.info(format!(
            "Reconcile {} records ({}) strategy={}",
            records.len(),
            languages.join(", "),
            self.cfg.strategy.as_str()
        ));
        let mut report = MergeReport::default();
        reconciler.apply(doc, &mut report);
        for o in report.notable() {
            if let Some(reason) = o.reason.as_ref() {
                self.progress
                    .warn(format!("{} [{}]: {reason}", o.identifier, o.language));
            }
        }
        report
    }

    pub(crate) fn finish(
        &self,
        doc: &Value,
        output: &Path,
        report: &MergeReport,
    ) -> anyhow::Result<Option<WriteOutcome>> {
        if self.cfg.dry_run {
            self.progress
                .info(format!("Dry run, not writing: {}", output.display()));
            return Ok(None);
        }
        let outcome = write_document(output, doc, Some(&self.cfg.backup))?;
        match &outcome {
            WriteOutcome::Written { backup } => {
                if let Some(b) = backup {
                    self.progress.info(format!("Backup: {}", b.display()));
                }
                self.progress.info(format!(
                    "Wrote survey: {} ({} updated)",
                    output.display(),
                    report.counts().updated
                ));
            }
            WriteOutcome::Unchanged => {
                self.progress
                    .info(format!("Unchanged: {}", output.display()));
            }
        }
        Ok(Some(outcome))
    }
}
