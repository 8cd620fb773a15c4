use std::fmt;

/// Why a node was not written for a language.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    NoCandidate,
    Ambiguous { candidates: usize },
    MissingBaseline,
    Protected,
    Divergent,
    UpToDate,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoCandidate => f.write_str("no matching record"),
            SkipReason::Ambiguous { candidates } => write!(
                f,
                "{candidates} records share the identifier and none matches the English text"
            ),
            SkipReason::MissingBaseline => f.write_str("missing English baseline"),
            SkipReason::Protected => f.write_str("protected language key"),
            SkipReason::Divergent => f.write_str("existing translation differs from English; kept"),
            SkipReason::UpToDate => f.write_str("already up to date"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeOutcome {
    pub identifier: String,
    pub language: String,
    pub updated: bool,
    pub reason: Option<SkipReason>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeCounts {
    pub updated: usize,
    pub up_to_date: usize,
    pub unmatched: usize,
    pub ambiguous: usize,
    pub protected: usize,
    pub divergent: usize,
    pub missing_baseline: usize,
}

impl MergeCounts {
    pub fn skipped(&self) -> usize {
        self.unmatched + self.ambiguous + self.protected + self.divergent + self.missing_baseline
    }
}

/// Audit trail of one merge run: one outcome per (node, language) attempt.
#[derive(Clone, Debug, Default)]
pub struct MergeReport {
    pub outcomes: Vec<MergeOutcome>,
}

impl MergeReport {
    pub fn push_updated(&mut self, identifier: &str, language: &str) {
        self.outcomes.push(MergeOutcome {
            identifier: identifier.to_string(),
            language: language.to_string(),
            updated: true,
            reason: None,
        });
    }

    pub fn push_skipped(&mut self, identifier: &str, language: &str, reason: SkipReason) {
        self.outcomes.push(MergeOutcome {
            identifier: identifier.to_string(),
            language: language.to_string(),
            updated: false,
            reason: Some(reason),
        });
    }

    pub fn extend(&mut self, other: MergeReport) {
        self.outcomes.extend(other.outcomes);
    }

    pub fn counts(&self) -> MergeCounts {
        let mut c = MergeCounts::default();
        for o in &self.outcomes {
            match &o.reason {
                None => c.updated += 1,
                Some(SkipReason::UpToDate) => c.up_to_date += 1,
                Some(SkipReason::NoCandidate) => c.unmatched += 1,
                Some(SkipReason::Ambiguous { .. }) => c.ambiguous += 1,
                Some(SkipReason::Protected) => c.protected += 1,
                Some(SkipReason::Divergent) => c.divergent += 1,
                Some(SkipReason::MissingBaseline) => c.missing_baseline += 1,
            }
        }
        c
    }

    pub fn has_changes(&self) -> bool {
        self.outcomes.iter().any(|o| o.updated)
    }

    /// Outcomes worth a human look: everything skipped except "no record" and
    /// "already up to date", which are expected in partial merges.
    pub fn notable(&self) -> impl Iterator<Item = &MergeOutcome> {
        self.outcomes.iter().filter(|o| {
            matches!(
                o.reason,
                Some(
                    SkipReason::Ambiguous { .. }
                        | SkipReason::Divergent
                        | SkipReason::MissingBaseline
                )
            )
        })
    }

    pub fn summary(&self) -> String {
        let c = self.counts();
        format!(
            "updated {}, up to date {}, skipped {} (no record {}, ambiguous {}, protected {}, divergent kept {}, missing baseline {})",
            c.updated,
            c.up_to_date,
            c.skipped(),
            c.unmatched,
            c.ambiguous,
            c.protected,
            c.divergent,
            c.missing_baseline
        )
    }
}
