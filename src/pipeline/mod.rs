mod config;
pub mod import;
mod merger;
pub mod reconcile;
pub mod report;

pub use config::{init_default_config, MergeConfig};
pub use import::{BatchSummary, SurveyIndex};
pub use merger::{DocumentMerge, SurveyMerger};
pub use reconcile::{reconcile, MatchStrategy, Reconciler};
pub use report::{MergeOutcome, MergeReport, SkipReason};
