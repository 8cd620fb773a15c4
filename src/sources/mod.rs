pub mod archive;
pub mod fixes;
pub mod record;
pub mod table;
pub mod xliff;

use std::path::Path;

use crate::progress::ConsoleProgress;

pub use record::{RecordKey, TranslationRecord};
pub use xliff::{Bundle, BundleSection};

/// Loads a bilingual bundle from a `.xliff`/`.xlf` file or a `.zip` download.
pub fn load_bundle(path: &Path, progress: &ConsoleProgress) -> anyhow::Result<Bundle> {
    let is_zip = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("zip"));
    if is_zip {
        archive::read_bundle_archive(path, progress)
    } else {
        xliff::read_bundle(path)
    }
}
