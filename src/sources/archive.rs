use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use anyhow::Context;
use zip::ZipArchive;

use crate::progress::ConsoleProgress;
use crate::sources::xliff::{parse_bundle, Bundle};
use crate::textutil::decode_text_bytes;

const BUNDLE_EXTENSIONS: [&str; 2] = [".xliff", ".xlf"];

/// Reads every bilingual bundle inside a translation download archive and
/// concatenates their sections. Entries that fail to parse are logged and skipped.
pub fn read_bundle_archive(path: &Path, progress: &ConsoleProgress) -> anyhow::Result<Bundle> {
    let f = File::open(path).with_context(|| format!("open archive: {}", path.display()))?;
    bundle_from_zip(f, progress).with_context(|| format!("read archive: {}", path.display()))
}

pub fn bundle_from_zip<R: Read + Seek>(
    reader: R,
    progress: &ConsoleProgress,
) -> anyhow::Result<Bundle> {
    let mut zip = ZipArchive::new(reader).context("read zip")?;
    let mut bundle = Bundle::default();
    for i in 0..zip.len() {
        let mut file = zip.by_index(i).context("zip entry")?;
        let name = file.name().to_string();
        let lower = name.to_lowercase();
        if file.is_dir() || !BUNDLE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
            continue;
        }
        let mut data = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut data)
            .with_context(|| format!("read zip entry: {name}"))?;
        match parse_bundle(&decode_text_bytes(&data)) {
            Ok(part) => {
                progress.info(format!("{name}: {} section(s)", part.sections.len()));
                bundle.sections.extend(part.sections);
            }
            Err(err) => progress.warn(format!("skipping {name}: {err:#}")),
        }
    }
    Ok(bundle)
}
