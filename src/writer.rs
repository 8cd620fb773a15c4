use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::survey::document::render_document;

pub const DEFAULT_OUTPUT_SUFFIX: &str = "_updated";
pub const DEFAULT_RETENTION: usize = 3;
const BACKUP_EXT: &str = ".bak";

#[derive(Clone, Debug)]
pub struct BackupPolicy {
    pub dir: PathBuf,
    /// Backup names embed the target's path relative to this directory.
    pub root: PathBuf,
    pub retention: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    Written { backup: Option<PathBuf> },
    Unchanged,
}

/// `<dir>/<stem><suffix>.json` next to the input.
pub fn default_output_for(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("survey")
        .to_string();
    input.with_file_name(format!("{stem}{suffix}.json"))
}

/// Relative path of `target` under `root` with separators flattened to `__`.
pub fn backup_base_name(target: &Path, root: &Path) -> String {
    let rel = target.strip_prefix(root).unwrap_or(target);
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("__")
}

/// Existing backups of `base`, oldest first.
pub fn list_backups(dir: &Path, base: &str) -> anyhow::Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let prefix = format!("{base}.");
    let mut found: Vec<PathBuf> = Vec::new();
    for entry in
        std::fs::read_dir(dir).with_context(|| format!("list backups: {}", dir.display()))?
    {
        let entry = entry.context("backup dir entry")?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(stamp) = name
            .strip_prefix(&prefix)
            .and_then(|rest| rest.strip_suffix(BACKUP_EXT))
        else {
            continue;
        };
        if !stamp.is_empty() && !stamp.contains('.') {
            found.push(entry.path());
        }
    }
    found.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(found)
}

/// Deletes the oldest backups of `base` until at most `retention` remain.
pub fn prune_backups(dir: &Path, base: &str, retention: usize) -> anyhow::Result<Vec<PathBuf>> {
    let backups = list_backups(dir, base)?;
    let excess = backups.len().saturating_sub(retention);
    let mut removed = Vec::with_capacity(excess);
    for path in backups.into_iter().take(excess) {
        std::fs::remove_file(&path)
            .with_context(|| format!("remove backup: {}", path.display()))?;
        removed.push(path);
    }
    Ok(removed)
}

/// Copies `target` into the backup directory, then prunes. Returns `None` when there
/// is nothing to back up or the newest backup already holds the same content.
pub fn backup_existing(target: &Path, policy: &BackupPolicy) -> anyhow::Result<Option<PathBuf>> {
    if !target.is_file() {
        return Ok(None);
    }
    let content =
        std::fs::read(target).with_context(|| format!("read for backup: {}", target.display()))?;
    let base = backup_base_name(target, &policy.root);

    if let Some(latest) = list_backups(&policy.dir, &base)?.last() {
        let previous = std::fs::read(latest)
            .with_context(|| format!("read backup: {}", latest.display()))?;
        if content_hash(&previous) == content_hash(&content) {
            prune_backups(&policy.dir, &base, policy.retention.max(1))?;
            return Ok(None);
        }
    }

    std::fs::create_dir_all(&policy.dir)
        .with_context(|| format!("create backup dir: {}", policy.dir.display()))?;
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%3fZ").to_string();
    let path = unused_backup_path(&policy.dir, &base, &stamp);
    std::fs::write(&path, &content)
        .with_context(|| format!("write backup: {}", path.display()))?;
    prune_backups(&policy.dir, &base, policy.retention.max(1))?;
    Ok(Some(path))
}

/// Writes `doc` as pretty JSON. An existing file with different content is backed up
/// first when a policy is given; identical content is left untouched.
pub fn write_document(
    path: &Path,
    doc: &Value,
    backup: Option<&BackupPolicy>,
) -> anyhow::Result<WriteOutcome> {
    let text = render_document(doc)?;
    if path.is_file() {
        let current =
            std::fs::read(path).with_context(|| format!("read output: {}", path.display()))?;
        if content_hash(&current) == content_hash(text.as_bytes()) {
            return Ok(WriteOutcome::Unchanged);
        }
    }
    let backup = match backup {
        Some(policy) => backup_existing(path, policy)?,
        None => None,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir: {}", parent.display()))?;
    }
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    std::fs::write(&tmp, text.as_bytes())
        .with_context(|| format!("write output: {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("move output into place: {}", path.display()))?;
    Ok(WriteOutcome::Written { backup })
}

/// `<base>.<stamp>.bak`, or `<base>.<stamp>-<n>.bak` when that name is already taken
/// within the same millisecond. The suffix keeps lexicographic order chronological.
fn unused_backup_path(dir: &Path, base: &str, stamp: &str) -> PathBuf {
    let mut path = dir.join(format!("{base}.{stamp}{BACKUP_EXT}"));
    let mut n = 1usize;
    while path.exists() {
        path = dir.join(format!("{base}.{stamp}-{n}{BACKUP_EXT}"));
        n += 1;
    }
    path
}

fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
