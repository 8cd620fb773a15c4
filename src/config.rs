use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

pub const CONFIG_FILENAME: &str = "survey-merge.toml";
pub const CONFIG_ENV: &str = "SURVEY_MERGE_CONFIG";

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub merge: MergeSection,
    #[serde(default)]
    pub backup: BackupSection,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct MergeSection {
    /// Match strategy: "identifier", "identifier-text" or "navigation".
    #[serde(default)]
    pub strategy: Option<String>,

    /// Languages whose unapproved bundle units fall back to the English source text.
    #[serde(default)]
    pub fallback_to_source: Option<Vec<String>>,

    /// Appended to the input stem for non in-place output (`school.json` -> `school_updated.json`).
    #[serde(default)]
    pub output_suffix: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct BackupSection {
    /// Relative paths resolve against the config file directory.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default)]
    pub retention: Option<usize>,
}

pub fn find_file_upwards(start_dir: &Path, filename: &str, max_levels: usize) -> Option<PathBuf> {
    let mut dir = start_dir;
    for _ in 0..=max_levels {
        let candidate = dir.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
    None
}

pub fn find_default_config(workdir: &Path, filename: &str) -> Option<PathBuf> {
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(p) = find_file_upwards(&cwd, filename, 8) {
            return Some(p);
        }
    }
    find_file_upwards(workdir, filename, 8)
}

pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    parse_config(&text).with_context(|| format!("config: {}", path.display()))
}

pub fn parse_config(text: &str) -> anyhow::Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(text).context("parse config toml")?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_sections() {
        let cfg = parse_config(
            r#"
[merge]
strategy = "navigation"
fallback_to_source = ["en-GH", "en-NG"]

[backup]
retention = 5
"#,
        )
        .expect("parse");
        assert_eq!(cfg.merge.strategy.as_deref(), Some("navigation"));
        assert_eq!(
            cfg.merge.fallback_to_source,
            Some(vec!["en-GH".to_string(), "en-NG".to_string()])
        );
        assert_eq!(cfg.merge.output_suffix, None);
        assert_eq!(cfg.backup.retention, Some(5));
        assert_eq!(cfg.backup.dir, None);
    }

    #[test]
    fn empty_file_is_default() {
        let cfg = parse_config("").expect("parse");
        assert!(cfg.merge.strategy.is_none());
        assert!(cfg.backup.retention.is_none());
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(parse_config("[merge\nstrategy = 1").is_err());
    }

    #[test]
    fn finds_config_in_ancestor() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).expect("mkdir");
        std::fs::write(dir.path().join(CONFIG_FILENAME), "").expect("write");

        let found = find_file_upwards(&nested, CONFIG_FILENAME, 4).expect("found");
        assert_eq!(found, dir.path().join(CONFIG_FILENAME));
        assert!(find_file_upwards(&nested, CONFIG_FILENAME, 1).is_none());
    }
}
