use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::config::{find_default_config, load_config, AppConfig, CONFIG_ENV, CONFIG_FILENAME};
use crate::lang::normalize_lang;
use crate::pipeline::reconcile::MatchStrategy;
use crate::writer::{default_output_for, BackupPolicy, DEFAULT_OUTPUT_SUFFIX, DEFAULT_RETENTION};

pub const DEFAULT_BACKUP_DIR: &str = ".backups";
pub const DEFAULT_FALLBACK_TO_SOURCE: [&str; 1] = ["en-GH"];

#[derive(Clone, Debug)]
pub struct MergeConfig {
    pub workdir: PathBuf,
    pub config_path: Option<PathBuf>,

    pub strategy: MatchStrategy,
    pub fallback_to_source: Vec<String>,
    pub output_suffix: String,
    pub backup: BackupPolicy,
    pub dry_run: bool,
}

impl MergeConfig {
    /// Resolves the file config (explicit path, then `SURVEY_MERGE_CONFIG`, then an
    /// upward search from `workdir`) and lets CLI values override it.
    pub fn from_paths_and_args(
        workdir: &Path,
        config_path: Option<PathBuf>,
        strategy: Option<String>,
        dry_run: bool,
    ) -> anyhow::Result<Self> {
        let workdir = workdir.canonicalize().unwrap_or_else(|_| workdir.to_path_buf());

        let cfg_file = config_path
            .clone()
            .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from))
            .or_else(|| find_default_config(&workdir, CONFIG_FILENAME));

        let mut file_cfg = AppConfig::default();
        if let Some(p) = cfg_file.as_ref() {
            if p.exists() {
                file_cfg = load_config(p)?;
            } else if config_path.is_some() {
                return Err(anyhow::anyhow!("config not found: {}", p.display()));
            }
        }
        Self::from_file_config(&workdir, cfg_file, &file_cfg, strategy, dry_run)
    }

    pub(crate) fn from_file_config(
        workdir: &Path,
        config_path: Option<PathBuf>,
        file_cfg: &AppConfig,
        strategy: Option<String>,
        dry_run: bool,
    ) -> anyhow::Result<Self> {
        let strategy = match strategy.or_else(|| file_cfg.merge.strategy.clone()) {
            Some(s) => MatchStrategy::parse(&s).context("merge.strategy")?,
            None => MatchStrategy::default(),
        };
        let fallback_to_source = file_cfg
            .merge
            .fallback_to_source
            .clone()
            .unwrap_or_else(|| DEFAULT_FALLBACK_TO_SOURCE.iter().map(|s| s.to_string()).collect())
            .iter()
            .map(|l| normalize_lang(l))
            .collect();
        let output_suffix = file_cfg
            .merge
            .output_suffix
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_OUTPUT_SUFFIX.to_string());

        let root = config_path
            .as_ref()
            .filter(|p| p.exists())
            .and_then(|p| p.parent())
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| workdir.to_path_buf());
        let backup_dir = file_cfg
            .backup
            .dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BACKUP_DIR));
        let backup_dir = if backup_dir.is_relative() {
            root.join(backup_dir)
        } else {
            backup_dir
        };
        let retention = file_cfg.backup.retention.unwrap_or(DEFAULT_RETENTION).max(1);

        Ok(Self {
            workdir: workdir.to_path_buf(),
            config_path,
            strategy,
            fallback_to_source,
            output_suffix,
            backup: BackupPolicy {
                dir: backup_dir,
                root,
                retention,
            },
            dry_run,
        })
    }

    /// Where a merged document goes: the input itself, an explicit path, or the
    /// suffixed sibling.
    pub fn output_for(&self, input: &Path, in_place: bool, explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if in_place {
            return input.to_path_buf();
        }
        default_output_for(input, &self.output_suffix)
    }
}

const DEFAULT_CONFIG_TOML: &str = r#"# survey-merge configuration.
# Located via --config, the SURVEY_MERGE_CONFIG environment variable,
# or by searching upwards from the working directory.

[merge]
# identifier | identifier-text | navigation
strategy = "identifier-text"

# Languages whose unapproved bundle units take the English source text.
fallback_to_source = ["en-GH"]

# school.json -> school_updated.json unless --in-place is given.
output_suffix = "_updated"

[backup]
# Relative to this file's directory.
dir = ".backups"

# Backups kept per file; older ones are pruned.
retention = 3
"#;

pub fn init_default_config(dir: &Path, force: bool) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create config dir: {}", dir.display()))?;
    let cfg_path = dir.join(CONFIG_FILENAME);
    if cfg_path.exists() && !force {
        return Ok(cfg_path);
    }
    std::fs::write(&cfg_path, DEFAULT_CONFIG_TOML)
        .with_context(|| format!("write config: {}", cfg_path.display()))?;
    Ok(cfg_path)
}
