use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand};

use survey_merge::pipeline::{init_default_config, MergeConfig, SurveyIndex, SurveyMerger};
use survey_merge::progress::ConsoleProgress;
use survey_merge::sources::fixes::read_fixes;
use survey_merge::sources::table::{read_table, records_from_table, write_table};
use survey_merge::sources::{load_bundle, TranslationRecord};
use survey_merge::survey::audit::audit_document;
use survey_merge::survey::document::read_document;
use survey_merge::survey::export::export_table;

#[derive(Parser, Debug)]
#[command(name = "survey-merge")]
#[command(about = "Merge translations from tables and XLIFF bundles into survey JSON", long_about = None)]
struct Cli {
    /// Config file path (default: SURVEY_MERGE_CONFIG, then search for survey-merge.toml upwards)
    #[arg(long, global = true, value_name = "TOML")]
    config: Option<PathBuf>,

    /// Suppress progress lines on stderr
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct MergeOpts {
    /// Reconcile and report, but write nothing
    #[arg(long)]
    dry_run: bool,

    /// Overwrite the survey (a backup is kept) instead of writing <stem>_updated.json
    #[arg(long)]
    in_place: bool,

    /// Only merge this language (required for single-language tables)
    #[arg(long)]
    lang: Option<String>,

    /// Match strategy: identifier, identifier-text, navigation
    #[arg(long)]
    strategy: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Merge a CSV translation table into one survey
    MergeTable {
        #[arg(value_name = "SURVEY")]
        survey: PathBuf,
        #[arg(value_name = "CSV")]
        table: PathBuf,
        /// Output path (overrides --in-place)
        #[arg(short, long, value_name = "JSON")]
        out: Option<PathBuf>,
        #[command(flatten)]
        opts: MergeOpts,
    },

    /// Import an XLIFF bundle (.xliff/.xlf or .zip) into the surveys of a directory
    ImportBundle {
        #[arg(value_name = "BUNDLE")]
        bundle: PathBuf,
        /// Directory holding the survey JSON files
        #[arg(long, value_name = "DIR", default_value = ".")]
        surveys: PathBuf,
        #[command(flatten)]
        opts: MergeOpts,
    },

    /// Apply a hand-written fixes JSON ({"<identifier>": {"<lang>": "text"}})
    ApplyFixes {
        #[arg(value_name = "SURVEY")]
        survey: PathBuf,
        #[arg(value_name = "FIXES")]
        fixes: PathBuf,
        #[arg(short, long, value_name = "JSON")]
        out: Option<PathBuf>,
        #[command(flatten)]
        opts: MergeOpts,
    },

    /// Report nodes missing an English baseline or a translation
    Check {
        #[arg(value_name = "SURVEY")]
        survey: PathBuf,
        /// Languages to check (comma separated)
        #[arg(long, value_delimiter = ',')]
        lang: Vec<String>,
    },

    /// Export a survey's localizable text as a CSV table
    Extract {
        #[arg(value_name = "SURVEY")]
        survey: PathBuf,
        #[arg(long, value_delimiter = ',')]
        lang: Vec<String>,
        /// Output CSV (default: <stem>.csv next to the survey)
        #[arg(short, long, value_name = "CSV")]
        out: Option<PathBuf>,
    },

    /// Write a default survey-merge.toml, then exit
    InitConfig {
        /// Directory to write into (default: current directory)
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let progress = ConsoleProgress::new(!cli.quiet);

    match cli.command {
        Command::MergeTable {
            survey,
            table,
            out,
            opts,
        } => {
            let table = read_table(&table)?;
            let records = records_from_table(&table, opts.lang.as_deref())
                .context("records from table")?;
            progress.info(format!("Table rows: {}, records: {}", table.rows.len(), records.len()));
            merge_one(&survey, records, out, &opts, cli.config, progress)
        }
        Command::ApplyFixes {
            survey,
            fixes,
            out,
            opts,
        } => {
            let mut records = read_fixes(&fixes)?;
            if let Some(lang) = opts.lang.as_deref() {
                let lang = survey_merge::lang::normalize_lang(lang);
                records.retain(|r| r.language == lang);
            }
            progress.info(format!("Fix records: {}", records.len()));
            merge_one(&survey, records, out, &opts, cli.config, progress)
        }
        Command::ImportBundle {
            bundle,
            surveys,
            opts,
        } => {
            let cfg = MergeConfig::from_paths_and_args(
                &surveys,
                cli.config,
                opts.strategy.clone(),
                opts.dry_run,
            )
            .context("build config")?;
            let index = SurveyIndex::scan(&surveys, &cfg.output_suffix)?;
            if index.is_empty() {
                return Err(anyhow!("no survey JSON files in {}", surveys.display()));
            }
            progress.info(format!("Surveys indexed: {}", index.len()));
            let bundle = load_bundle(&bundle, &progress)?;
            progress.info(format!("Bundle sections: {}", bundle.sections.len()));

            let merger = SurveyMerger::new(cfg, progress);
            let summary =
                merger.import_bundle(&bundle, &index, opts.lang.as_deref(), opts.in_place);
            merger.progress().summary(summary.render());
            if summary.documents_failed > 0 {
                return Err(anyhow!("{} document(s) failed", summary.documents_failed));
            }
            Ok(())
        }
        Command::Check { survey, lang } => {
            let doc = read_document(&survey)?;
            let report = audit_document(&doc, &lang);
            progress.summary(report.render().trim_end());
            if !report.is_clean() {
                return Err(anyhow!("{} has gaps", survey.display()));
            }
            Ok(())
        }
        Command::Extract { survey, lang, out } => {
            let doc = read_document(&survey)?;
            let table = export_table(&doc, &lang);
            let out = out.unwrap_or_else(|| survey.with_extension("csv"));
            std::fs::write(&out, write_table(&table)?)
                .with_context(|| format!("write table: {}", out.display()))?;
            progress.summary(format!("Wrote {} rows: {}", table.rows.len(), out.display()));
            Ok(())
        }
        Command::InitConfig { dir, force } => {
            let dir = dir
                .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
            let cfg_path = init_default_config(&dir, force).context("init default config")?;
            progress.summary(format!("Wrote config: {}", cfg_path.display()));
            Ok(())
        }
    }
}

fn merge_one(
    survey: &Path,
    records: Vec<TranslationRecord>,
    out: Option<PathBuf>,
    opts: &MergeOpts,
    config: Option<PathBuf>,
    progress: ConsoleProgress,
) -> anyhow::Result<()> {
    let workdir = survey
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let cfg = MergeConfig::from_paths_and_args(
        &workdir,
        config,
        opts.strategy.clone(),
        opts.dry_run,
    )
    .context("build config")?;
    let output = cfg.output_for(survey, opts.in_place, out.as_deref());

    let merger = SurveyMerger::new(cfg, progress);
    let merged = merger.merge_file(survey, &records, &output)?;
    merger.progress().summary(format!(
        "{}: {}",
        output.display(),
        merged.report.summary()
    ));
    Ok(())
}
