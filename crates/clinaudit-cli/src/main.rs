//! clinaudit CLI - certify a model version against a synthetic case corpus
//!
//! ## Commands
//!
//! - `run`: generate, score and gate a full corpus; writes the audit packet
//! - `parse`: parse one raw model response and print the result
//! - `check-data`: validate a corpus directory and print counts
//! - `config`: print the effective configuration and its hash

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

use clinaudit_core::{parse_model_output_with, CaseCorpus, ParseResult, RunContext, RunReport};
use clinaudit_runtime::{write_audit_packet, RunConfig, Runner};

#[derive(Parser)]
#[command(name = "clinaudit")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Certify LLM responses to synthetic clinical-style cases", long_about = None)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full evaluation and apply the certification gate
    ///
    /// Exits with status 1 when the gate fails.
    Run {
        /// Path to the YAML run configuration
        #[arg(short, long)]
        config: PathBuf,

        /// Override `data.data_dir`
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Override `data.output_dir`
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Parse a raw model response file and print the parse result as JSON
    Parse {
        /// File holding the raw response text
        file: PathBuf,

        /// Repair attempts after the initial parse
        #[arg(long, default_value_t = clinaudit_core::DEFAULT_MAX_REPAIR_ATTEMPTS)]
        max_repair_attempts: u32,
    },

    /// Validate a corpus directory and print record counts
    CheckData {
        /// Corpus directory
        #[arg(short, long, default_value = "data")]
        data_dir: PathBuf,
    },

    /// Print the effective configuration and its hash
    Config {
        /// Path to the YAML run configuration (defaults when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            config,
            data_dir,
            output_dir,
        } => cmd_run(&config, data_dir, output_dir).await,
        Commands::Parse {
            file,
            max_repair_attempts,
        } => {
            let result = parse_file(&file, max_repair_attempts)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::CheckData { data_dir } => {
            let corpus = CaseCorpus::from_dir(&data_dir)
                .with_context(|| format!("Corpus in {} is invalid", data_dir.display()))?;
            print!("{}", corpus_counts(&corpus));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config { config } => {
            let config = load_config(config.as_deref())?;
            println!("# config_hash: {}", config.hash()?);
            print!("{}", serde_yaml::to_string(&config)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<RunConfig> {
    match path {
        Some(path) => RunConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(RunConfig::default()),
    }
}

async fn cmd_run(
    config_path: &Path,
    data_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
) -> Result<ExitCode> {
    let mut config = load_config(Some(config_path))?;
    if let Some(dir) = data_dir {
        config.data.data_dir = dir;
    }
    if let Some(dir) = output_dir {
        config.data.output_dir = dir;
    }

    let corpus = CaseCorpus::from_dir(&config.data.data_dir).with_context(|| {
        format!("Failed to load corpus from {}", config.data.data_dir.display())
    })?;

    let audit_dir = config.audit_dir();
    let runner = Runner::from_config(config)?;
    let context = RunContext::new(
        runner.adapter().model_id(),
        runner.adapter().version(),
        runner.config().hash()?,
        runner.config().seed,
    )
    .with_command_line(std::env::args().collect::<Vec<_>>().join(" "));

    let report = runner.run_with_context(&corpus, context).await?;
    let path = write_audit_packet(&report, &audit_dir)?;

    print!("{}", run_summary(&report));
    println!("Audit packet: {}", path.display());

    info!(verdict = %report.gate.overall, "run finished");
    Ok(if report.gate.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn parse_file(path: &Path, max_repair_attempts: u32) -> Result<ParseResult> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(parse_model_output_with(&raw, max_repair_attempts))
}

fn corpus_counts(corpus: &CaseCorpus) -> String {
    let mut out = format!(
        "bases: {}\nvariants: {}\n",
        corpus.bases.len(),
        corpus.variants.len()
    );
    for (name, entries) in &corpus.suites {
        out.push_str(&format!("suite {}: {}\n", name, entries.len()));
    }
    out
}

fn run_summary(report: &RunReport) -> String {
    let m = &report.metrics;
    let mut out = format!(
        "Run {} ({})\n  CFC overall:     {:.4}\n  NRT pass rate:   {:.4}\n  JSON validity:   {:.4}\n  Repair rate:     {:.4}\n  Canary leakage:  {:.4}\nGate: {}\n",
        report.context.run_id,
        report.context.config_hash,
        m.cfc.overall,
        m.sng.pass_rate,
        m.fc.validity_rate,
        m.fc.repair_rate,
        m.pc.leakage_rate,
        report.gate.overall,
    );
    for failure in &report.gate.failures {
        out.push_str(&format!("  - {}\n", failure));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_args() {
        let args = ["clinaudit", "parse", "out.txt", "--max-repair-attempts", "0"];
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Parse {
                file,
                max_repair_attempts,
            } => {
                assert_eq!(file, PathBuf::from("out.txt"));
                assert_eq!(max_repair_attempts, 0);
            }
            _ => panic!("expected parse command"),
        }
    }

    #[test]
    fn test_parse_file_repairs_trailing_commas() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.txt");
        std::fs::write(
            &path,
            "Here you go:\n```json\n{\"diagnosis\": [\"a\",], \"medications\": [], \"monitoring\": [], \"contraindications_flagged\": [], \"risk_flags\": [], \"icd10_codes\": [], \"uncertainty\": {\"level\": \"low\", \"reasons\": []}}\n```",
        )
        .unwrap();

        let result = parse_file(&path, 2).unwrap();
        assert!(result.schema_valid);
        assert!(result.repaired);
        assert_eq!(result.repair_attempts, 1);
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(parse_file(Path::new("/nonexistent/raw.txt"), 2).is_err());
    }
}
