//! Wallet Credit Score
//!
//! Batch job that reads an exported lending-protocol transaction history
//! (a JSON array of records), scores every wallet in it, and writes one CSV
//! row per wallet with its score and the features the score came from.

mod config;
mod error;
mod storage;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use credit_core::{extract_features, rank, score_all, ScoreSummary};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{AppConfig, LoggingConfig};
use crate::error::{AppError, AppResult};

/// Score lending-protocol wallets from their transaction history
#[derive(Parser, Debug)]
#[command(name = "wallet-credit-score")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the user-transactions JSON file
    input_json: PathBuf,

    /// Output CSV file (default: wallet_scores.csv)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Sort rows by score, highest first
    #[arg(long)]
    rank: bool,

    /// Re-read the written table and check every score against its features
    #[arg(long)]
    verify: bool,

    /// Extra configuration file, layered over config/default and config/local
    #[arg(short, long, env = "CREDIT_CONFIG")]
    config: Option<PathBuf>,
}

/// Options for one scoring run, after merging CLI flags over configuration.
#[derive(Debug, Clone)]
struct RunOptions {
    input: PathBuf,
    output: PathBuf,
    rank: bool,
    verify: bool,
}

impl RunOptions {
    fn resolve(cli: Cli, config: &AppConfig) -> Self {
        Self {
            input: cli.input_json,
            output: cli
                .output
                .unwrap_or_else(|| PathBuf::from(&config.output.path)),
            rank: cli.rank || config.output.rank,
            verify: cli.verify || config.output.verify,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())
        .map_err(AppError::from)
        .context("Failed to load configuration")?;
    init_tracing(&config.logging);

    let options = RunOptions::resolve(cli, &config);
    tracing::debug!(?options, "Run options resolved");

    run(&options).map_err(|e| {
        tracing::error!(error = %e, "Scoring run failed, no output written");
        e
    })?;

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    // Logs go to stderr; stdout stays free for piping.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let registry = tracing_subscriber::registry().with(filter);

    if logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn run(options: &RunOptions) -> AppResult<ScoreSummary> {
    tracing::info!(input = %options.input.display(), "Loading data");
    let transactions = storage::load_transactions(&options.input)?;

    tracing::info!(transactions = transactions.len(), "Extracting features");
    let features = extract_features(&transactions)?;
    if features.is_empty() {
        tracing::warn!("No record carries a wallet identity, writing an empty table");
    }

    tracing::info!(wallets = features.len(), "Scoring wallets");
    let mut rows = score_all(&features);
    if options.rank {
        rank(&mut rows);
    }

    storage::save_scores(&options.output, &rows)?;

    if options.verify {
        let checked = storage::verify_scores(&options.output)?;
        tracing::info!(rows = checked, "Written scores verified against features");
    }

    let summary = ScoreSummary::from_rows(&rows);
    log_summary(&summary);
    tracing::info!(output = %options.output.display(), "Saved scores");

    Ok(summary)
}

fn log_summary(summary: &ScoreSummary) {
    let bands = ScoreSummary::band_labels()
        .iter()
        .zip(summary.band_counts.iter())
        .map(|(label, count)| format!("{}={}", label, count))
        .collect::<Vec<_>>()
        .join(" ");

    tracing::info!(
        wallets = summary.wallets,
        min = summary.min_score,
        max = summary.max_score,
        mean = %format!("{:.1}", summary.mean_score),
        bands = %bands,
        "Score distribution"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use credit_core::CreditError;
    use std::fs;
    use std::path::Path;

    fn options(dir: &Path, input: &str) -> RunOptions {
        let input_path = dir.join("transactions.json");
        fs::write(&input_path, input).unwrap();
        RunOptions {
            input: input_path,
            output: dir.join("wallet_scores.csv"),
            rank: true,
            verify: true,
        }
    }

    #[test]
    fn test_run_writes_ranked_table() {
        let dir = tempfile::tempdir().unwrap();
        let opts = options(
            dir.path(),
            r#"[
                {"user": "0xlow", "action": "borrow", "amount": 50},
                {"user": "0xhigh", "action": "deposit", "amount": 100, "timestamp": "2021-01-01T00:00:00Z"},
                {"user": "0xhigh", "action": "redeemunderlying", "amount": 50, "timestamp": "2021-07-20T00:00:00Z"},
                {"action": "deposit", "amount": "ignored, no wallet"}
            ]"#,
        );

        let summary = run(&opts).unwrap();
        assert_eq!(summary.wallets, 2);

        let rows = storage::read_scores(&opts.output).unwrap();
        assert_eq!(rows[0].wallet, "0xhigh");
        assert_eq!(rows[1].wallet, "0xlow");
        // 500 + 200 + 50 (200 days) + 20
        assert_eq!(rows[0].score, 770);
        // 500 + 10 - 100
        assert_eq!(rows[1].score, 410);
    }

    #[test]
    fn test_malformed_amount_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let opts = options(
            dir.path(),
            r#"[
                {"user": "0xa", "action": "deposit", "amount": 100},
                {"user": "0xa", "action": "repay", "amount": "ten"}
            ]"#,
        );

        let err = run(&opts).unwrap_err();
        assert!(matches!(
            err,
            AppError::Credit(CreditError::MalformedAmount { .. })
        ));
        assert!(!opts.output.exists());
    }

    #[test]
    fn test_input_without_identities_writes_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let opts = options(dir.path(), r#"[{"action": "deposit", "amount": 5}, 3]"#);

        let summary = run(&opts).unwrap();
        assert_eq!(summary.wallets, 0);
        assert!(storage::read_scores(&opts.output).unwrap().is_empty());
    }

    #[test]
    fn test_cli_flags_override_config() {
        let config = AppConfig::load(None).unwrap();
        let cli = Cli::parse_from([
            "wallet-credit-score",
            "tx.json",
            "--output",
            "out.csv",
            "--rank",
        ]);
        let opts = RunOptions::resolve(cli, &config);

        assert_eq!(opts.input, PathBuf::from("tx.json"));
        assert_eq!(opts.output, PathBuf::from("out.csv"));
        assert!(opts.rank);
        assert!(!opts.verify);

        let cli = Cli::parse_from(["wallet-credit-score", "tx.json"]);
        let opts = RunOptions::resolve(cli, &config);
        assert_eq!(opts.output, PathBuf::from(crate::config::DEFAULT_OUTPUT_PATH));
    }
}
