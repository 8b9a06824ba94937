//! CLI command definitions and handlers

mod info;
mod leaderboard;
mod predict;
mod refresh;
mod train;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::classifier::{PredictionMethod, MAX_HIGH_RISK_LIMIT};
use crate::config::ChurnConfig;
use crate::ingest;
use crate::models::ActivityRecord;
use crate::pipeline::ChurnService;

/// Parse and validate the high-risk list size (1-1000)
fn parse_high_risk_limit(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if n == 0 {
        Err("limit must be at least 1".to_string())
    } else if n > MAX_HIGH_RISK_LIMIT {
        Err(format!("limit cannot exceed {MAX_HIGH_RISK_LIMIT}"))
    } else {
        Ok(n)
    }
}

/// Anchor date for prediction features, `YYYY-MM-DD`
fn parse_as_of(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| format!("'{}' is not a YYYY-MM-DD date", s))
}

/// gamechurn - Churn prediction for on-chain game activity
#[derive(Parser, Debug)]
#[command(name = "gamechurn")]
#[command(
    version,
    about = "Churn prediction for on-chain game activity: feature engineering, multi-model training, champion and ensemble scoring",
    after_help = "\
Examples:
  gamechurn train activity.csv                       Train the model panel
  gamechurn predict activity.csv --by-project        Score users, roll up per project
  gamechurn predict activity.json --method champion  Use the best single model
  gamechurn refresh activity.csv                     Retrain, then score with both methods
  gamechurn leaderboard                              Compare trained models
  gamechurn info --format json                       Model state and effective config"
)]
pub struct Cli {
    /// Log level (error, warn, info, debug, trace). RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "info", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    /// Model store directory (overrides config and GAMECHURN_MODELS_DIR)
    #[arg(long, global = true)]
    pub models_dir: Option<PathBuf>,

    /// Config file to use instead of ./gamechurn.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train every model family on an activity export and publish the roster
    Train {
        /// Activity file (.csv, otherwise JSON)
        input: PathBuf,

        #[arg(long, short = 'f', default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// Score users with the trained roster
    #[command(after_help = "\
Risk tiers are relative to the scored batch: the high and medium cut points are the
85th and 50th percentiles of this batch's probabilities, clamped to [0.5, 0.8] and
[0.2, 0.5]. The same probability can land in different tiers across runs.")]
    Predict {
        /// Activity file (.csv, otherwise JSON)
        input: PathBuf,

        #[arg(long, short = 'm', default_value = "ensemble", value_parser = ["champion", "ensemble"])]
        method: String,

        #[arg(long, short = 'f', default_value = "text", value_parser = ["text", "json"])]
        format: String,

        /// Write the report to a file instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Add a per-project rollup
        #[arg(long)]
        by_project: bool,

        /// List the N most likely churners in the High tier (1-1000)
        #[arg(long, value_name = "N", num_args = 0..=1, default_missing_value = "100", value_parser = parse_high_risk_limit)]
        high_risk: Option<usize>,

        /// Feature anchor date (default: the day after the latest activity)
        #[arg(long, value_parser = parse_as_of)]
        as_of: Option<NaiveDate>,
    },

    /// Retrain, then score the same input with champion and ensemble
    Refresh {
        /// Activity file (.csv, otherwise JSON)
        input: PathBuf,

        #[arg(long, short = 'f', default_value = "text", value_parser = ["text", "json"])]
        format: String,

        /// Directory for the prediction exports (default: next to the models)
        #[arg(long)]
        export_dir: Option<PathBuf>,
    },

    /// Rank every trained model by ROC-AUC and accuracy
    Leaderboard {
        #[arg(long, short = 'f', default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// Show model state and the effective configuration
    Info {
        #[arg(long, short = 'f', default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },
}

/// Run the CLI with parsed arguments
pub fn run(cli: Cli) -> Result<()> {
    let mut config = ChurnConfig::load(cli.config.as_deref())?;
    if let Some(dir) = &cli.models_dir {
        config.storage.models_dir = Some(dir.clone());
    }

    match cli.command {
        Commands::Train { input, format } => {
            let service = ChurnService::open(config);
            train::run(&service, &input, format.parse()?)
        }

        Commands::Predict {
            input,
            method,
            format,
            output,
            by_project,
            high_risk,
            as_of,
        } => {
            let service = ChurnService::open(config);
            let method: PredictionMethod = method.parse().map_err(anyhow::Error::msg)?;
            predict::run(
                &service,
                &input,
                predict::PredictArgs {
                    method,
                    format: format.parse()?,
                    output,
                    by_project,
                    high_risk: high_risk.map(|n| n.clamp(1, MAX_HIGH_RISK_LIMIT)),
                    as_of,
                },
            )
        }

        Commands::Refresh {
            input,
            format,
            export_dir,
        } => {
            let service = ChurnService::open(config);
            refresh::run(&service, &input, format.parse()?, export_dir.as_deref())
        }

        Commands::Leaderboard { format } => {
            let service = ChurnService::open(config);
            leaderboard::run(&service, format.parse()?)
        }

        Commands::Info { format } => {
            let service = ChurnService::open(config);
            info::run(&service, format.parse()?)
        }
    }
}

/// Load an activity file with a readable error
fn load_input(path: &Path) -> Result<Vec<ActivityRecord>> {
    ingest::load_activity(path)
        .with_context(|| format!("Failed to load activity from {}", path.display()))
}

/// Prediction anchor: the explicit date at midnight, otherwise now
fn resolve_as_of(as_of: Option<NaiveDate>) -> NaiveDateTime {
    as_of
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .unwrap_or_else(crate::pipeline::default_as_of)
}

/// Create spinner progress style
fn create_spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(create_spinner_style());
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// Print to stdout or write to `output`
fn emit(rendered: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            std::fs::write(path, rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Report written to {}", path.display());
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::DEFAULT_HIGH_RISK_LIMIT;

    #[test]
    fn test_parse_high_risk_limit_bounds() {
        assert_eq!(parse_high_risk_limit("1"), Ok(1));
        assert_eq!(parse_high_risk_limit("1000"), Ok(1000));
        assert!(parse_high_risk_limit("0").is_err());
        assert!(parse_high_risk_limit("1001").is_err());
        assert!(parse_high_risk_limit("many").is_err());
    }

    #[test]
    fn test_cli_parses_predict() {
        let cli = Cli::try_parse_from([
            "gamechurn",
            "--models-dir",
            "/tmp/m",
            "predict",
            "a.csv",
            "--method",
            "champion",
            "--by-project",
            "--high-risk",
            "25",
            "--as-of",
            "2024-04-01",
        ])
        .unwrap();
        assert_eq!(cli.models_dir, Some(PathBuf::from("/tmp/m")));
        match cli.command {
            Commands::Predict {
                method,
                by_project,
                high_risk,
                as_of,
                ..
            } => {
                assert_eq!(method, "champion");
                assert!(by_project);
                assert_eq!(high_risk, Some(25));
                assert_eq!(as_of, NaiveDate::from_ymd_opt(2024, 4, 1));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_high_risk_flag_defaults_to_limit() {
        let cli = Cli::try_parse_from(["gamechurn", "predict", "a.csv", "--high-risk"]).unwrap();
        match cli.command {
            Commands::Predict { high_risk, .. } => {
                assert_eq!(high_risk, Some(DEFAULT_HIGH_RISK_LIMIT))
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_resolve_as_of_prefers_explicit_date() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert_eq!(
            resolve_as_of(Some(date)),
            date.and_hms_opt(0, 0, 0).unwrap()
        );

        let before = chrono::Utc::now().naive_utc();
        assert!(resolve_as_of(None) >= before);
    }
}
