//! Survey Sentiment - command line front end
//!
//! Scores single answers, records corrections, and summarizes survey exports
//! against the engine state in `--state-dir`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use survey_sentiment_core::{EngineConfig, IncomeBand, SurveyEngine, SurveyRow};
use tracing::{debug, Level};
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(name = "survey-sentiment")]
#[command(about = "Adaptive categorization engine for survey responses", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// State directory (overrides config and SURVEY_SENTIMENT_STATE_DIR)
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Seed for exploration (overrides config)
    #[arg(long)]
    seed: Option<u64>,

    /// Set log level
    #[arg(short, long, default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Score an occupation
    Background {
        /// Occupation label, e.g. "Software Engineer"
        label: String,
    },

    /// Classify a monthly family income
    Income {
        #[arg(value_parser = parse_amount, allow_negative_numbers = true)]
        amount: f64,
    },

    /// Run role-model text through the trait pipeline
    Traits {
        text: String,
    },

    /// Print the current income thresholds
    Thresholds,

    /// Record a correction and apply it
    #[command(subcommand)]
    Feedback(FeedbackCommands),

    /// Summarize a JSON array of survey rows
    Analyze {
        /// Path to the rows file
        rows: PathBuf,
    },

    /// Print the effective configuration
    Config,
}

#[derive(Subcommand)]
enum FeedbackCommands {
    /// Correct an occupation score
    Background {
        label: String,
        predicted: f64,
        observed: f64,
    },

    /// Correct an income band (e.g. low_income, below_average)
    Income {
        #[arg(value_parser = parse_amount, allow_negative_numbers = true)]
        amount: f64,
        predicted: IncomeBand,
        observed: IncomeBand,
    },
}

/// Income amounts must be finite numbers
fn parse_amount(s: &str) -> std::result::Result<f64, String> {
    let amount: f64 = s
        .trim()
        .parse()
        .map_err(|e| format!("invalid amount {:?}: {}", s, e))?;
    if !amount.is_finite() {
        return Err(format!("amount must be a finite number, got {}", s));
    }
    Ok(amount)
}

fn init_tracing(log_level: &str) {
    let level = match log_level {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };
    let level = level.as_str().to_lowercase();

    let filter = EnvFilter::new(format!(
        "survey_sentiment={},survey_sentiment_core={}",
        level, level
    ));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr) // Write logs to stderr, not stdout
        .init();
}

fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config =
        EngineConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(dir) = &cli.state_dir {
        config.state_dir = dir.clone();
    }
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }
    Ok(config)
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    debug!("survey-sentiment v{} starting", env!("CARGO_PKG_VERSION"));

    let config = load_config(&cli)?;
    if let Commands::Config = cli.command {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let engine = SurveyEngine::open(config).context("Failed to open engine")?;

    match cli.command {
        Commands::Background { label } => {
            print_json(&engine.score_background(&label)?)?;
        }
        Commands::Income { amount } => {
            print_json(&json!({
                "income": amount,
                "band": engine.classify_income(amount),
                "label": engine.classify_income(amount).to_string(),
                "thresholds": engine.income().thresholds(),
            }))?;
        }
        Commands::Traits { text } => {
            let observation = engine.observe_role_models(&text);
            let weights = engine.traits().weights();
            let touched: serde_json::Map<String, serde_json::Value> = observation
                .extraction
                .distinct_traits()
                .into_iter()
                .map(|t| {
                    let w = weights.weight(&t);
                    (t, json!(w))
                })
                .collect();
            print_json(&json!({
                "categories": observation.extraction.matched_categories,
                "traits": observation.extraction.traits,
                "impact": observation.impact,
                "weights": touched,
                "persisted": observation.persisted,
            }))?;
        }
        Commands::Thresholds => {
            print_json(&engine.income().thresholds())?;
        }
        Commands::Feedback(FeedbackCommands::Background {
            label,
            predicted,
            observed,
        }) => {
            engine.submit_background_feedback(&label, predicted, observed)?;
            let report = engine.background().update();
            print_json(&json!({
                "report": report,
                "score": engine.background().lookup(&label),
            }))?;
        }
        Commands::Feedback(FeedbackCommands::Income {
            amount,
            predicted,
            observed,
        }) => {
            let receipt = engine.submit_income_feedback(amount, predicted, observed)?;
            let report = match receipt.update {
                Some(report) => report,
                None => engine.income().update(),
            };
            print_json(&json!({
                "report": report,
                "thresholds": engine.income().thresholds(),
            }))?;
        }
        Commands::Analyze { rows } => {
            let contents = std::fs::read_to_string(&rows)
                .with_context(|| format!("Failed to read {}", rows.display()))?;
            let rows: Vec<SurveyRow> =
                serde_json::from_str(&contents).context("Rows file is not a JSON array of rows")?;
            print_json(&engine.analyze(&rows))?;
        }
        Commands::Config => {}
    }

    Ok(())
}
