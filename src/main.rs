//! nl2sql-guard command line entry point.
//!
//! Reads a question and a schema file, runs the guarded pipeline against the
//! configured oracle and prints the result to stdout. Logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use nl2sql_guard::cancel::install_ctrl_c_handler;
use nl2sql_guard::{CancelController, Config, GuardError, Nl2SqlPipeline, OpenAiOracle};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "nl2sql-guard", version, about = "Guarded natural language to SQL")]
struct Args {
    /// Natural language question
    #[arg(short, long)]
    question: String,

    /// File containing CREATE TABLE statements
    #[arg(short, long)]
    schema_file: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, env = "NL2SQL_OUTPUT_FORMAT", default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Skip the plain-language explanation
    #[arg(long)]
    no_answer: bool,

    /// Override NL2SQL_MAX_CORRECTION_ATTEMPTS
    #[arg(long)]
    max_attempts: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let mut config = Config::from_env()?;
    if let Some(max_attempts) = args.max_attempts {
        config.verification.max_correction_attempts = max_attempts;
    }

    let schema = std::fs::read_to_string(&args.schema_file)
        .with_context(|| format!("Failed to read schema file {}", args.schema_file.display()))?;

    let oracle = Arc::new(OpenAiOracle::new(&config.oracle)?);
    let pipeline = Nl2SqlPipeline::from_config(oracle, &config);

    let controller = Arc::new(CancelController::new());
    install_ctrl_c_handler(controller.clone());

    let result = pipeline
        .generate(&args.question, &schema, !args.no_answer, &controller.signal())
        .await
        .map_err(report)?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => {
            println!("{}", result.sql);
            if !result.is_valid {
                println!("\n-- Verification failed after {} corrections", result.corrections_made);
            }
            for note in &result.verification_notes {
                println!("-- {}", note);
            }
            if let Some(answer) = &result.answer {
                println!("\n{}", answer);
            }
            println!("\n{}", result.disclaimer);
        }
    }

    Ok(())
}

/// Turn a pipeline error into a user-facing message.
fn report(err: GuardError) -> anyhow::Error {
    let mut message = err.user_message();
    if let Some(suggestion) = err.suggestion() {
        message.push_str(&format!(" ({})", suggestion));
    }
    anyhow::anyhow!(message)
}

/// Initialize tracing subscriber with stderr output.
///
/// stdout carries the result, so logs must go to stderr.
fn init_logging() {
    let filter = std::env::var("RUST_LOG")
        .map(EnvFilter::new)
        .unwrap_or_else(|_| EnvFilter::new("warn,nl2sql_guard=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}
