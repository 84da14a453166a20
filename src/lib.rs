//! Interpretation of Indonesian hospital billing documents.
//!
//! Text acquisition (`pipeline::extraction`) merges text-layer output with
//! OCR for scanned pages; interpretation (`pipeline::structuring`) turns the
//! merged text into a patient name, a total, categorized cost components and
//! a ranked evidence bundle.

pub mod config;
pub mod pipeline;
pub mod pipeline_config;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

pub use pipeline::extraction::{AcquiredText, DocumentExtractor, ExtractionError};
pub use pipeline::structuring::{interpret_billing_text, ExtractionOutcome, ParsedBillingFields};
pub use pipeline_config::PipelineConfig;

/// Exit status when no name, total or component was found.
const EXIT_NOTHING_FOUND: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "tagihan",
    version,
    about = "Interpret Indonesian hospital billing text and print the result as JSON."
)]
pub struct Args {
    /// Billing text file. Reads stdin when omitted.
    pub input: Option<PathBuf>,
}

/// Initialize tracing on stderr so stdout carries only the JSON result.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Command-line entry.
pub fn run() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    init_tracing();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let text = read_input(args.input.as_deref())?;
    let config = PipelineConfig::from_env();
    let parsed = interpret_billing_text(&text, &config);
    let outcome = parsed.outcome();

    let json = serde_json::to_string_pretty(&parsed)
        .context("Cannot serialize interpretation result")?;
    println!("{json}");

    tracing::info!(outcome = ?outcome, "Done");
    Ok(ExitCode::from(exit_status(outcome)))
}

/// Process exit status for an interpretation outcome.
pub fn exit_status(outcome: ExtractionOutcome) -> u8 {
    match outcome {
        ExtractionOutcome::NothingFound => EXIT_NOTHING_FOUND,
        _ => 0,
    }
}

fn read_input(path: Option<&Path>) -> anyhow::Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read billing text {path:?}")),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Cannot read billing text from stdin")?;
            Ok(text)
        }
    }
}
