use std::io::Write;

use anyhow::{Result, anyhow};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::OutputFormat;

pub fn setup_logging(format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Jsonl => {
            let subscriber = tracing_subscriber::FmtSubscriber::builder()
                .with_writer(std::io::stderr)
                .json()
                .with_env_filter(EnvFilter::from_default_env())
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .map_err(|e| anyhow!("Failed to initialize tracing: {e}"))
        }
        OutputFormat::Pretty => {
            let subscriber = tracing_subscriber::FmtSubscriber::builder()
                .with_writer(std::io::stderr)
                .with_env_filter(EnvFilter::from_default_env())
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .map_err(|e| anyhow!("Failed to initialize tracing: {e}"))
        }
    }
}

/// Writes `value` as one JSON line, or pretty-printed.
pub fn write_output<W: Write, T: Serialize>(
    writer: &mut W,
    value: &T,
    format: &OutputFormat,
) -> Result<(), crate::error::EvaluatorError> {
    match format {
        OutputFormat::Jsonl => writeln!(writer, "{}", serde_json::to_string(value)?)?,
        OutputFormat::Pretty => writeln!(writer, "{}", serde_json::to_string_pretty(value)?)?,
    }
    Ok(())
}
