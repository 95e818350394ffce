//! Application entry point for the `sensorflow-forecast` batch job.
//!
//! This binary runs one forecasting pass end to end:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Reading the train and test readings tables
//! - Engineering features, fitting the forest and evaluating on test
//! - Writing the results table and the JSON metrics summary
//!
//! # Environment Variables
//! - `TRAIN_DATA_PATH` / `TEST_DATA_PATH` (**required**) – input CSV tables
//! - `FORECAST_LOG_LEVEL` (optional) – log verbosity (default: `info`)
//! - `FORECAST_SPAN_EVENTS` (optional) – span event mode for tracing
//!
//! See `config` for the remaining optional settings. The CPU-bound work runs
//! on tokio's blocking pool so the runtime threads stay free.
use std::env;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use uuid::Uuid;

use sensorflow_forecast::{config, runner};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("forecast_run", %run_id);

    let summary = tokio::task::spawn_blocking(move || {
        let _entered = span.enter();
        runner::run(&cfg, run_id)
    })
    .await
    .context("forecast run panicked")??;

    tracing::info!(
        "Run {} complete: {} train rows, {} test rows, test MAE {:.4}°C",
        run_id,
        summary.train_rows,
        summary.test_rows,
        summary.test_report.overall.mae
    );
    if let Some(top) = summary.top_features.first() {
        tracing::info!("Most important feature: {} ({:.4})", top.feature, top.importance);
    }

    Ok(())
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `FORECAST_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level controlled by `RUST_LOG`, else `FORECAST_LOG_LEVEL`
///
/// Call once at startup, before any logging macro runs.
fn init_tracing() {
    // ---
    let span_events = match env::var("FORECAST_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("FORECAST_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "info",
        };
        EnvFilter::new(level)
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
