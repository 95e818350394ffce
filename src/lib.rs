//! Temperature forecasting for fleets of IoT sensors.
//!
//! Readings are turned into leakage-free per-sensor features (`features`),
//! fitted with a scaled random forest (`model`), evaluated per sensor and per
//! slice (`report`) and written out as a flat results table (`storage`).
//! `runner` wires the stages into one batch run; the binary adds logging and
//! configuration around it.

pub mod config;
pub mod error;
pub mod features;
pub mod model;
pub mod models;
pub mod report;
pub mod runner;
pub mod storage;

pub use config::Config;
pub use error::{ForecastError, Result};
pub use models::{PredictionRecord, RawSensorRecord, SensorReading};
pub use runner::{run, run_pipeline, PipelineOptions, PipelineOutput, RunSummary};
