//! Feature engineering gateway (EMBP).
//!
//! Raw readings flow through `temporal` (calendar fields), `series`
//! (per-sensor lags and rolling statistics) and `assembler` (per-sensor
//! merge plus warm-up filtering). Callers only see the re-exports below.

mod assembler;
mod frame;
mod series;
mod temporal;

pub use assembler::{
    drop_warm_up, partition_by_sensor, AssembledDataset, DatasetAssembler, WarmUpOutcome,
};
pub use frame::{FeatureFrame, FeatureMatrix, FeatureRecord};
pub use series::{FeatureRow, SensorSeriesFeatureBuilder, SeriesConfig};
pub use temporal::{extract as extract_calendar, CalendarFeatures, CALENDAR_COLUMNS};
