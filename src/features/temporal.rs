//! Calendar and cyclical features derived from a reading's timestamp.

use std::f64::consts::PI;

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::Serialize;

// ---

/// Column names produced by [`CalendarFeatures::values`], in order.
pub const CALENDAR_COLUMNS: [&str; 9] = [
    "hour",
    "day_of_week",
    "month",
    "day_of_month",
    "quarter",
    "hour_sin",
    "hour_cos",
    "month_sin",
    "month_cos",
];

/// Calendar fields plus sin/cos encodings of hour-of-day and month.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CalendarFeatures {
    // ---
    pub hour: u32,
    /// Monday = 0 .. Sunday = 6
    pub day_of_week: u32,
    pub month: u32,
    pub day_of_month: u32,
    pub quarter: u32,
    pub hour_sin: f64,
    pub hour_cos: f64,
    pub month_sin: f64,
    pub month_cos: f64,
}

/// Derive calendar and cyclical fields from a timestamp. Pure and total.
pub fn extract(timestamp: &DateTime<Utc>) -> CalendarFeatures {
    // ---
    let hour = timestamp.hour();
    let month = timestamp.month();

    let hour_angle = 2.0 * PI * f64::from(hour) / 24.0;
    let month_angle = 2.0 * PI * f64::from(month) / 12.0;

    CalendarFeatures {
        hour,
        day_of_week: timestamp.weekday().num_days_from_monday(),
        month,
        day_of_month: timestamp.day(),
        quarter: (month - 1) / 3 + 1,
        hour_sin: hour_angle.sin(),
        hour_cos: hour_angle.cos(),
        month_sin: month_angle.sin(),
        month_cos: month_angle.cos(),
    }
}

impl CalendarFeatures {
    /// Values in [`CALENDAR_COLUMNS`] order.
    pub fn values(&self) -> [f64; 9] {
        // ---
        [
            f64::from(self.hour),
            f64::from(self.day_of_week),
            f64::from(self.month),
            f64::from(self.day_of_month),
            f64::from(self.quarter),
            self.hour_sin,
            self.hour_cos,
            self.month_sin,
            self.month_cos,
        ]
    }
}
