//! Reporting endpoints over the parser log.
//!
//! Three reports the operations dashboard consumes: message volume,
//! parser performance, and OpenAI spend. Each executor aggregates
//! `ParserLogStore` rows in-process and returns columns, rows, and a
//! chart payload; results are cached for a short TTL.

mod cache;
pub mod cost_tracking;
pub mod message_volume;
pub mod parser_performance;
pub mod types;

pub use cache::ReportCache;
pub use types::{ReportFilters, ReportResult};

use crate::error::{AppError, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

pub(crate) fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

pub(crate) fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    // 23:59:59 is always a valid wall-clock time.
    let last_second = NaiveTime::from_hms_opt(23, 59, 59).unwrap();
    date.and_time(last_second).and_utc()
}

pub(crate) fn to_values<T: Serialize>(rows: Vec<T>) -> Result<Vec<serde_json::Value>> {
    rows.into_iter()
        .map(|row| serde_json::to_value(row).map_err(AppError::from))
        .collect()
}
