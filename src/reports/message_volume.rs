// Telegram message volume report.

use super::types::{
    round2, Chart, ChartData, ChartDataset, ReportColumn, ReportFilters, ReportResult,
};
use super::{end_of_day, start_of_day, to_values};
use crate::error::{AppError, Result};
use crate::parser_log::{ParserLogEntry, ParserLogStore};
use chrono::{Duration, NaiveDate, Timelike, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

const MAX_RANGE_DAYS: i64 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Grouping {
    Date,
    Hour,
}

impl Grouping {
    // Anything that is not an hourly grouping falls back to daily.
    fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some(value) if value.eq_ignore_ascii_case("hour") => Grouping::Hour,
            _ => Grouping::Date,
        }
    }
}

#[derive(Debug, Serialize)]
struct DateRow {
    date: String,
    total_messages: u64,
    unique_users: u64,
    tasks_created: u64,
    errors: u64,
    avg_confidence: Option<f64>,
}

#[derive(Debug, Serialize)]
struct HourRow {
    hour: u32,
    total_messages: u64,
    unique_users: u64,
    tasks_created: u64,
    errors: u64,
}

#[derive(Default)]
struct Bucket {
    total_messages: u64,
    users: HashSet<i64>,
    tasks_created: u64,
    errors: u64,
    confidence_sum: f64,
    confidence_count: u64,
}

impl Bucket {
    fn add(&mut self, entry: &ParserLogEntry) {
        self.total_messages += 1;
        if let Some(user_id) = entry.telegram_user_id {
            self.users.insert(user_id);
        }
        if entry.created_task_id.is_some() {
            self.tasks_created += 1;
        }
        if entry.error_occurred {
            self.errors += 1;
        }
        if let Some(score) = entry.confidence_score {
            self.confidence_sum += score;
            self.confidence_count += 1;
        }
    }

    fn avg_confidence(&self) -> Option<f64> {
        if self.confidence_count == 0 {
            return None;
        }
        Some(round2(self.confidence_sum / self.confidence_count as f64))
    }
}

/// Message counts, users, task conversions and errors per day or hour.
pub fn execute(store: &dyn ParserLogStore, filters: &ReportFilters) -> Result<ReportResult> {
    let grouping = Grouping::parse(filters.group_by.as_deref());

    let today = Utc::now().date_naive();
    let from = filters
        .from_date
        .unwrap_or_else(|| today - Duration::days(7));
    let to = filters.to_date.unwrap_or(today);

    if (to - from).num_days() > MAX_RANGE_DAYS {
        return Err(AppError::InvalidRequest(
            "Date range cannot exceed 90 days".to_string(),
        ));
    }

    let entries: Vec<ParserLogEntry> = store
        .entries_between(start_of_day(from), end_of_day(to))
        .into_iter()
        .filter(|entry| match filters.telegram_user_id {
            Some(user_id) => entry.telegram_user_id == Some(user_id),
            None => true,
        })
        .collect();

    match grouping {
        Grouping::Date => execute_by_date(&entries),
        Grouping::Hour => execute_by_hour(&entries),
    }
}

fn execute_by_date(entries: &[ParserLogEntry]) -> Result<ReportResult> {
    let mut buckets: BTreeMap<NaiveDate, Bucket> = BTreeMap::new();
    for entry in entries {
        buckets
            .entry(entry.created_at.date_naive())
            .or_default()
            .add(entry);
    }

    // Newest day first.
    let rows: Vec<DateRow> = buckets
        .iter()
        .rev()
        .map(|(date, bucket)| DateRow {
            date: date.to_string(),
            total_messages: bucket.total_messages,
            unique_users: bucket.users.len() as u64,
            tasks_created: bucket.tasks_created,
            errors: bucket.errors,
            avg_confidence: bucket.avg_confidence(),
        })
        .collect();

    let chart = volume_chart(
        rows.iter().map(|row| row.date.clone()).collect(),
        rows.iter().map(|row| row.total_messages as f64).collect(),
    );

    Ok(ReportResult {
        columns: date_columns(),
        rows: to_values(rows)?,
        message: None,
        chart,
    })
}

fn execute_by_hour(entries: &[ParserLogEntry]) -> Result<ReportResult> {
    let mut buckets: BTreeMap<u32, Bucket> = BTreeMap::new();
    for entry in entries {
        buckets
            .entry(entry.created_at.time().hour())
            .or_default()
            .add(entry);
    }

    let rows: Vec<HourRow> = buckets
        .iter()
        .map(|(hour, bucket)| HourRow {
            hour: *hour,
            total_messages: bucket.total_messages,
            unique_users: bucket.users.len() as u64,
            tasks_created: bucket.tasks_created,
            errors: bucket.errors,
        })
        .collect();

    let message = peak_hour(&rows)
        .map(|(hour, messages)| format!("Peak Hour: {}:00 with {} messages", hour, messages));

    let chart = volume_chart(
        rows.iter().map(|row| row.hour.to_string()).collect(),
        rows.iter().map(|row| row.total_messages as f64).collect(),
    );

    Ok(ReportResult {
        columns: hour_columns(),
        rows: to_values(rows)?,
        message,
        chart,
    })
}

fn peak_hour(rows: &[HourRow]) -> Option<(u32, u64)> {
    let mut peak: Option<(u32, u64)> = None;
    for row in rows {
        if peak.map_or(true, |(_, best)| row.total_messages > best) {
            peak = Some((row.hour, row.total_messages));
        }
    }
    peak.filter(|(_, messages)| *messages > 0)
}

fn volume_chart(labels: Vec<String>, values: Vec<f64>) -> Option<Chart> {
    if labels.is_empty() {
        return None;
    }
    Some(Chart::line(
        ChartData {
            labels,
            datasets: vec![ChartDataset {
                name: "Total Messages".to_string(),
                values,
            }],
        },
        vec!["#3498db".to_string()],
    ))
}

fn date_columns() -> Vec<ReportColumn> {
    vec![
        ReportColumn::new("date", "Date", "Date", 100),
        ReportColumn::new("total_messages", "Total Messages", "Int", 120),
        ReportColumn::new("unique_users", "Unique Users", "Int", 120),
        ReportColumn::new("tasks_created", "Tasks Created", "Int", 120),
        ReportColumn::new("errors", "Errors", "Int", 120),
        ReportColumn::new("avg_confidence", "Avg Confidence", "Float", 120),
    ]
}

fn hour_columns() -> Vec<ReportColumn> {
    vec![
        ReportColumn::new("hour", "Hour", "Int", 100),
        ReportColumn::new("total_messages", "Total Messages", "Int", 120),
        ReportColumn::new("unique_users", "Unique Users", "Int", 120),
        ReportColumn::new("tasks_created", "Tasks Created", "Int", 120),
        ReportColumn::new("errors", "Errors", "Int", 120),
    ]
}

