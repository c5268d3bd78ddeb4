// Parser performance dashboard report.

use super::types::{
    round2, round4, Chart, ChartData, ChartDataset, ReportColumn, ReportFilters, ReportResult,
};
use super::{end_of_day, start_of_day, to_values};
use crate::error::Result;
use crate::parser_log::{ParserLogEntry, ParserLogStore, ReviewStatus};
use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

const MAX_RANGE_DAYS: i64 = 90;

#[derive(Debug, Serialize)]
struct PerformanceRow {
    date: String,
    total_parses: u64,
    accepted: u64,
    rejected: u64,
    pending: u64,
    success_rate: f64,
    avg_confidence: Option<f64>,
    avg_response_ms: Option<u64>,
    avg_backend_response_ms: Option<u64>,
    total_cost: f64,
    avg_cost_per_parse: f64,
}

#[derive(Default)]
struct Bucket {
    total_parses: u64,
    accepted: u64,
    rejected: u64,
    pending: u64,
    confidence_sum: f64,
    confidence_count: u64,
    response_ms_sum: u64,
    response_ms_count: u64,
    backend_ms_sum: u64,
    backend_ms_count: u64,
    cost_sum: f64,
}

impl Bucket {
    fn add(&mut self, entry: &ParserLogEntry) {
        self.total_parses += 1;
        match entry.review {
            ReviewStatus::Accepted => self.accepted += 1,
            ReviewStatus::Rejected => self.rejected += 1,
            ReviewStatus::Pending => self.pending += 1,
        }
        if let Some(score) = entry.confidence_score {
            self.confidence_sum += score;
            self.confidence_count += 1;
        }
        if let Some(ms) = entry.response_duration_ms {
            self.response_ms_sum += u64::from(ms);
            self.response_ms_count += 1;
        }
        if let Some(ms) = entry.backend_response_ms {
            self.backend_ms_sum += u64::from(ms);
            self.backend_ms_count += 1;
        }
        self.cost_sum += entry.estimated_cost_usd.unwrap_or(0.0);
    }

    fn success_rate(&self) -> f64 {
        let reviewed = self.accepted + self.rejected;
        if reviewed == 0 {
            return 0.0;
        }
        round2(self.accepted as f64 * 100.0 / reviewed as f64)
    }
}

fn rounded_avg(sum: u64, count: u64) -> Option<u64> {
    if count == 0 {
        return None;
    }
    Some(((sum as f64) / (count as f64)).round() as u64)
}

/// Per-day parse counts, acceptance outcomes, latency and cost.
pub fn execute(store: &dyn ParserLogStore, filters: &ReportFilters) -> Result<ReportResult> {
    let today = Utc::now().date_naive();
    let mut from = filters
        .from_date
        .unwrap_or_else(|| today - Duration::days(30));
    let to = filters.to_date.unwrap_or(today);

    // Oversized ranges are clamped rather than rejected.
    if (to - from).num_days() > MAX_RANGE_DAYS {
        from = to - Duration::days(MAX_RANGE_DAYS);
    }

    let entries: Vec<ParserLogEntry> = store
        .entries_between(start_of_day(from), end_of_day(to))
        .into_iter()
        .filter(|entry| match filters.telegram_user_id {
            Some(user_id) => entry.telegram_user_id == Some(user_id),
            None => true,
        })
        .filter(|entry| match filters.model_name.as_deref() {
            Some(model) => entry.model_name.as_deref() == Some(model),
            None => true,
        })
        .collect();

    let mut buckets: BTreeMap<NaiveDate, Bucket> = BTreeMap::new();
    for entry in &entries {
        buckets
            .entry(entry.created_at.date_naive())
            .or_default()
            .add(entry);
    }

    // Newest day first.
    let rows: Vec<PerformanceRow> = buckets
        .iter()
        .rev()
        .map(|(date, bucket)| {
            let avg_confidence = if bucket.confidence_count == 0 {
                None
            } else {
                Some(round2(bucket.confidence_sum / bucket.confidence_count as f64))
            };
            PerformanceRow {
                date: date.to_string(),
                total_parses: bucket.total_parses,
                accepted: bucket.accepted,
                rejected: bucket.rejected,
                pending: bucket.pending,
                success_rate: bucket.success_rate(),
                avg_confidence,
                avg_response_ms: rounded_avg(bucket.response_ms_sum, bucket.response_ms_count),
                avg_backend_response_ms: rounded_avg(bucket.backend_ms_sum, bucket.backend_ms_count),
                total_cost: round4(bucket.cost_sum),
                avg_cost_per_parse: round4(bucket.cost_sum / bucket.total_parses as f64),
            }
        })
        .collect();

    let chart = performance_chart(&rows);

    Ok(ReportResult {
        columns: columns(),
        rows: to_values(rows)?,
        message: None,
        chart,
    })
}

fn performance_chart(rows: &[PerformanceRow]) -> Option<Chart> {
    if rows.is_empty() {
        return None;
    }
    let mut chart = Chart::line(
        ChartData {
            labels: rows.iter().map(|row| row.date.clone()).collect(),
            datasets: vec![ChartDataset {
                name: "Success Rate (%)".to_string(),
                values: rows.iter().map(|row| row.success_rate).collect(),
            }],
        },
        vec!["#28a745".to_string()],
    );
    chart.axis_options = Some(serde_json::json!({"xAxisMode": "tick", "xIsSeries": true}));
    chart.line_options = Some(serde_json::json!({"regionFill": 1, "hideDots": 0}));
    Some(chart)
}

fn columns() -> Vec<ReportColumn> {
    vec![
        ReportColumn::new("date", "Date", "Date", 100),
        ReportColumn::new("total_parses", "Total Parses", "Int", 120),
        ReportColumn::new("accepted", "Accepted", "Int", 100),
        ReportColumn::new("rejected", "Rejected", "Int", 100),
        ReportColumn::new("pending", "Pending", "Int", 100),
        ReportColumn::new("success_rate", "Success Rate (%)", "Percent", 130),
        ReportColumn::new("avg_confidence", "Avg Confidence", "Float", 120),
        ReportColumn::new("avg_response_ms", "Avg Response (ms)", "Int", 140),
        ReportColumn::new("avg_backend_response_ms", "Avg Backend API (ms)", "Int", 150),
        ReportColumn::new("total_cost", "Total Cost ($)", "Currency", 120),
        ReportColumn::new("avg_cost_per_parse", "Avg Cost per Parse ($)", "Currency", 160),
    ]
}
