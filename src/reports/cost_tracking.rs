// OpenAI cost tracking report.

use super::types::{
    round4, round6, Chart, ChartData, ChartDataset, ReportColumn, ReportFilters, ReportResult,
};
use super::{end_of_day, start_of_day, to_values};
use crate::error::Result;
use crate::parser_log::{ParserLogEntry, ParserLogStore};
use chrono::{Datelike, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// A day over this much spend is flagged in the budget column.
const BUDGET_ALERT_USD: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Grouping {
    Date,
    ModelName,
}

impl Grouping {
    fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some(value)
                if value.eq_ignore_ascii_case("model name")
                    || value.eq_ignore_ascii_case("model_name") =>
            {
                Grouping::ModelName
            }
            _ => Grouping::Date,
        }
    }
}

#[derive(Debug, Serialize)]
struct CostRow {
    date: String,
    total_requests: u64,
    total_tokens: u64,
    prompt_tokens: u64,
    completion_tokens: u64,
    total_cost: f64,
    avg_cost_per_request: f64,
    model_name: String,
    projected_monthly_cost: f64,
    budget_status: String,
}

#[derive(Default)]
struct Bucket {
    first_date: Option<NaiveDate>,
    total_requests: u64,
    total_tokens: u64,
    prompt_tokens: u64,
    completion_tokens: u64,
    cost_sum: f64,
    models: Vec<String>,
}

impl Bucket {
    fn add(&mut self, entry: &ParserLogEntry) {
        let date = entry.created_at.date_naive();
        if self.first_date.map_or(true, |seen| date < seen) {
            self.first_date = Some(date);
        }
        self.total_requests += 1;
        self.total_tokens += u64::from(entry.total_tokens.unwrap_or(0));
        self.prompt_tokens += u64::from(entry.prompt_tokens.unwrap_or(0));
        self.completion_tokens += u64::from(entry.completion_tokens.unwrap_or(0));
        self.cost_sum += entry.estimated_cost_usd.unwrap_or(0.0);
        if let Some(model) = entry.model_name.as_deref() {
            if !self.models.iter().any(|seen| seen == model) {
                self.models.push(model.to_string());
            }
        }
    }

    fn model_label(&self) -> String {
        match self.models.as_slice() {
            [single] => single.clone(),
            _ => String::new(),
        }
    }
}

/// Token usage and spend per day or per model, with a monthly projection
/// and a trailing summary row.
pub fn execute(store: &dyn ParserLogStore, filters: &ReportFilters) -> Result<ReportResult> {
    let grouping = Grouping::parse(filters.group_by.as_deref());

    let today = Utc::now().date_naive();
    let from = filters
        .from_date
        .unwrap_or_else(|| today.with_day(1).unwrap_or(today));
    let to = filters.to_date.unwrap_or(today);

    let entries: Vec<ParserLogEntry> = store
        .entries_between(start_of_day(from), end_of_day(to))
        .into_iter()
        .filter(|entry| match filters.model_name.as_deref() {
            Some(model) => entry.model_name.as_deref() == Some(model),
            None => true,
        })
        .collect();

    let mut buckets: BTreeMap<String, Bucket> = BTreeMap::new();
    for entry in &entries {
        let key = match grouping {
            Grouping::Date => entry.created_at.date_naive().to_string(),
            Grouping::ModelName => entry.model_name.clone().unwrap_or_default(),
        };
        buckets.entry(key).or_default().add(entry);
    }

    let current_day = f64::from(today.day());
    let month_days = f64::from(days_in_month(today));

    let build_row = |key: &String, bucket: &Bucket| {
        let total_cost = round4(bucket.cost_sum);
        let projected = if total_cost > 0.0 {
            round4((total_cost / current_day) * month_days)
        } else {
            0.0
        };
        let (date, model_name) = match grouping {
            Grouping::Date => (key.clone(), bucket.model_label()),
            Grouping::ModelName => (
                bucket
                    .first_date
                    .map(|d| d.to_string())
                    .unwrap_or_default(),
                key.clone(),
            ),
        };
        CostRow {
            date,
            total_requests: bucket.total_requests,
            total_tokens: bucket.total_tokens,
            prompt_tokens: bucket.prompt_tokens,
            completion_tokens: bucket.completion_tokens,
            total_cost,
            avg_cost_per_request: round6(bucket.cost_sum / bucket.total_requests.max(1) as f64),
            model_name,
            projected_monthly_cost: projected,
            budget_status: budget_status(total_cost).to_string(),
        }
    };

    // Date grouping shows the newest day first; model grouping is
    // alphabetical.
    let mut rows: Vec<CostRow> = match grouping {
        Grouping::Date => buckets
            .iter()
            .rev()
            .map(|(key, bucket)| build_row(key, bucket))
            .collect(),
        Grouping::ModelName => buckets
            .iter()
            .map(|(key, bucket)| build_row(key, bucket))
            .collect(),
    };

    let chart = cost_chart(&rows);

    if let Some(summary) = summary_row(&rows) {
        rows.push(summary);
    }

    Ok(ReportResult {
        columns: columns(),
        rows: to_values(rows)?,
        message: None,
        chart,
    })
}

fn budget_status(total_cost: f64) -> &'static str {
    if total_cost >= BUDGET_ALERT_USD {
        "⚠️ Over Budget"
    } else {
        "✅ Under Budget"
    }
}

fn summary_row(rows: &[CostRow]) -> Option<CostRow> {
    if rows.is_empty() {
        return None;
    }

    let total_requests: u64 = rows.iter().map(|row| row.total_requests).sum();
    let total_cost: f64 = rows.iter().map(|row| row.total_cost).sum();
    let avg_cost_per_request = if total_requests > 0 {
        round6(total_cost / total_requests as f64)
    } else {
        0.0
    };

    Some(CostRow {
        date: "Total".to_string(),
        total_requests,
        total_tokens: rows.iter().map(|row| row.total_tokens).sum(),
        prompt_tokens: rows.iter().map(|row| row.prompt_tokens).sum(),
        completion_tokens: rows.iter().map(|row| row.completion_tokens).sum(),
        total_cost: round4(total_cost),
        avg_cost_per_request,
        model_name: String::new(),
        projected_monthly_cost: round4(rows.iter().map(|row| row.projected_monthly_cost).sum()),
        budget_status: String::new(),
    })
}

fn cost_chart(rows: &[CostRow]) -> Option<Chart> {
    if rows.is_empty() {
        return None;
    }
    let colors = rows
        .iter()
        .map(|row| {
            if row.total_cost < BUDGET_ALERT_USD {
                "#28a745".to_string()
            } else {
                "#dc3545".to_string()
            }
        })
        .collect();
    let mut chart = Chart::bar(
        ChartData {
            labels: rows.iter().map(|row| row.date.clone()).collect(),
            datasets: vec![ChartDataset {
                name: "Total Cost".to_string(),
                values: rows.iter().map(|row| row.total_cost).collect(),
            }],
        },
        colors,
    );
    chart.bar_options = Some(serde_json::json!({"spaceRatio": 0.5}));
    Some(chart)
}

pub(crate) fn days_in_month(date: NaiveDate) -> u32 {
    let (year, month) = (date.year(), date.month());
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    match (first_of_next, NaiveDate::from_ymd_opt(year, month, 1)) {
        (Some(next), Some(first)) => (next - first).num_days() as u32,
        _ => 30,
    }
}

fn columns() -> Vec<ReportColumn> {
    vec![
        ReportColumn::new("date", "Date", "Date", 100),
        ReportColumn::new("total_requests", "Total Requests", "Int", 120),
        ReportColumn::new("total_tokens", "Total Tokens", "Int", 120),
        ReportColumn::new("prompt_tokens", "Prompt Tokens", "Int", 120),
        ReportColumn::new("completion_tokens", "Completion Tokens", "Int", 130),
        ReportColumn::new("total_cost", "Total Cost", "Currency", 100),
        ReportColumn::new("avg_cost_per_request", "Avg Cost per Request", "Currency", 140),
        ReportColumn::new("model_name", "Model Name", "Data", 120),
        ReportColumn::new("projected_monthly_cost", "Projected Monthly Cost", "Currency", 150),
        ReportColumn::new("budget_status", "Budget Status", "Data", 120),
    ]
}
