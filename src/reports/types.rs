// Shared shapes for the reporting endpoints.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Query-string filters accepted by every report endpoint. Each report
/// applies its own defaults for missing values.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportFilters {
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub telegram_user_id: Option<i64>,
    pub model_name: Option<String>,
    pub group_by: Option<String>,
}

impl ReportFilters {
    /// Stable cache key for a report under these filters.
    pub fn cache_key(&self, report: &str) -> String {
        format!(
            "{}_{}_{}_{}_{}_{}",
            report,
            self.group_by.as_deref().unwrap_or("-"),
            self.from_date.map(|d| d.to_string()).unwrap_or_default(),
            self.to_date.map(|d| d.to_string()).unwrap_or_default(),
            self.telegram_user_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "all".to_string()),
            self.model_name.as_deref().unwrap_or("all"),
        )
    }
}

/// Column descriptor rendered by the report frontend.
#[derive(Debug, Clone, Serialize)]
pub struct ReportColumn {
    pub fieldname: &'static str,
    pub label: &'static str,
    pub fieldtype: &'static str,
    pub width: u32,
}

impl ReportColumn {
    pub fn new(fieldname: &'static str, label: &'static str, fieldtype: &'static str, width: u32) -> Self {
        Self {
            fieldname,
            label,
            fieldtype,
            width,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartDataset {
    pub name: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub datasets: Vec<ChartDataset>,
}

/// Chart payload in the shape the dashboard frontend consumes.
#[derive(Debug, Clone, Serialize)]
pub struct Chart {
    #[serde(rename = "type")]
    pub chart_type: &'static str,
    pub data: ChartData,
    pub colors: Vec<String>,
    #[serde(rename = "axisOptions", skip_serializing_if = "Option::is_none")]
    pub axis_options: Option<Value>,
    #[serde(rename = "lineOptions", skip_serializing_if = "Option::is_none")]
    pub line_options: Option<Value>,
    #[serde(rename = "barOptions", skip_serializing_if = "Option::is_none")]
    pub bar_options: Option<Value>,
}

impl Chart {
    pub fn line(data: ChartData, colors: Vec<String>) -> Self {
        Self {
            chart_type: "line",
            data,
            colors,
            axis_options: None,
            line_options: None,
            bar_options: None,
        }
    }

    pub fn bar(data: ChartData, colors: Vec<String>) -> Self {
        Self {
            chart_type: "bar",
            data,
            colors,
            axis_options: None,
            line_options: None,
            bar_options: None,
        }
    }
}

/// Executed report: columns, data rows, an optional headline message, and
/// an optional chart.
#[derive(Debug, Clone, Serialize)]
pub struct ReportResult {
    pub columns: Vec<ReportColumn>,
    pub rows: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<Chart>,
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub(crate) fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

pub(crate) fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}
