//! Parser log records and their storage seam.
//!
//! Every processed Telegram message leaves a `ParserLogEntry` behind; the
//! reports and monitors aggregate over these. Storage sits behind the
//! `ParserLogStore` trait so the service and its tests share the same
//! in-memory implementation while a deployment can bind its own.

use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};
use uuid::Uuid;

/// Human review verdict on a parsed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ReviewStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
}

/// One parsed-message record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserLogEntry {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub telegram_user_id: Option<i64>,
    pub message_text: Option<String>,
    pub model_name: Option<String>,
    pub confidence_score: Option<f64>,
    pub review: ReviewStatus,
    pub error_occurred: bool,
    pub error_message: Option<String>,
    pub created_task_id: Option<String>,
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
    pub response_duration_ms: Option<u32>,
    pub backend_response_ms: Option<u32>,
    pub is_correction: bool,
    pub original_log_id: Option<Uuid>,
    pub estimated_cost_usd: Option<f64>,
}

impl ParserLogEntry {
    /// Fresh entry stamped with a new id and the current time.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            telegram_user_id: None,
            message_text: None,
            model_name: None,
            confidence_score: None,
            review: ReviewStatus::default(),
            error_occurred: false,
            error_message: None,
            created_task_id: None,
            prompt_tokens: None,
            completion_tokens: None,
            total_tokens: None,
            response_duration_ms: None,
            backend_response_ms: None,
            is_correction: false,
            original_log_id: None,
            estimated_cost_usd: None,
        }
    }

    /// Entry for an inbound message, before any parse result is known.
    pub fn received(telegram_user_id: Option<i64>, text: &str) -> Self {
        let mut entry = Self::new();
        entry.telegram_user_id = telegram_user_id;
        entry.message_text = Some(text.to_string());
        entry
    }

    /// Consistency checks enforced before an entry is stored.
    pub fn validate(&self) -> Result<()> {
        if let Some(score) = self.confidence_score {
            if !(0.0..=1.0).contains(&score) {
                return Err(AppError::Validation(
                    "Confidence score must be between 0.0 and 1.0".to_string(),
                ));
            }
        }

        if self.is_correction && self.original_log_id.is_none() {
            return Err(AppError::Validation(
                "Correction logs must reference an original log".to_string(),
            ));
        }

        if self.error_occurred && self.error_message.is_none() {
            return Err(AppError::Validation(
                "Error message is required when an error occurred".to_string(),
            ));
        }

        Ok(())
    }

    /// Fill `estimated_cost_usd` from token usage and per-model pricing.
    ///
    /// Skipped when both token counts are zero or absent. Unknown models
    /// fall back to generic gpt-4o pricing with a warning.
    pub fn calculate_cost(&mut self) {
        let prompt_tokens = self.prompt_tokens.unwrap_or(0);
        let completion_tokens = self.completion_tokens.unwrap_or(0);

        if prompt_tokens == 0 && completion_tokens == 0 {
            return;
        }

        let model_key = self
            .model_name
            .as_deref()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();

        let pricing = match MODEL_PRICING.get(model_key.as_str()) {
            Some(rates) => rates,
            None => {
                warn!(
                    "Unknown model '{}' in cost calculation for {}, falling back to gpt-4o pricing",
                    self.model_name.as_deref().unwrap_or(""),
                    self.id
                );
                &MODEL_PRICING["gpt-4o"]
            }
        };

        let input_cost = f64::from(prompt_tokens) * pricing.input;
        let output_cost = f64::from(completion_tokens) * pricing.output;
        let total_cost = round6(input_cost + output_cost);

        self.estimated_cost_usd = Some(total_cost);

        debug!(
            "Calculated cost for {}: {} input + {} output = ${:.6}",
            self.id, prompt_tokens, completion_tokens, total_cost
        );
    }
}

impl Default for ParserLogEntry {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-token USD rates for a model.
#[derive(Debug, Clone, Copy)]
struct ModelPricing {
    input: f64,
    output: f64,
}

// Rates per single token. "gpt-4o" doubles as the fallback for
// unrecognized model names.
static MODEL_PRICING: Lazy<HashMap<&'static str, ModelPricing>> = Lazy::new(|| {
    HashMap::from([
        (
            "gpt-4o-2024-08-06",
            ModelPricing {
                input: 0.000_003_75,
                output: 0.000_015,
            },
        ),
        (
            "gpt-4o-mini",
            ModelPricing {
                input: 0.000_000_6,
                output: 0.000_002_4,
            },
        ),
        (
            "gpt-4o",
            ModelPricing {
                input: 0.000_003_75,
                output: 0.000_015,
            },
        ),
    ])
});

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

/// Storage seam for parser log records.
pub trait ParserLogStore: Send + Sync {
    /// Validate, price, and persist an entry.
    fn insert(&self, entry: ParserLogEntry) -> Result<()>;

    /// Entries with `created_at` in the inclusive range `[from, to]`.
    fn entries_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<ParserLogEntry>;
}

/// Vec-backed store used by the service and its tests.
#[derive(Default)]
pub struct InMemoryParserLogStore {
    entries: RwLock<Vec<ParserLogEntry>>,
}

impl InMemoryParserLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl ParserLogStore for InMemoryParserLogStore {
    fn insert(&self, mut entry: ParserLogEntry) -> Result<()> {
        entry.validate()?;
        entry.calculate_cost();
        self.entries.write().push(entry);
        Ok(())
    }

    fn entries_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<ParserLogEntry> {
        self.entries
            .read()
            .iter()
            .filter(|entry| entry.created_at >= from && entry.created_at <= to)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_validate_confidence_range() {
        let mut entry = ParserLogEntry::new();
        entry.confidence_score = Some(0.95);
        assert!(entry.validate().is_ok());

        entry.confidence_score = Some(1.5);
        assert!(entry.validate().is_err());

        entry.confidence_score = Some(-0.1);
        assert!(entry.validate().is_err());
    }

    #[test]
    fn test_validate_correction_chain() {
        let mut entry = ParserLogEntry::new();
        entry.is_correction = true;
        assert!(entry.validate().is_err());

        entry.original_log_id = Some(Uuid::new_v4());
        assert!(entry.validate().is_ok());
    }

    #[test]
    fn test_validate_error_state() {
        let mut entry = ParserLogEntry::new();
        entry.error_occurred = true;
        assert!(entry.validate().is_err());

        entry.error_message = Some("parse timeout".to_string());
        assert!(entry.validate().is_ok());
    }

    #[test]
    fn test_cost_calculation_mini() {
        let mut entry = ParserLogEntry::new();
        entry.model_name = Some("gpt-4o-mini".to_string());
        entry.prompt_tokens = Some(1000);
        entry.completion_tokens = Some(500);
        entry.calculate_cost();
        // 1000 * 0.0000006 + 500 * 0.0000024
        assert_eq!(entry.estimated_cost_usd, Some(0.0018));
    }

    #[test]
    fn test_cost_skipped_without_tokens() {
        let mut entry = ParserLogEntry::new();
        entry.model_name = Some("gpt-4o".to_string());
        entry.calculate_cost();
        assert_eq!(entry.estimated_cost_usd, None);
    }

    #[test]
    fn test_cost_unknown_model_falls_back() {
        let mut entry = ParserLogEntry::new();
        entry.model_name = Some("gpt-9-turbo".to_string());
        entry.prompt_tokens = Some(1000);
        entry.completion_tokens = Some(0);
        entry.calculate_cost();
        // Falls back to gpt-4o input pricing.
        assert_eq!(entry.estimated_cost_usd, Some(0.00375));
    }

    #[test]
    fn test_store_range_filter() {
        let store = InMemoryParserLogStore::new();
        let now = Utc::now();

        let mut recent = ParserLogEntry::received(Some(7), "check generator");
        recent.created_at = now - Duration::hours(1);
        store.insert(recent).unwrap();

        let mut old = ParserLogEntry::received(Some(7), "old message");
        old.created_at = now - Duration::days(30);
        store.insert(old).unwrap();

        let window = store.entries_between(now - Duration::days(1), now);
        assert_eq!(window.len(), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_store_rejects_invalid_entries() {
        let store = InMemoryParserLogStore::new();
        let mut entry = ParserLogEntry::new();
        entry.error_occurred = true;
        assert!(store.insert(entry).is_err());
        assert!(store.is_empty());
    }
}
