// HTTP request handlers

use super::routes::AppState;
use crate::error::AppError;
use crate::jobs::process_telegram_message;
use crate::reports::{self, ReportFilters, ReportResult};
use crate::tasks::{self, Task};
use crate::telegram::Update;
use crate::utils::security::mask_optional;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, error, info};

const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub checks: HashMap<String, HealthCheck>,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthCheck {
    pub status: String,
    pub message: String,
}

pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let mut checks = HashMap::new();
    let mut overall_status = HealthStatus::Healthy;

    // Check webhook configuration
    let webhook_check = if state.config.telegram.webhook_secret.is_empty() {
        overall_status = HealthStatus::Degraded;
        HealthCheck {
            status: "warning".to_string(),
            message: "Webhook secret not configured; inbound updates will be rejected".to_string(),
        }
    } else {
        HealthCheck {
            status: "ok".to_string(),
            message: "Webhook secret configured".to_string(),
        }
    };
    checks.insert("webhook_secret".to_string(), webhook_check);

    // Check upstream configuration
    let upstream_check = HealthCheck {
        status: "ok".to_string(),
        message: format!("API base: {}", state.config.telegram.api_base_url),
    };
    checks.insert("telegram_api".to_string(), upstream_check);

    // Check environment
    let environment_check = HealthCheck {
        status: "ok".to_string(),
        message: format!("Environment: {}", state.config.logging.environment),
    };
    checks.insert("environment".to_string(), environment_check);

    Json(HealthResponse {
        status: overall_status,
        checks,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Immediate acknowledgment returned to Telegram.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub ok: bool,
    pub acknowledged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
}

impl WebhookAck {
    fn acknowledged() -> Self {
        Self {
            ok: true,
            acknowledged: true,
            reason: None,
            // Sync time only; the work itself runs in a background job.
            processing_time_ms: Some(0),
        }
    }

    fn skipped(reason: &'static str) -> Self {
        Self {
            ok: true,
            acknowledged: false,
            reason: Some(reason),
            processing_time_ms: None,
        }
    }
}

/// Handler for the Telegram webhook endpoint.
///
/// Flow:
/// 1. Validate the `X-Telegram-Bot-Api-Secret-Token` header
/// 2. Parse the update payload
/// 3. Enqueue a background job for message processing
/// 4. Return an immediate acknowledgment
pub async fn telegram_webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookAck>, AppError> {
    let expected = state.config.telegram.webhook_secret.as_str();
    if expected.is_empty() {
        error!("Telegram webhook secret not configured");
        return Err(AppError::NotConfigured("telegram.webhook_secret"));
    }

    let incoming = headers
        .get(SECRET_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());
    if incoming != Some(expected) {
        info!(
            "Unauthorized webhook attempt with token: {}",
            mask_optional(incoming)
        );
        return Err(AppError::Unauthorized);
    }

    let update: Update = serde_json::from_str(&body)
        .map_err(|e| AppError::InvalidRequest(format!("Malformed update payload: {}", e)))?;

    debug!("Received Telegram update ID: {}", update.update_id);

    let Some(message) = update.content() else {
        debug!("No message in update {}, skipping", update.update_id);
        return Ok(Json(WebhookAck::skipped("no_message")));
    };

    if message.text.as_deref().map_or(true, str::is_empty) {
        debug!("Missing text in update {}, skipping", update.update_id);
        return Ok(Json(WebhookAck::skipped("incomplete_data")));
    }

    let chat_id = message.chat.id;
    state.jobs.enqueue(
        "process_telegram_message",
        process_telegram_message(
            state.telegram.clone(),
            state.parser_logs.clone(),
            update.clone(),
        ),
    );

    info!(
        "Enqueued processing for Telegram update {} from chat {}",
        update.update_id, chat_id
    );

    Ok(Json(WebhookAck::acknowledged()))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TaskAck {
    pub ok: bool,
    pub name: String,
}

/// Save surface for Task records: runs the validate hook (a failure
/// blocks the save) and then the update hook, which enqueues the sync
/// job for completed tasks.
pub async fn task_save_handler(
    State(state): State<AppState>,
    Json(task): Json<Task>,
) -> Result<Json<TaskAck>, AppError> {
    tasks::validate(&task)?;
    tasks::on_update(&task, &state.jobs, state.task_sync.clone());

    Ok(Json(TaskAck {
        ok: true,
        name: task.name,
    }))
}

pub async fn message_volume_handler(
    State(state): State<AppState>,
    Query(filters): Query<ReportFilters>,
) -> Result<Json<ReportResult>, AppError> {
    run_cached_report(&state, "telegram_message_volume", &filters, |store, f| {
        reports::message_volume::execute(store, f)
    })
}

pub async fn parser_performance_handler(
    State(state): State<AppState>,
    Query(filters): Query<ReportFilters>,
) -> Result<Json<ReportResult>, AppError> {
    run_cached_report(&state, "parser_performance", &filters, |store, f| {
        reports::parser_performance::execute(store, f)
    })
}

pub async fn cost_tracking_handler(
    State(state): State<AppState>,
    Query(filters): Query<ReportFilters>,
) -> Result<Json<ReportResult>, AppError> {
    run_cached_report(&state, "openai_cost_tracking", &filters, |store, f| {
        reports::cost_tracking::execute(store, f)
    })
}

fn run_cached_report<F>(
    state: &AppState,
    report: &str,
    filters: &ReportFilters,
    execute: F,
) -> Result<Json<ReportResult>, AppError>
where
    F: Fn(&dyn crate::parser_log::ParserLogStore, &ReportFilters) -> crate::error::Result<ReportResult>,
{
    let key = filters.cache_key(report);
    if let Some(hit) = state.report_cache.get(&key) {
        return Ok(Json(hit));
    }

    let result = execute(state.parser_logs.as_ref(), filters)?;
    state.report_cache.set(key, result.clone());
    Ok(Json(result))
}
