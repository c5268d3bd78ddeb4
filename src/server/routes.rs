// HTTP routes configuration

use super::handlers::{
    cost_tracking_handler, health_handler, message_volume_handler, parser_performance_handler,
    task_save_handler, telegram_webhook_handler,
};
use crate::config::AppConfig;
use crate::error::Result;
use crate::jobs::Jobs;
use crate::parser_log::ParserLogStore;
use crate::reports::ReportCache;
use crate::tasks::TaskSync;
use crate::telegram::TelegramClient;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub telegram: Arc<TelegramClient>,
    pub parser_logs: Arc<dyn ParserLogStore>,
    pub jobs: Jobs,
    pub task_sync: Arc<TaskSync>,
    pub report_cache: Arc<ReportCache>,
}

pub fn create_router(
    config: AppConfig,
    telegram: Arc<TelegramClient>,
    parser_logs: Arc<dyn ParserLogStore>,
) -> Result<Router> {
    let task_sync = TaskSync::new(
        config.telegram.task_sync_url.clone(),
        config.telegram.timeout_seconds,
        config.retry.policy(),
    )?;

    let state = AppState {
        report_cache: Arc::new(ReportCache::new(Duration::from_secs(
            config.reports.cache_ttl_seconds,
        ))),
        config,
        telegram,
        parser_logs,
        jobs: Jobs::new(),
        task_sync: Arc::new(task_sync),
    };

    // Every request gets an x-request-id, echoed back on the response so
    // webhook deliveries can be correlated with log lines.
    let set_request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_request_id = PropagateRequestIdLayer::x_request_id();

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/webhook/telegram", post(telegram_webhook_handler))
        .route("/tasks", post(task_save_handler))
        .route("/reports/telegram-message-volume", get(message_volume_handler))
        .route("/reports/parser-performance", get(parser_performance_handler))
        .route("/reports/openai-cost-tracking", get(cost_tracking_handler))
        // Telegram update payloads are small; anything larger is noise.
        .layer(tower_http::limit::RequestBodyLimitLayer::new(1024 * 1024))
        .layer(TraceLayer::new_for_http())
        .layer(propagate_request_id)
        .layer(set_request_id)
        .with_state(state);

    Ok(app)
}
