// Webhook endpoint integration tests

use axum::body::Body;
use axum::http::{header::CONTENT_TYPE, Request, StatusCode};
use axum::Router;
use flrts_gateway::config::AppConfig;
use flrts_gateway::parser_log::{InMemoryParserLogStore, ParserLogStore};
use flrts_gateway::server::create_router;
use flrts_gateway::telegram::TelegramClient;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";
const BOT_TOKEN: &str = "123456:AAH-test-bot-token";
const WEBHOOK_SECRET: &str = "hook-secret-value";

fn test_config(api_base_url: &str) -> AppConfig {
    let mut config = AppConfig::default();
    config.telegram.bot_token = BOT_TOKEN.to_string();
    config.telegram.webhook_secret = WEBHOOK_SECRET.to_string();
    config.telegram.api_base_url = api_base_url.to_string();
    // Keep test runs fast if a retry ever happens.
    config.retry.base_delay_seconds = 0.01;
    config
}

fn build_router(config: AppConfig) -> (Router, Arc<InMemoryParserLogStore>) {
    let store = Arc::new(InMemoryParserLogStore::new());
    let store_dyn: Arc<dyn ParserLogStore> = store.clone();
    let telegram = Arc::new(TelegramClient::new(&config.telegram, config.retry.policy()).unwrap());
    let router = create_router(config, telegram, store_dyn).unwrap();
    (router, store)
}

fn webhook_request(secret: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhook/telegram")
        .header(CONTENT_TYPE, "application/json");
    if let Some(secret) = secret {
        builder = builder.header(SECRET_HEADER, secret);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn update_with_text(update_id: i64, chat_id: i64, text: &str) -> String {
    json!({
        "update_id": update_id,
        "message": {
            "message_id": 1,
            "chat": {"id": chat_id},
            "from": {"id": 42, "username": "operator"},
            "text": text,
        }
    })
    .to_string()
}

#[tokio::test]
async fn test_missing_secret_header_is_rejected() {
    let (router, store) = build_router(test_config("https://api.telegram.org"));

    let response = router
        .oneshot(webhook_request(None, r#"{"update_id": 1}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], "authentication_error");
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_wrong_secret_is_rejected() {
    let (router, _) = build_router(test_config("https://api.telegram.org"));

    let response = router
        .oneshot(webhook_request(Some("not-the-secret"), r#"{"update_id": 1}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unconfigured_secret_is_server_error() {
    let mut config = test_config("https://api.telegram.org");
    config.telegram.webhook_secret = String::new();
    let (router, _) = build_router(config);

    let response = router
        .oneshot(webhook_request(Some("anything"), r#"{"update_id": 1}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], "configuration_error");
}

#[tokio::test]
async fn test_update_without_message_is_skipped() {
    let (router, store) = build_router(test_config("https://api.telegram.org"));

    let response = router
        .oneshot(webhook_request(Some(WEBHOOK_SECRET), r#"{"update_id": 7}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["acknowledged"], false);
    assert_eq!(body["reason"], "no_message");
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_message_without_text_is_incomplete() {
    let (router, _) = build_router(test_config("https://api.telegram.org"));

    let payload = json!({
        "update_id": 8,
        "message": {"message_id": 2, "chat": {"id": 55}}
    })
    .to_string();

    let response = router
        .oneshot(webhook_request(Some(WEBHOOK_SECRET), &payload))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["acknowledged"], false);
    assert_eq!(body["reason"], "incomplete_data");
}

#[tokio::test]
async fn test_malformed_payload_is_bad_request() {
    let (router, _) = build_router(test_config("https://api.telegram.org"));

    let response = router
        .oneshot(webhook_request(Some(WEBHOOK_SECRET), "not json at all"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], "invalid_request_error");
}

#[tokio::test]
async fn test_valid_update_is_acknowledged_and_processed() {
    let mut server = mockito::Server::new_async().await;
    let send_mock = server
        .mock("POST", format!("/bot{}/sendMessage", BOT_TOKEN).as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "ok": true,
                "result": {"message_id": 900, "chat": {"id": 55}}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let (router, store) = build_router(test_config(&server.url()));

    let response = router
        .oneshot(webhook_request(
            Some(WEBHOOK_SECRET),
            &update_with_text(9, 55, "generator fuel check done"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["acknowledged"], true);
    assert_eq!(body["processing_time_ms"], 0);

    // The background job records the message and sends the reply.
    for _ in 0..200 {
        if store.len() == 1 && send_mock.matched_async().await {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(store.len(), 1);
    send_mock.assert_async().await;
}

#[tokio::test]
async fn test_task_save_validation() {
    let (router, _) = build_router(test_config("https://api.telegram.org"));

    let invalid = json!({
        "name": "TASK-010",
        "subject": "Swap pump seals",
        "status": "Completed"
    })
    .to_string();

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/tasks")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(invalid))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], "validation_error");
}

#[tokio::test]
async fn test_task_save_accepts_completed_with_completed_by() {
    let (router, _) = build_router(test_config("https://api.telegram.org"));

    let valid = json!({
        "name": "TASK-011",
        "subject": "Swap pump seals",
        "status": "Completed",
        "completed_by": "operator@10nz.tools"
    })
    .to_string();

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/tasks")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(valid))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["name"], "TASK-011");
}

#[tokio::test]
async fn test_health_endpoint() {
    let (router, _) = build_router(test_config("https://api.telegram.org"));

    let response = router
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["webhook_secret"]["status"], "ok");
}
