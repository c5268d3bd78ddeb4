// Telegram Bot API client with retry-wrapped outbound calls.

use super::types::{ApiResponse, Message, SendMessageRequest, SentMessage};
use crate::config::TelegramConfig;
use crate::error::{AppError, Result};
use crate::utils::retry::{RetryFailure, RetryPolicy, TransportError};
use crate::utils::security::mask_secret;
use reqwest::header::HeaderMap;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

/// Client for the Telegram Bot API.
///
/// Owns the pooled HTTP client, the bot credentials, and the retry policy
/// applied to every outbound call. The bot token is embedded in request
/// URLs per the Bot API contract and therefore never appears in an error
/// message or log line unmasked.
pub struct TelegramClient {
    http_client: Client,
    base_url: String,
    bot_token: String,
    policy: RetryPolicy,
}

impl TelegramClient {
    /// Create a new client from explicit configuration.
    pub fn new(config: &TelegramConfig, policy: RetryPolicy) -> Result<Self> {
        if config.bot_token.is_empty() {
            return Err(AppError::NotConfigured("telegram.bot_token"));
        }

        // Keep-alive and pooling tuned for many small sequential calls
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(5))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .tcp_nodelay(true)
            .use_rustls_tls()
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        debug!(
            "Created Telegram client for {} with bot token {}",
            config.api_base_url,
            mask_secret(&config.bot_token)
        );

        Ok(Self {
            http_client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
            policy,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.bot_token, method)
    }

    /// Replace any occurrence of the bot token in an error message with
    /// its masked form. Client errors stringify the request URL, which
    /// carries the token.
    fn redact(&self, mut error: TransportError) -> TransportError {
        if !self.bot_token.is_empty() && error.message.contains(&self.bot_token) {
            error.message = error
                .message
                .replace(&self.bot_token, &mask_secret(&self.bot_token));
        }
        error
    }

    /// Send a Markdown text message to a chat.
    ///
    /// Wrapped in the retry policy: connection failures, timeouts and 5xx
    /// responses are retried with backoff, everything else fails
    /// immediately. The returned failure carries the final cause and the
    /// attempt count.
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
    ) -> std::result::Result<SentMessage, RetryFailure> {
        let url = self.method_url("sendMessage");
        let payload = SendMessageRequest::markdown(chat_id, text);

        let outcome = self
            .policy
            .run("sendMessage", || {
                let client = self.http_client.clone();
                let url = url.clone();
                let payload = payload.clone();
                async move {
                    let response = client
                        .post(&url)
                        .json(&payload)
                        .send()
                        .await
                        .map_err(TransportError::from)?;

                    let status = response.status();
                    let retry_after = parse_retry_after_header(response.headers());
                    let body = response.text().await.unwrap_or_default();

                    if !status.is_success() {
                        return Err(status_error(status.as_u16(), &body, retry_after));
                    }

                    let parsed: ApiResponse<Message> = serde_json::from_str(&body)
                        .map_err(|e| {
                            TransportError::other(format!("Invalid sendMessage response: {}", e))
                        })?;

                    if !parsed.ok {
                        // ok=false with a 200 status is a malformed call,
                        // not a transient fault.
                        return Err(TransportError::other(format!(
                            "Telegram returned ok=false: {}",
                            parsed.description.unwrap_or_default()
                        )));
                    }

                    parsed
                        .result
                        .map(|message| message.message_id)
                        .ok_or_else(|| {
                            TransportError::other("Telegram returned ok=true without a result")
                        })
                }
            })
            .await
            .map_err(|mut failure| {
                failure.cause = self.redact(failure.cause);
                failure
            })?;

        info!(
            "Sent Telegram message {} to chat {} ({} attempt(s))",
            outcome.value, chat_id, outcome.attempts
        );

        Ok(SentMessage {
            message_id: outcome.value,
            attempts: outcome.attempts,
        })
    }
}

/// Build a status-tagged error, preferring the `Retry-After` header and
/// falling back to the `parameters.retry_after` field Telegram embeds in
/// rate-limit bodies.
fn status_error(code: u16, body: &str, header_hint: Option<Duration>) -> TransportError {
    let parsed: Option<ApiResponse<Message>> = serde_json::from_str(body).ok();

    let description = parsed
        .as_ref()
        .and_then(|r| r.description.clone())
        .unwrap_or_else(|| truncated(body));

    let hint = header_hint.or_else(|| {
        parsed
            .as_ref()
            .and_then(|r| r.parameters.as_ref())
            .and_then(|p| p.retry_after)
            .map(Duration::from_secs)
    });

    let error = TransportError::status(code, format!("sendMessage failed with {}: {}", code, description));
    match hint {
        Some(delay) => error.with_retry_after(delay),
        None => error,
    }
}

fn parse_retry_after_header(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(reqwest::header::RETRY_AFTER)?.to_str().ok()?;
    let seconds: u64 = raw.trim().parse().ok()?;
    // Cap at 5 minutes; the policy's max_delay applies on top.
    Some(Duration::from_secs(seconds.min(300)))
}

fn truncated(body: &str) -> String {
    const LIMIT: usize = 200;
    if body.len() > LIMIT {
        let cut = body
            .char_indices()
            .take_while(|(i, _)| *i <= LIMIT)
            .last()
            .map(|(i, _)| i)
            .unwrap_or(0);
        format!("{}...", &body[..cut])
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::retry::TransportErrorKind;

    #[test]
    fn test_status_error_prefers_header_hint() {
        let body = r#"{"ok": false, "description": "gateway busy", "parameters": {"retry_after": 99}}"#;
        let error = status_error(503, body, Some(Duration::from_secs(7)));
        assert_eq!(error.kind, TransportErrorKind::Status(503));
        assert_eq!(error.retry_after, Some(Duration::from_secs(7)));
        assert!(error.message.contains("gateway busy"));
    }

    #[test]
    fn test_status_error_reads_body_hint() {
        let body = r#"{"ok": false, "description": "Too Many Requests: retry after 35", "parameters": {"retry_after": 35}}"#;
        let error = status_error(429, body, None);
        assert_eq!(error.retry_after, Some(Duration::from_secs(35)));
    }

    #[test]
    fn test_status_error_with_opaque_body() {
        let error = status_error(502, "<html>Bad Gateway</html>", None);
        assert_eq!(error.kind, TransportErrorKind::Status(502));
        assert_eq!(error.retry_after, None);
    }

    #[test]
    fn test_truncated_long_body() {
        let body = "x".repeat(500);
        let shortened = truncated(&body);
        assert!(shortened.len() < 250);
        assert!(shortened.ends_with("..."));
    }
}
