//! Background job execution.
//!
//! The platform this service grew out of ran these bodies on a worker
//! queue; here each job runs on its own tokio task. The enqueuing request
//! never waits on a job and never sees its failure: job errors are
//! logged and the process keeps serving.

use crate::error::{AppError, Result};
use crate::parser_log::{ParserLogEntry, ParserLogStore};
use crate::telegram::{TelegramClient, Update};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, info_span, Instrument};

/// Handle for spawning named background jobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct Jobs;

impl Jobs {
    pub fn new() -> Self {
        Self
    }

    /// Spawn `job` on its own task, logging its completion or failure.
    pub fn enqueue<F>(&self, name: &'static str, job: F) -> JoinHandle<()>
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let span = info_span!("job", job = name);
        tokio::spawn(
            async move {
                match job.await {
                    Ok(()) => info!("{} completed", name),
                    Err(e) => error!("{} failed: {}", name, e),
                }
            }
            .instrument(span),
        )
    }
}

/// Background job body for an inbound Telegram message.
///
/// Records the message in the parser log and sends an acknowledgment
/// reply. The actual content parse belongs to the upstream platform; this
/// service owns receipt, logging, and the reply path.
pub async fn process_telegram_message(
    telegram: Arc<TelegramClient>,
    parser_logs: Arc<dyn ParserLogStore>,
    update: Update,
) -> Result<()> {
    let message = update
        .content()
        .ok_or_else(|| AppError::InvalidRequest("update carries no message".to_string()))?;

    let chat_id = message.chat.id;
    let text = message.text.clone().unwrap_or_default();

    info!(
        "Processing Telegram message from chat {}: {}",
        chat_id,
        preview(&text)
    );

    let entry = ParserLogEntry::received(message.from.as_ref().map(|user| user.id), &text);
    parser_logs.insert(entry)?;

    let sent = telegram
        .send_message(chat_id, "Message received")
        .await
        .map_err(AppError::from)?;

    info!(
        "Acknowledged update {} with message {} to chat {}",
        update.update_id, sent.message_id, chat_id
    );
    Ok(())
}

/// First 50 characters of a message for log lines.
fn preview(text: &str) -> String {
    let mut shortened: String = text.chars().take(50).collect();
    if shortened.len() < text.len() {
        shortened.push_str("...");
    }
    shortened
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_short_text() {
        assert_eq!(preview("pump inspection done"), "pump inspection done");
    }

    #[test]
    fn test_preview_truncates() {
        let long = "a".repeat(80);
        let shortened = preview(&long);
        assert_eq!(shortened.chars().count(), 53);
        assert!(shortened.ends_with("..."));
    }

    #[tokio::test]
    async fn test_enqueue_runs_job() {
        let jobs = Jobs::new();
        let (tx, rx) = tokio::sync::oneshot::channel();
        let handle = jobs.enqueue("test_job", async move {
            tx.send(()).ok();
            Ok(())
        });
        handle.await.unwrap();
        rx.await.unwrap();
    }

    #[tokio::test]
    async fn test_enqueue_swallows_job_errors() {
        let jobs = Jobs::new();
        let handle = jobs.enqueue("failing_job", async {
            Err(AppError::Internal("boom".to_string()))
        });
        // The task itself must complete cleanly; the failure is logged.
        assert!(handle.await.is_ok());
    }
}
