//! Task lifecycle hooks.
//!
//! The save pipeline for Task records: `validate` runs before a save and
//! can block it, `on_update` runs after and enqueues a sync job for
//! completed tasks. Hook failures after the save never block the caller.

use crate::error::{AppError, Result};
use crate::jobs::Jobs;
use crate::utils::retry::{RetryPolicy, TransportError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TaskStatus {
    #[default]
    Open,
    Working,
    Completed,
    Cancelled,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TaskStatus::Open => "Open",
            TaskStatus::Working => "Working",
            TaskStatus::Completed => "Completed",
            TaskStatus::Cancelled => "Cancelled",
        };
        f.write_str(label)
    }
}

/// A Task record as seen by the lifecycle hooks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub name: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub completed_by: Option<String>,
}

/// Pre-save hook. A failure here blocks the save.
pub fn validate(task: &Task) -> Result<()> {
    debug!("Validating Task {}", task.name);

    if task.status == TaskStatus::Completed && task.completed_by.is_none() {
        return Err(AppError::Validation(
            "Completed tasks must have 'Completed By' field set".to_string(),
        ));
    }

    debug!("Task {} validation passed", task.name);
    Ok(())
}

/// Post-save hook. Completed tasks get a background sync job; the save
/// itself already happened, so nothing raised here reaches the caller.
pub fn on_update(task: &Task, jobs: &Jobs, sync: Arc<TaskSync>) {
    info!("Task {} updated to status: {}", task.name, task.status);

    if task.status == TaskStatus::Completed {
        info!("Enqueued sync job for completed Task {}", task.name);
        let task = task.clone();
        jobs.enqueue("sync_completed_task", async move {
            sync.sync(&task).await
        });
    }
}

/// Outbound sync for completed tasks.
///
/// POSTs the task document to the configured endpoint, wrapped in the
/// retry policy. With no endpoint configured the sync is a logged no-op.
pub struct TaskSync {
    http_client: Client,
    url: Option<String>,
    policy: RetryPolicy,
}

impl TaskSync {
    pub fn new(url: Option<String>, timeout_seconds: u64, policy: RetryPolicy) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .connect_timeout(Duration::from_secs(5))
            .use_rustls_tls()
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            url,
            policy,
        })
    }

    pub async fn sync(&self, task: &Task) -> Result<()> {
        let Some(url) = self.url.as_deref() else {
            info!(
                "No task sync endpoint configured, skipping sync for Task {}",
                task.name
            );
            return Ok(());
        };

        let outcome = self
            .policy
            .run("task_sync", || {
                let client = self.http_client.clone();
                let url = url.to_string();
                let task = task.clone();
                async move {
                    let response = client
                        .post(&url)
                        .json(&task)
                        .send()
                        .await
                        .map_err(TransportError::from)?;

                    let status = response.status();
                    if !status.is_success() {
                        let body = response.text().await.unwrap_or_default();
                        return Err(TransportError::status(
                            status.as_u16(),
                            format!("task sync failed with {}: {}", status.as_u16(), body),
                        ));
                    }
                    Ok(())
                }
            })
            .await?;

        info!(
            "Synced completed Task {} ({} attempt(s))",
            task.name, outcome.attempts
        );
        Ok(())
    }
}
