// Bounded exponential-backoff retry for outbound Telegram API calls.

use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Transport-level cause of a failed outbound call.
///
/// Modeled as a closed tag set so classification is a plain match instead
/// of downcasting the HTTP client's error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connection could not be established (ECONNREFUSED, ECONNRESET).
    ConnectionRefused,
    /// Connect or read deadline elapsed.
    Timeout,
    /// Upstream answered with a non-success HTTP status.
    Status(u16),
    /// Anything else (TLS, body decode, request build).
    Other,
}

/// A failed outbound call, tagged with its transport cause.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
    /// Upstream `Retry-After` hint, when one was supplied.
    pub retry_after: Option<Duration>,
}

impl TransportError {
    pub fn connection_refused(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::ConnectionRefused,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Timeout,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn status(code: u16, message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Status(code),
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Other,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn with_retry_after(mut self, delay: Duration) -> Self {
        self.retry_after = Some(delay);
        self
    }

    /// HTTP status code carried by this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self.kind {
            TransportErrorKind::Status(code) => Some(code),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TransportError::timeout(error.to_string())
        } else if error.is_connect() {
            TransportError::connection_refused(error.to_string())
        } else if let Some(status) = error.status() {
            TransportError::status(status.as_u16(), error.to_string())
        } else {
            TransportError::other(error.to_string())
        }
    }
}

/// Whether a failure is worth another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Retryable,
    Terminal,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorClass::Retryable => write!(f, "retryable"),
            ErrorClass::Terminal => write!(f, "terminal"),
        }
    }
}

/// Classify a transport failure.
///
/// Connection refusal, timeouts and 5xx responses are transient; every
/// other cause (4xx, malformed requests, unclassified errors) is terminal
/// and must not consume further attempts.
pub fn classify(error: &TransportError) -> ErrorClass {
    match error.kind {
        TransportErrorKind::ConnectionRefused | TransportErrorKind::Timeout => {
            ErrorClass::Retryable
        }
        TransportErrorKind::Status(code) if (500..=599).contains(&code) => ErrorClass::Retryable,
        _ => ErrorClass::Terminal,
    }
}

/// How a retried operation ultimately failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The final failure was not retryable.
    Terminal,
    /// Every allowed attempt failed with a retryable cause.
    RetriesExhausted,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Terminal => write!(f, "terminal_error"),
            FailureKind::RetriesExhausted => write!(f, "retries_exhausted"),
        }
    }
}

/// Terminal outcome of a retried operation: the final cause, how it is
/// classified, and how many attempts were made before giving up.
#[derive(Debug, Clone, Error)]
#[error("{kind} after {attempts} attempt(s): {cause}")]
pub struct RetryFailure {
    pub cause: TransportError,
    pub attempts: u32,
    pub kind: FailureKind,
}

/// Successful outcome, reporting how many attempts it took.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub value: T,
    pub attempts: u32,
}

/// Exponential-backoff schedule for one outbound operation.
///
/// Stateless across invocations; callers may run any number of `run()`
/// calls concurrently. The policy bounds attempt count and per-step delay
/// only; a caller needing a global wall-clock bound must size
/// `max_attempts` and the delays accordingly.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff_multiplier: f64,
    pub max_delay: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            max_delay: Some(Duration::from_secs(60)),
        }
    }
}

impl RetryPolicy {
    /// Backoff delay after a failed attempt (1-based):
    /// `base_delay * multiplier^(attempt - 1)`, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let seconds = self.base_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);

        // Duration::from_secs_f64 panics on non-finite or overflowing
        // input, so clamp before converting. An uncapped policy still gets
        // a day-long ceiling.
        let ceiling = self
            .max_delay
            .map(|cap| cap.as_secs_f64())
            .unwrap_or(86_400.0);
        Duration::from_secs_f64(seconds.min(ceiling).max(0.0))
    }

    fn cap(&self, delay: Duration) -> Duration {
        match self.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }

    /// Execute `operation`, retrying transient failures with exponential
    /// backoff.
    ///
    /// Returns the result and the attempt count on success. Terminal
    /// failures propagate immediately without consuming the remaining
    /// attempts; retryable failures are retried up to `max_attempts`,
    /// after which the final cause escalates to `retries_exhausted`.
    /// Failures are always reported to the caller, never swallowed. An
    /// upstream `Retry-After` hint replaces the computed backoff for that
    /// step, still subject to `max_delay`.
    pub async fn run<F, Fut, T>(
        &self,
        operation_name: &str,
        mut operation: F,
    ) -> Result<RetryOutcome<T>, RetryFailure>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, TransportError>>,
    {
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{} succeeded on attempt {}", operation_name, attempt);
                    }
                    return Ok(RetryOutcome {
                        value,
                        attempts: attempt,
                    });
                }
                Err(error) => {
                    let class = classify(&error);

                    if class == ErrorClass::Terminal {
                        warn!(
                            "{} failed on attempt {} ({}): {}",
                            operation_name, attempt, class, error
                        );
                        return Err(RetryFailure {
                            cause: error,
                            attempts: attempt,
                            kind: FailureKind::Terminal,
                        });
                    }

                    if attempt >= self.max_attempts {
                        warn!(
                            "{} exhausted {} attempts: {}",
                            operation_name, attempt, error
                        );
                        return Err(RetryFailure {
                            cause: error,
                            attempts: attempt,
                            kind: FailureKind::RetriesExhausted,
                        });
                    }

                    let delay = match error.retry_after {
                        Some(hint) => self.cap(hint),
                        None => self.delay_for(attempt),
                    };
                    debug!(
                        "{} failed on attempt {} ({}), retrying after {}ms: {}",
                        operation_name,
                        attempt,
                        class,
                        delay.as_millis(),
                        error
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_retryable() {
        assert_eq!(
            classify(&TransportError::connection_refused("refused")),
            ErrorClass::Retryable
        );
        assert_eq!(
            classify(&TransportError::timeout("deadline")),
            ErrorClass::Retryable
        );
        assert_eq!(
            classify(&TransportError::status(500, "ise")),
            ErrorClass::Retryable
        );
        assert_eq!(
            classify(&TransportError::status(503, "unavailable")),
            ErrorClass::Retryable
        );
        assert_eq!(
            classify(&TransportError::status(599, "edge")),
            ErrorClass::Retryable
        );
    }

    #[test]
    fn test_classify_terminal() {
        assert_eq!(
            classify(&TransportError::status(400, "bad request")),
            ErrorClass::Terminal
        );
        assert_eq!(
            classify(&TransportError::status(404, "not found")),
            ErrorClass::Terminal
        );
        assert_eq!(
            classify(&TransportError::status(429, "rate limited")),
            ErrorClass::Terminal
        );
        assert_eq!(
            classify(&TransportError::other("decode failure")),
            ErrorClass::Terminal
        );
    }

    #[test]
    fn test_delay_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
    }

    #[test]
    fn test_delay_cap() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            max_delay: Some(Duration::from_secs(5)),
        };
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(4), Duration::from_secs(5));
        assert_eq!(policy.delay_for(9), Duration::from_secs(5));
    }

    #[test]
    fn test_delay_uncapped_has_ceiling() {
        let policy = RetryPolicy {
            max_attempts: 64,
            base_delay: Duration::from_secs(1),
            backoff_multiplier: 10.0,
            max_delay: None,
        };
        // Must stay finite for conversion even without an explicit cap.
        assert!(policy.delay_for(40) <= Duration::from_secs(86_400));
    }

    #[test]
    fn test_transport_error_display() {
        let error = TransportError::status(502, "bad gateway from upstream");
        assert_eq!(error.to_string(), "bad gateway from upstream");
        assert_eq!(error.status_code(), Some(502));
    }
}
