//! Utility functions and helpers for the FLRTS gateway.
//!
//! This module provides cross-cutting concerns like structured logging,
//! secret masking, and bounded retry with exponential backoff.
//!
//! # Submodules
//!
//! - `logging`: Tracing initialization and environment-aware suppression.
//! - `retry`: Retry policy for outbound Telegram API calls.
//! - `security`: Two-character reveal masking for secrets in logs.

pub mod logging;
pub mod retry;
pub mod security;
