//! Axum-based HTTP server for the FLRTS gateway.
//!
//! This module wires up the HTTP surface: the Telegram webhook receiver,
//! the Task save hooks, the reporting endpoints, and a health check.
//!
//! # Components
//!
//! - `handlers`: Implementation of individual endpoints.
//! - `routes`: The router configuration, request-id layers included.

mod handlers;
mod routes;

pub use handlers::{HealthResponse, TaskAck, WebhookAck};
pub use routes::{create_router, AppState};
