//! Telegram Bot API integration.
//!
//! Wire types for the webhook payloads plus the outbound client used by
//! background jobs. All outbound calls go through the retry policy, and
//! the bot token is masked before anything reaches a log sink.

mod client;
pub mod types;

pub use client::TelegramClient;
pub use types::{SentMessage, Update};
