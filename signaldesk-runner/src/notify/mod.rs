//! Chat notifications.
//!
//! A notifier reports success as a plain bool: a failed send is logged by
//! the adapter and never interrupts the caller.

pub mod messages;
pub mod telegram;

pub use messages::{StatusUpdate, TradeVenue};
pub use telegram::TelegramNotifier;

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notifier misconfigured: {0}")]
    Config(String),

    #[error("network error: {0}")]
    Network(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    /// Send one HTML-formatted message. True iff the service accepted it.
    async fn send(&self, text: &str) -> bool;
}
