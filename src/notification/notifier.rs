//! Delivery channel for notifications.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum NotifyError {
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

/// Sends a message to a user. Email, SMS or push all sit behind this.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, user_id: &str, subject: &str, message: &str) -> Result<(), NotifyError>;
}

/// Writes notifications to the log instead of delivering them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, user_id: &str, subject: &str, message: &str) -> Result<(), NotifyError> {
        info!(user_id, subject, message, "Notification sent");
        Ok(())
    }
}
