use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::log::{NotificationCreate, NotificationLogClient};
use super::notifier::Notifier;
use crate::event_channel::{EventHandler, HandlerError, OrderEvent};
use crate::model::OrderStatus;

/// Subject and body for an event, or `None` when the status is not announced.
pub fn compose(event: &OrderEvent) -> Option<(&'static str, String)> {
    match event.status {
        OrderStatus::Confirmed => Some((
            "Order Confirmation",
            format!(
                "Your order {} has been confirmed! Total: ${:.2}",
                event.order_id, event.total_price
            ),
        )),
        OrderStatus::Cancelled => Some((
            "Order Cancelled",
            format!("Your order {} has been cancelled.", event.order_id),
        )),
        OrderStatus::Pending | OrderStatus::Completed => None,
    }
}

/// Turns order events into user notifications.
///
/// Deliveries can repeat, so a notification already sent for the same order and
/// status is acknowledged without sending again.
pub struct NotificationHandler {
    log: NotificationLogClient,
    notifier: Arc<dyn Notifier>,
}

impl NotificationHandler {
    pub fn new(log: NotificationLogClient, notifier: Arc<dyn Notifier>) -> Self {
        Self { log, notifier }
    }
}

fn log_failure(e: impl std::fmt::Display) -> HandlerError {
    HandlerError::Failed(format!("notification log: {e}"))
}

#[async_trait]
impl EventHandler for NotificationHandler {
    #[instrument(skip(self, event), fields(order_id = %event.order_id, status = %event.status))]
    async fn handle(&self, event: &OrderEvent) -> Result<(), HandlerError> {
        let Some((subject, message)) = compose(event) else {
            warn!("No notification for this status");
            return Ok(());
        };

        if self.log.was_sent(&event.order_id, event.status).await.map_err(log_failure)? {
            info!("Already notified, skipping duplicate");
            return Ok(());
        }

        let record = self
            .log
            .record(NotificationCreate {
                user_id: event.user_id.clone(),
                order_id: event.order_id.clone(),
                order_status: event.status,
                subject: subject.to_string(),
                message: message.clone(),
            })
            .await
            .map_err(log_failure)?;

        match self.notifier.send(&event.user_id, subject, &message).await {
            Ok(()) => {
                // Delivered already; a retry would notify the user twice.
                if let Err(e) = self.log.mark_sent(&record.id).await {
                    warn!(notification_id = %record.id, error = %e, "Could not mark notification sent");
                }
                Ok(())
            }
            Err(e) => {
                if let Err(log_err) = self.log.mark_failed(&record.id, e.to_string()).await {
                    warn!(error = %log_err, "Could not mark notification failed");
                }
                Err(HandlerError::Failed(e.to_string()))
            }
        }
    }
}
