//! Notification log: one record per notification attempt, `pending → sent | failed`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::clients::actor_client::{recover_entity_error, ActorClient};
use crate::framework::{ActorEntity, FrameworkError, ResourceActor, ResourceClient};
use crate::model::{OrderId, OrderStatus, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: String,
    pub user_id: UserId,
    pub order_id: OrderId,
    /// Order status the notification announces.
    pub order_status: OrderStatus,
    pub subject: String,
    pub message: String,
    pub status: NotificationStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationCreate {
    pub user_id: UserId,
    pub order_id: OrderId,
    pub order_status: OrderStatus,
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationAction {
    MarkSent,
    MarkFailed(String),
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum NotificationLogError {
    #[error("Notification not found: {0}")]
    NotFound(String),
    #[error("Notification {0} is already settled")]
    AlreadySettled(String),
    #[error("Notification log unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
impl ActorEntity for NotificationRecord {
    type Id = String;
    type Create = NotificationCreate;
    type Update = ();
    type Action = NotificationAction;
    type ActionResult = NotificationRecord;
    type Error = NotificationLogError;

    fn from_create_params(id: String, params: NotificationCreate) -> Result<Self, NotificationLogError> {
        let now = Utc::now();
        Ok(Self {
            id,
            user_id: params.user_id,
            order_id: params.order_id,
            order_status: params.order_status,
            subject: params.subject,
            message: params.message,
            status: NotificationStatus::Pending,
            error: None,
            created_at: now,
            updated_at: now,
        })
    }

    async fn on_update(&mut self, _update: ()) -> Result<(), NotificationLogError> {
        Ok(())
    }

    async fn handle_action(&mut self, action: NotificationAction) -> Result<NotificationRecord, NotificationLogError> {
        if self.status != NotificationStatus::Pending {
            return Err(NotificationLogError::AlreadySettled(self.id.clone()));
        }
        match action {
            NotificationAction::MarkSent => self.status = NotificationStatus::Sent,
            NotificationAction::MarkFailed(error) => {
                self.status = NotificationStatus::Failed;
                self.error = Some(error);
            }
        }
        self.updated_at = Utc::now();
        Ok(self.clone())
    }
}

/// Creates the notification log actor and its client.
pub fn new(buffer_size: usize) -> (ResourceActor<NotificationRecord>, NotificationLogClient) {
    let (actor, generic_client) =
        ResourceActor::<NotificationRecord>::new(buffer_size, |_: &NotificationCreate| Uuid::new_v4().to_string());
    (actor, NotificationLogClient::new(generic_client))
}

#[derive(Clone)]
pub struct NotificationLogClient {
    inner: ResourceClient<NotificationRecord>,
}

impl NotificationLogClient {
    pub fn new(inner: ResourceClient<NotificationRecord>) -> Self {
        Self { inner }
    }

    #[instrument(skip(self, params), fields(order_id = %params.order_id, status = %params.order_status))]
    pub async fn record(&self, params: NotificationCreate) -> Result<NotificationRecord, NotificationLogError> {
        self.inner.create(params).await.map_err(Self::map_error)
    }

    pub async fn mark_sent(&self, id: &str) -> Result<NotificationRecord, NotificationLogError> {
        self.inner
            .perform_action(id.to_string(), NotificationAction::MarkSent)
            .await
            .map_err(Self::map_error)
    }

    pub async fn mark_failed(&self, id: &str, error: impl Into<String>) -> Result<NotificationRecord, NotificationLogError> {
        self.inner
            .perform_action(id.to_string(), NotificationAction::MarkFailed(error.into()))
            .await
            .map_err(Self::map_error)
    }

    /// Whether a notification for this order and status has already gone out.
    #[instrument(skip(self))]
    pub async fn was_sent(&self, order_id: &str, order_status: OrderStatus) -> Result<bool, NotificationLogError> {
        let sent = self.list().await?.into_iter().any(|record| {
            record.order_id == order_id
                && record.order_status == order_status
                && record.status == NotificationStatus::Sent
        });
        debug!(sent, "Checked notification log");
        Ok(sent)
    }
}

#[async_trait]
impl ActorClient<NotificationRecord> for NotificationLogClient {
    type Error = NotificationLogError;

    fn inner(&self) -> &ResourceClient<NotificationRecord> {
        &self.inner
    }

    fn map_error(e: FrameworkError) -> Self::Error {
        recover_entity_error(
            e,
            NotificationLogError::NotFound,
            NotificationLogError::Unavailable,
            NotificationLogError::Unavailable,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(order_id: &str, order_status: OrderStatus) -> NotificationCreate {
        NotificationCreate {
            user_id: "user_1".into(),
            order_id: order_id.into(),
            order_status,
            subject: "Order Confirmation".into(),
            message: "hello".into(),
        }
    }

    #[tokio::test]
    async fn test_records_settle_once() {
        let (actor, log) = new(8);
        tokio::spawn(actor.run());

        let record = log.record(create("order_1", OrderStatus::Confirmed)).await.unwrap();
        assert_eq!(record.status, NotificationStatus::Pending);
        assert!(!log.was_sent("order_1", OrderStatus::Confirmed).await.unwrap());

        let sent = log.mark_sent(&record.id).await.unwrap();
        assert_eq!(sent.status, NotificationStatus::Sent);
        assert!(log.was_sent("order_1", OrderStatus::Confirmed).await.unwrap());
        assert!(!log.was_sent("order_1", OrderStatus::Cancelled).await.unwrap());

        assert_eq!(
            log.mark_failed(&record.id, "late").await,
            Err(NotificationLogError::AlreadySettled(record.id.clone()))
        );
    }

    #[tokio::test]
    async fn test_failed_records_keep_the_error() {
        let (actor, log) = new(8);
        tokio::spawn(actor.run());

        let record = log.record(create("order_1", OrderStatus::Cancelled)).await.unwrap();
        let failed = log.mark_failed(&record.id, "smtp down").await.unwrap();

        assert_eq!(failed.status, NotificationStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("smtp down"));
        assert!(!log.was_sent("order_1", OrderStatus::Cancelled).await.unwrap());
        assert!(matches!(log.mark_sent("nope").await, Err(NotificationLogError::NotFound(_))));
    }
}
