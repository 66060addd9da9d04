//! Outbox log: a record of every event handed to the publisher and what became of it.
//!
//! Publishing stays fire-and-forget for the order flow. The log lets
//! [`OutboxReconciler`](super::OutboxReconciler) find events that never reached the
//! broker and publish them again.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::event::OrderEvent;
use crate::clients::actor_client::{recover_entity_error, ActorClient};
use crate::framework::{ActorEntity, FrameworkError, ResourceActor, ResourceClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutboxStatus {
    Pending,
    Published,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub id: String,
    pub event: OrderEvent,
    pub status: OutboxStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OutboxEntry {
    /// Whether the reconciler should try this entry again.
    pub fn needs_publish(&self, max_attempts: u32, stale_before: DateTime<Utc>) -> bool {
        if self.attempts >= max_attempts {
            return false;
        }
        match self.status {
            OutboxStatus::Published => false,
            OutboxStatus::Failed => true,
            // A fresh pending entry is still owned by the task that created it.
            OutboxStatus::Pending => self.updated_at <= stale_before,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboxAction {
    MarkPublished,
    /// Records a failed attempt with the error text.
    MarkFailed(String),
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum OutboxError {
    #[error("Outbox entry not found: {0}")]
    NotFound(String),
    #[error("Outbox entry {0} has not been published")]
    NotPublished(String),
    #[error("Outbox unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
impl ActorEntity for OutboxEntry {
    type Id = String;
    type Create = OrderEvent;
    type Update = ();
    type Action = OutboxAction;
    type ActionResult = OutboxEntry;
    type Error = OutboxError;

    fn from_create_params(id: String, event: OrderEvent) -> Result<Self, OutboxError> {
        let now = Utc::now();
        Ok(Self {
            id,
            event,
            status: OutboxStatus::Pending,
            attempts: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        })
    }

    async fn on_update(&mut self, _update: ()) -> Result<(), OutboxError> {
        Ok(())
    }

    /// Only published entries may be pruned.
    async fn on_delete(&self) -> Result<(), OutboxError> {
        if self.status != OutboxStatus::Published {
            return Err(OutboxError::NotPublished(self.id.clone()));
        }
        Ok(())
    }

    async fn handle_action(&mut self, action: OutboxAction) -> Result<OutboxEntry, OutboxError> {
        self.attempts += 1;
        self.updated_at = Utc::now();
        self.status = match action {
            OutboxAction::MarkPublished => {
                self.last_error = None;
                OutboxStatus::Published
            }
            OutboxAction::MarkFailed(error) => {
                self.last_error = Some(error);
                OutboxStatus::Failed
            }
        };
        Ok(self.clone())
    }
}

/// Creates the outbox actor and its client.
pub fn new(buffer_size: usize) -> (ResourceActor<OutboxEntry>, OutboxClient) {
    let (actor, generic_client) = ResourceActor::<OutboxEntry>::new(buffer_size, |_| Uuid::new_v4().to_string());
    (actor, OutboxClient::new(generic_client))
}

#[derive(Clone)]
pub struct OutboxClient {
    inner: ResourceClient<OutboxEntry>,
}

impl OutboxClient {
    pub fn new(inner: ResourceClient<OutboxEntry>) -> Self {
        Self { inner }
    }

    #[instrument(skip(self, event), fields(order_id = %event.order_id, status = %event.status))]
    pub async fn record(&self, event: OrderEvent) -> Result<OutboxEntry, OutboxError> {
        self.inner.create(event).await.map_err(Self::map_error)
    }

    pub async fn mark_published(&self, id: &str) -> Result<OutboxEntry, OutboxError> {
        self.inner
            .perform_action(id.to_string(), OutboxAction::MarkPublished)
            .await
            .map_err(Self::map_error)
    }

    pub async fn mark_failed(&self, id: &str, error: impl Into<String>) -> Result<OutboxEntry, OutboxError> {
        self.inner
            .perform_action(id.to_string(), OutboxAction::MarkFailed(error.into()))
            .await
            .map_err(Self::map_error)
    }

    /// Entries the reconciler should publish again, oldest first.
    pub async fn due(&self, max_attempts: u32, stale_before: DateTime<Utc>) -> Result<Vec<OutboxEntry>, OutboxError> {
        let mut due: Vec<OutboxEntry> = self
            .list()
            .await?
            .into_iter()
            .filter(|entry| entry.needs_publish(max_attempts, stale_before))
            .collect();
        due.sort_by_key(|entry| entry.created_at);
        Ok(due)
    }

    /// Removes published entries. Returns how many were removed.
    #[instrument(skip(self))]
    pub async fn prune_published(&self) -> Result<usize, OutboxError> {
        let mut pruned = 0;
        for entry in self.list().await? {
            if entry.status != OutboxStatus::Published {
                continue;
            }
            match self.delete(entry.id.clone()).await {
                Ok(()) => pruned += 1,
                // Raced with another prune.
                Err(OutboxError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        debug!(pruned, "Pruned outbox");
        Ok(pruned)
    }
}

#[async_trait]
impl ActorClient<OutboxEntry> for OutboxClient {
    type Error = OutboxError;

    fn inner(&self) -> &ResourceClient<OutboxEntry> {
        &self.inner
    }

    fn map_error(e: FrameworkError) -> Self::Error {
        recover_entity_error(e, OutboxError::NotFound, OutboxError::Unavailable, OutboxError::Unavailable)
    }
}
