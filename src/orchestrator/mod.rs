//! # Order Orchestrator
//!
//! Coordinates one checkout across the collaborators, the order store, the stock
//! ledger and the event channel.
//!
//! ## Create
//!
//! ```text
//! validate input ─▶ user exists? ─▶ price + pre-check via catalog
//!     ─▶ store order (pending) ─▶ reserve each item in the ledger
//!         ├─ all ok ─▶ confirmed ─▶ publish event (detached)
//!         └─ item n fails ─▶ cancelled ─▶ release items 1..n-1 ─▶ error
//! ```
//!
//! Each reservation is recorded on the pending order as soon as the ledger takes
//! it, and whoever moves the order to `cancelled` releases exactly the recorded
//! items. The reserve step runs in a spawned task, so a caller deadline cannot
//! strand it half way.
//!
//! There is no transaction spanning the store and the ledger rows; a failure part
//! way through is undone by compensating releases. The catalog stock check is only
//! advisory: the ledger's answer is final.

pub mod dto;
pub mod error;

pub use dto::*;
pub use error::*;

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn, Instrument};

use crate::clients::{ActorClient, Catalog, CollaboratorError, IdentityProvider, OrderStoreClient, StockClient};
use crate::config::Config;
use crate::event_channel::{EventPublisher, OrderEvent};
use crate::model::{Order, OrderItem, OrderItemCreate, OrderLine, OrderStatus};
use crate::order_actor::OrderStoreError;

#[derive(Clone)]
pub struct OrderOrchestrator {
    store: OrderStoreClient,
    ledger: StockClient,
    identity: Arc<dyn IdentityProvider>,
    catalog: Arc<dyn Catalog>,
    publisher: EventPublisher,
    collaborator_timeout: Duration,
    default_page_size: u32,
    max_page_size: u32,
}

/// Merges lines for the same product, keeping first-seen order.
fn merge_lines(lines: Vec<OrderLine>) -> Result<Vec<OrderLine>, OrderError> {
    let mut merged: Vec<OrderLine> = Vec::with_capacity(lines.len());
    let mut index: HashMap<String, usize> = HashMap::new();

    for line in lines {
        if line.product_id.trim().is_empty() {
            return Err(OrderError::InvalidInput("product_id is required".into()));
        }
        if line.quantity == 0 {
            return Err(OrderError::InvalidInput(format!(
                "quantity for {} must be at least 1",
                line.product_id
            )));
        }
        match index.get(&line.product_id) {
            Some(&i) => {
                let total = merged[i].quantity.checked_add(line.quantity).ok_or_else(|| {
                    OrderError::InvalidInput(format!("quantity for {} is too large", line.product_id))
                })?;
                merged[i].quantity = total;
            }
            None => {
                index.insert(line.product_id.clone(), merged.len());
                merged.push(line);
            }
        }
    }
    Ok(merged)
}

impl OrderOrchestrator {
    pub fn new(
        store: OrderStoreClient,
        ledger: StockClient,
        identity: Arc<dyn IdentityProvider>,
        catalog: Arc<dyn Catalog>,
        publisher: EventPublisher,
        config: &Config,
    ) -> Self {
        Self {
            store,
            ledger,
            identity,
            catalog,
            publisher,
            collaborator_timeout: config.collaborator_timeout,
            default_page_size: config.default_page_size,
            max_page_size: config.max_page_size,
        }
    }

    /// Runs a collaborator call under the configured deadline.
    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, CollaboratorError>>,
    ) -> Result<T, OrderError> {
        match tokio::time::timeout(self.collaborator_timeout, call).await {
            Ok(result) => result.map_err(OrderError::from),
            Err(_) => Err(OrderError::infrastructure(format!(
                "collaborator call exceeded {:?}",
                self.collaborator_timeout
            ))),
        }
    }

    /// Places an order: validates, prices from the catalog, persists as pending,
    /// reserves stock and confirms. Returns the confirmed order.
    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn create_order(&self, user_id: &str, lines: Vec<OrderLine>) -> Result<Order, OrderError> {
        debug!(?lines, "create_order called");

        if user_id.trim().is_empty() {
            return Err(OrderError::InvalidInput("user_id is required".into()));
        }
        if lines.is_empty() {
            return Err(OrderError::InvalidInput("order must contain at least one item".into()));
        }
        let lines = merge_lines(lines)?;

        if !self.bounded(self.identity.user_exists(user_id)).await? {
            return Err(OrderError::UserInvalid(user_id.to_string()));
        }

        let ids: Vec<String> = lines.iter().map(|line| line.product_id.clone()).collect();
        let products = self.bounded(self.catalog.get_products(&ids)).await?;

        let mut items = Vec::with_capacity(lines.len());
        let mut total_price = Decimal::ZERO;
        for line in lines {
            let info = products
                .get(&line.product_id)
                .ok_or_else(|| OrderError::ProductNotFound(line.product_id.clone()))?;
            let requested = i64::from(line.quantity);
            if requested > info.stock {
                return Err(OrderError::InsufficientStock {
                    product_id: line.product_id,
                    requested,
                    available: info.stock,
                });
            }
            total_price += info.price * Decimal::from(line.quantity);
            items.push(OrderItemCreate {
                product_id: line.product_id,
                quantity: line.quantity,
                price: info.price,
            });
        }

        let order = self.store.create(user_id, items, total_price).await?;
        info!(order_id = %order.id, %total_price, "Order pending");

        // Reserving runs as its own task; a caller that stops waiting does not stop it.
        let saga = self.clone();
        tokio::spawn(async move { saga.reserve_and_confirm(order).await }.in_current_span())
            .await
            .map_err(|e| OrderError::infrastructure(format!("checkout task failed: {e}")))?
    }

    async fn reserve_and_confirm(self, order: Order) -> Result<Order, OrderError> {
        self.reserve_items(&order).await?;

        let order = match self.store.transition(&order.id, OrderStatus::Confirmed).await {
            Ok(confirmed) => confirmed,
            Err(e) => {
                // Cancelled while reserving. Every item was recorded, so the canceller released them.
                warn!(order_id = %order.id, error = %e, "Could not confirm order");
                return Err(e.into());
            }
        };
        info!(order_id = %order.id, "Order confirmed");

        self.publisher.spawn_publish(OrderEvent::from_order(&order));
        Ok(order)
    }

    /// Reserves every item and records each reservation on the order. On the first
    /// rejection, cancels the order, releases what it recorded and returns the
    /// ledger's error. Item `n + 1` is never attempted once item `n` fails.
    async fn reserve_items(&self, order: &Order) -> Result<(), OrderError> {
        for item in &order.items {
            let remaining = match self.ledger.reserve(&item.product_id, item.quantity).await {
                Ok(remaining) => remaining,
                Err(e) => {
                    warn!(order_id = %order.id, product_id = %item.product_id, error = %e, "Reservation failed, compensating");
                    self.abandon(order).await?;
                    return Err(e.into());
                }
            };
            debug!(order_id = %order.id, product_id = %item.product_id, quantity = item.quantity, remaining, "Reserved");

            if let Err(e) = self.store.record_reservation(&order.id, &item.id).await {
                // Unrecorded stock is invisible to a canceller; it goes back from here.
                warn!(order_id = %order.id, product_id = %item.product_id, error = %e, "Could not record reservation");
                let released = self.release_items(order, std::slice::from_ref(item)).await;
                let abandoned = match &e {
                    OrderStoreError::NotPending(_) => Ok(()),
                    _ => self.abandon(order).await,
                };
                released.and(abandoned)?;
                return Err(e.into());
            }
        }
        Ok(())
    }

    /// Cancels a pending order whose checkout failed and releases the stock it
    /// recorded. If a concurrent cancel got there first, that cancel did the release.
    async fn abandon(&self, order: &Order) -> Result<(), OrderError> {
        match self.store.transition(&order.id, OrderStatus::Cancelled).await {
            Ok(cancelled) => self.release_items(&cancelled, &cancelled.reserved_items()).await,
            Err(OrderStoreError::InvalidTransition { from: OrderStatus::Cancelled, .. }) => {
                debug!(order_id = %order.id, "Order already cancelled");
                Ok(())
            }
            Err(e) => {
                error!(order_id = %order.id, error = %e, "Could not cancel order after failed reservation");
                Err(e.into())
            }
        }
    }

    /// Gives reserved stock back, newest reservation first. Every item is attempted;
    /// any item that cannot be released is logged and reported as `Infrastructure`.
    async fn release_items(&self, order: &Order, items: &[OrderItem]) -> Result<(), OrderError> {
        let mut failed = 0usize;
        for item in items.iter().rev() {
            match self.ledger.release(&item.product_id, item.quantity).await {
                Ok(level) => {
                    debug!(order_id = %order.id, product_id = %item.product_id, quantity = item.quantity, level, "Released");
                }
                Err(e) => {
                    failed += 1;
                    error!(
                        order_id = %order.id,
                        product_id = %item.product_id,
                        quantity = item.quantity,
                        error = %e,
                        "STOCK INCONSISTENCY: reserved quantity could not be released"
                    );
                }
            }
        }
        if failed > 0 {
            return Err(OrderError::infrastructure(format!(
                "{failed} stock release(s) failed for order {}",
                order.id
            )));
        }
        Ok(())
    }

    /// Cancels an order on behalf of its owner and releases the stock it holds.
    #[instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: &str, user_id: &str) -> Result<(), OrderError> {
        let order = self.owned_order(order_id, user_id).await?;
        match order.status {
            OrderStatus::Cancelled => return Err(OrderError::AlreadyCancelled),
            OrderStatus::Completed => return Err(OrderError::CannotCancelCompleted),
            OrderStatus::Pending | OrderStatus::Confirmed => {}
        }

        // The store decides the race between two cancels: only one transition wins,
        // so stock is released at most once.
        let cancelled = match self.store.transition(order_id, OrderStatus::Cancelled).await {
            Ok(cancelled) => cancelled,
            Err(OrderStoreError::InvalidTransition { from: OrderStatus::Cancelled, .. }) => {
                return Err(OrderError::AlreadyCancelled)
            }
            Err(OrderStoreError::InvalidTransition { from: OrderStatus::Completed, .. }) => {
                return Err(OrderError::CannotCancelCompleted)
            }
            Err(e) => return Err(e.into()),
        };

        // The reserved set is fixed once the order leaves pending. A checkout still
        // in flight releases anything it reserves after this point itself.
        let released = self.release_items(&cancelled, &cancelled.reserved_items()).await;
        info!(order_id, "Order cancelled");

        self.publisher.spawn_publish(OrderEvent::from_order(&cancelled));
        released
    }

    /// Marks a confirmed order as completed.
    #[instrument(skip(self))]
    pub async fn complete_order(&self, order_id: &str) -> Result<Order, OrderError> {
        let order = self.store.transition(order_id, OrderStatus::Completed).await?;
        info!(order_id, "Order completed");
        self.publisher.spawn_publish(OrderEvent::from_order(&order));
        Ok(order)
    }

    async fn owned_order(&self, order_id: &str, user_id: &str) -> Result<Order, OrderError> {
        let order = self
            .store
            .get(order_id.to_string())
            .await?
            .ok_or_else(|| OrderError::NotFound(order_id.to_string()))?;
        if order.user_id != user_id {
            warn!(order_id, user_id, "Order belongs to another user");
            return Err(OrderError::Unauthorized);
        }
        Ok(order)
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: &str, user_id: &str) -> Result<Order, OrderError> {
        self.owned_order(order_id, user_id).await
    }

    pub async fn get_order_status(&self, order_id: &str, user_id: &str) -> Result<OrderStatus, OrderError> {
        Ok(self.owned_order(order_id, user_id).await?.status)
    }

    /// A page of the user's orders, newest first. `page` starts at 1; out-of-range
    /// values fall back to the first page and the default page size.
    #[instrument(skip(self))]
    pub async fn list_user_orders(&self, user_id: &str, page: u32, page_size: u32) -> Result<Vec<Order>, OrderError> {
        let page = page.max(1);
        let page_size = if page_size == 0 || page_size > self.max_page_size {
            self.default_page_size
        } else {
            page_size
        };
        let offset = (page as usize - 1) * page_size as usize;
        Ok(self.store.list_by_user(user_id, page_size as usize, offset).await?)
    }
}
