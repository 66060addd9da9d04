//! [`ActorEntity`] implementation for [`Order`].
//!
//! An order and all of its items are built and stored in a single actor turn, so
//! readers never observe an order without its items.

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::actions::OrderAction;
use super::error::OrderStoreError;
use crate::framework::ActorEntity;
use crate::model::{Order, OrderCreate, OrderId, OrderItem, OrderStatus};

#[async_trait]
impl ActorEntity for Order {
    type Id = OrderId;
    type Create = OrderCreate;
    type Update = ();
    type Action = OrderAction;
    type ActionResult = Order;
    type Error = OrderStoreError;

    fn from_create_params(id: OrderId, params: OrderCreate) -> Result<Self, OrderStoreError> {
        let now = Utc::now();
        let items = params
            .items
            .into_iter()
            .map(|item| OrderItem {
                id: Uuid::new_v4().to_string(),
                order_id: id.clone(),
                product_id: item.product_id,
                quantity: item.quantity,
                price: item.price,
                reserved: false,
            })
            .collect();

        Ok(Self {
            id,
            user_id: params.user_id,
            items,
            total_price: params.total_price,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rejects orders that break the item invariants before they are stored.
    async fn on_create(&mut self) -> Result<(), OrderStoreError> {
        if self.items.is_empty() {
            return Err(OrderStoreError::InvalidOrder("order has no items".into()));
        }
        if let Some(item) = self.items.iter().find(|item| item.quantity == 0) {
            return Err(OrderStoreError::InvalidOrder(format!(
                "item {} has zero quantity",
                item.product_id
            )));
        }
        let items_total = self.items_total();
        if items_total != self.total_price {
            return Err(OrderStoreError::InvalidOrder(format!(
                "total {} does not match items {}",
                self.total_price, items_total
            )));
        }
        Ok(())
    }

    async fn on_update(&mut self, _update: ()) -> Result<(), OrderStoreError> {
        Ok(())
    }

    async fn handle_action(&mut self, action: OrderAction) -> Result<Order, OrderStoreError> {
        match action {
            OrderAction::Transition(to) => {
                if !self.status.can_transition_to(to) {
                    return Err(OrderStoreError::InvalidTransition { from: self.status, to });
                }
                self.status = to;
                self.updated_at = Utc::now();
                Ok(self.clone())
            }
            OrderAction::RecordReservation(item_id) => {
                if self.status != OrderStatus::Pending {
                    return Err(OrderStoreError::NotPending(self.status));
                }
                let item = self
                    .items
                    .iter_mut()
                    .find(|item| item.id == item_id)
                    .ok_or_else(|| OrderStoreError::InvalidOrder(format!("no item {item_id} in order {}", self.id)))?;
                item.reserved = true;
                Ok(self.clone())
            }
        }
    }
}
