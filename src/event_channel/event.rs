use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::model::{Order, OrderId, OrderStatus, UserId};

/// Point-in-time snapshot of an order, as carried on the `orders` exchange.
///
/// Wire format (JSON):
///
/// ```text
/// { "order_id": "...", "user_id": "...", "total_price": 1329.98,
///   "status": "confirmed", "created_at": "2024-05-01T12:00:00Z" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub total_price: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl OrderEvent {
    /// Snapshot of `order` as of now.
    pub fn from_order(order: &Order) -> Self {
        Self {
            order_id: order.id.clone(),
            user_id: order.user_id.clone(),
            total_price: order.total_price,
            status: order.status,
            created_at: Utc::now(),
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_json(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }
}
