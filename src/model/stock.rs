use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ProductId;

/// Available quantity for one product. Never negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockRecord {
    pub product_id: ProductId,
    pub quantity: i64,
    pub updated_at: DateTime<Utc>,
}

/// Payload for opening a stock row. The product id is the row key.
#[derive(Debug, Clone)]
pub struct StockCreate {
    pub product_id: ProductId,
    pub quantity: i64,
}
