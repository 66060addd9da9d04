use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ProductId;

/// Represents a product in the catalog.
///
/// Available quantity is not stored here: the stock ledger owns it (see
/// [`StockRecord`](crate::model::StockRecord)).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Decimal,
}

impl Product {
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>, price: Decimal) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
        }
    }
}

/// Payload for adding a product to the catalog.
#[derive(Debug, Clone)]
pub struct ProductCreate {
    pub name: String,
    pub price: Decimal,
}

/// Payload for changing a catalog entry. Prices already captured on orders are unaffected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub price: Option<Decimal>,
}
