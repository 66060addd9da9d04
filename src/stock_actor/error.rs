//! Error types for the stock ledger.

use thiserror::Error;

/// Errors that can occur while adjusting stock.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StockError {
    /// No stock row exists for the product.
    #[error("Product not found: {0}")]
    NotFound(String),

    /// Applying the adjustment would take the quantity below zero.
    #[error("Insufficient stock for {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: String,
        requested: i64,
        available: i64,
    },

    /// A stock row for the product is already open.
    #[error("Stock already tracked for product: {0}")]
    AlreadyExists(String),

    /// A stock row cannot be opened with a negative quantity.
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(i64),

    /// The ledger actor could not be reached.
    #[error("Stock ledger unavailable: {0}")]
    Unavailable(String),
}
