//! Error types for the order store.

use thiserror::Error;

use crate::model::OrderStatus;

/// Errors that can occur during order store operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum OrderStoreError {
    /// The requested order was not found.
    #[error("Order not found: {0}")]
    NotFound(String),

    /// The status state machine has no edge between these states.
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Reservations can only be recorded while the order is pending.
    #[error("Order is no longer pending (now {0})")]
    NotPending(OrderStatus),

    /// The order payload violates an order invariant (empty, zero quantity, total mismatch).
    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    /// The store actor could not be reached.
    #[error("Order store unavailable: {0}")]
    Unavailable(String),
}
