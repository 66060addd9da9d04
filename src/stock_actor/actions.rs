//! Custom actions for the stock ledger.
//!
//! These are handled by [`ActorEntity::handle_action`](crate::framework::ActorEntity::handle_action)
//! on [`StockRecord`](crate::model::StockRecord). Both return the quantity after the
//! action, so the result type is a plain `i64`.

/// Operations on a single stock row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockAction {
    /// Adds `delta` to the available quantity. Negative reserves, positive releases.
    ///
    /// # Errors
    /// Fails with `InsufficientStock` if the result would be negative. Releases never fail.
    Adjust(i64),
    /// Reads the current quantity without modifying it.
    Level,
}
