use crate::model::OrderStatus;

/// Custom actions for stored orders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderAction {
    /// Moves the order to a new status if the state machine allows it.
    /// Returns the updated order.
    Transition(OrderStatus),
    /// Marks the item with this id as held by the ledger. Only a pending order
    /// accepts it, so once an order leaves `pending` its reserved set is fixed.
    RecordReservation(String),
}
