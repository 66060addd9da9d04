//! Order store: orders and their items, persisted as one unit.

mod actions;
pub mod entity;
pub mod error;

pub use actions::*;
pub use error::*;

use crate::clients::OrderStoreClient;
use crate::framework::ResourceActor;
use crate::model::Order;
use uuid::Uuid;

/// Creates a new order store actor and its client. Orders get a fresh UUID.
pub fn new(buffer_size: usize) -> (ResourceActor<Order>, OrderStoreClient) {
    let (actor, generic_client) = ResourceActor::<Order>::new(buffer_size, |_| Uuid::new_v4().to_string());
    let client = OrderStoreClient::new(generic_client);

    (actor, client)
}
