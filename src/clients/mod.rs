//! Type-safe wrappers around [`ResourceClient`](crate::framework::ResourceClient),
//! plus the collaborator traits the orchestrator consumes.

pub mod actor_client;
pub mod collaborators;
pub mod order_client;
pub mod product_client;
pub mod stock_client;
pub mod user_client;

pub use actor_client::ActorClient;
pub use collaborators::*;
pub use order_client::*;
pub use product_client::*;
pub use stock_client::*;
pub use user_client::*;
