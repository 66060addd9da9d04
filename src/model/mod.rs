//! Pure data structures (DTOs) managed by the actors.

pub mod order;
pub mod product;
pub mod stock;
pub mod user;

pub use order::*;
pub use product::*;
pub use stock::*;
pub use user::*;

pub type OrderId = String;
pub type ProductId = String;
pub type UserId = String;
