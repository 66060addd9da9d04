//! Notification collaborator: consumes order events and tells the user about them.

pub mod handler;
pub mod log;
pub mod notifier;

pub use handler::*;
pub use log::{
    NotificationCreate, NotificationLogClient, NotificationLogError, NotificationRecord, NotificationStatus,
};
pub use notifier::*;
