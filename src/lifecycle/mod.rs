//! Runtime orchestration and lifecycle management.
//!
//! - **Wiring**: starting every actor, the broker topology, the notification
//!   consumer and the outbox reconciler, and handing out their clients
//! - **Shutdown**: stopping background services, then the actors
//! - **Observability setup**: initializing tracing and logging
//!
//! # Main Components
//!
//! - [`OrderSystem`] - Owns every running task and the clients that talk to them
//! - [`setup_tracing`] - Initializes the tracing/logging infrastructure

pub mod order_system;
pub mod tracing;

pub use order_system::*;
pub use tracing::*;
