//! Generic actor framework for resource management.
//!
//! This module provides the core building blocks every stateful component of the order
//! lifecycle is built from: the stock ledger, the order store, the outbox log and the
//! in-process collaborators all run as a [`ResourceActor`] over their own entity type.
//!
//! # Main Components
//!
//! - [`ActorEntity`] - Trait that resource types implement to be managed by actors
//! - [`ResourceActor`] - Generic actor that owns a table of entities
//! - [`ResourceClient`] - Typed, cloneable handle for sending requests to an actor
//! - [`FrameworkError`] - Transport errors plus boxed per-entity errors
//!
//! # Testing
//!
//! See [`mock`] module for utilities to test clients without spawning full actors.

pub mod core;
pub mod mock;

// Re-export core types for convenience
pub use core::*;
