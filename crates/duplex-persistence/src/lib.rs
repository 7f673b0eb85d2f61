//! Duplex Persistence - Data store connection supervision
//!
//! This crate provides:
//! - A single-assignment completion slot for handing a result back from a task
//! - The database connector (open pool, verify liveness, bounded retry)
//! - The shareable [`DatabaseHandle`] published once liveness is verified

pub mod completion;
pub mod connector;
pub mod handle;

// Re-export sea-orm for convenience
pub use sea_orm;

pub use completion::{Completer, Completion, CompletionError, completion, spawn_completion};
pub use connector::{ConnectError, connect, spawn_connect};
pub use handle::DatabaseHandle;
