//! Job lifecycle event bus.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`JobEvent`]: the envelope published on every status transition made
//!   by the dispatcher and executor.

pub mod bus;

pub use bus::{EventBus, JobEvent, JobEventKind};
