//! Job queue runtime for virtual try-on requests.
//!
//! - [`queue::JobQueue`]: admission, queries and push notifications.
//! - [`sessions::SessionRegistry`]: groups jobs under session ids.
//! - [`dispatcher::Dispatcher`]: bounded, FIFO admission of pending jobs.
//! - [`executor::Executor`]: runs one claimed job to a terminal state.
//! - [`config::WorkerConfig`]: environment configuration for the binary.

pub mod config;
pub mod dispatcher;
pub mod executor;
pub mod queue;
pub mod sessions;

pub use config::{ConfigError, WorkerConfig};
pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use executor::Executor;
pub use queue::{JobQueue, QueueConfig, QueueStats, SessionOverview};
pub use sessions::SessionRegistry;
