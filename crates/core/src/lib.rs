//! Shared domain types for the try-on job queue.
//!
//! Pure data and state-machine logic only. This crate has no internal
//! dependencies so that every other workspace crate can depend on it.

pub mod error;
pub mod job;
pub mod status;
pub mod types;
