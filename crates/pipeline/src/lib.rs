//! The virtual try-on generation pipeline.
//!
//! A job runs up to four named steps against a [`GenerationBackend`]:
//!
//! 1. [`PipelineStep::Analyze`]: interpret the description.
//! 2. [`PipelineStep::GenerateModel`]: produce the person image, if needed.
//! 3. [`PipelineStep::GenerateJewelry`]: produce the jewelry image, if needed.
//! 4. [`PipelineStep::Compose`]: combine both into the try-on image.
//!
//! [`plan`] holds the pure decision table, [`pipeline`] drives the steps
//! with a per-step timeout, and [`remote`] is an HTTP backend for a
//! prediction-style generation gateway.

pub mod backend;
pub mod error;
pub mod pipeline;
pub mod plan;
pub mod remote;

pub use backend::{Analysis, CompositionRequest, GenerationBackend, GenerationRequest};
pub use error::{BackendError, PipelineStep, StepError};
pub use pipeline::TryOnPipeline;
pub use remote::{RemoteBackend, RemoteConfig};
