//! Pipeline step names and error taxonomy.

use std::time::Duration;

/// A named step of the try-on pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStep {
    Analyze,
    GenerateModel,
    GenerateJewelry,
    Compose,
}

/// What to do when a step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Any failure fails the job.
    Abort,
    /// An authentication/configuration failure skips the step; any other
    /// failure fails the job.
    SkipOnAuth,
}

impl PipelineStep {
    /// The skip/abort decision for each step.
    ///
    /// Only model generation tolerates an auth failure. Jewelry generation
    /// does not, even though it is equally optional.
    pub fn failure_policy(self) -> FailurePolicy {
        match self {
            PipelineStep::GenerateModel => FailurePolicy::SkipOnAuth,
            PipelineStep::Analyze | PipelineStep::GenerateJewelry | PipelineStep::Compose => {
                FailurePolicy::Abort
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStep::Analyze => "analyze",
            PipelineStep::GenerateModel => "generate_model",
            PipelineStep::GenerateJewelry => "generate_jewelry",
            PipelineStep::Compose => "compose",
        }
    }

    /// Label used in user-facing error messages.
    fn label(self) -> &'static str {
        match self {
            PipelineStep::Analyze => "Request analysis",
            PipelineStep::GenerateModel => "Model generation",
            PipelineStep::GenerateJewelry => "Jewelry generation",
            PipelineStep::Compose => "Final image generation",
        }
    }
}

impl std::fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Errors returned by a [`GenerationBackend`](crate::GenerationBackend) call.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Credentials missing or rejected by the generation service.
    #[error("authentication failed: {0}")]
    Unauthorized(String),

    /// The service reported a failure.
    #[error("{0}")]
    Failed(String),

    /// The call succeeded but produced no image.
    #[error("No images generated")]
    NoOutput,

    /// The call did not finish within its ceiling.
    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("generation API error ({status}): {body}")]
    Api { status: u16, body: String },
}

impl BackendError {
    pub fn is_auth(&self) -> bool {
        matches!(self, BackendError::Unauthorized(_))
    }
}

/// A pipeline step failed. The `Display` form is what lands in `Job.error`.
#[derive(Debug, thiserror::Error)]
#[error("{step} failed: {source}")]
pub struct StepError {
    pub step: PipelineStep,
    #[source]
    pub source: BackendError,
}

impl StepError {
    pub fn new(step: PipelineStep, source: BackendError) -> Self {
        Self { step, source }
    }

    /// Whether the step's policy lets the pipeline continue without it.
    pub fn is_skippable(&self) -> bool {
        self.step.failure_policy() == FailurePolicy::SkipOnAuth && self.source.is_auth()
    }
}
