//! Step driver for one try-on job.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tryon_core::job::{JobData, JobResult};

use crate::backend::{Analysis, CompositionRequest, GenerationBackend, GenerationRequest};
use crate::error::{BackendError, PipelineStep, StepError};
use crate::plan::{composition_prompt, plan_assets, AssetSource};

/// Default hard ceiling for a single step.
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(300);

/// Runs the analyze / generate / compose steps for a job payload.
///
/// Every backend call is bounded by `step_timeout`; an expired step fails
/// like any other step failure.
pub struct TryOnPipeline {
    backend: Arc<dyn GenerationBackend>,
    step_timeout: Duration,
}

impl TryOnPipeline {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self {
            backend,
            step_timeout: DEFAULT_STEP_TIMEOUT,
        }
    }

    pub fn with_step_timeout(mut self, step_timeout: Duration) -> Self {
        self.step_timeout = step_timeout;
        self
    }

    /// Run the pipeline to a result.
    ///
    /// Returns a partial result (no `generated_image_url`) when either
    /// composition input is missing after the generation steps.
    pub async fn run(&self, job_id: &str, data: &JobData) -> Result<JobResult, StepError> {
        let analysis = self
            .step(
                job_id,
                PipelineStep::Analyze,
                self.backend.analyze(data.description_text()),
            )
            .await?;
        tracing::debug!(
            job_id,
            needs_model = analysis.needs_model_generation,
            needs_jewelry = analysis.needs_jewelry_generation,
            category = ?analysis.jewelry_category,
            "Request analyzed",
        );

        let plan = plan_assets(data, &analysis);

        let model_url = match self
            .obtain(job_id, PipelineStep::GenerateModel, plan.model, data, &analysis)
            .await
        {
            Ok(url) => url,
            Err(e) if e.is_skippable() => {
                tracing::warn!(
                    job_id,
                    step = e.step.as_str(),
                    error = %e,
                    "Skipping model generation after authentication failure",
                );
                None
            }
            Err(e) => return Err(e),
        };

        let jewelry_url = self
            .obtain(
                job_id,
                PipelineStep::GenerateJewelry,
                plan.jewelry,
                data,
                &analysis,
            )
            .await?;

        let (model_url, jewelry_url) = match (model_url, jewelry_url) {
            (Some(model), Some(jewelry)) => (model, jewelry),
            (model, jewelry) => {
                tracing::info!(
                    job_id,
                    has_model = model.is_some(),
                    has_jewelry = jewelry.is_some(),
                    "Composition inputs incomplete, returning partial result",
                );
                return Ok(JobResult::partial(model, jewelry));
            }
        };

        let request = CompositionRequest {
            model_image_url: model_url.clone(),
            jewelry_image_url: jewelry_url.clone(),
            prompt: composition_prompt(&analysis),
            sizing_info: data.sizing_info(),
            category: analysis.jewelry_category.clone(),
            user_context: data.description.clone(),
        };
        let generated = self
            .step(
                job_id,
                PipelineStep::Compose,
                self.backend.compose_try_on(&request),
            )
            .await?;

        Ok(JobResult::try_on(generated, model_url, jewelry_url))
    }

    /// Resolve one composition input according to its plan.
    async fn obtain(
        &self,
        job_id: &str,
        step: PipelineStep,
        source: AssetSource,
        data: &JobData,
        analysis: &Analysis,
    ) -> Result<Option<String>, StepError> {
        let prompt = match source {
            AssetSource::Provided(url) => return Ok(Some(url)),
            AssetSource::Unavailable => return Ok(None),
            AssetSource::Generate { prompt } => prompt,
        };
        let request = GenerationRequest {
            prompt,
            category: analysis.jewelry_category.clone(),
            context: data.description.clone(),
        };
        let url = match step {
            PipelineStep::GenerateModel => {
                self.step(job_id, step, self.backend.generate_model_image(&request))
                    .await?
            }
            _ => {
                self.step(job_id, step, self.backend.generate_jewelry_image(&request))
                    .await?
            }
        };
        Ok(Some(url))
    }

    /// Run one backend call under the step timeout.
    async fn step<T>(
        &self,
        job_id: &str,
        step: PipelineStep,
        call: impl Future<Output = Result<T, BackendError>>,
    ) -> Result<T, StepError> {
        tracing::debug!(job_id, step = step.as_str(), "Pipeline step started");
        let outcome = match tokio::time::timeout(self.step_timeout, call).await {
            Ok(outcome) => outcome,
            Err(_) => Err(BackendError::Timeout(self.step_timeout)),
        };
        match outcome {
            Ok(value) => {
                tracing::debug!(job_id, step = step.as_str(), "Pipeline step finished");
                Ok(value)
            }
            Err(source) => Err(StepError::new(step, source)),
        }
    }
}
