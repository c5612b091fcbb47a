//! Contracts of the external generation services.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;

/// Outcome of the analysis step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    #[serde(default)]
    pub needs_model_generation: bool,
    #[serde(default)]
    pub needs_jewelry_generation: bool,
    #[serde(default)]
    pub reasoning: String,
    /// E.g. `rings`, `necklaces`, `earrings`; free-form, passed through.
    #[serde(default)]
    pub jewelry_category: Option<String>,
    #[serde(default)]
    pub suggested_model_prompt: Option<String>,
    #[serde(default)]
    pub suggested_jewelry_prompt: Option<String>,
}

/// Input to a single-image generation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub prompt: String,
    pub category: Option<String>,
    /// The user's original description.
    pub context: Option<String>,
}

/// Input to the composition step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionRequest {
    pub model_image_url: String,
    pub jewelry_image_url: String,
    pub prompt: String,
    pub sizing_info: String,
    pub category: Option<String>,
    pub user_context: Option<String>,
}

/// The four generation services a try-on job depends on.
///
/// Each method returns the URL of the produced image. Implementations
/// should report rejected credentials as [`BackendError::Unauthorized`].
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn analyze(&self, description: &str) -> Result<Analysis, BackendError>;

    async fn generate_model_image(
        &self,
        request: &GenerationRequest,
    ) -> Result<String, BackendError>;

    async fn generate_jewelry_image(
        &self,
        request: &GenerationRequest,
    ) -> Result<String, BackendError>;

    async fn compose_try_on(&self, request: &CompositionRequest) -> Result<String, BackendError>;
}
