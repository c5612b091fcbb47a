//! Decision table for the optional generation steps.
//!
//! | pre-supplied image | analysis says needed | suggested prompt | outcome       |
//! |--------------------|----------------------|------------------|---------------|
//! | yes                | any                  | any              | `Provided`    |
//! | no                 | yes                  | non-blank        | `Generate`    |
//! | no                 | yes                  | missing/blank    | `Unavailable` |
//! | no                 | no                   | any              | `Unavailable` |
//!
//! A blank image reference counts as not supplied.

use tryon_core::job::JobData;

use crate::backend::Analysis;

/// Composition prompt used when analysis suggested no model prompt.
pub const DEFAULT_COMPOSITION_PROMPT: &str = "Virtual jewelry try-on";

/// Where an input image of the composition step comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetSource {
    /// The client supplied the image reference.
    Provided(String),
    /// Run the generation step with this prompt.
    Generate { prompt: String },
    /// Neither supplied nor generated.
    Unavailable,
}

/// Resolved sources for both composition inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPlan {
    pub model: AssetSource,
    pub jewelry: AssetSource,
}

fn resolve(provided: Option<&str>, needed: bool, prompt: Option<&str>) -> AssetSource {
    if let Some(url) = provided {
        return AssetSource::Provided(url.to_string());
    }
    match prompt.map(str::trim) {
        Some(prompt) if needed && !prompt.is_empty() => AssetSource::Generate {
            prompt: prompt.to_string(),
        },
        _ => AssetSource::Unavailable,
    }
}

/// Decide how each composition input is obtained.
pub fn plan_assets(data: &JobData, analysis: &Analysis) -> AssetPlan {
    AssetPlan {
        model: resolve(
            data.model_image_ref(),
            analysis.needs_model_generation,
            analysis.suggested_model_prompt.as_deref(),
        ),
        jewelry: resolve(
            data.jewelry_image_ref(),
            analysis.needs_jewelry_generation,
            analysis.suggested_jewelry_prompt.as_deref(),
        ),
    }
}

/// Prompt for the composition step.
pub fn composition_prompt(analysis: &Analysis) -> String {
    analysis
        .suggested_model_prompt
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_COMPOSITION_PROMPT)
        .to_string()
}
