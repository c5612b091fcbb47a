//! Typed job payloads.
//!
//! [`JobData`] is what a client submits and what the executor interprets;
//! [`JobResult`] is what a completed job carries. Both are stored as JSON,
//! so their serde names are the wire contract (`camelCase`).

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::SessionId;

/// Result message for a job that produced the final try-on image.
pub const MSG_TRY_ON_COMPLETED: &str = "Virtual try-on completed successfully!";

/// Result message for a job that ended without a final composite.
pub const MSG_PARTIAL_GENERATION: &str =
    "Partial generation completed. Missing some images for final try-on.";

/// Sizing text used when the request carries no sizing value.
pub const DEFAULT_SIZING_INFO: &str = "Standard sizing";

// ---------------------------------------------------------------------------
// JobKind
// ---------------------------------------------------------------------------

/// The kind of work a job requests, tagged by the payload's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobKind {
    /// Compose a person image and a jewelry image into a try-on picture.
    #[serde(rename = "virtual-tryon", alias = "virtual-tryson")]
    VirtualTryOn,
}

impl JobKind {
    /// Parse a payload `type` tag. A missing tag means [`JobKind::VirtualTryOn`].
    pub fn parse(tag: Option<&str>) -> Result<Self, CoreError> {
        match tag.map(str::trim) {
            None | Some("") | Some("virtual-tryon") | Some("virtual-tryson") => {
                Ok(JobKind::VirtualTryOn)
            }
            Some(other) => Err(CoreError::Validation(format!(
                "Unsupported job type '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// JobData
// ---------------------------------------------------------------------------

/// Payload of a job, persisted verbatim in the job record.
///
/// The `type` tag is kept as submitted; it is only interpreted (and
/// rejected if unknown) by [`JobData::validate`] at execution time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Pre-supplied reference to a person (model) image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_image: Option<String>,
    /// Pre-supplied reference to a jewelry image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jewelry_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sizing: Option<f64>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub job_type: Option<String>,
}

impl JobData {
    /// Resolve the payload's [`JobKind`]. An unknown `type` is the only
    /// hard failure; other fields degrade to their defaults.
    pub fn validate(&self) -> Result<JobKind, CoreError> {
        JobKind::parse(self.job_type.as_deref())
    }

    /// The supplied model image reference, ignoring blank strings.
    pub fn model_image_ref(&self) -> Option<&str> {
        non_blank(self.model_image.as_deref())
    }

    /// The supplied jewelry image reference, ignoring blank strings.
    pub fn jewelry_image_ref(&self) -> Option<&str> {
        non_blank(self.jewelry_image.as_deref())
    }

    /// The description, or an empty string when none was given.
    pub fn description_text(&self) -> &str {
        self.description.as_deref().unwrap_or_default()
    }

    /// Human-readable sizing hint passed to the composition step.
    /// Non-finite or non-positive values count as absent.
    pub fn sizing_info(&self) -> String {
        match self.sizing {
            Some(size) if size.is_finite() && size > 0.0 => format!("Size: {size}"),
            _ => DEFAULT_SIZING_INFO.to_string(),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

// ---------------------------------------------------------------------------
// JobResult
// ---------------------------------------------------------------------------

/// Output payload of a completed job.
///
/// A result without `generated_image_url` is a partial completion: the
/// pipeline lacked one of the two source images needed for composition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jewelry_image_url: Option<String>,
    pub message: String,
}

impl JobResult {
    /// Full result carrying the final composite.
    pub fn try_on(generated: String, model: String, jewelry: String) -> Self {
        Self {
            generated_image_url: Some(generated),
            model_image_url: Some(model),
            jewelry_image_url: Some(jewelry),
            message: MSG_TRY_ON_COMPLETED.to_string(),
        }
    }

    /// Partial result carrying whichever source images exist.
    pub fn partial(model: Option<String>, jewelry: Option<String>) -> Self {
        Self {
            generated_image_url: None,
            model_image_url: model,
            jewelry_image_url: jewelry,
            message: MSG_PARTIAL_GENERATION.to_string(),
        }
    }

    pub fn is_partial(&self) -> bool {
        self.generated_image_url.is_none()
    }
}

// ---------------------------------------------------------------------------
// Enqueue contract
// ---------------------------------------------------------------------------

/// Enqueue request accepted from clients.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJob {
    /// Existing session to attach to. A new session is minted when absent.
    pub session_id: Option<SessionId>,
    pub description: Option<String>,
    pub model_image: Option<String>,
    pub jewelry_image: Option<String>,
    pub sizing: Option<f64>,
    #[serde(rename = "type")]
    pub job_type: Option<String>,
}

impl SubmitJob {
    /// Split into the optional owning session and the job payload.
    pub fn into_parts(self) -> (Option<SessionId>, JobData) {
        let session_id = self.session_id.filter(|s| !s.trim().is_empty());
        let data = JobData {
            description: self.description,
            model_image: self.model_image.filter(|v| !v.trim().is_empty()),
            jewelry_image: self.jewelry_image.filter(|v| !v.trim().is_empty()),
            sizing: self.sizing,
            job_type: self.job_type,
        };
        (session_id, data)
    }
}

/// Enqueue response returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub job_id: String,
    pub session_id: SessionId,
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn missing_type_defaults_to_virtual_try_on() {
        let data = JobData::default();
        assert_eq!(data.validate().unwrap(), JobKind::VirtualTryOn);
    }

    #[test]
    fn legacy_type_spelling_is_accepted() {
        assert_eq!(
            JobKind::parse(Some("virtual-tryson")).unwrap(),
            JobKind::VirtualTryOn
        );
        let kind: JobKind = serde_json::from_str("\"virtual-tryson\"").unwrap();
        assert_eq!(kind, JobKind::VirtualTryOn);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let data = JobData {
            job_type: Some("upscale".into()),
            ..Default::default()
        };
        assert_matches!(data.validate(), Err(CoreError::Validation(msg)) if msg.contains("upscale"));
    }

    #[test]
    fn blank_image_reference_counts_as_missing() {
        let data = JobData {
            model_image: Some("https://cdn.example/m.png".into()),
            jewelry_image: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(data.validate().unwrap(), JobKind::VirtualTryOn);
        assert_eq!(data.model_image_ref(), Some("https://cdn.example/m.png"));
        assert!(data.jewelry_image_ref().is_none());
    }

    #[test]
    fn unusable_sizing_falls_back_to_default() {
        for sizing in [0.0, -3.0, f64::NAN, f64::INFINITY] {
            let data = JobData {
                sizing: Some(sizing),
                ..Default::default()
            };
            assert_eq!(data.validate().unwrap(), JobKind::VirtualTryOn);
            assert_eq!(data.sizing_info(), DEFAULT_SIZING_INFO, "sizing {sizing}");
        }
    }

    #[test]
    fn long_description_is_accepted() {
        let data = JobData {
            description: Some("x".repeat(10_000)),
            ..Default::default()
        };
        assert!(data.validate().is_ok());
    }

    #[test]
    fn sizing_info_formats_value_or_default() {
        let sized = JobData {
            sizing: Some(7.0),
            ..Default::default()
        };
        assert_eq!(sized.sizing_info(), "Size: 7");
        assert_eq!(JobData::default().sizing_info(), DEFAULT_SIZING_INFO);
    }

    #[test]
    fn payload_uses_camel_case_wire_names() {
        let json = serde_json::json!({
            "description": "gold necklace on a model",
            "jewelryImage": "https://cdn.example/necklace.png",
            "sizing": 18,
            "type": "virtual-tryon"
        });
        let data: JobData = serde_json::from_value(json).unwrap();
        assert_eq!(
            data.jewelry_image.as_deref(),
            Some("https://cdn.example/necklace.png")
        );
        assert_eq!(data.sizing, Some(18.0));

        let back = serde_json::to_value(&data).unwrap();
        assert_eq!(back["type"], "virtual-tryon");
        assert!(back.get("modelImage").is_none());
    }

    #[test]
    fn partial_result_has_no_generated_image() {
        let result = JobResult::partial(None, Some("https://cdn.example/j.png".into()));
        assert!(result.is_partial());
        assert_eq!(result.message, MSG_PARTIAL_GENERATION);

        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("generatedImageUrl").is_none());
        assert_eq!(json["jewelryImageUrl"], "https://cdn.example/j.png");
    }

    #[test]
    fn submit_job_splits_session_from_payload() {
        let req: SubmitJob = serde_json::from_value(serde_json::json!({
            "sessionId": "",
            "description": "silver ring",
            "modelImage": " ",
            "type": "virtual-tryon"
        }))
        .unwrap();
        let (session, data) = req.into_parts();
        assert!(session.is_none());
        assert!(data.model_image.is_none());
        assert_eq!(data.description.as_deref(), Some("silver ring"));
        assert_eq!(data.job_type.as_deref(), Some("virtual-tryon"));
    }
}
