//! HTTP client for a prediction-style generation gateway.
//!
//! Analysis is a single synchronous call. Image steps create a prediction
//! and poll its status URL until it settles, bounded by
//! `max_poll_attempts * poll_interval`.
//!
//! | Call                  | Request                                  |
//! |-----------------------|------------------------------------------|
//! | analyze               | `POST {base}/v1/analyze`                 |
//! | create prediction     | `POST {base}/v1/predictions`             |
//! | poll prediction       | `GET  urls.get` or `{base}/v1/predictions/{id}` |

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::backend::{Analysis, CompositionRequest, GenerationBackend, GenerationRequest};
use crate::error::BackendError;

/// HTTP request timeout for a single gateway call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Default interval between prediction status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default number of polls before a prediction is considered hung.
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 60;

/// Connection settings for [`RemoteBackend`].
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL, e.g. `http://localhost:8000`.
    pub base_url: String,
    /// Sent as a bearer token when present.
    pub api_token: Option<String>,
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
}

impl RemoteConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_poll_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
        }
    }

    /// Total time spent polling before a prediction times out.
    pub fn poll_budget(&self) -> Duration {
        self.poll_interval
            .checked_mul(self.max_poll_attempts)
            .unwrap_or(Duration::MAX)
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Which generation model a prediction targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PredictionTask {
    ModelImage,
    JewelryImage,
    TryOn,
}

#[derive(Debug, Serialize)]
struct PredictionInput<'a, T: Serialize> {
    task: PredictionTask,
    input: &'a T,
}

#[derive(Debug, Serialize)]
struct AnalyzeInput<'a> {
    description: &'a str,
}

/// Lifecycle of a remote prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

impl PredictionStatus {
    pub fn is_settled(self) -> bool {
        !matches!(self, PredictionStatus::Starting | PredictionStatus::Processing)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredictionUrls {
    pub get: String,
}

/// A prediction as reported by the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct Prediction {
    pub id: String,
    pub status: PredictionStatus,
    #[serde(default)]
    pub output: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub urls: Option<PredictionUrls>,
}

impl Prediction {
    /// Extract the first image URL from the output.
    ///
    /// Accepts a bare string, an array of strings, `{"url": ..}` or
    /// `{"images": [{"url": ..}]}`.
    pub fn output_url(&self) -> Option<String> {
        fn first_url(value: &serde_json::Value) -> Option<String> {
            match value {
                serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
                serde_json::Value::Array(items) => items.iter().find_map(first_url),
                serde_json::Value::Object(map) => map
                    .get("url")
                    .and_then(first_url)
                    .or_else(|| map.get("images").and_then(first_url)),
                _ => None,
            }
        }
        self.output.as_ref().and_then(first_url)
    }
}

// ---------------------------------------------------------------------------
// RemoteBackend
// ---------------------------------------------------------------------------

/// [`GenerationBackend`] talking to the gateway over HTTP.
pub struct RemoteBackend {
    client: reqwest::Client,
    config: RemoteConfig,
}

impl RemoteBackend {
    pub fn new(config: RemoteConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self::with_client(client, config))
    }

    /// Create a backend reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, config: RemoteConfig) -> Self {
        Self { client, config }
    }

    /// Create a prediction and wait for it to settle, returning its image URL.
    async fn predict<T: Serialize + Sync>(
        &self,
        task: PredictionTask,
        input: &T,
    ) -> Result<String, BackendError> {
        let request = self
            .authorize(
                self.client
                    .post(format!("{}/v1/predictions", self.config.base_url)),
            )
            .json(&PredictionInput { task, input });
        let mut prediction: Prediction = Self::parse_response(request.send().await?).await?;
        tracing::debug!(prediction_id = %prediction.id, ?task, "Prediction created");

        let mut attempts = 0;
        while !prediction.status.is_settled() {
            if attempts >= self.config.max_poll_attempts {
                return Err(BackendError::Timeout(self.config.poll_budget()));
            }
            attempts += 1;
            tokio::time::sleep(self.config.poll_interval).await;

            let url = match &prediction.urls {
                Some(urls) => urls.get.clone(),
                None => format!("{}/v1/predictions/{}", self.config.base_url, prediction.id),
            };
            let response = self.authorize(self.client.get(url)).send().await?;
            prediction = Self::parse_response(response).await?;
            tracing::trace!(
                prediction_id = %prediction.id,
                attempt = attempts,
                status = ?prediction.status,
                "Polled prediction",
            );
        }

        match prediction.status {
            PredictionStatus::Succeeded => prediction.output_url().ok_or(BackendError::NoOutput),
            PredictionStatus::Canceled => Err(BackendError::Failed(format!(
                "Prediction {} was canceled",
                prediction.id
            ))),
            _ => Err(BackendError::Failed(
                prediction
                    .error
                    .unwrap_or_else(|| "Unknown error".to_string()),
            )),
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Rejected credentials
    /// become [`BackendError::Unauthorized`]; other failures carry the
    /// status and body text.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        match status.as_u16() {
            401 | 403 => Err(BackendError::Unauthorized(body)),
            code => Err(BackendError::Api { status: code, body }),
        }
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, BackendError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl GenerationBackend for RemoteBackend {
    async fn analyze(&self, description: &str) -> Result<Analysis, BackendError> {
        let request = self
            .authorize(self.client.post(format!("{}/v1/analyze", self.config.base_url)))
            .json(&AnalyzeInput { description });
        Self::parse_response(request.send().await?).await
    }

    async fn generate_model_image(
        &self,
        request: &GenerationRequest,
    ) -> Result<String, BackendError> {
        self.predict(PredictionTask::ModelImage, request).await
    }

    async fn generate_jewelry_image(
        &self,
        request: &GenerationRequest,
    ) -> Result<String, BackendError> {
        self.predict(PredictionTask::JewelryImage, request).await
    }

    async fn compose_try_on(&self, request: &CompositionRequest) -> Result<String, BackendError> {
        self.predict(PredictionTask::TryOn, request).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
