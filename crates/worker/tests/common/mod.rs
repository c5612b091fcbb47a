#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tryon_core::job::SubmitJob;
use tryon_db::{Store, StoreStats};
use tryon_pipeline::{
    Analysis, BackendError, CompositionRequest, GenerationBackend, GenerationRequest,
};

/// Scripted outcome of one backend call.
#[derive(Debug, Clone)]
pub enum Reply {
    Url(&'static str),
    Unauthorized,
    Fail(&'static str),
}

impl Reply {
    fn into_result(self) -> Result<String, BackendError> {
        match self {
            Reply::Url(url) => Ok(url.to_string()),
            Reply::Unauthorized => Err(BackendError::Unauthorized("invalid API key".into())),
            Reply::Fail(message) => Err(BackendError::Failed(message.into())),
        }
    }
}

/// Backend stub with scripted replies.
///
/// When gated, every `analyze` call waits for a permit on the gate, which
/// lets tests hold jobs in `processing`. `active`/`peak` count concurrent
/// `analyze` calls.
pub struct StubBackend {
    pub analysis: Analysis,
    pub model: Reply,
    pub jewelry: Reply,
    pub compose: Reply,
    gate: Option<Arc<Semaphore>>,
    active: AtomicUsize,
    peak: AtomicUsize,
    pub analyzed: Mutex<Vec<String>>,
    pub sizing_hints: Mutex<Vec<String>>,
}

impl StubBackend {
    pub fn new() -> Self {
        Self {
            analysis: Analysis::default(),
            model: Reply::Url("https://img.example/model.png"),
            jewelry: Reply::Url("https://img.example/jewelry.png"),
            compose: Reply::Url("https://img.example/try-on.png"),
            gate: None,
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            analyzed: Mutex::new(Vec::new()),
            sizing_hints: Mutex::new(Vec::new()),
        }
    }

    /// Analysis asking for both images with prompts.
    pub fn generating_both() -> Self {
        Self {
            analysis: Analysis {
                needs_model_generation: true,
                needs_jewelry_generation: true,
                reasoning: "nothing supplied".into(),
                jewelry_category: Some("necklaces".into()),
                suggested_model_prompt: Some("woman in studio light".into()),
                suggested_jewelry_prompt: Some("gold chain necklace".into()),
            },
            ..Self::new()
        }
    }

    pub fn with_model(mut self, reply: Reply) -> Self {
        self.model = reply;
        self
    }

    pub fn with_jewelry(mut self, reply: Reply) -> Self {
        self.jewelry = reply;
        self
    }

    pub fn with_compose(mut self, reply: Reply) -> Self {
        self.compose = reply;
        self
    }

    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationBackend for StubBackend {
    async fn analyze(&self, description: &str) -> Result<Analysis, BackendError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.analyzed
            .lock()
            .unwrap()
            .push(description.to_string());

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }

        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(self.analysis.clone())
    }

    async fn generate_model_image(
        &self,
        _request: &GenerationRequest,
    ) -> Result<String, BackendError> {
        self.model.clone().into_result()
    }

    async fn generate_jewelry_image(
        &self,
        _request: &GenerationRequest,
    ) -> Result<String, BackendError> {
        self.jewelry.clone().into_result()
    }

    async fn compose_try_on(&self, request: &CompositionRequest) -> Result<String, BackendError> {
        self.sizing_hints
            .lock()
            .unwrap()
            .push(request.sizing_info.clone());
        self.compose.clone().into_result()
    }
}

pub fn request(description: &str) -> SubmitJob {
    SubmitJob {
        description: Some(description.to_string()),
        ..Default::default()
    }
}

/// Poll the store until its counters satisfy `check`, failing the test
/// after five seconds.
pub async fn wait_for_stats(store: &dyn Store, what: &str, check: impl Fn(&StoreStats) -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let stats = store.stats().await.unwrap();
        if check(&stats) {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for: {what} (last stats: {stats:?})"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Poll `check` until it holds, failing the test after five seconds.
pub async fn wait_until(what: &str, check: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for: {what}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
