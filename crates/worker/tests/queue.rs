mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use tokio_util::sync::CancellationToken;
use tryon_core::job::{
    SubmitJob, DEFAULT_SIZING_INFO, MSG_PARTIAL_GENERATION, MSG_TRY_ON_COMPLETED,
};
use tryon_core::status::JobStatus;
use tryon_db::models::job::Job;
use tryon_db::{MemoryStore, PersistenceError};
use tryon_events::JobEventKind;
use tryon_worker::{JobQueue, QueueConfig};

use common::{request, Reply, StubBackend};

const WAIT: Duration = Duration::from_secs(5);

/// A started queue over an in-memory store.
fn running(backend: StubBackend) -> (JobQueue, CancellationToken) {
    let queue = JobQueue::new(
        Arc::new(MemoryStore::new()),
        Arc::new(backend),
        QueueConfig {
            poll_interval: Duration::from_millis(20),
            ..Default::default()
        },
    );
    let cancel = CancellationToken::new();
    queue.start(cancel.clone());
    (queue, cancel)
}

async fn run_to_end(queue: &JobQueue, request: SubmitJob) -> Job {
    let submitted = queue.enqueue(request).await.unwrap();
    let job = queue
        .wait_for_terminal(&submitted.job_id, WAIT)
        .await
        .unwrap()
        .unwrap();
    assert!(job.status.is_terminal(), "job still {}", job.status);
    job
}

#[tokio::test]
async fn submit_without_session_mints_one() {
    let (queue, cancel) = running(StubBackend::new());

    let submitted = queue
        .enqueue(request("gold necklace on a model"))
        .await
        .unwrap();

    assert!(!submitted.job_id.is_empty());
    assert!(!submitted.session_id.is_empty());
    let session = queue.get_session(&submitted.session_id).await.unwrap().unwrap();
    assert_eq!(session.jobs, vec![submitted.job_id.clone()]);

    let job = queue
        .wait_for_terminal(&submitted.job_id, WAIT)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.session_id, submitted.session_id);
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.is_consistent());
    cancel.cancel();
}

#[tokio::test]
async fn duplicate_job_id_is_rejected() {
    let (queue, cancel) = running(StubBackend::new());
    queue.submit("job-1".into(), request("ring")).await.unwrap();

    assert_matches!(
        queue.submit("job-1".into(), request("ring")).await,
        Err(PersistenceError::Duplicate { entity: "job", .. })
    );
    cancel.cancel();
}

#[tokio::test]
async fn session_queries_list_newest_first() {
    let (queue, cancel) = running(StubBackend::new());
    let session = queue.create_session().await.unwrap();

    for id in ["a", "b", "c"] {
        queue
            .submit(
                id.to_string(),
                SubmitJob {
                    session_id: Some(session.id.clone()),
                    ..request("ring")
                },
            )
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    queue.submit("other".into(), request("ring")).await.unwrap();

    let ids: Vec<_> = queue
        .get_jobs_by_session(&session.id)
        .await
        .unwrap()
        .into_iter()
        .map(|j| j.id)
        .collect();
    assert_eq!(ids, vec!["c", "b", "a"]);

    let overview = queue.session_overview(&session.id).await.unwrap().unwrap();
    assert_eq!(overview.job_count, 3);
    assert_eq!(overview.session.jobs, vec!["a", "b", "c"]);
    assert!(overview.session.last_activity > session.last_activity);

    assert!(queue.session_overview("missing").await.unwrap().is_none());
    cancel.cancel();
}

#[tokio::test]
async fn provided_images_produce_full_try_on() {
    let (queue, cancel) = running(StubBackend::new());

    let job = run_to_end(
        &queue,
        SubmitJob {
            model_image: Some("https://cdn.example/me.png".into()),
            jewelry_image: Some("https://cdn.example/ring.png".into()),
            sizing: Some(7.0),
            ..request("silver ring on my hand")
        },
    )
    .await;

    assert_eq!(job.status, JobStatus::Completed);
    let result = job.result.unwrap();
    assert_eq!(
        result.generated_image_url.as_deref(),
        Some("https://img.example/try-on.png")
    );
    assert_eq!(result.model_image_url.as_deref(), Some("https://cdn.example/me.png"));
    assert_eq!(result.message, MSG_TRY_ON_COMPLETED);
    cancel.cancel();
}

#[tokio::test]
async fn missing_model_image_completes_partially() {
    let (queue, cancel) = running(StubBackend::new());

    let job = run_to_end(
        &queue,
        SubmitJob {
            jewelry_image: Some("https://cdn.example/necklace.png".into()),
            ..request("necklace")
        },
    )
    .await;

    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.error.is_none());
    let result = job.result.unwrap();
    assert!(result.generated_image_url.is_none());
    assert_eq!(
        result.jewelry_image_url.as_deref(),
        Some("https://cdn.example/necklace.png")
    );
    assert_eq!(result.message, MSG_PARTIAL_GENERATION);
    cancel.cancel();
}

#[tokio::test]
async fn unusable_sizing_uses_standard_sizing() {
    let backend = Arc::new(StubBackend::new());
    let queue = JobQueue::new(
        Arc::new(MemoryStore::new()),
        backend.clone(),
        QueueConfig {
            poll_interval: Duration::from_millis(20),
            ..Default::default()
        },
    );
    let cancel = CancellationToken::new();
    queue.start(cancel.clone());

    let job = run_to_end(
        &queue,
        SubmitJob {
            model_image: Some("https://cdn.example/me.png".into()),
            jewelry_image: Some("https://cdn.example/ring.png".into()),
            sizing: Some(0.0),
            ..request("silver ring on my hand")
        },
    )
    .await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.result.unwrap().message, MSG_TRY_ON_COMPLETED);
    assert_eq!(
        *backend.sizing_hints.lock().unwrap(),
        vec![DEFAULT_SIZING_INFO.to_string()]
    );
    cancel.cancel();
}

#[tokio::test]
async fn blank_model_image_counts_as_missing() {
    let (queue, cancel) = running(StubBackend::new());

    let job = run_to_end(
        &queue,
        SubmitJob {
            model_image: Some("  ".into()),
            jewelry_image: Some("https://cdn.example/necklace.png".into()),
            ..request("necklace")
        },
    )
    .await;

    assert_eq!(job.status, JobStatus::Completed);
    let result = job.result.unwrap();
    assert!(result.model_image_url.is_none());
    assert_eq!(result.message, MSG_PARTIAL_GENERATION);
    cancel.cancel();
}

#[tokio::test]
async fn model_auth_failure_does_not_fail_the_job() {
    let (queue, cancel) = running(StubBackend::generating_both().with_model(Reply::Unauthorized));

    let job = run_to_end(&queue, request("gold necklace on a model")).await;

    // Model generation only runs when no model image was supplied, so a
    // skipped model step leaves nothing to compose: completed, but partial.
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.error.is_none());
    let result = job.result.unwrap();
    assert!(result.model_image_url.is_none());
    assert_eq!(
        result.jewelry_image_url.as_deref(),
        Some("https://img.example/jewelry.png")
    );
    cancel.cancel();
}

#[tokio::test]
async fn generated_images_are_composed() {
    let (queue, cancel) = running(StubBackend::generating_both());

    let job = run_to_end(&queue, request("gold necklace on a model")).await;

    let result = job.result.unwrap();
    assert_eq!(
        result.generated_image_url.as_deref(),
        Some("https://img.example/try-on.png")
    );
    assert_eq!(
        result.model_image_url.as_deref(),
        Some("https://img.example/model.png")
    );
    cancel.cancel();
}

#[tokio::test]
async fn jewelry_failure_fails_the_job() {
    for model in [Reply::Url("https://img.example/model.png"), Reply::Unauthorized] {
        let (queue, cancel) = running(
            StubBackend::generating_both()
                .with_model(model)
                .with_jewelry(Reply::Fail("upstream returned 500")),
        );

        let job = run_to_end(&queue, request("gold necklace on a model")).await;

        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.result.is_none());
        let error = job.error.unwrap();
        assert!(error.contains("Jewelry generation"), "{error}");
        assert!(error.contains("upstream returned 500"), "{error}");
        assert!(job.completed_at.is_some());
        cancel.cancel();
    }
}

#[tokio::test]
async fn jewelry_auth_failure_is_not_skipped() {
    let (queue, cancel) = running(StubBackend::generating_both().with_jewelry(Reply::Unauthorized));

    let job = run_to_end(&queue, request("gold necklace on a model")).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.unwrap().contains("authentication failed"));
    cancel.cancel();
}

#[tokio::test]
async fn composition_failure_fails_the_job() {
    let (queue, cancel) = running(
        StubBackend::generating_both().with_compose(Reply::Fail("composition model overloaded")),
    );

    let job = run_to_end(&queue, request("gold necklace on a model")).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.unwrap().contains("composition model overloaded"));
    cancel.cancel();
}

#[tokio::test]
async fn invalid_payload_fails_at_execution() {
    let (queue, cancel) = running(StubBackend::new());

    let job = run_to_end(
        &queue,
        SubmitJob {
            job_type: Some("upscale".into()),
            ..request("ring")
        },
    )
    .await;

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.unwrap().contains("upscale"));
    cancel.cancel();
}

#[tokio::test]
async fn subscribers_see_claim_then_terminal_event() {
    let (queue, cancel) = running(StubBackend::new());
    let mut rx = queue.subscribe();

    let submitted = queue.enqueue(request("ring")).await.unwrap();

    let claimed = rx.recv().await.unwrap();
    assert_eq!(claimed.kind, JobEventKind::Claimed);
    assert_eq!(claimed.job_id, submitted.job_id);

    let done = rx.recv().await.unwrap();
    assert_eq!(done.kind, JobEventKind::Completed);
    assert_eq!(done.session_id, submitted.session_id);
    assert!(done.persisted);

    let stats = queue.stats().await.unwrap();
    assert_eq!(stats.store.total_jobs, 1);
    assert_eq!(stats.store.total_sessions, 1);
    cancel.cancel();
}

#[tokio::test]
async fn wait_for_terminal_reports_unknown_and_unfinished_jobs() {
    // Not started: jobs stay pending.
    let queue = JobQueue::new(
        Arc::new(MemoryStore::new()),
        Arc::new(StubBackend::new()),
        QueueConfig::default(),
    );
    assert!(queue
        .wait_for_terminal("missing", Duration::from_millis(10))
        .await
        .unwrap()
        .is_none());

    let submitted = queue.enqueue(request("ring")).await.unwrap();
    let job = queue
        .wait_for_terminal(&submitted.job_id, Duration::from_millis(50))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert!(job.started_at.is_none());
}
