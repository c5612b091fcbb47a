//! Admission-controlled job dispatcher.
//!
//! Pending work is always read from the store, never held in memory. The
//! dispatcher owns a semaphore of `max_concurrent` permits; a job is
//! launched only after a permit is taken *and* the store's conditional
//! claim (`pending -> processing`) succeeds. Whoever loses a claim race
//! simply drops the permit and moves on.
//!
//! Re-entry is message based: submissions and finished jobs call
//! [`Dispatcher::wake`], which signals the single [`Dispatcher::run`] loop.
//! A periodic tick picks up work enqueued by other processes.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::Instrument;
use tryon_core::types::JobId;
use tryon_db::{PersistenceError, Store};
use tryon_events::{EventBus, JobEvent};

use crate::executor::Executor;

/// Default dispatcher capacity.
pub const DEFAULT_MAX_CONCURRENT: usize = 10;

/// Default fallback polling interval.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Shortest accepted polling interval; `tokio::time::interval` rejects zero.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy)]
pub struct DispatcherConfig {
    /// Upper bound on jobs this instance keeps in `processing`.
    pub max_concurrent: usize,
    pub poll_interval: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

type InFlight = Arc<Mutex<HashSet<JobId>>>;

fn lock(in_flight: &Mutex<HashSet<JobId>>) -> MutexGuard<'_, HashSet<JobId>> {
    in_flight.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Holds a job's slot. Dropping it frees the slot and wakes the dispatcher,
/// whether the job finished, panicked or lost its claim.
struct InFlightGuard {
    job_id: JobId,
    in_flight: InFlight,
    permit: Option<OwnedSemaphorePermit>,
    wake: Arc<Notify>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock(&self.in_flight).remove(&self.job_id);
        // Release capacity before signalling so the woken cycle sees it.
        drop(self.permit.take());
        self.wake.notify_one();
    }
}

/// Bounded FIFO scheduler for pending jobs.
pub struct Dispatcher {
    store: Arc<dyn Store>,
    executor: Arc<Executor>,
    events: Arc<EventBus>,
    config: DispatcherConfig,
    permits: Arc<Semaphore>,
    in_flight: InFlight,
    wake: Arc<Notify>,
    tasks: TaskTracker,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn Store>,
        executor: Arc<Executor>,
        events: Arc<EventBus>,
        config: DispatcherConfig,
    ) -> Self {
        let max_concurrent = config.max_concurrent.max(1);
        Self {
            store,
            executor,
            events,
            config: DispatcherConfig {
                max_concurrent,
                poll_interval: config.poll_interval.max(MIN_POLL_INTERVAL),
            },
            permits: Arc::new(Semaphore::new(max_concurrent)),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            wake: Arc::new(Notify::new()),
            tasks: TaskTracker::new(),
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.config.max_concurrent
    }

    /// Signal that work may be available. Never blocks; wake-ups sent
    /// while a cycle is running are coalesced into one more cycle.
    pub fn wake(&self) {
        self.wake.notify_one();
    }

    /// Ids of jobs this instance currently holds a slot for.
    pub fn in_flight_jobs(&self) -> Vec<JobId> {
        lock(&self.in_flight).iter().cloned().collect()
    }

    pub fn in_flight_count(&self) -> usize {
        lock(&self.in_flight).len()
    }

    /// Run the dispatch loop until the cancellation token is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            max_concurrent = self.config.max_concurrent,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "Job dispatcher started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(in_flight = self.in_flight_count(), "Job dispatcher shutting down");
                    break;
                }
                _ = self.wake.notified() => {}
                _ = ticker.tick() => {}
            }

            if let Err(e) = self.dispatch().await {
                tracing::error!(error = %e, "Dispatch cycle failed");
            }
        }
    }

    /// One admission cycle. Claims up to the free capacity of pending jobs,
    /// oldest first, and launches an executor task for each.
    ///
    /// Returns how many jobs were launched. Store errors abort the cycle;
    /// jobs already launched keep running.
    pub async fn dispatch(&self) -> Result<usize, PersistenceError> {
        let free = self.permits.available_permits();
        if free == 0 {
            return Ok(0);
        }

        let pending = self.store.list_pending(free).await?;
        let mut launched = 0;

        for job in pending {
            // Capacity may have been taken by a concurrent cycle.
            let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() else {
                break;
            };

            if !lock(&self.in_flight).insert(job.id.clone()) {
                continue;
            }
            let guard = InFlightGuard {
                job_id: job.id.clone(),
                in_flight: Arc::clone(&self.in_flight),
                permit: Some(permit),
                wake: Arc::clone(&self.wake),
            };

            let claimed = match self.store.claim(&job.id).await? {
                Some(claimed) => claimed,
                None => {
                    tracing::debug!(job_id = %job.id, "Lost claim race, skipping job");
                    continue;
                }
            };

            tracing::info!(
                job_id = %claimed.id,
                session_id = %claimed.session_id,
                in_flight = self.in_flight_count(),
                "Job claimed",
            );
            self.events
                .publish(JobEvent::claimed(&claimed.id, &claimed.session_id));

            let executor = Arc::clone(&self.executor);
            let span = tracing::info_span!("job", job_id = %claimed.id);
            self.tasks.spawn(
                async move {
                    let _guard = guard;
                    executor.execute(&claimed).await;
                }
                .instrument(span),
            );
            launched += 1;
        }

        Ok(launched)
    }

    /// Stop accepting new tasks and wait for running jobs, up to `timeout`.
    /// Returns `false` if jobs were still running when the window closed.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.tasks.close();
        tokio::time::timeout(timeout, self.tasks.wait()).await.is_ok()
    }
}
