//! Job orchestrator.
//!
//! Accepts mutating requests for a subject, claims the subject through the
//! store's compare-and-swap, and runs the generator in a background task
//! tracked by a [`TaskTracker`]. The request returns as soon as the claim
//! succeeds; clients poll [`JobOrchestrator::status`] for the outcome.
//!
//! Every subject with a supervising task in this process is held in an
//! in-memory live set. A record that reads `in_progress` while its subject is
//! not live belongs to a job that died with a previous process (or panicked)
//! and is reconciled to `error("interrupted")` on access. Any operation that
//! writes a subject's record first reserves the subject in the live set, so a
//! reconcile can never race a fresh claim.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use packforge_core::artifact::{ArtifactKind, ArtifactRefs};
use packforge_core::error::CoreError;
use packforge_core::job_events::{
    EVENT_JOB_CLEARED, EVENT_JOB_COMPLETED, EVENT_JOB_FAILED, EVENT_JOB_INTERRUPTED,
    EVENT_JOB_PROGRESS, EVENT_JOB_REWOUND, EVENT_JOB_SEEDED, EVENT_JOB_STARTED,
};
use packforge_core::protocol::ArtifactPayload;
use packforge_core::status::{IterationKind, JobKind};
use packforge_core::subject::{SubjectId, PANEL_PREFIX};
use packforge_db::models::iteration::{Iteration, NewIteration};
use packforge_db::models::job_record::{JobRecord, StatusTransition};
use packforge_db::repositories::{
    ClearOutcome, IterationRepo, JobRecordRepo, RewindOutcome,
};
use packforge_db::DbPool;
use packforge_events::{EventBus, JobEvent};
use tokio_util::task::TaskTracker;

use crate::generator::{GenerationRequest, Generator, JobPayload, ProgressReporter};

/// Recorded when a generator reports success without any artifacts.
pub const EMPTY_RESULT_ERROR: &str = "generation returned no artifacts";

/// Rejection for an edit with nothing to edit.
pub const NO_BASE_PRODUCT: &str = "No base product available to edit";

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Outcome of [`JobOrchestrator::clear_all`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ClearAllOutcome {
    pub cleared: Vec<SubjectId>,
    /// Subjects skipped because a job is running for them.
    pub busy: Vec<SubjectId>,
}

type LiveSet = Arc<Mutex<HashSet<SubjectId>>>;

fn lock(live: &LiveSet) -> MutexGuard<'_, HashSet<SubjectId>> {
    live.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Exclusive hold on a subject. Released on drop.
struct LiveGuard {
    live: LiveSet,
    subject: SubjectId,
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        lock(&self.live).remove(&self.subject);
    }
}

pub struct JobOrchestrator {
    pool: DbPool,
    generator: Arc<dyn Generator>,
    event_bus: Arc<EventBus>,
    live: LiveSet,
    tracker: TaskTracker,
}

impl JobOrchestrator {
    pub fn new(pool: DbPool, generator: Arc<dyn Generator>, event_bus: Arc<EventBus>) -> Self {
        Self {
            pool,
            generator,
            event_bus,
            live: Arc::default(),
            tracker: TaskTracker::new(),
        }
    }

    /// Whether a task in this process currently holds the subject.
    pub fn is_live(&self, subject: &SubjectId) -> bool {
        lock(&self.live).contains(subject)
    }

    /// Number of background jobs still running.
    pub fn running_jobs(&self) -> usize {
        self.tracker.len()
    }

    fn reserve(&self, subject: &SubjectId) -> Result<LiveGuard, CoreError> {
        if !lock(&self.live).insert(subject.clone()) {
            return Err(CoreError::already_generating(subject.as_str()));
        }
        Ok(LiveGuard {
            live: Arc::clone(&self.live),
            subject: subject.clone(),
        })
    }

    fn publish(&self, event_type: &str, subject: &SubjectId, payload: serde_json::Value) {
        self.event_bus
            .publish(JobEvent::new(event_type).for_subject(subject).with_payload(payload));
    }

    // -----------------------------------------------------------------------
    // Starting jobs
    // -----------------------------------------------------------------------

    /// Claim `subject` and start generating `payload` in the background.
    ///
    /// Returns the freshly claimed `in_progress` record, or
    /// [`CoreError::Conflict`] if the subject already has a job in flight.
    /// Nothing is queued.
    pub async fn start_job(
        &self,
        subject: SubjectId,
        payload: JobPayload,
    ) -> Result<JobRecord, OrchestratorError> {
        check_payload_fits_subject(&subject, &payload)?;
        let guard = self.reserve(&subject)?;

        let mut record = JobRecordRepo::get(&self.pool, &subject).await?;
        if record.is_in_progress() {
            // The reservation proves nothing here supervises it.
            self.interrupt(&subject).await?;
            record = JobRecordRepo::get(&self.pool, &subject).await?;
        }

        let kind = payload.kind();
        if kind == JobKind::Edit && !record.current_artifact_refs.contains_key(&ArtifactKind::Model)
        {
            return Err(CoreError::Validation(NO_BASE_PRODUCT.into()).into());
        }

        let claimed = JobRecordRepo::compare_and_swap_status(
            &self.pool,
            &subject,
            record.status,
            &StatusTransition::start(kind, starting_message(kind)),
        )
        .await?;
        if !claimed {
            return Err(CoreError::already_generating(subject.as_str()).into());
        }

        tracing::info!(subject_id = %subject, job_kind = %kind, "Generation job started");
        self.publish(
            EVENT_JOB_STARTED,
            &subject,
            serde_json::json!({ "job_kind": kind, "prompt": payload.prompt() }),
        );

        let claimed_record = JobRecordRepo::get(&self.pool, &subject).await?;
        let run = JobRun {
            pool: self.pool.clone(),
            generator: Arc::clone(&self.generator),
            event_bus: Arc::clone(&self.event_bus),
            request: GenerationRequest {
                subject_id: subject,
                payload,
                base_artifacts: record.current_artifact_refs,
            },
            guard,
        };
        self.tracker.spawn(run.execute());

        Ok(claimed_record)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Current record of a subject, reconciling a stale `in_progress` first.
    pub async fn status(&self, subject: &SubjectId) -> Result<JobRecord, OrchestratorError> {
        let record = JobRecordRepo::get(&self.pool, subject).await?;
        if record.is_in_progress() && !self.is_live(subject) && self.reconcile(subject).await? {
            return Ok(JobRecordRepo::get(&self.pool, subject).await?);
        }
        Ok(record)
    }

    pub async fn history(&self, subject: &SubjectId) -> Result<Vec<Iteration>, OrchestratorError> {
        Ok(IterationRepo::list_for_subject(&self.pool, subject).await?)
    }

    /// Records of every panel that has ever been touched.
    pub async fn panels(&self) -> Result<Vec<JobRecord>, OrchestratorError> {
        let records = JobRecordRepo::list_by_prefix(&self.pool, PANEL_PREFIX).await?;
        let mut out = Vec::with_capacity(records.len());
        for record in records {
            if record.is_in_progress() {
                out.push(self.status(&record.subject_id).await?);
            } else {
                out.push(record);
            }
        }
        Ok(out)
    }

    /// The reference for one artifact kind of a subject.
    ///
    /// While a job runs the artifact is [`ArtifactPayload::NotReady`] even
    /// if an older reference exists, so pollers never pick up a stale one.
    /// A missing reference outside a job is `NotFound`.
    pub async fn artifact(
        &self,
        subject: &SubjectId,
        kind: ArtifactKind,
    ) -> Result<ArtifactPayload, OrchestratorError> {
        let record = self.status(subject).await?;
        if record.is_in_progress() {
            return Ok(ArtifactPayload::NotReady {
                subject_id: subject.clone(),
                kind,
            });
        }
        match record.current_artifact_refs.get(&kind) {
            Some(reference) => Ok(ArtifactPayload::Ready {
                subject_id: subject.clone(),
                kind,
                reference: reference.clone(),
            }),
            None => Err(CoreError::NotFound {
                entity: "artifact",
                id: format!("{subject}/{kind}"),
            }
            .into()),
        }
    }

    // -----------------------------------------------------------------------
    // Synchronous mutations
    // -----------------------------------------------------------------------

    /// Point the subject's active artifacts at iteration `index` (0-based).
    ///
    /// Returns the updated record and the history length, which is never
    /// changed by a rewind.
    pub async fn rewind(
        &self,
        subject: &SubjectId,
        index: usize,
    ) -> Result<(JobRecord, usize), OrchestratorError> {
        let _guard = self.reserve(subject)?;
        self.interrupt_if_stale(subject).await?;

        match JobRecordRepo::rewind(&self.pool, subject, index).await? {
            RewindOutcome::Rewound {
                record,
                total_iterations,
            } => {
                tracing::info!(subject_id = %subject, index, "Rewound to iteration");
                self.publish(
                    EVENT_JOB_REWOUND,
                    subject,
                    serde_json::json!({
                        "iteration_index": index,
                        "iteration_id": record.current_iteration_id,
                    }),
                );
                Ok((record, total_iterations))
            }
            RewindOutcome::InProgress => Err(CoreError::already_generating(subject.as_str()).into()),
            RewindOutcome::IndexOutOfRange { total_iterations } => Err(CoreError::NotFound {
                entity: "iteration",
                id: format!("{index} (history has {total_iterations})"),
            }
            .into()),
        }
    }

    /// Reconcile a stale `in_progress` record on request.
    ///
    /// Returns whether anything was reconciled, plus the current record.
    pub async fn recover(&self, subject: &SubjectId) -> Result<(bool, JobRecord), OrchestratorError> {
        let record = JobRecordRepo::get(&self.pool, subject).await?;
        let recovered =
            record.is_in_progress() && !self.is_live(subject) && self.reconcile(subject).await?;
        Ok((recovered, JobRecordRepo::get(&self.pool, subject).await?))
    }

    /// Drop a subject's current artifacts. History is kept.
    pub async fn clear(&self, subject: &SubjectId) -> Result<JobRecord, OrchestratorError> {
        let _guard = self.reserve(subject)?;
        self.interrupt_if_stale(subject).await?;

        match JobRecordRepo::clear_artifacts(&self.pool, subject).await? {
            ClearOutcome::InProgress => {
                return Err(CoreError::already_generating(subject.as_str()).into())
            }
            ClearOutcome::Cleared => {
                tracing::info!(subject_id = %subject, "Cleared subject artifacts");
                self.publish(EVENT_JOB_CLEARED, subject, serde_json::json!({}));
            }
            ClearOutcome::NothingStored => {}
        }
        Ok(JobRecordRepo::get(&self.pool, subject).await?)
    }

    /// Clear the product and every panel, skipping subjects with a running
    /// job.
    pub async fn clear_all(&self) -> Result<ClearAllOutcome, OrchestratorError> {
        let mut subjects = vec![SubjectId::product()];
        subjects.extend(
            JobRecordRepo::list_by_prefix(&self.pool, PANEL_PREFIX)
                .await?
                .into_iter()
                .map(|r| r.subject_id),
        );

        let mut outcome = ClearAllOutcome::default();
        for subject in subjects {
            match self.clear(&subject).await {
                Ok(_) => outcome.cleared.push(subject),
                Err(OrchestratorError::Core(CoreError::Conflict(_))) => outcome.busy.push(subject),
                Err(e) => return Err(e),
            }
        }
        Ok(outcome)
    }

    /// Append a pre-generated iteration and make it current.
    pub async fn seed(
        &self,
        subject: &SubjectId,
        kind: IterationKind,
        prompt: &str,
        refs: ArtifactRefs,
        note: &str,
    ) -> Result<Iteration, OrchestratorError> {
        let _guard = self.reserve(subject)?;
        self.interrupt_if_stale(subject).await?;

        let new = NewIteration {
            kind,
            prompt: prompt.to_string(),
            artifact_refs: refs,
            note: Some(note.to_string()),
            duration_seconds: None,
        };
        let iteration = JobRecordRepo::seed_iteration(&self.pool, subject, &new)
            .await?
            .ok_or_else(|| CoreError::already_generating(subject.as_str()))?;

        self.publish(
            EVENT_JOB_SEEDED,
            subject,
            serde_json::json!({ "iteration_id": iteration.id }),
        );
        Ok(iteration)
    }

    // -----------------------------------------------------------------------
    // Reconciliation and lifecycle
    // -----------------------------------------------------------------------

    /// Reconcile every `in_progress` record left by a previous process.
    ///
    /// Must run before the server accepts requests.
    pub async fn reconcile_at_startup(&self) -> Result<Vec<SubjectId>, OrchestratorError> {
        let subjects = JobRecordRepo::reconcile_all_interrupted(&self.pool).await?;
        for subject in &subjects {
            tracing::warn!(subject_id = %subject, "Reconciled interrupted job at startup");
            self.publish(
                EVENT_JOB_INTERRUPTED,
                subject,
                serde_json::json!({ "reason": "startup" }),
            );
        }
        Ok(subjects)
    }

    /// Stop accepting tracked work and wait for running jobs.
    ///
    /// Returns `false` if jobs were still running when `timeout` elapsed.
    /// Those records are reconciled on the next startup.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let running = self.tracker.len();
        if running > 0 {
            tracing::info!(running, "Waiting for generation jobs to finish");
        }
        tokio::time::timeout(timeout, self.tracker.wait()).await.is_ok()
    }

    /// Reserve the subject and reconcile it if its record is stale.
    async fn reconcile(&self, subject: &SubjectId) -> Result<bool, OrchestratorError> {
        let Ok(_guard) = self.reserve(subject) else {
            return Ok(false);
        };
        self.interrupt(subject).await
    }

    /// Reconcile under an already held reservation.
    async fn interrupt_if_stale(&self, subject: &SubjectId) -> Result<(), OrchestratorError> {
        if JobRecordRepo::get(&self.pool, subject).await?.is_in_progress() {
            self.interrupt(subject).await?;
        }
        Ok(())
    }

    /// Mark the subject interrupted. Caller must hold its reservation.
    async fn interrupt(&self, subject: &SubjectId) -> Result<bool, OrchestratorError> {
        let interrupted = JobRecordRepo::mark_interrupted(&self.pool, subject).await?;
        if interrupted {
            tracing::warn!(subject_id = %subject, "Reconciled interrupted job");
            self.publish(
                EVENT_JOB_INTERRUPTED,
                subject,
                serde_json::json!({ "reason": "no_live_task" }),
            );
        }
        Ok(interrupted)
    }
}

fn check_payload_fits_subject(subject: &SubjectId, payload: &JobPayload) -> Result<(), CoreError> {
    let is_panel_job = payload.kind() == JobKind::PanelTexture;
    if subject.is_product() == is_panel_job {
        return Err(CoreError::Validation(format!(
            "{} jobs cannot run for subject {subject}",
            payload.kind()
        )));
    }
    Ok(())
}

fn starting_message(kind: JobKind) -> &'static str {
    match kind {
        JobKind::Create => "Starting generation...",
        JobKind::Edit => "Starting edit...",
        JobKind::PanelTexture => "Starting texture generation...",
    }
}

// ---------------------------------------------------------------------------
// Background job
// ---------------------------------------------------------------------------

/// Writes generator milestones to the store and the event bus.
struct StoreProgress {
    pool: DbPool,
    event_bus: Arc<EventBus>,
    subject: SubjectId,
}

#[async_trait::async_trait]
impl ProgressReporter for StoreProgress {
    async fn report(&self, percent: u8, message: &str) {
        match JobRecordRepo::update_progress(&self.pool, &self.subject, percent, message).await {
            Ok(true) => {
                tracing::debug!(subject_id = %self.subject, percent, stage = message, "Job progress");
                self.event_bus.publish(
                    JobEvent::new(EVENT_JOB_PROGRESS)
                        .for_subject(&self.subject)
                        .with_payload(serde_json::json!({ "progress": percent, "message": message })),
                );
            }
            Ok(false) => {}
            Err(e) => {
                tracing::error!(subject_id = %self.subject, error = %e, "Failed to record progress");
            }
        }
    }
}

/// Everything a background job owns. Dropping it releases the subject.
struct JobRun {
    pool: DbPool,
    generator: Arc<dyn Generator>,
    event_bus: Arc<EventBus>,
    request: GenerationRequest,
    guard: LiveGuard,
}

impl JobRun {
    async fn execute(self) {
        let subject = self.request.subject_id.clone();
        let started = Instant::now();
        let progress = StoreProgress {
            pool: self.pool.clone(),
            event_bus: Arc::clone(&self.event_bus),
            subject: subject.clone(),
        };

        let outcome = self.generator.generate(&self.request, &progress).await;
        let duration = started.elapsed().as_secs_f64();

        let recorded = match outcome {
            Ok(refs) if refs.is_empty() => self.record_failure(EMPTY_RESULT_ERROR).await,
            Ok(refs) => self.record_success(refs, duration).await,
            Err(e) => self.record_failure(&e.to_string()).await,
        };
        if let Err(e) = recorded {
            // Left in_progress; reconciled as interrupted once the guard drops.
            tracing::error!(subject_id = %subject, error = %e, "Failed to record job outcome");
        }

        drop(self.guard);
    }

    async fn record_success(&self, refs: ArtifactRefs, duration: f64) -> Result<(), sqlx::Error> {
        let subject = &self.request.subject_id;
        let new = NewIteration {
            kind: self.request.payload.kind().iteration_kind(),
            prompt: self.request.payload.prompt().to_string(),
            artifact_refs: refs,
            note: None,
            duration_seconds: Some(duration),
        };

        match JobRecordRepo::complete_with_iteration(&self.pool, subject, &new).await? {
            Some(iteration) => {
                tracing::info!(
                    subject_id = %subject,
                    iteration_id = %iteration.id,
                    duration_seconds = duration,
                    "Generation job complete",
                );
                self.event_bus.publish(
                    JobEvent::new(EVENT_JOB_COMPLETED)
                        .for_subject(subject)
                        .with_payload(serde_json::json!({
                            "iteration_id": iteration.id,
                            "duration_seconds": duration,
                            "artifacts": iteration.artifact_refs,
                        })),
                );
            }
            None => {
                tracing::warn!(subject_id = %subject, "Job no longer in progress, result discarded");
            }
        }
        Ok(())
    }

    async fn record_failure(&self, error: &str) -> Result<(), sqlx::Error> {
        let subject = &self.request.subject_id;
        tracing::warn!(subject_id = %subject, error, "Generation job failed");

        if JobRecordRepo::fail(&self.pool, subject, error).await? {
            self.event_bus.publish(
                JobEvent::new(EVENT_JOB_FAILED)
                    .for_subject(subject)
                    .with_payload(serde_json::json!({ "error": error })),
            );
        }
        Ok(())
    }
}
