//! Integration tests for the job store repositories.
//!
//! Exercises the CAS claim, progress updates, atomic completion, rewind,
//! interruption reconciliation and clearing against a real SQLite database.

use assert_matches::assert_matches;
use packforge_core::artifact::{ArtifactKind, ArtifactRefs};
use packforge_core::job_events::INTERRUPTED_ERROR;
use packforge_core::status::{IterationKind, JobKind, JobStatus};
use packforge_core::subject::SubjectId;
use packforge_db::models::iteration::NewIteration;
use packforge_db::models::job_event::JobEventQuery;
use packforge_db::models::job_record::StatusTransition;
use packforge_db::repositories::{
    ClearOutcome, IterationRepo, JobEventRepo, JobRecordRepo, RewindOutcome,
};
use sqlx::SqlitePool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn product() -> SubjectId {
    SubjectId::product()
}

fn model_refs(url: &str) -> ArtifactRefs {
    let mut refs = ArtifactRefs::new();
    refs.insert(ArtifactKind::Model, url.to_string());
    refs
}

fn new_iteration(kind: IterationKind, prompt: &str, url: &str) -> NewIteration {
    NewIteration {
        kind,
        prompt: prompt.to_string(),
        artifact_refs: model_refs(url),
        note: None,
        duration_seconds: Some(1.5),
    }
}

async fn claim(pool: &SqlitePool, subject: &SubjectId, kind: JobKind) -> bool {
    let current = JobRecordRepo::get(pool, subject).await.unwrap();
    JobRecordRepo::compare_and_swap_status(
        pool,
        subject,
        current.status,
        &StatusTransition::start(kind, "Preparing"),
    )
    .await
    .unwrap()
}

/// Run one full create/edit job to completion.
async fn run_job(pool: &SqlitePool, subject: &SubjectId, kind: JobKind, prompt: &str, url: &str) {
    assert!(claim(pool, subject, kind).await, "claim should succeed");
    let new = new_iteration(kind.iteration_kind(), prompt, url);
    JobRecordRepo::complete_with_iteration(pool, subject, &new)
        .await
        .unwrap()
        .expect("job should complete");
}

// ---------------------------------------------------------------------------
// Get
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn unknown_subject_reads_as_idle_zero_value(pool: SqlitePool) {
    let record = JobRecordRepo::get(&pool, &product()).await.unwrap();

    assert_eq!(record.status, JobStatus::Idle);
    assert_eq!(record.progress, 0);
    assert!(record.current_artifact_refs.is_empty());
    assert!(record.last_error.is_none());
    assert!(record.updated_at.is_none());
    assert!(JobRecordRepo::find(&pool, &product()).await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Compare-and-swap
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn claim_creates_record_and_second_claim_fails(pool: SqlitePool) {
    let subject = product();

    assert!(claim(&pool, &subject, JobKind::Create).await);
    let record = JobRecordRepo::get(&pool, &subject).await.unwrap();
    assert_eq!(record.status, JobStatus::InProgress);
    assert_eq!(record.job_kind, Some(JobKind::Create));
    assert_eq!(record.progress, 0);
    assert!(record.started_at.is_some());

    let second = JobRecordRepo::compare_and_swap_status(
        &pool,
        &subject,
        JobStatus::Idle,
        &StatusTransition::start(JobKind::Edit, "Preparing edit"),
    )
    .await
    .unwrap();
    assert!(!second, "idle -> in_progress must fail while in progress");

    let unchanged = JobRecordRepo::get(&pool, &subject).await.unwrap();
    assert_eq!(unchanged.job_kind, Some(JobKind::Create));
}

#[sqlx::test(migrations = "./migrations")]
async fn concurrent_claims_have_exactly_one_winner(pool: SqlitePool) {
    let subject = product();
    let transition = StatusTransition::start(JobKind::Create, "Preparing");

    let attempts = (0..8).map(|_| {
        JobRecordRepo::compare_and_swap_status(&pool, &subject, JobStatus::Idle, &transition)
    });
    let results = futures::future::join_all(attempts).await;

    let winners = results
        .into_iter()
        .map(|r| r.unwrap())
        .filter(|won| *won)
        .count();
    assert_eq!(winners, 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn claim_clears_previous_error(pool: SqlitePool) {
    let subject = product();
    assert!(claim(&pool, &subject, JobKind::Create).await);
    assert!(JobRecordRepo::fail(&pool, &subject, "model exploded").await.unwrap());

    assert!(claim(&pool, &subject, JobKind::Create).await);
    let record = JobRecordRepo::get(&pool, &subject).await.unwrap();
    assert_eq!(record.status, JobStatus::InProgress);
    assert!(record.last_error.is_none());
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn progress_never_decreases(pool: SqlitePool) {
    let subject = product();
    assert!(claim(&pool, &subject, JobKind::Create).await);

    JobRecordRepo::update_progress(&pool, &subject, 45, "Generating model").await.unwrap();
    JobRecordRepo::update_progress(&pool, &subject, 20, "Late message").await.unwrap();

    let record = JobRecordRepo::get(&pool, &subject).await.unwrap();
    assert_eq!(record.progress, 45);
    assert_eq!(record.message, "Late message");
}

#[sqlx::test(migrations = "./migrations")]
async fn progress_is_ignored_when_not_in_progress(pool: SqlitePool) {
    let updated = JobRecordRepo::update_progress(&pool, &product(), 50, "nobody home")
        .await
        .unwrap();
    assert!(!updated);
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn completion_appends_iteration_atomically(pool: SqlitePool) {
    let subject = product();
    run_job(&pool, &subject, JobKind::Create, "a running shoe", "https://cdn/v1.glb").await;

    let record = JobRecordRepo::get(&pool, &subject).await.unwrap();
    let history = IterationRepo::list_for_subject(&pool, &subject).await.unwrap();

    assert_eq!(record.status, JobStatus::Complete);
    assert_eq!(record.progress, 100);
    assert!(record.started_at.is_none());
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].kind, IterationKind::Create);
    assert_eq!(record.current_iteration_id, Some(history[0].id));
    assert_eq!(record.current_artifact_refs, history[0].artifact_refs);
}

#[sqlx::test(migrations = "./migrations")]
async fn completion_without_claim_writes_nothing(pool: SqlitePool) {
    let subject = product();
    let new = new_iteration(IterationKind::Create, "orphan", "https://cdn/x.glb");

    let result = JobRecordRepo::complete_with_iteration(&pool, &subject, &new)
        .await
        .unwrap();

    assert!(result.is_none());
    assert_eq!(IterationRepo::count_for_subject(&pool, &subject).await.unwrap(), 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn failure_keeps_artifacts_and_history(pool: SqlitePool) {
    let subject = product();
    run_job(&pool, &subject, JobKind::Create, "a running shoe", "https://cdn/v1.glb").await;

    assert!(claim(&pool, &subject, JobKind::Edit).await);
    assert!(JobRecordRepo::fail(&pool, &subject, "quota exceeded").await.unwrap());

    let record = JobRecordRepo::get(&pool, &subject).await.unwrap();
    assert_eq!(record.status, JobStatus::Error);
    assert_eq!(record.last_error.as_deref(), Some("quota exceeded"));
    assert_eq!(record.current_artifact_refs, model_refs("https://cdn/v1.glb"));
    assert_eq!(IterationRepo::count_for_subject(&pool, &subject).await.unwrap(), 1);
}

// ---------------------------------------------------------------------------
// Rewind
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn rewind_moves_pointer_without_touching_history(pool: SqlitePool) {
    let subject = product();
    run_job(&pool, &subject, JobKind::Create, "a running shoe", "https://cdn/v1.glb").await;
    run_job(&pool, &subject, JobKind::Edit, "add red stripes", "https://cdn/v2.glb").await;

    let outcome = JobRecordRepo::rewind(&pool, &subject, 0).await.unwrap();
    let history = IterationRepo::list_for_subject(&pool, &subject).await.unwrap();

    assert_matches!(outcome, RewindOutcome::Rewound { record, total_iterations: 2 } => {
        assert_eq!(record.status, JobStatus::Complete);
        assert_eq!(record.current_artifact_refs, history[0].artifact_refs);
        assert_eq!(record.current_iteration_id, Some(history[0].id));
    });
    assert_eq!(history.len(), 2);
}

#[sqlx::test(migrations = "./migrations")]
async fn rewind_rejects_bad_index_and_in_flight_jobs(pool: SqlitePool) {
    let subject = product();

    assert_matches!(
        JobRecordRepo::rewind(&pool, &subject, 0).await.unwrap(),
        RewindOutcome::IndexOutOfRange { total_iterations: 0 }
    );

    run_job(&pool, &subject, JobKind::Create, "a running shoe", "https://cdn/v1.glb").await;
    assert_matches!(
        JobRecordRepo::rewind(&pool, &subject, 3).await.unwrap(),
        RewindOutcome::IndexOutOfRange { total_iterations: 1 }
    );

    assert!(claim(&pool, &subject, JobKind::Edit).await);
    assert_matches!(
        JobRecordRepo::rewind(&pool, &subject, 0).await.unwrap(),
        RewindOutcome::InProgress
    );
}

// ---------------------------------------------------------------------------
// Interruption
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn startup_reconciliation_marks_in_flight_jobs_interrupted(pool: SqlitePool) {
    let front = SubjectId::panel("front").unwrap();
    assert!(claim(&pool, &product(), JobKind::Create).await);
    assert!(claim(&pool, &front, JobKind::PanelTexture).await);

    let mut reconciled = JobRecordRepo::reconcile_all_interrupted(&pool).await.unwrap();
    reconciled.sort();
    assert_eq!(reconciled, vec![front.clone(), product()]);

    let record = JobRecordRepo::get(&pool, &front).await.unwrap();
    assert_eq!(record.status, JobStatus::Error);
    assert_eq!(record.last_error.as_deref(), Some(INTERRUPTED_ERROR));

    // A late completion from the dead job must not land.
    let late = new_iteration(IterationKind::Create, "late", "https://cdn/late.png");
    assert!(JobRecordRepo::complete_with_iteration(&pool, &front, &late)
        .await
        .unwrap()
        .is_none());
}

// ---------------------------------------------------------------------------
// Clear / seed / listing
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn clear_resets_artifacts_but_keeps_history(pool: SqlitePool) {
    let subject = SubjectId::panel("front").unwrap();
    assert_eq!(
        JobRecordRepo::clear_artifacts(&pool, &subject).await.unwrap(),
        ClearOutcome::NothingStored
    );

    run_job(&pool, &subject, JobKind::PanelTexture, "gold foil", "https://cdn/front.png").await;
    assert_eq!(
        JobRecordRepo::clear_artifacts(&pool, &subject).await.unwrap(),
        ClearOutcome::Cleared
    );

    let record = JobRecordRepo::get(&pool, &subject).await.unwrap();
    assert_eq!(record.status, JobStatus::Idle);
    assert!(record.current_artifact_refs.is_empty());
    assert_eq!(IterationRepo::count_for_subject(&pool, &subject).await.unwrap(), 1);

    assert!(claim(&pool, &subject, JobKind::PanelTexture).await);
    assert_eq!(
        JobRecordRepo::clear_artifacts(&pool, &subject).await.unwrap(),
        ClearOutcome::InProgress
    );
}

#[sqlx::test(migrations = "./migrations")]
async fn seeding_appends_completed_iteration(pool: SqlitePool) {
    let subject = product();
    let new = NewIteration {
        note: Some("seeded".into()),
        ..new_iteration(IterationKind::Create, "Demo Product", "https://cdn/demo.glb")
    };

    let seeded = JobRecordRepo::seed_iteration(&pool, &subject, &new)
        .await
        .unwrap()
        .expect("seed should land on an idle subject");

    let record = JobRecordRepo::get(&pool, &subject).await.unwrap();
    assert_eq!(record.status, JobStatus::Complete);
    assert_eq!(record.current_iteration_id, Some(seeded.id));

    assert!(claim(&pool, &subject, JobKind::Edit).await);
    assert!(JobRecordRepo::seed_iteration(&pool, &subject, &new)
        .await
        .unwrap()
        .is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn list_by_prefix_returns_only_panels(pool: SqlitePool) {
    run_job(&pool, &product(), JobKind::Create, "a running shoe", "https://cdn/v1.glb").await;
    for panel in ["top", "front"] {
        let subject = SubjectId::panel(panel).unwrap();
        run_job(&pool, &subject, JobKind::PanelTexture, "matte", "https://cdn/p.png").await;
    }

    let panels = JobRecordRepo::list_by_prefix(&pool, "panel:").await.unwrap();
    let ids: Vec<_> = panels.iter().map(|r| r.subject_id.to_string()).collect();
    assert_eq!(ids, vec!["panel:front", "panel:top"]);
}

#[sqlx::test(migrations = "./migrations")]
async fn events_are_listed_newest_first(pool: SqlitePool) {
    let now = chrono::Utc::now();
    let payload = serde_json::json!({"progress": 10});
    JobEventRepo::insert(&pool, "job.started", Some("product"), &payload, now).await.unwrap();
    JobEventRepo::insert(&pool, "job.progress", Some("product"), &payload, now).await.unwrap();
    JobEventRepo::insert(&pool, "job.started", Some("panel:top"), &payload, now).await.unwrap();

    let query = JobEventQuery {
        subject_id: Some("product".into()),
        limit: None,
    };
    let events = JobEventRepo::list(&pool, &query).await.unwrap();

    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event_type, "job.progress");
    assert_eq!(events[0].payload.0["progress"], 10);
}
