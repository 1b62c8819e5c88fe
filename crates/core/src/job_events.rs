//! Event type names for job lifecycle events.
//!
//! Published on the event bus by the orchestrator and persisted to the
//! `job_events` table.

/// A job was accepted and its background task spawned.
pub const EVENT_JOB_STARTED: &str = "job.started";

/// Progress milestone reported by the generator.
pub const EVENT_JOB_PROGRESS: &str = "job.progress";

/// Job completed and a new iteration was appended.
pub const EVENT_JOB_COMPLETED: &str = "job.completed";

/// Job failed; the error was recorded on the job record.
pub const EVENT_JOB_FAILED: &str = "job.failed";

/// An in-progress record without a live task was reconciled to error.
pub const EVENT_JOB_INTERRUPTED: &str = "job.interrupted";

/// The active state was pointed at an earlier iteration.
pub const EVENT_JOB_REWOUND: &str = "job.rewound";

/// A subject's current artifacts were cleared.
pub const EVENT_JOB_CLEARED: &str = "job.cleared";

/// A pre-generated iteration was seeded (demo mode).
pub const EVENT_JOB_SEEDED: &str = "job.seeded";

/// `last_error` recorded for jobs reconciled after a restart or crash.
pub const INTERRUPTED_ERROR: &str = "interrupted";
