/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Iteration identifiers are UUIDv7 (time-ordered, stable across reloads).
pub type IterationId = uuid::Uuid;

/// Row id type used by auxiliary tables (`job_events`).
pub type DbId = i64;
