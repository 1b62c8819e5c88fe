pub mod iteration_repo;
pub mod job_event_repo;
pub mod job_record_repo;

pub use iteration_repo::IterationRepo;
pub use job_event_repo::JobEventRepo;
pub use job_record_repo::{ClearOutcome, JobRecordRepo, RewindOutcome};
