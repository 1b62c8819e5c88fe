//! Job lifecycle event bus.
//!
//! - [`EventBus`] fans [`JobEvent`]s out to in-process subscribers over a
//!   `tokio::sync::broadcast` channel.
//! - [`EventPersistence`] writes every event to the `job_events` table so
//!   that lifecycle transitions can be inspected after the fact.

pub mod bus;
pub mod persistence;

pub use bus::{EventBus, JobEvent};
pub use persistence::EventPersistence;
