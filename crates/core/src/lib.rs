//! Domain types shared by the packforge server and client crates.
//!
//! Nothing in here touches the database, the network or the filesystem;
//! the server (`packforge-db`, `packforge-pipeline`, `packforge-api`) and
//! the client (`packforge-client`) both build on these definitions.

pub mod artifact;
pub mod error;
pub mod hashing;
pub mod job_events;
pub mod protocol;
pub mod status;
pub mod subject;
pub mod types;
pub mod validation;
