//! Durable event persistence service.
//!
//! [`EventPersistence`] subscribes to the [`EventBus`](crate::bus::EventBus)
//! and appends every [`JobEvent`] to the `job_events` table. It exits when
//! the bus is dropped.

use packforge_core::types::DbId;
use packforge_db::repositories::JobEventRepo;
use packforge_db::DbPool;
use tokio::sync::broadcast;

use crate::bus::JobEvent;

pub struct EventPersistence;

impl EventPersistence {
    /// Run the persistence loop until the channel closes.
    pub async fn run(pool: DbPool, mut receiver: broadcast::Receiver<JobEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if let Err(e) = Self::persist(&pool, &event).await {
                        tracing::error!(
                            error = %e,
                            event_type = %event.event_type,
                            "Failed to persist job event"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Event persistence lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, persistence shutting down");
                    break;
                }
            }
        }
    }

    async fn persist(pool: &DbPool, event: &JobEvent) -> Result<DbId, sqlx::Error> {
        JobEventRepo::insert(
            pool,
            &event.event_type,
            event.subject_id.as_ref().map(|s| s.as_str()),
            &event.payload,
            event.timestamp,
        )
        .await
    }
}
