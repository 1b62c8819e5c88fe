#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl CoreError {
    /// The rejection returned when a subject already has a job in flight.
    pub fn already_generating(subject: &str) -> Self {
        CoreError::Conflict(format!("Generation already running for {subject}"))
    }
}
