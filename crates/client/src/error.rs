use packforge_core::subject::SubjectId;

/// Failure to obtain the bytes behind an artifact reference.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("remote returned status {0}")]
    Status(u16),

    #[error("malformed data URI: {0}")]
    InvalidDataUri(String),

    #[error("unsupported reference scheme in '{0}'")]
    UnsupportedScheme(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The remote artifact could not be fetched. Nothing was cached, so the
    /// resolve can be retried.
    #[error("failed to fetch artifact '{reference}': {source}")]
    CacheFetchFailure {
        reference: String,
        #[source]
        source: FetchError,
    },

    /// The poll loop ran out of attempts before the job finished.
    #[error("{subject} still in progress after {attempts} polls")]
    PollTimeout { subject: SubjectId, attempts: u32 },

    /// The server recorded the job as failed.
    #[error("generation failed for {subject}: {message}")]
    ServerReportedError { subject: SubjectId, message: String },

    /// The server reported `complete` but had no artifact to serve.
    #[error("invariant violated for {subject}: {detail}")]
    InvariantViolation { subject: SubjectId, detail: String },

    #[error("polling {0} was cancelled")]
    Cancelled(SubjectId),

    #[error("API returned {status} {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("HTTP error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// True for a 409 rejection because the subject is already generating.
    pub fn is_conflict(&self) -> bool {
        matches!(self, ClientError::Api { status: 409, .. })
    }
}
