pub mod iteration;
pub mod job_event;
pub mod job_record;

/// Wrap a row conversion failure as a sqlx decode error.
pub(crate) fn decode_error(err: impl std::fmt::Display) -> sqlx::Error {
    sqlx::Error::Decode(err.to_string().into())
}
