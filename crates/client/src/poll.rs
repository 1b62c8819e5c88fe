//! Status polling.
//!
//! [`PollMachine`] is the pure protocol: it turns each observation of a
//! subject into "keep polling", a final outcome, or an error. [`Poller`]
//! drives it against a [`StatusSource`] on a fixed cadence, with one
//! cancellation point between polls.

use std::sync::Arc;

use async_trait::async_trait;
use packforge_core::artifact::ArtifactKind;
use packforge_core::protocol::StatusPayload;
use packforge_core::status::JobStatus;
use packforge_core::subject::SubjectId;
use tokio_util::sync::CancellationToken;

use crate::api::{ArtifactLookup, PackforgeApi};
use crate::config::PollPolicy;
use crate::error::ClientError;

/// Where the poll loop reads status and artifact availability from.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn status(&self, subject: &SubjectId) -> Result<StatusPayload, ClientError>;

    async fn artifact(
        &self,
        subject: &SubjectId,
        kind: ArtifactKind,
    ) -> Result<ArtifactLookup, ClientError>;
}

#[async_trait]
impl StatusSource for PackforgeApi {
    async fn status(&self, subject: &SubjectId) -> Result<StatusPayload, ClientError> {
        PackforgeApi::status(self, subject).await
    }

    async fn artifact(
        &self,
        subject: &SubjectId,
        kind: ArtifactKind,
    ) -> Result<ArtifactLookup, ClientError> {
        PackforgeApi::artifact(self, subject, kind).await
    }
}

/// One reading of a subject, as seen by the poll loop.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    InProgress { progress: u8, message: String },
    /// Status is `complete`; carries what the artifact endpoint returned.
    Complete(ArtifactLookup),
    /// Status is `error`, with the recorded `last_error`.
    Failed(Option<String>),
    Idle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The job completed and this reference is ready to resolve.
    Ready { reference: String },
    /// The subject is idle: there is nothing to wait for.
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    NotPolling,
    Polling { attempt: u32 },
    Terminal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Continue,
    Done(PollOutcome),
}

#[derive(Debug)]
pub struct PollMachine {
    subject: SubjectId,
    max_attempts: u32,
    state: PollState,
}

impl PollMachine {
    pub fn new(subject: SubjectId, max_attempts: u32) -> Self {
        Self {
            subject,
            max_attempts,
            state: PollState::NotPolling,
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// Begin a poll for a newly started job.
    pub fn start(&mut self) {
        self.state = PollState::Polling { attempt: 0 };
    }

    /// Apply one observation.
    ///
    /// Every error is terminal. Observations outside `Polling` are refused
    /// and leave the state unchanged.
    pub fn advance(&mut self, observation: Observation) -> Result<Step, ClientError> {
        let PollState::Polling { attempt } = self.state else {
            return Err(self.violation(format!(
                "observation received in state {:?}",
                self.state
            )));
        };
        let attempt = attempt + 1;

        match observation {
            // A new job may start between the status read and the artifact
            // read; keep waiting for it.
            Observation::InProgress { .. } | Observation::Complete(ArtifactLookup::NotReady) => {
                if attempt >= self.max_attempts {
                    self.state = PollState::Terminal;
                    return Err(ClientError::PollTimeout {
                        subject: self.subject.clone(),
                        attempts: attempt,
                    });
                }
                self.state = PollState::Polling { attempt };
                Ok(Step::Continue)
            }
            Observation::Complete(ArtifactLookup::Ready(reference)) => {
                self.state = PollState::Terminal;
                Ok(Step::Done(PollOutcome::Ready { reference }))
            }
            Observation::Complete(ArtifactLookup::Missing) => {
                self.state = PollState::Terminal;
                Err(self.violation("job is complete but its artifact is missing".into()))
            }
            Observation::Failed(last_error) => {
                self.state = PollState::Terminal;
                Err(ClientError::ServerReportedError {
                    subject: self.subject.clone(),
                    message: last_error.unwrap_or_else(|| "unknown error".into()),
                })
            }
            Observation::Idle => {
                self.state = PollState::Terminal;
                Ok(Step::Done(PollOutcome::Stopped))
            }
        }
    }

    fn violation(&self, detail: String) -> ClientError {
        ClientError::InvariantViolation {
            subject: self.subject.clone(),
            detail,
        }
    }
}

/// Read a subject's status, and its artifact once the job is complete.
pub async fn observe(
    source: &dyn StatusSource,
    subject: &SubjectId,
    kind: ArtifactKind,
) -> Result<Observation, ClientError> {
    let status = source.status(subject).await?;
    Ok(match status.status {
        JobStatus::InProgress => Observation::InProgress {
            progress: status.progress,
            message: status.message,
        },
        JobStatus::Complete => Observation::Complete(source.artifact(subject, kind).await?),
        JobStatus::Error => Observation::Failed(status.last_error),
        JobStatus::Idle => Observation::Idle,
    })
}

pub struct Poller {
    source: Arc<dyn StatusSource>,
    policy: PollPolicy,
}

impl Poller {
    pub fn new(source: Arc<dyn StatusSource>, policy: PollPolicy) -> Self {
        Self { source, policy }
    }

    /// Poll `subject` until its job ends, then report the `kind` artifact.
    ///
    /// The first status read is immediate. Transport errors end the poll.
    pub async fn wait_for(
        &self,
        subject: &SubjectId,
        kind: ArtifactKind,
        cancel: &CancellationToken,
    ) -> Result<PollOutcome, ClientError> {
        let mut machine = PollMachine::new(subject.clone(), self.policy.max_attempts);
        machine.start();

        loop {
            let observation = observe(self.source.as_ref(), subject, kind).await?;
            if let Observation::InProgress { progress, message } = &observation {
                tracing::debug!(subject_id = %subject, progress, stage = %message, "Job in progress");
            }

            if let Step::Done(outcome) = machine.advance(observation)? {
                tracing::info!(subject_id = %subject, ?outcome, "Poll finished");
                return Ok(outcome);
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!(subject_id = %subject, "Poll cancelled");
                    return Err(ClientError::Cancelled(subject.clone()));
                }
                _ = tokio::time::sleep(self.policy.interval) => {}
            }
        }
    }
}
