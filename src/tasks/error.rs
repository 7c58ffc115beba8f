//! Error taxonomy for pipeline invocations.

use thiserror::Error;
use uuid::Uuid;

use crate::media::NormalizeError;
use crate::store::StoreError;

/// Classified failure of a pipeline invocation.
///
/// The classification drives the queue's retry decision: transient and
/// internal failures are re-enqueued up to the policy bound, the rest are
/// terminal on first occurrence.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Referenced entity does not exist. A caller or data-integrity bug,
    /// never retried.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: Uuid },

    /// The audio input cannot be decoded (corrupt bytes, unsupported
    /// codec). Permanent: retrying replays the same bytes.
    #[error("unprocessable audio input: {0}")]
    Unprocessable(#[source] anyhow::Error),

    /// Transport failure, non-2xx response, or malformed output from an
    /// external service. Retried.
    #[error("transient service failure: {0}")]
    Transient(#[source] anyhow::Error),

    /// Any other failure. Conservatively retried.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl TaskError {
    /// Classify an external-service failure as transient
    pub fn transient(err: impl Into<anyhow::Error>) -> Self {
        Self::Transient(err.into())
    }

    /// Whether the queue should schedule another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Internal(_))
    }
}

impl From<StoreError> for TaskError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { kind, id } => Self::NotFound { kind, id },
            other => Self::Internal(anyhow::Error::new(other)),
        }
    }
}

impl From<NormalizeError> for TaskError {
    fn from(err: NormalizeError) -> Self {
        match err {
            decode @ NormalizeError::Decode(_) => {
                Self::Unprocessable(anyhow::Error::new(decode))
            }
            other => Self::Internal(anyhow::Error::new(other)),
        }
    }
}
