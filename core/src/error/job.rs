use thiserror::Error;

use super::throttle::ThrottleError;
use crate::throttle::classify;

/// Failure kinds stored on a task record. The HTTP layer maps these to
/// distinct response shapes, so the strings are part of the polling contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    AdmissionTimeout,
    Throttled,
    ModelUnavailable,
    Execution,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AdmissionTimeout => "ADMISSION_TIMEOUT",
            Self::Throttled => "THROTTLED",
            Self::ModelUnavailable => "MODEL_UNAVAILABLE",
            Self::Execution => "EXECUTION_ERROR",
        }
    }
}

/// Errors raised inside a job function body.
#[derive(Error, Debug, Clone)]
pub enum JobError {
    #[error("admission timed out after {waited_secs:.1}s")]
    AdmissionTimeout { waited_secs: f64 },

    #[error("model '{model_id}' unavailable: {reason}")]
    ModelUnavailable { model_id: String, reason: String },

    #[error("model '{model_id}' invocation failed: {message}")]
    Invoke { model_id: String, message: String },

    #[error("malformed model response: {0}")]
    MalformedResponse(String),
}

impl JobError {
    /// Map to the failure kind stored on the task record.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::AdmissionTimeout { .. } => FailureKind::AdmissionTimeout,
            Self::ModelUnavailable { .. } => FailureKind::ModelUnavailable,
            Self::Invoke { message, .. } if classify::is_throttle_error(message) => {
                FailureKind::Throttled
            }
            Self::Invoke { .. } => FailureKind::Execution,
            Self::MalformedResponse(_) => FailureKind::Execution,
        }
    }
}

impl From<ThrottleError> for JobError {
    fn from(err: ThrottleError) -> Self {
        match err {
            ThrottleError::AdmissionTimeout { waited_secs } => {
                Self::AdmissionTimeout { waited_secs }
            }
            ThrottleError::CircuitOpen {
                model_id,
                remaining_secs,
            } => Self::ModelUnavailable {
                model_id,
                reason: format!("circuit breaker open, cooldown: {remaining_secs:.0}s"),
            },
        }
    }
}
