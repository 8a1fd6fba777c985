use thiserror::Error;
use uuid::Uuid;

/// Task registry errors surfaced to pollers and submitters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("task '{0}' not found")]
    TaskNotFound(Uuid),

    #[error("registry is shutting down, not accepting new tasks")]
    ShuttingDown,
}
