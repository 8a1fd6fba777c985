#[allow(clippy::module_inception)]
pub mod error;
pub mod dispatch;
pub mod job;
pub mod throttle;

pub use dispatch::DispatchError;
pub use error::CliError;
pub use job::{FailureKind, JobError};
pub use throttle::ThrottleError;
