mod registry;
mod types;

pub use registry::TaskRegistry;
pub use types::{DispatchStats, TaskError, TaskStatus, TaskSummary, TaskView};
