//! Stable re-exports for consumers (`cli` and external crates).
//!
//! Prefer importing from `redline_core::api` instead of reaching into
//! internal modules.

pub use crate::backend::{Completion, HttpModelInvoker, InvokeError, InvokeRequest, ModelInvoker};
pub use crate::config::{
    load_default, AppConfig, BackendConfig, DispatchConfig, LoggingConfig, ModelConfig,
    ModelsConfig, ThrottleConfig,
};
pub use crate::context::{AppContext, JobServices};
pub use crate::dispatch::{DispatchStats, TaskError, TaskRegistry, TaskStatus, TaskSummary, TaskView};
pub use crate::error::{CliError, DispatchError, FailureKind, JobError, ThrottleError};
pub use crate::jobs::{analyze_section, process_chat, ChatRequest, SectionRequest};
pub use crate::throttle::{
    estimate_tokens, ManagerSnapshot, ModelHealthSnapshot, ModelStatus, RequestManager,
};
