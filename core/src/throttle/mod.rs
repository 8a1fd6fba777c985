pub mod classify;
mod health;
mod limiter;
mod manager;
mod tokens;

pub use health::{ModelHealthSnapshot, ModelHealthTracker, ModelStatus};
pub use limiter::{Denial, RateLimiter};
pub use manager::{ManagerSnapshot, RequestManager};
pub use tokens::{estimate_tokens, TokenCounter};
