mod http;
mod traits;

pub use http::HttpModelInvoker;
pub use traits::{Completion, InvokeError, InvokeRequest, ModelInvoker};
