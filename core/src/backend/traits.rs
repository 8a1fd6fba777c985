use async_trait::async_trait;
use thiserror::Error;

/// One inference call: prompts in, text and token counts out.
#[derive(Debug, Clone)]
pub struct InvokeRequest {
    pub model_id: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_tokens: u64,
    pub temperature: f64,
}

#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Invocation failures. The throttling subsystem only ever inspects the
/// rendered message, so variants exist for diagnostics, not control flow.
#[derive(Error, Debug)]
pub enum InvokeError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("upstream returned HTTP {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("malformed completion payload: {0}")]
    Payload(String),
}

/// The external inference collaborator. Implementations are opaque to the
/// dispatch core; jobs gate calls through the request manager and hand the
/// outcome back to it.
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    async fn invoke(&self, request: &InvokeRequest) -> Result<Completion, InvokeError>;
}
