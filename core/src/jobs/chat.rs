use serde_json::json;
use tokio::time::Instant;

use crate::context::JobServices;
use crate::error::JobError;

use super::{invoke_with_fallback, prompts};

/// One reviewer chat turn, with whatever document context the caller holds.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub query: String,
    pub context: serde_json::Value,
    pub session_id: Option<String>,
}

/// Answer a reviewer question. Chat responses are free text; no JSON
/// post-processing beyond token accounting.
pub async fn process_chat(
    services: &JobServices,
    request: &ChatRequest,
) -> Result<serde_json::Value, JobError> {
    let started = Instant::now();
    let preview: String = request.query.chars().take(50).collect();
    tracing::info!(
        query = %preview,
        session_id = request.session_id.as_deref().unwrap_or("-"),
        "processing chat"
    );

    let system_prompt = prompts::build_system_prompt();
    let user_prompt = prompts::build_chat_prompt(&request.query, &request.context);

    let (completion, model_used) =
        invoke_with_fallback(services, &system_prompt, &user_prompt).await?;

    let duration = started.elapsed();
    tracing::info!(duration_secs = duration.as_secs_f64(), "chat complete");

    Ok(json!({
        "response": completion.text,
        "model_used": model_used,
        "tokens": {
            "input": completion.input_tokens,
            "output": completion.output_tokens,
        },
        "duration_secs": duration.as_secs_f64(),
    }))
}
