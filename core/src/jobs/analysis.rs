use serde_json::json;
use tokio::time::Instant;

use crate::context::JobServices;
use crate::error::JobError;

use super::{invoke_with_fallback, parse, prompts};

const MAX_FEEDBACK_ITEMS: usize = 10;

/// One "analyze this section" unit of work.
#[derive(Debug, Clone)]
pub struct SectionRequest {
    pub section_name: String,
    pub content: String,
    pub doc_type: String,
    pub session_id: Option<String>,
}

/// Analyze a document section and return the filtered feedback payload.
///
/// The payload shape is what the polling layer hands to the browser:
/// feedback items, counts, model attribution, and token usage.
pub async fn analyze_section(
    services: &JobServices,
    request: &SectionRequest,
) -> Result<serde_json::Value, JobError> {
    let started = Instant::now();
    tracing::info!(
        section = %request.section_name,
        session_id = request.session_id.as_deref().unwrap_or("-"),
        "analyzing section"
    );

    let system_prompt = prompts::build_system_prompt();
    let user_prompt = prompts::build_analysis_prompt(
        &request.section_name,
        &request.content,
        &request.doc_type,
        MAX_FEEDBACK_ITEMS,
    );

    let (completion, model_used) =
        invoke_with_fallback(services, &system_prompt, &user_prompt).await?;

    let analysis = parse::parse_model_json(&completion.text)?;
    let feedback_items = parse::filter_feedback(&analysis, services.models.min_confidence);
    let feedback_count = feedback_items.len();

    let duration = started.elapsed();
    tracing::info!(
        section = %request.section_name,
        feedback_count,
        duration_secs = duration.as_secs_f64(),
        "analysis complete"
    );

    Ok(json!({
        "section": request.section_name,
        "feedback_items": feedback_items,
        "feedback_count": feedback_count,
        "model_used": model_used,
        "tokens": {
            "input": completion.input_tokens,
            "output": completion.output_tokens,
        },
        "duration_secs": duration.as_secs_f64(),
    }))
}
