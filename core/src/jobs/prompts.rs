//! Deterministic prompt builders for the review jobs.

use serde_json::Value;

const REVIEW_GUIDELINES: &str = "\
- Judge completeness: every claim should be supported by evidence in the section.\n\
- Judge clarity: flag ambiguous subjects, undefined acronyms, passive risk statements.\n\
- Judge consistency: dates, amounts, and entity names must agree across the section.\n\
- Only raise actionable feedback; do not restate the text.";

pub fn build_system_prompt() -> String {
    format!(
        "You are a senior review analyst for investigation write-ups.\n\
         Your expertise: document quality assessment, risk analysis and \
         compliance, investigation best practices.\n\nGuidelines:\n{REVIEW_GUIDELINES}"
    )
}

pub fn build_analysis_prompt(
    section_name: &str,
    content: &str,
    doc_type: &str,
    max_feedback_items: usize,
) -> String {
    format!(
        "Review the following section of a \"{doc_type}\" document.\n\n\
         Section: {section_name}\n\
         ---\n\
         {content}\n\
         ---\n\n\
         Respond with JSON only, of the shape:\n\
         {{\"feedback_items\": [{{\"comment\": str, \"severity\": \"low\"|\"medium\"|\"high\", \
         \"confidence\": float, \"quote\": str}}]}}\n\
         Return at most {max_feedback_items} items, ordered by severity."
    )
}

pub fn build_chat_prompt(query: &str, context: &Value) -> String {
    let context_block = serde_json::to_string_pretty(context).unwrap_or_else(|_| "{}".to_string());
    format!(
        "Answer the reviewer's question about the document under review.\n\n\
         Context:\n{context_block}\n\nQuestion: {query}"
    )
}
