//! Post-processing of raw model output into structured feedback.

use serde_json::Value;

use crate::error::JobError;

/// Strip leading/trailing markdown code fences the models like to add.
pub fn strip_code_fences(text: &str) -> &str {
    let mut s = text.trim();
    if let Some(rest) = s.strip_prefix("```") {
        // Drop an optional language tag on the fence line.
        s = match rest.split_once('\n') {
            Some((_, body)) => body,
            None => rest,
        };
    }
    if let Some(rest) = s.strip_suffix("```") {
        s = rest;
    }
    s.trim()
}

/// Parse model output as JSON, falling back to the outermost `{...}` block
/// when the model wrapped the payload in prose.
pub fn parse_model_json(text: &str) -> Result<Value, JobError> {
    let cleaned = strip_code_fences(text);
    if let Ok(value) = serde_json::from_str::<Value>(cleaned) {
        return Ok(value);
    }

    let start = cleaned.find('{');
    let end = cleaned.rfind('}');
    if let (Some(start), Some(end)) = (start, end) {
        if start < end {
            if let Ok(value) = serde_json::from_str::<Value>(&cleaned[start..=end]) {
                return Ok(value);
            }
        }
    }

    Err(JobError::MalformedResponse(format!(
        "not valid JSON: {}",
        truncate(cleaned, 200)
    )))
}

/// Keep only feedback items at or above the confidence floor.
pub fn filter_feedback(analysis: &Value, min_confidence: f64) -> Vec<Value> {
    analysis
        .get("feedback_items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter(|item| {
                    item.is_object()
                        && item
                            .get("confidence")
                            .and_then(Value::as_f64)
                            .unwrap_or(0.0)
                            >= min_confidence
                })
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
