mod analysis;
mod chat;
mod parse;
mod prompts;

pub use analysis::{analyze_section, SectionRequest};
pub use chat::{process_chat, ChatRequest};

use std::time::Duration;

use tokio::time::Instant;

use crate::backend::{Completion, InvokeRequest};
use crate::context::JobServices;
use crate::error::JobError;
use crate::throttle::estimate_tokens;

/// Run one inference call through the model chain.
///
/// Walks the configured chain in order, skipping models with an open
/// circuit, retrying each model with exponential backoff, and falling
/// through to the next model when attempts are exhausted. Every attempt is
/// individually admitted and reported back to the request manager; this
/// helper owns the retry policy, the manager never retries on its own.
pub(crate) async fn invoke_with_fallback(
    services: &JobServices,
    system_prompt: &str,
    user_prompt: &str,
) -> Result<(Completion, String), JobError> {
    let models = &services.models;
    let estimated = estimate_tokens(system_prompt) + estimate_tokens(user_prompt);
    let per_request_cap = services.throttle.config().max_tokens_per_request;
    let mut last_err: Option<JobError> = None;

    for (position, model) in models.chain.iter().enumerate() {
        if let Err(err) = services.throttle.check_model(&model.id) {
            tracing::warn!(model_id = %model.id, "skipping model: {err}");
            last_err = Some(err.into());
            continue;
        }

        if position > 0 {
            tokio::time::sleep(Duration::from_secs(models.model_switch_delay_secs)).await;
        }

        let request = InvokeRequest {
            model_id: model.id.clone(),
            system_prompt: system_prompt.to_string(),
            user_prompt: user_prompt.to_string(),
            max_tokens: model.max_tokens.min(per_request_cap),
            temperature: model.temperature,
        };

        let mut backoff = Duration::from_secs(models.initial_backoff_secs.max(1));
        let max_backoff = Duration::from_secs(models.max_backoff_secs.max(1));
        let attempts = models.max_retries_per_request.max(1);

        for attempt in 0..attempts {
            if attempt > 0 {
                services.throttle.record_retry();
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(max_backoff);
            }

            services
                .throttle
                .await_admission(estimated, services.admission_timeout)
                .await?;

            services.throttle.record_start();
            let started = Instant::now();
            let outcome = services.invoker.invoke(&request).await;
            let duration = started.elapsed();

            match outcome {
                Ok(completion) => {
                    // Prefer the backend's reported usage; fall back to the
                    // prompt estimate when it reports none.
                    let mut tokens_used = completion.input_tokens + completion.output_tokens;
                    if tokens_used == 0 {
                        tokens_used = estimated;
                    }
                    services
                        .throttle
                        .record_end(true, &model.id, duration, tokens_used, None);
                    if position > 0 {
                        services.throttle.record_fallback();
                        tracing::info!(model_id = %model.id, "fallback model answered");
                    }
                    return Ok((completion, model.name.clone()));
                }
                Err(err) => {
                    let message = err.to_string();
                    services
                        .throttle
                        .record_end(false, &model.id, duration, 0, Some(&message));
                    tracing::warn!(
                        model_id = %model.id,
                        attempt,
                        "invocation failed: {message}"
                    );
                    last_err = Some(JobError::Invoke {
                        model_id: model.id.clone(),
                        message,
                    });
                    // Once this model's circuit opens there is no point in
                    // further attempts against it.
                    if services.throttle.check_model(&model.id).is_err() {
                        break;
                    }
                }
            }
        }
    }

    Err(last_err.unwrap_or_else(|| JobError::ModelUnavailable {
        model_id: "<none>".to_string(),
        reason: "model chain is empty".to_string(),
    }))
}
