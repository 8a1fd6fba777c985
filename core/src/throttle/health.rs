use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::error::ThrottleError;

/// Per-model circuit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    Healthy,
    CircuitOpen,
    HalfOpen,
}

#[derive(Debug, Clone)]
struct ModelHealth {
    status: ModelStatus,
    consecutive_errors: u32,
    last_error_at: Option<Instant>,
    cooldown_until: Option<Instant>,
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
}

impl ModelHealth {
    fn fresh() -> Self {
        Self {
            status: ModelStatus::Healthy,
            consecutive_errors: 0,
            last_error_at: None,
            cooldown_until: None,
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
        }
    }
}

/// Read-only view of one model's health, for the stats surface.
#[derive(Debug, Clone, Serialize)]
pub struct ModelHealthSnapshot {
    pub status: ModelStatus,
    pub consecutive_errors: u32,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    /// Seconds of cooldown remaining, when the circuit is open.
    pub cooldown_remaining_secs: Option<f64>,
    pub seconds_since_last_error: Option<f64>,
}

struct TrackerState {
    models: HashMap<String, ModelHealth>,
    circuit_breaker_trips: u64,
}

/// Per-model circuit breaker.
///
/// A model's circuit opens after `error_threshold` consecutive failures, with
/// a cooldown that scales with the error count at trip time. The flip from
/// CircuitOpen to HalfOpen happens on the availability check that first
/// observes an expired cooldown, not on a background timer.
pub struct ModelHealthTracker {
    error_threshold: u32,
    base_cooldown: Duration,
    state: Mutex<TrackerState>,
}

impl ModelHealthTracker {
    pub fn new(error_threshold: u32, base_cooldown: Duration) -> Self {
        Self {
            error_threshold,
            base_cooldown,
            state: Mutex::new(TrackerState {
                models: HashMap::new(),
                circuit_breaker_trips: 0,
            }),
        }
    }

    pub fn record_success(&self, model_id: &str) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let health = state
            .models
            .entry(model_id.to_string())
            .or_insert_with(ModelHealth::fresh);
        health.total_requests += 1;
        health.successful_requests += 1;
        health.consecutive_errors = 0;
        health.status = ModelStatus::Healthy;
        health.cooldown_until = None;
    }

    pub fn record_failure(&self, model_id: &str) {
        let now = Instant::now();
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let threshold = self.error_threshold;
        let base = self.base_cooldown;

        let mut tripped = false;
        {
            let health = state
                .models
                .entry(model_id.to_string())
                .or_insert_with(ModelHealth::fresh);
            health.total_requests += 1;
            health.failed_requests += 1;
            health.consecutive_errors += 1;
            health.last_error_at = Some(now);

            if health.consecutive_errors >= threshold {
                let cooldown = base * health.consecutive_errors;
                if health.status != ModelStatus::CircuitOpen {
                    tripped = true;
                }
                health.status = ModelStatus::CircuitOpen;
                health.cooldown_until = Some(now + cooldown);
                tracing::warn!(
                    model_id,
                    consecutive_errors = health.consecutive_errors,
                    cooldown_secs = cooldown.as_secs(),
                    "circuit breaker opened"
                );
            }
        }

        if tripped {
            state.circuit_breaker_trips += 1;
        }
    }

    /// Check whether a model may be used. Observing an expired cooldown flips
    /// the circuit to HalfOpen and clears the consecutive error count.
    pub fn is_available(&self, model_id: &str) -> Result<(), ThrottleError> {
        let now = Instant::now();
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let health = state
            .models
            .entry(model_id.to_string())
            .or_insert_with(ModelHealth::fresh);

        if health.status == ModelStatus::CircuitOpen {
            if let Some(until) = health.cooldown_until {
                if now < until {
                    return Err(ThrottleError::CircuitOpen {
                        model_id: model_id.to_string(),
                        remaining_secs: until.duration_since(now).as_secs_f64(),
                    });
                }
            }
            health.status = ModelStatus::HalfOpen;
            health.consecutive_errors = 0;
            tracing::info!(model_id, "circuit breaker half-open, probing model");
        }

        Ok(())
    }

    /// Clear one model's record, or all records. Operator escape hatch.
    pub fn reset(&self, model_id: Option<&str>) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match model_id {
            Some(id) => {
                state.models.insert(id.to_string(), ModelHealth::fresh());
                tracing::info!(model_id = id, "model health reset");
            }
            None => {
                state.models.clear();
                tracing::info!("all model health records reset");
            }
        }
    }

    pub fn circuit_breaker_trips(&self) -> u64 {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .circuit_breaker_trips
    }

    pub fn snapshot(&self) -> HashMap<String, ModelHealthSnapshot> {
        let now = Instant::now();
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .models
            .iter()
            .map(|(id, health)| {
                let cooldown_remaining_secs = match (health.status, health.cooldown_until) {
                    (ModelStatus::CircuitOpen, Some(until)) if until > now => {
                        Some(until.duration_since(now).as_secs_f64())
                    }
                    _ => None,
                };
                (
                    id.clone(),
                    ModelHealthSnapshot {
                        status: health.status,
                        consecutive_errors: health.consecutive_errors,
                        total_requests: health.total_requests,
                        successful_requests: health.successful_requests,
                        failed_requests: health.failed_requests,
                        cooldown_remaining_secs,
                        seconds_since_last_error: health
                            .last_error_at
                            .map(|at| now.duration_since(at).as_secs_f64()),
                    },
                )
            })
            .collect()
    }
}
