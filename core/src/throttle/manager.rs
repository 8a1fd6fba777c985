use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::config::ThrottleConfig;
use crate::error::ThrottleError;

use super::classify;
use super::health::{ModelHealthSnapshot, ModelHealthTracker};
use super::limiter::RateLimiter;
use super::tokens::TokenCounter;

#[derive(Debug, Default, Clone)]
struct RequestStats {
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    throttled_requests: u64,
    retried_requests: u64,
    fallback_used: u64,
    avg_response_time_secs: f64,
}

/// Read-only copy of all counters plus per-model health.
#[derive(Debug, Clone, Serialize)]
pub struct ManagerSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub throttled_requests: u64,
    pub retried_requests: u64,
    pub fallback_used: u64,
    pub circuit_breaker_trips: u64,
    pub avg_response_time_secs: f64,
    pub active_requests: usize,
    pub requests_last_minute: usize,
    pub tokens_last_minute: u64,
    pub model_health: HashMap<String, ModelHealthSnapshot>,
}

/// Admission gate in front of the inference API.
///
/// Composes the request/concurrency limiter, the token budget, and the
/// per-model circuit breaker. It never retries on the caller's behalf and
/// never errors for "not yet admitted" — `await_admission` blocks (politely)
/// until the budgets allow the request or the deadline passes.
pub struct RequestManager {
    cfg: ThrottleConfig,
    limiter: RateLimiter,
    tokens: TokenCounter,
    health: ModelHealthTracker,
    stats: Mutex<RequestStats>,
}

impl RequestManager {
    pub fn new(cfg: &ThrottleConfig) -> Self {
        tracing::info!(
            max_requests_per_minute = cfg.max_requests_per_minute,
            max_concurrent = cfg.max_concurrent_requests,
            max_tokens_per_minute = cfg.max_tokens_per_minute,
            "request manager initialized"
        );
        Self {
            cfg: cfg.clone(),
            limiter: RateLimiter::new(cfg.max_requests_per_minute, cfg.max_concurrent_requests),
            tokens: TokenCounter::new(cfg.max_tokens_per_minute),
            health: ModelHealthTracker::new(
                cfg.error_threshold,
                Duration::from_secs(cfg.base_cooldown_secs),
            ),
            stats: Mutex::new(RequestStats::default()),
        }
    }

    pub fn config(&self) -> &ThrottleConfig {
        &self.cfg
    }

    /// Block until both the request and token budgets admit the request, or
    /// the deadline passes. Returns the time spent waiting.
    ///
    /// No ordering is guaranteed among concurrent waiters: each one re-polls
    /// independently and the first to observe an open slot proceeds.
    pub async fn await_admission(
        &self,
        estimated_tokens: u64,
        timeout: Duration,
    ) -> Result<Duration, ThrottleError> {
        let start = Instant::now();
        let poll = Duration::from_millis(self.cfg.admission_poll_interval_ms.max(1));
        let token_wait_cap = Duration::from_secs(self.cfg.admission_max_token_wait_secs.max(1));

        loop {
            let nap = if let Err(denial) = self.limiter.can_admit() {
                tracing::debug!(%denial, "admission deferred");
                poll
            } else if estimated_tokens > 0 {
                match self.tokens.can_admit(estimated_tokens) {
                    Ok(()) => break,
                    Err(wait) => {
                        tracing::debug!(wait_secs = wait.as_secs_f64(), "token budget deferred");
                        if wait.is_zero() {
                            poll
                        } else {
                            wait.min(token_wait_cap)
                        }
                    }
                }
            } else {
                break;
            };

            let waited = start.elapsed();
            if waited + nap >= timeout {
                let total = timeout.saturating_sub(waited);
                if !total.is_zero() {
                    tokio::time::sleep(total).await;
                }
                return Err(ThrottleError::AdmissionTimeout {
                    waited_secs: start.elapsed().as_secs_f64(),
                });
            }
            tokio::time::sleep(nap).await;
        }

        let waited = start.elapsed();
        if waited > Duration::from_secs(1) {
            tracing::info!(
                waited_secs = waited.as_secs_f64(),
                "waited for rate limit clearance"
            );
        }
        Ok(waited)
    }

    /// Record that an admitted request is starting. Must be paired with
    /// exactly one `record_end`.
    pub fn record_start(&self) {
        self.limiter.begin();
    }

    /// Record request completion: releases the concurrency slot, updates
    /// rolling statistics, model health, and token usage.
    pub fn record_end(
        &self,
        success: bool,
        model_id: &str,
        duration: Duration,
        tokens_used: u64,
        error: Option<&str>,
    ) {
        self.limiter.end();

        {
            let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
            stats.total_requests += 1;
            if success {
                stats.successful_requests += 1;
                let n = stats.successful_requests as f64;
                stats.avg_response_time_secs =
                    (stats.avg_response_time_secs * (n - 1.0) + duration.as_secs_f64()) / n;
            } else {
                stats.failed_requests += 1;
                if error.map(classify::is_throttle_error).unwrap_or(false) {
                    stats.throttled_requests += 1;
                }
            }
        }

        if success {
            self.health.record_success(model_id);
        } else {
            self.health.record_failure(model_id);
        }

        if tokens_used > 0 {
            self.tokens.record_usage(tokens_used);
        }
    }

    /// Note a retry of the same model after a failed attempt.
    pub fn record_retry(&self) {
        let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        stats.retried_requests += 1;
    }

    /// Note a job that succeeded on a non-primary model.
    pub fn record_fallback(&self) {
        let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        stats.fallback_used += 1;
    }

    /// Check a model's circuit; an expired cooldown flips it to half-open.
    pub fn check_model(&self, model_id: &str) -> Result<(), ThrottleError> {
        self.health.is_available(model_id)
    }

    pub fn reset_model_health(&self, model_id: Option<&str>) {
        self.health.reset(model_id);
    }

    pub fn snapshot(&self) -> ManagerSnapshot {
        let stats = self
            .stats
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        ManagerSnapshot {
            total_requests: stats.total_requests,
            successful_requests: stats.successful_requests,
            failed_requests: stats.failed_requests,
            throttled_requests: stats.throttled_requests,
            retried_requests: stats.retried_requests,
            fallback_used: stats.fallback_used,
            circuit_breaker_trips: self.health.circuit_breaker_trips(),
            avg_response_time_secs: stats.avg_response_time_secs,
            active_requests: self.limiter.active_requests(),
            requests_last_minute: self.limiter.requests_last_minute(),
            tokens_last_minute: self.tokens.usage_last_minute(),
            model_health: self.health.snapshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(cfg: ThrottleConfig) -> RequestManager {
        RequestManager::new(&cfg)
    }

    fn small_cfg() -> ThrottleConfig {
        ThrottleConfig {
            max_requests_per_minute: 4,
            max_concurrent_requests: 2,
            max_tokens_per_minute: 1000,
            admission_poll_interval_ms: 100,
            ..ThrottleConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn admission_times_out_when_slots_never_free() {
        let m = manager(small_cfg());
        m.record_start();
        m.record_start();

        let err = m
            .await_admission(0, Duration::from_secs(3))
            .await
            .expect_err("no slot should free up");
        match err {
            ThrottleError::AdmissionTimeout { waited_secs } => {
                assert!(waited_secs >= 3.0);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn admission_waits_for_token_budget() {
        let m = manager(small_cfg());
        m.tokens.record_usage(900);

        // 200 estimated tokens exceed the 1000/min budget until the 900
        // expire at t+60s.
        let waited = m
            .await_admission(200, Duration::from_secs(120))
            .await
            .expect("should eventually admit");
        assert!(waited >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn record_end_tracks_rolling_average_and_throttles() {
        let m = manager(small_cfg());

        m.record_start();
        m.record_end(true, "m", Duration::from_secs(2), 100, None);
        m.record_start();
        m.record_end(true, "m", Duration::from_secs(4), 100, None);
        m.record_start();
        m.record_end(false, "m", Duration::from_secs(1), 0, Some("throttled by upstream"));
        m.record_start();
        m.record_end(false, "m", Duration::from_secs(1), 0, Some("parse error"));

        let snap = m.snapshot();
        assert_eq!(snap.total_requests, 4);
        assert_eq!(snap.successful_requests, 2);
        assert_eq!(snap.failed_requests, 2);
        assert_eq!(snap.throttled_requests, 1);
        assert!((snap.avg_response_time_secs - 3.0).abs() < 1e-9);
        assert_eq!(snap.active_requests, 0);
        assert_eq!(snap.requests_last_minute, 4);
        assert_eq!(snap.tokens_last_minute, 200);
        assert_eq!(snap.model_health["m"].failed_requests, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn waiter_admitted_when_concurrent_slot_frees() {
        let m = std::sync::Arc::new(manager(small_cfg()));
        m.record_start();
        m.record_start();

        let waiter = {
            let m = m.clone();
            tokio::spawn(async move { m.await_admission(0, Duration::from_secs(30)).await })
        };

        tokio::time::advance(Duration::from_secs(1)).await;
        m.record_end(true, "m", Duration::from_secs(1), 0, None);

        let waited = waiter
            .await
            .expect("join")
            .expect("should admit after slot frees");
        assert!(waited > Duration::ZERO);
    }
}
