use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

const WINDOW: Duration = Duration::from_secs(60);

/// Why an admission check failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    #[error("max concurrent requests ({limit}) reached")]
    Concurrency { limit: usize },

    #[error("rate limit reached, wait {}s", wait.as_secs())]
    RateLimited { wait: Duration },
}

struct LimiterState {
    window: VecDeque<Instant>,
    active: usize,
}

/// Request-count and concurrency admission.
///
/// The timestamp window and the active-request count share one lock so the
/// check in `can_admit` and the append in `begin` cannot interleave with a
/// stale view of either.
pub struct RateLimiter {
    max_requests_per_minute: usize,
    max_concurrent: usize,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(max_requests_per_minute: usize, max_concurrent: usize) -> Self {
        Self {
            max_requests_per_minute,
            max_concurrent,
            state: Mutex::new(LimiterState {
                window: VecDeque::new(),
                active: 0,
            }),
        }
    }

    /// Check whether a new request may start now.
    pub fn can_admit(&self) -> Result<(), Denial> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();

        if state.active >= self.max_concurrent {
            return Err(Denial::Concurrency {
                limit: self.max_concurrent,
            });
        }

        Self::prune(&mut state.window, now);

        if state.window.len() >= self.max_requests_per_minute {
            let wait = state
                .window
                .front()
                .map(|oldest| WINDOW.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(Duration::ZERO);
            return Err(Denial::RateLimited { wait });
        }

        Ok(())
    }

    /// Record a request start. Must be paired with exactly one `end`.
    pub fn begin(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        state.window.push_back(now);
        Self::prune(&mut state.window, now);
        state.active += 1;
    }

    /// Record a request end.
    pub fn end(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        debug_assert!(state.active > 0, "end() without matching begin()");
        state.active = state.active.saturating_sub(1);
    }

    pub fn active_requests(&self) -> usize {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).active
    }

    pub fn requests_last_minute(&self) -> usize {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Self::prune(&mut state.window, Instant::now());
        state.window.len()
    }

    fn prune(window: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = window.front() {
            if now.duration_since(*oldest) >= WINDOW {
                window.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrency_limit_denies_then_releases() {
        let limiter = RateLimiter::new(100, 2);
        limiter.begin();
        limiter.begin();
        assert_eq!(
            limiter.can_admit(),
            Err(Denial::Concurrency { limit: 2 })
        );
        assert_eq!(limiter.active_requests(), 2);

        limiter.end();
        assert!(limiter.can_admit().is_ok());
        assert_eq!(limiter.active_requests(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn window_denies_until_oldest_entry_ages_out() {
        let limiter = RateLimiter::new(3, 100);
        for _ in 0..3 {
            limiter.begin();
            limiter.end();
            tokio::time::advance(Duration::from_secs(1)).await;
        }

        match limiter.can_admit() {
            Err(Denial::RateLimited { wait }) => {
                // Oldest entry is 3s old, so 57s remain.
                assert_eq!(wait, Duration::from_secs(57));
            }
            other => panic!("expected rate denial, got {other:?}"),
        }

        // Round-trip: once the oldest timestamp is past 60s the limiter
        // admits again.
        tokio::time::advance(Duration::from_secs(57)).await;
        assert!(limiter.can_admit().is_ok());
        assert_eq!(limiter.requests_last_minute(), 2);
    }

    #[test]
    fn begin_end_pairing_balances_active_count() {
        let limiter = RateLimiter::new(10, 10);
        limiter.begin();
        limiter.begin();
        limiter.end();
        limiter.end();
        assert_eq!(limiter.active_requests(), 0);
    }
}
