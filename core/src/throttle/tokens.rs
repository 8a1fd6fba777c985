use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

/// Width of the sliding usage window.
const WINDOW: Duration = Duration::from_secs(60);

/// Fixed per-request overhead added to the character-based estimate, covering
/// formatting and message framing tokens.
const ESTIMATE_OVERHEAD: u64 = 100;

/// Approximate token count for a prompt. The upstream models average ~4
/// characters per token.
pub fn estimate_tokens(text: &str) -> u64 {
    if text.is_empty() {
        return 0;
    }
    (text.len() as u64) / 4 + ESTIMATE_OVERHEAD
}

/// Sliding one-minute window of token usage.
///
/// Entries older than the window are pruned on every read, under the same
/// lock used for appends, so a check-then-record sequence never observes a
/// half-pruned window.
pub struct TokenCounter {
    max_tokens_per_minute: u64,
    window: Mutex<VecDeque<(Instant, u64)>>,
}

impl TokenCounter {
    pub fn new(max_tokens_per_minute: u64) -> Self {
        Self {
            max_tokens_per_minute,
            window: Mutex::new(VecDeque::new()),
        }
    }

    /// Record token usage for a completed request.
    pub fn record_usage(&self, tokens: u64) {
        let mut window = self.window.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        window.push_back((now, tokens));
        Self::prune(&mut window, now);
    }

    /// Total tokens used in the last minute.
    pub fn usage_last_minute(&self) -> u64 {
        let mut window = self.window.lock().unwrap_or_else(|e| e.into_inner());
        Self::prune(&mut window, Instant::now());
        window.iter().map(|(_, tokens)| tokens).sum()
    }

    /// Check whether `estimated` more tokens fit in the budget. On denial,
    /// returns the time until the oldest window entry expires; zero when the
    /// window is empty, which signals "retry almost immediately".
    pub fn can_admit(&self, estimated: u64) -> Result<(), Duration> {
        let mut window = self.window.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        Self::prune(&mut window, now);

        let current: u64 = window.iter().map(|(_, tokens)| tokens).sum();
        if current + estimated <= self.max_tokens_per_minute {
            return Ok(());
        }

        let wait = window
            .front()
            .map(|(oldest, _)| WINDOW.saturating_sub(now.duration_since(*oldest)))
            .unwrap_or(Duration::ZERO);
        Err(wait)
    }

    fn prune(window: &mut VecDeque<(Instant, u64)>, now: Instant) {
        while let Some((at, _)) = window.front() {
            if now.duration_since(*at) >= WINDOW {
                window.pop_front();
            } else {
                break;
            }
        }
    }
}
