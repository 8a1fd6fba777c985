//! Pattern-based classification of upstream error messages.
//!
//! The inference collaborator is a black box; the only thing this subsystem
//! inspects is whether a failure looks like upstream throttling, which feeds
//! the `throttled_requests` statistic.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref THROTTLE_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)throttl").unwrap(),
        Regex::new(r"(?i)too many requests").unwrap(),
        Regex::new(r"\b503\b").unwrap(),
    ];
}

/// Check if an upstream error message matches a throttling signature.
pub fn is_throttle_error(message: &str) -> bool {
    THROTTLE_PATTERNS
        .iter()
        .any(|pattern| pattern.is_match(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_known_throttle_signatures() {
        assert!(is_throttle_error("ThrottlingException: rate exceeded"));
        assert!(is_throttle_error("HTTP 503 service unavailable"));
        assert!(is_throttle_error("Too Many Requests"));
        assert!(is_throttle_error("request was throttled upstream"));
    }

    #[test]
    fn ignores_other_failures() {
        assert!(!is_throttle_error("connection reset by peer"));
        assert!(!is_throttle_error("invalid api key"));
        assert!(!is_throttle_error("HTTP 500 internal error"));
        // "503" must be a standalone token, not part of a larger number
        assert!(!is_throttle_error("took 15033ms"));
    }
}
