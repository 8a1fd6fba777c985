use thiserror::Error;

/// Admission-side failures. "Not yet admitted" is never an error — callers
/// wait; these only report a deadline miss or an open circuit.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ThrottleError {
    #[error("could not admit request within deadline, waited {waited_secs:.1}s")]
    AdmissionTimeout { waited_secs: f64 },

    #[error("circuit breaker open for '{model_id}', cooldown: {remaining_secs:.0}s")]
    CircuitOpen {
        model_id: String,
        remaining_secs: f64,
    },
}
