use failsafe::{backoff, failure_policy, CircuitBreaker, Config, StateMachine};
use std::time::Duration;

/// Breaker guarding a single registry mirror.
pub type MirrorBreaker =
    StateMachine<failure_policy::ConsecutiveFailures<backoff::Exponential>, ()>;

/// Creates a circuit breaker for one registry mirror.
///
/// - **Failure threshold**: 5 consecutive soft failures open the breaker.
/// - **Backoff**: exponential from 10s to 60s before a half-open probe.
///
/// While open, the mirror is skipped and the lookup moves on to the next one.
pub fn create_mirror_circuit_breaker() -> MirrorBreaker {
    let backoff_strategy = backoff::exponential(Duration::from_secs(10), Duration::from_secs(60));
    let policy = failure_policy::consecutive_failures(5, backoff_strategy);
    Config::new().failure_policy(policy).build()
}

/// Feeds the outcome of an async mirror call back into the breaker.
pub fn record_outcome(breaker: &MirrorBreaker, success: bool) {
    let _ = breaker.call(|| if success { Ok(()) } else { Err(()) });
}
