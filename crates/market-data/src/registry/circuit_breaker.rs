//! Per-provider circuit breaker for fault tolerance.
//!
//! Implements the circuit breaker pattern to prevent cascading failures
//! when a provider is experiencing issues. The circuit has three states:
//!
//! - **Closed**: Normal operation, requests are allowed through.
//! - **Open**: Provider is failing, requests are rejected without being attempted.
//! - **HalfOpen**: Testing if provider has recovered.
//!
//! Failures are counted in a sliding window: only failures younger than
//! `monitoring_window` count toward `failure_threshold`.
//!
//! The circuit breaker is in-memory and resets on application restart.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::errors::MarketDataError;
use crate::models::ProviderId;
use crate::utils::duration_serde::duration_ms;

/// Default number of failures before opening the circuit.
const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Default time to wait before transitioning from Open to HalfOpen.
const DEFAULT_RECOVERY_TIMEOUT: Duration = Duration::from_secs(60);

/// Number of successful requests needed to close the circuit from HalfOpen.
const DEFAULT_SUCCESS_THRESHOLD: u32 = 2;

/// Default age after which a failure stops counting.
const DEFAULT_MONITORING_WINDOW: Duration = Duration::from_secs(300);

/// Circuit breaker state.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Normal operation - requests are allowed.
    Closed,
    /// Provider is failing - requests are blocked.
    Open,
    /// Testing recovery - probe requests allowed.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Open => write!(f, "Open"),
            Self::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}

/// Circuit breaker configuration.
///
/// Durations are (de)serialized as milliseconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CircuitBreakerConfig {
    /// Number of failures inside the window before opening the circuit.
    /// Zero disables opening.
    pub failure_threshold: u32,
    /// Time to wait after the last failure before probing recovery.
    #[serde(with = "duration_ms")]
    pub recovery_timeout: Duration,
    /// Number of consecutive HalfOpen successes needed to close.
    pub success_threshold: u32,
    /// Failures older than this are forgotten.
    #[serde(with = "duration_ms")]
    pub monitoring_window: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            recovery_timeout: DEFAULT_RECOVERY_TIMEOUT,
            success_threshold: DEFAULT_SUCCESS_THRESHOLD,
            monitoring_window: DEFAULT_MONITORING_WINDOW,
        }
    }
}

/// Point-in-time view of a breaker.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakerStats {
    pub state: CircuitState,
    /// Failures inside the monitoring window.
    pub failure_count: u32,
    /// Consecutive successes while HalfOpen.
    pub success_count: u32,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub last_success_time: Option<DateTime<Utc>>,
    pub total_requests: u64,
    pub total_failures: u64,
    pub total_successes: u64,
    /// Percentage of attempted requests that succeeded (100 when idle).
    pub uptime: f64,
}

/// Internal mutable state, guarded by one mutex per breaker.
#[derive(Debug)]
struct Circuit {
    state: CircuitState,
    /// Timestamps of recent failures, oldest first.
    failures: VecDeque<Instant>,
    half_open_successes: u32,
    /// Monotonic time of the last failure (or forced open), for recovery.
    last_failure: Option<Instant>,
    last_failure_at: Option<DateTime<Utc>>,
    last_success_at: Option<DateTime<Utc>>,
    total_requests: u64,
    total_failures: u64,
    total_successes: u64,
}

impl Circuit {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failures: VecDeque::new(),
            half_open_successes: 0,
            last_failure: None,
            last_failure_at: None,
            last_success_at: None,
            total_requests: 0,
            total_failures: 0,
            total_successes: 0,
        }
    }

    fn prune(&mut self, window: Duration, now: Instant) {
        while let Some(oldest) = self.failures.front() {
            if now.saturating_duration_since(*oldest) >= window {
                self.failures.pop_front();
            } else {
                break;
            }
        }
    }

    fn recovery_elapsed(&self, recovery_timeout: Duration, now: Instant) -> bool {
        match self.last_failure {
            Some(last) => now.saturating_duration_since(last) >= recovery_timeout,
            None => true,
        }
    }

    fn close(&mut self) {
        self.state = CircuitState::Closed;
        self.failures.clear();
        self.half_open_successes = 0;
    }
}

/// Circuit breaker guarding a single provider.
///
/// Thread-safe: every transition decision and every success/failure
/// recording happens inside one critical section. The lock is never held
/// while the wrapped operation runs.
pub struct CircuitBreaker {
    name: ProviderId,
    config: CircuitBreakerConfig,
    circuit: Mutex<Circuit>,
}

impl CircuitBreaker {
    /// Create a breaker with default settings.
    pub fn new(name: impl Into<ProviderId>) -> Self {
        Self::with_config(name, CircuitBreakerConfig::default())
    }

    /// Create a breaker with custom configuration.
    pub fn with_config(name: impl Into<ProviderId>, mut config: CircuitBreakerConfig) -> Self {
        if config.success_threshold == 0 {
            config.success_threshold = 1;
        }
        Self {
            name: name.into(),
            config,
            circuit: Mutex::new(Circuit::new()),
        }
    }

    pub fn name(&self) -> &ProviderId {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Lock the circuit mutex, recovering from poison if necessary.
    ///
    /// For circuit breakers, it's safe to recover from a poisoned mutex since
    /// the worst case is slightly incorrect circuit state, which is better
    /// than panicking.
    fn lock_circuit(&self) -> MutexGuard<'_, Circuit> {
        self.circuit.lock().unwrap_or_else(|poisoned| {
            warn!("Circuit breaker mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Run `operation` through the breaker.
    ///
    /// Fails with [`MarketDataError::CircuitOpen`] without invoking the
    /// operation while the circuit is Open and the recovery timeout has not
    /// elapsed. Otherwise the operation is invoked and its outcome recorded.
    /// A call dropped before it completes is recorded as a failure.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T, MarketDataError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, MarketDataError>>,
    {
        self.acquire()?;
        let mut in_flight = InFlight {
            breaker: self,
            settled: false,
        };

        let result = operation().await;
        in_flight.settled = true;

        match result {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                self.record_failure();
                Err(e)
            }
        }
    }

    /// Admission check. Moves Open -> HalfOpen once recovery has elapsed and
    /// counts the request.
    fn acquire(&self) -> Result<(), MarketDataError> {
        let mut circuit = self.lock_circuit();
        let now = Instant::now();

        if circuit.state == CircuitState::Open {
            if !circuit.recovery_elapsed(self.config.recovery_timeout, now) {
                debug!("Circuit breaker: rejecting call to '{}' (open)", self.name);
                return Err(MarketDataError::CircuitOpen {
                    provider: self.name.to_string(),
                });
            }
            info!(
                "Circuit breaker: transitioning '{}' from Open to HalfOpen",
                self.name
            );
            circuit.state = CircuitState::HalfOpen;
            circuit.half_open_successes = 0;
        }

        circuit.total_requests += 1;
        Ok(())
    }

    fn record_success(&self) {
        let mut circuit = self.lock_circuit();

        circuit.total_successes += 1;
        circuit.last_success_at = Some(Utc::now());

        match circuit.state {
            CircuitState::Closed => {
                // Rolling failure evidence is reset by any success
                circuit.failures.clear();
                debug!(
                    "Circuit breaker: success for '{}', failure log cleared",
                    self.name
                );
            }
            CircuitState::HalfOpen => {
                circuit.half_open_successes += 1;
                debug!(
                    "Circuit breaker: success for '{}' in HalfOpen ({}/{})",
                    self.name, circuit.half_open_successes, self.config.success_threshold
                );

                if circuit.half_open_successes >= self.config.success_threshold {
                    info!(
                        "Circuit breaker: closing circuit for '{}' after {} successes",
                        self.name, circuit.half_open_successes
                    );
                    circuit.close();
                }
            }
            CircuitState::Open => {
                // A call admitted before a concurrent reopen or force_open
                debug!(
                    "Circuit breaker: late success for '{}' while open",
                    self.name
                );
            }
        }
    }

    fn record_failure(&self) {
        let mut circuit = self.lock_circuit();
        let now = Instant::now();

        circuit.total_failures += 1;
        circuit.last_failure = Some(now);
        circuit.last_failure_at = Some(Utc::now());
        circuit.failures.push_back(now);
        circuit.prune(self.config.monitoring_window, now);

        match circuit.state {
            CircuitState::Closed => {
                let failures = circuit.failures.len() as u32;
                if self.config.failure_threshold > 0 && failures >= self.config.failure_threshold
                {
                    info!(
                        "Circuit breaker: opening circuit for '{}' after {} failures",
                        self.name, failures
                    );
                    circuit.state = CircuitState::Open;
                } else {
                    debug!(
                        "Circuit breaker: failure for '{}' ({}/{})",
                        self.name, failures, self.config.failure_threshold
                    );
                }
            }
            CircuitState::HalfOpen => {
                // Any failure in HalfOpen immediately reopens the circuit
                info!(
                    "Circuit breaker: reopening circuit for '{}' after failure in HalfOpen",
                    self.name
                );
                circuit.state = CircuitState::Open;
                circuit.half_open_successes = 0;
            }
            CircuitState::Open => {
                debug!(
                    "Circuit breaker: additional failure for '{}' (already open)",
                    self.name
                );
            }
        }
    }

    /// Current state. Does not perform the Open -> HalfOpen transition.
    pub fn state(&self) -> CircuitState {
        self.lock_circuit().state
    }

    /// Whether a call made now would be attempted.
    pub fn is_available(&self) -> bool {
        let circuit = self.lock_circuit();
        match circuit.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                circuit.recovery_elapsed(self.config.recovery_timeout, Instant::now())
            }
        }
    }

    /// Snapshot of the breaker's counters.
    pub fn stats(&self) -> CircuitBreakerStats {
        let mut circuit = self.lock_circuit();
        circuit.prune(self.config.monitoring_window, Instant::now());

        let uptime = if circuit.total_requests == 0 {
            100.0
        } else {
            circuit.total_successes as f64 / circuit.total_requests as f64 * 100.0
        };

        CircuitBreakerStats {
            state: circuit.state,
            failure_count: circuit.failures.len() as u32,
            success_count: circuit.half_open_successes,
            last_failure_time: circuit.last_failure_at,
            last_success_time: circuit.last_success_at,
            total_requests: circuit.total_requests,
            total_failures: circuit.total_failures,
            total_successes: circuit.total_successes,
            uptime,
        }
    }

    /// Open the circuit regardless of recorded failures.
    ///
    /// The recovery timer restarts now. The failure log and lifetime totals
    /// are left untouched.
    pub fn force_open(&self) {
        let mut circuit = self.lock_circuit();
        info!("Circuit breaker: forcing circuit for '{}' open", self.name);
        circuit.state = CircuitState::Open;
        circuit.half_open_successes = 0;
        circuit.last_failure = Some(Instant::now());
    }

    /// Close the circuit and forget recent failures. Lifetime totals are kept.
    pub fn force_close(&self) {
        let mut circuit = self.lock_circuit();
        info!("Circuit breaker: forcing circuit for '{}' closed", self.name);
        circuit.close();
        circuit.last_failure = None;
    }
}

/// Records a failure for an admitted call whose future is dropped before it
/// completes, e.g. when an enclosing timeout abandons it.
struct InFlight<'a> {
    breaker: &'a CircuitBreaker,
    settled: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            debug!(
                "Circuit breaker: call to '{}' abandoned before completion",
                self.breaker.name
            );
            self.breaker.record_failure();
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn breaker(failure_threshold: u32, recovery_ms: u64, success_threshold: u32) -> CircuitBreaker {
        CircuitBreaker::with_config(
            "TEST_PROVIDER",
            CircuitBreakerConfig {
                failure_threshold,
                recovery_timeout: Duration::from_millis(recovery_ms),
                success_threshold,
                monitoring_window: Duration::from_secs(60),
            },
        )
    }

    async fn fail(cb: &CircuitBreaker) -> Result<(), MarketDataError> {
        cb.execute(|| async { Err::<(), _>(MarketDataError::provider("TEST_PROVIDER", "boom")) })
            .await
    }

    async fn succeed(cb: &CircuitBreaker) -> Result<(), MarketDataError> {
        cb.execute(|| async { Ok(()) }).await
    }

    #[tokio::test]
    async fn test_circuit_starts_closed() {
        let cb = CircuitBreaker::new("TEST_PROVIDER");

        assert!(cb.is_available());
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.stats().uptime, 100.0);
    }

    #[tokio::test]
    async fn test_circuit_opens_after_threshold_and_fails_fast() {
        let cb = breaker(3, 60_000, 2);
        let invocations = AtomicUsize::new(0);

        for _ in 0..3 {
            let result = cb
                .execute(|| async {
                    invocations.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(MarketDataError::provider("TEST_PROVIDER", "boom"))
                })
                .await;
            assert!(matches!(result, Err(MarketDataError::ProviderError { .. })));
        }
        assert_eq!(cb.state(), CircuitState::Open);

        let result = cb
            .execute(|| async {
                invocations.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert!(result.unwrap_err().is_circuit_open());
        assert_eq!(invocations.load(Ordering::SeqCst), 3);
        assert_eq!(cb.stats().total_requests, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovery_timeout_scenario() {
        let cb = breaker(3, 1000, 2);
        let invocations = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let _ = fail(&cb).await;
        }
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_millis(500)).await;
        let counter = invocations.clone();
        let result = cb
            .execute(|| async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert!(result.unwrap_err().is_circuit_open());
        assert_eq!(invocations.load(Ordering::SeqCst), 0);

        tokio::time::advance(Duration::from_millis(501)).await;
        assert!(cb.is_available());
        let counter = invocations.clone();
        let result = cb
            .execute(|| async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert!(result.is_ok());
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_closes_after_consecutive_successes() {
        let cb = breaker(1, 10, 2);

        let _ = fail(&cb).await;
        tokio::time::advance(Duration::from_millis(20)).await;

        succeed(&cb).await.unwrap();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert_eq!(cb.stats().success_count, 1);

        succeed(&cb).await.unwrap();
        assert_eq!(cb.state(), CircuitState::Closed);
        let stats = cb.stats();
        assert_eq!(stats.success_count, 0);
        assert_eq!(stats.failure_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_reopens_on_failure() {
        let cb = breaker(1, 10, 3);

        let _ = fail(&cb).await;
        tokio::time::advance(Duration::from_millis(20)).await;

        succeed(&cb).await.unwrap();
        assert_eq!(cb.stats().success_count, 1);

        let _ = fail(&cb).await;
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.stats().success_count, 0);

        // Recovery timer restarted from the HalfOpen failure
        assert!(fail(&cb).await.unwrap_err().is_circuit_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_failure_moves_through_half_open() {
        let cb = breaker(2, 100, 1);

        let _ = fail(&cb).await;
        let _ = fail(&cb).await;
        tokio::time::advance(Duration::from_millis(100)).await;

        let result = fail(&cb).await;
        assert!(matches!(result, Err(MarketDataError::ProviderError { .. })));
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.stats().total_requests, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_outside_window_do_not_count() {
        let cb = CircuitBreaker::with_config(
            "WINDOWED",
            CircuitBreakerConfig {
                failure_threshold: 3,
                recovery_timeout: Duration::from_secs(1),
                success_threshold: 1,
                monitoring_window: Duration::from_secs(10),
            },
        );

        let _ = fail(&cb).await;
        let _ = fail(&cb).await;
        assert_eq!(cb.stats().failure_count, 2);

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(cb.stats().failure_count, 0);

        let _ = fail(&cb).await;
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.stats().failure_count, 1);
        assert_eq!(cb.stats().total_failures, 3);
    }

    #[tokio::test]
    async fn test_success_in_closed_clears_failure_log() {
        let cb = breaker(3, 60_000, 1);

        let _ = fail(&cb).await;
        let _ = fail(&cb).await;
        assert_eq!(cb.stats().failure_count, 2);

        succeed(&cb).await.unwrap();
        assert_eq!(cb.stats().failure_count, 0);

        let _ = fail(&cb).await;
        let _ = fail(&cb).await;
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_zero_threshold_never_opens() {
        let cb = breaker(0, 60_000, 1);

        for _ in 0..20 {
            let _ = fail(&cb).await;
        }
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.is_available());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_and_deferred_failures_are_identical() {
        let ready = breaker(2, 60_000, 1);
        let deferred = breaker(2, 60_000, 1);

        for _ in 0..2 {
            let _ = ready
                .execute(|| std::future::ready(Err::<(), _>(MarketDataError::provider("X", "sync"))))
                .await;
            let _ = deferred
                .execute(|| async {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Err::<(), _>(MarketDataError::provider("X", "async"))
                })
                .await;
        }

        assert_eq!(ready.state(), CircuitState::Open);
        assert_eq!(deferred.state(), CircuitState::Open);
        assert_eq!(ready.stats().total_failures, deferred.stats().total_failures);
    }

    #[tokio::test]
    async fn test_uptime_tracks_success_ratio() {
        let cb = breaker(0, 60_000, 1);

        succeed(&cb).await.unwrap();
        succeed(&cb).await.unwrap();
        succeed(&cb).await.unwrap();
        let _ = fail(&cb).await;

        let stats = cb.stats();
        assert_eq!(stats.total_requests, 4);
        assert_eq!(stats.total_successes, 3);
        assert_eq!(stats.total_failures, 1);
        assert!((stats.uptime - 75.0).abs() < f64::EPSILON);
        assert!(stats.last_success_time.is_some());
        assert!(stats.last_failure_time.is_some());
    }

    #[tokio::test]
    async fn test_rejections_do_not_count_as_requests() {
        let cb = breaker(1, 60_000, 1);

        let _ = fail(&cb).await;
        for _ in 0..5 {
            assert!(succeed(&cb).await.unwrap_err().is_circuit_open());
        }

        let stats = cb.stats();
        assert_eq!(stats.total_requests, 1);
        assert!((0.0..=100.0).contains(&stats.uptime));
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_open_and_close() {
        let cb = breaker(3, 1000, 1);

        let _ = fail(&cb).await;
        cb.force_open();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.is_available());
        assert_eq!(cb.stats().failure_count, 1);
        assert_eq!(cb.stats().total_failures, 1);
        assert!(succeed(&cb).await.unwrap_err().is_circuit_open());

        cb.force_close();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.stats().failure_count, 0);
        assert_eq!(cb.stats().total_failures, 1);

        // Counting restarts from an empty log after the override
        let _ = fail(&cb).await;
        let _ = fail(&cb).await;
        assert_eq!(cb.state(), CircuitState::Closed);
        let _ = fail(&cb).await;
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_open_recovers_after_timeout() {
        let cb = breaker(3, 1000, 1);

        cb.force_open();
        tokio::time::advance(Duration::from_millis(1000)).await;

        succeed(&cb).await.unwrap();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_failures_open_once() {
        let cb = Arc::new(breaker(5, 60_000, 1));

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let cb = cb.clone();
                tokio::spawn(async move {
                    let _ = fail(&cb).await;
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let stats = cb.stats();
        assert_eq!(stats.state, CircuitState::Open);
        assert_eq!(stats.total_requests, stats.total_failures);
        assert!(stats.total_failures >= 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_call_counts_as_failure() {
        let cb = breaker(1, 60_000, 1);

        let result = tokio::time::timeout(
            Duration::from_millis(100),
            cb.execute(|| async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            }),
        )
        .await;
        assert!(result.is_err());

        let stats = cb.stats();
        assert_eq!(stats.total_requests, 1);
        assert_eq!(stats.total_failures, 1);
        assert_eq!(stats.state, CircuitState::Open);
    }

    #[test]
    fn test_zero_success_threshold_is_clamped() {
        let cb = breaker(1, 10, 0);
        assert_eq!(cb.config().success_threshold, 1);
    }
}
