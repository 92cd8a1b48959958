//! Data service configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::MarketDataError;
use crate::registry::{CircuitBreakerConfig, DEFAULT_ATTEMPT_TIMEOUT};
use crate::utils::duration_serde::{duration_ms, duration_ms_option};

/// Default interval between background health sweeps.
const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Default bound for a single health check.
const DEFAULT_HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Consecutive failures after which a provider is reported unhealthy.
const DEFAULT_UNHEALTHY_AFTER_FAILURES: u32 = 3;

/// Configuration for [`ResilientDataService`](super::ResilientDataService).
///
/// Durations are (de)serialized as milliseconds and every field has a
/// default, so partial JSON documents are accepted:
///
/// ```
/// use coinwatch_market_data::ResilientServiceConfig;
///
/// let config = ResilientServiceConfig::from_json(r#"{ "enableFailover": false }"#).unwrap();
/// assert!(!config.enable_failover);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResilientServiceConfig {
    /// Walk the whole provider chain on every call (true), or only call the
    /// active provider through its circuit breaker (false).
    pub enable_failover: bool,

    /// Interval of the background health sweep. `None` disables it.
    #[serde(with = "duration_ms_option")]
    pub health_check_interval: Option<Duration>,

    /// Bound for each provider health check.
    #[serde(with = "duration_ms")]
    pub health_check_timeout: Duration,

    /// Bound for each provider call.
    #[serde(with = "duration_ms")]
    pub request_timeout: Duration,

    /// Maximum providers invoked per chain call. `None` means all of them.
    pub max_attempts: Option<usize>,

    /// Health-check providers before calling them in chain mode.
    pub skip_unhealthy_providers: bool,

    /// Consecutive failed calls after which a provider's status turns unhealthy.
    pub unhealthy_after_failures: u32,

    /// Settings applied to every provider's circuit breaker.
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for ResilientServiceConfig {
    fn default() -> Self {
        Self {
            enable_failover: true,
            health_check_interval: Some(DEFAULT_HEALTH_CHECK_INTERVAL),
            health_check_timeout: DEFAULT_HEALTH_CHECK_TIMEOUT,
            request_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            max_attempts: None,
            skip_unhealthy_providers: false,
            unhealthy_after_failures: DEFAULT_UNHEALTHY_AFTER_FAILURES,
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl ResilientServiceConfig {
    /// Parse a JSON document, filling missing fields with defaults.
    pub fn from_json(json: &str) -> Result<Self, MarketDataError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_failover(mut self, enabled: bool) -> Self {
        self.enable_failover = enabled;
        self
    }

    pub fn with_health_check_interval(mut self, interval: Option<Duration>) -> Self {
        self.health_check_interval = interval;
        self
    }

    pub fn with_health_check_timeout(mut self, timeout: Duration) -> Self {
        self.health_check_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: Option<usize>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_skip_unhealthy_providers(mut self, skip: bool) -> Self {
        self.skip_unhealthy_providers = skip;
        self
    }

    pub fn with_circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = config;
        self
    }
}
