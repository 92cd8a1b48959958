//! Per-provider attempt tracking for chain execution diagnostics.

use std::time::Duration;

use crate::models::ProviderId;

/// Why a provider was passed over without being invoked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// Health check answered `false`.
    Unhealthy,

    /// Health check did not answer within the attempt timeout.
    HealthCheckTimedOut,

    /// The provider's circuit breaker rejected the call without attempting it.
    CircuitOpen,
}

/// What happened to one provider during a chain execution.
#[derive(Clone, Debug, PartialEq)]
pub enum AttemptOutcome {
    Skipped(SkipReason),
    Failed { error: String },
    TimedOut { after: Duration },
    Succeeded,
}

/// Record of a single provider visit during a chain execution.
#[derive(Clone, Debug)]
pub struct AttemptRecord {
    pub provider_id: ProviderId,
    pub outcome: AttemptOutcome,
    /// Time spent on this provider (health check and/or call).
    pub duration: Duration,
}

/// Ordered provenance of a chain execution.
#[derive(Clone, Debug, Default)]
pub struct FetchDiagnostics {
    pub attempts: Vec<AttemptRecord>,
}

impl FetchDiagnostics {
    pub fn new() -> Self {
        Self {
            attempts: Vec::new(),
        }
    }

    pub fn record_skip(&mut self, provider_id: ProviderId, reason: SkipReason, duration: Duration) {
        self.attempts.push(AttemptRecord {
            provider_id,
            outcome: AttemptOutcome::Skipped(reason),
            duration,
        });
    }

    pub fn record_error(&mut self, provider_id: ProviderId, error: String, duration: Duration) {
        self.attempts.push(AttemptRecord {
            provider_id,
            outcome: AttemptOutcome::Failed { error },
            duration,
        });
    }

    pub fn record_timeout(&mut self, provider_id: ProviderId, after: Duration) {
        self.attempts.push(AttemptRecord {
            provider_id,
            outcome: AttemptOutcome::TimedOut { after },
            duration: after,
        });
    }

    pub fn record_success(&mut self, provider_id: ProviderId, duration: Duration) {
        self.attempts.push(AttemptRecord {
            provider_id,
            outcome: AttemptOutcome::Succeeded,
            duration,
        });
    }

    /// Providers that failed or were skipped, in traversal order.
    pub fn failed_providers(&self) -> Vec<ProviderId> {
        self.attempts
            .iter()
            .filter(|a| a.outcome != AttemptOutcome::Succeeded)
            .map(|a| a.provider_id.clone())
            .collect()
    }

    /// Summary for logging/debugging.
    pub fn summary(&self) -> String {
        self.attempts
            .iter()
            .map(|a| match &a.outcome {
                AttemptOutcome::Succeeded => format!("{}: SUCCESS", a.provider_id),
                AttemptOutcome::Skipped(reason) => {
                    format!("{}: SKIPPED ({:?})", a.provider_id, reason)
                }
                AttemptOutcome::Failed { error } => format!("{}: ERROR ({})", a.provider_id, error),
                AttemptOutcome::TimedOut { after } => {
                    format!("{}: TIMEOUT ({:?})", a.provider_id, after)
                }
            })
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    /// Check if any provider succeeded.
    pub fn has_success(&self) -> bool {
        self.attempts
            .iter()
            .any(|a| a.outcome == AttemptOutcome::Succeeded)
    }

    /// Get all skip reasons.
    pub fn skip_reasons(&self) -> Vec<(&ProviderId, &SkipReason)> {
        self.attempts
            .iter()
            .filter_map(|a| match &a.outcome {
                AttemptOutcome::Skipped(reason) => Some((&a.provider_id, reason)),
                _ => None,
            })
            .collect()
    }
}
