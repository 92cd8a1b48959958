//! Provider chain - ordered failover across market data providers.
//!
//! The chain walks its providers in order and returns the first success,
//! together with the provenance of every provider visited before it.
//! Attempts are strictly sequential and each one is bounded by a timeout,
//! so one slow provider cannot stall the whole chain.

use std::borrow::Cow;
use std::future::Future;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use log::{debug, warn};
use tokio::time::{timeout, Instant};

use super::diagnostics::{FetchDiagnostics, SkipReason};
use crate::errors::MarketDataError;
use crate::models::ProviderId;
use crate::provider::MarketDataProvider;

/// Default bound for a single attempt or health check.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-execution options.
#[derive(Clone, Debug)]
pub struct ChainOptions {
    /// Maximum number of providers actually invoked. Defaults to the chain length.
    pub max_attempts: Option<usize>,
    /// Health-check each provider first and skip the ones that fail.
    pub skip_unhealthy_providers: bool,
    /// Bound for each attempt (and each health check).
    pub timeout: Duration,
}

impl Default for ChainOptions {
    fn default() -> Self {
        Self {
            max_attempts: None,
            skip_unhealthy_providers: false,
            timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }
}

/// Successful chain execution with provenance.
#[derive(Clone, Debug)]
pub struct ChainExecutionResult<T> {
    pub data: T,
    /// Provider that produced `data`.
    pub provider_id: ProviderId,
    /// Providers invoked, including the successful one. Skipped providers are not counted.
    pub attempts: usize,
    /// Providers that failed or were skipped before the success, in order.
    pub failed_providers: Vec<ProviderId>,
    pub elapsed: Duration,
    pub diagnostics: FetchDiagnostics,
}

/// Ordered, mutable list of providers tried in turn until one succeeds.
pub struct ProviderChain {
    nodes: RwLock<Vec<Arc<dyn MarketDataProvider>>>,
}

impl ProviderChain {
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(Vec::new()),
        }
    }

    /// Build a chain in the given order. Duplicate ids are rejected.
    pub fn from_providers(
        providers: impl IntoIterator<Item = Arc<dyn MarketDataProvider>>,
    ) -> Result<Self, MarketDataError> {
        let chain = Self::new();
        for provider in providers {
            chain.add_provider(provider)?;
        }
        Ok(chain)
    }

    fn read_nodes(&self) -> RwLockReadGuard<'_, Vec<Arc<dyn MarketDataProvider>>> {
        self.nodes.read().unwrap_or_else(|poisoned| {
            warn!("Provider chain lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write_nodes(&self) -> RwLockWriteGuard<'_, Vec<Arc<dyn MarketDataProvider>>> {
        self.nodes.write().unwrap_or_else(|poisoned| {
            warn!("Provider chain lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Append a provider at the tail of the chain.
    pub fn add_provider(&self, provider: Arc<dyn MarketDataProvider>) -> Result<(), MarketDataError> {
        let mut nodes = self.write_nodes();
        if nodes.iter().any(|p| p.id() == provider.id()) {
            return Err(MarketDataError::DuplicateProvider(provider.id().to_string()));
        }
        debug!(
            "Provider chain: added '{}' at position {}",
            provider.id(),
            nodes.len()
        );
        nodes.push(provider);
        Ok(())
    }

    /// Remove a provider by id. Returns false if it was not in the chain.
    pub fn remove_provider(&self, id: &str) -> bool {
        let mut nodes = self.write_nodes();
        let before = nodes.len();
        nodes.retain(|p| p.id() != id);
        let removed = nodes.len() != before;
        if removed {
            debug!("Provider chain: removed '{}'", id);
        }
        removed
    }

    /// Providers in traversal order.
    pub fn providers(&self) -> Vec<Arc<dyn MarketDataProvider>> {
        self.read_nodes().clone()
    }

    pub fn provider(&self, id: &str) -> Option<Arc<dyn MarketDataProvider>> {
        self.read_nodes().iter().find(|p| p.id() == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read_nodes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_nodes().is_empty()
    }

    /// Stable sort by ascending priority (lower is tried first).
    pub fn reorder_by_priority(&self) {
        self.write_nodes().sort_by_key(|p| p.priority());
    }

    /// Run `operation` against each provider in order until one succeeds.
    ///
    /// Walks a snapshot of the chain taken at call time, so concurrent
    /// add/remove calls never cause a provider to be visited twice.
    /// Operations rejected with [`MarketDataError::CircuitOpen`] are recorded
    /// as skipped and do not consume an attempt.
    /// Fails with [`MarketDataError::ChainExhausted`] once `max_attempts`
    /// providers have been invoked or the chain runs out.
    pub async fn execute<T, F, Fut>(
        &self,
        operation_name: &str,
        operation: F,
        options: &ChainOptions,
    ) -> Result<ChainExecutionResult<T>, MarketDataError>
    where
        F: Fn(Arc<dyn MarketDataProvider>) -> Fut,
        Fut: Future<Output = Result<T, MarketDataError>>,
    {
        self.execute_traced(operation_name, operation, options)
            .await
            .map_err(|(error, _)| error)
    }

    /// Same as [`execute`](Self::execute), but keeps the attempt
    /// diagnostics when the chain is exhausted.
    pub async fn execute_traced<T, F, Fut>(
        &self,
        operation_name: &str,
        operation: F,
        options: &ChainOptions,
    ) -> Result<ChainExecutionResult<T>, (MarketDataError, FetchDiagnostics)>
    where
        F: Fn(Arc<dyn MarketDataProvider>) -> Fut,
        Fut: Future<Output = Result<T, MarketDataError>>,
    {
        let nodes = self.providers();
        let max_attempts = options.max_attempts.unwrap_or(nodes.len());
        let started = Instant::now();
        let mut attempts = 0usize;
        let mut diagnostics = FetchDiagnostics::new();

        for provider in nodes {
            if attempts >= max_attempts {
                debug!(
                    "Provider chain: '{}' reached max attempts ({})",
                    operation_name, max_attempts
                );
                break;
            }

            let provider_id: ProviderId = Cow::Borrowed(provider.id());

            if options.skip_unhealthy_providers {
                let check_started = Instant::now();
                match timeout(options.timeout, provider.health_check()).await {
                    Ok(true) => {}
                    Ok(false) => {
                        debug!(
                            "Provider chain: skipping unhealthy '{}' for '{}'",
                            provider_id, operation_name
                        );
                        diagnostics.record_skip(
                            provider_id,
                            SkipReason::Unhealthy,
                            check_started.elapsed(),
                        );
                        continue;
                    }
                    Err(_) => {
                        debug!(
                            "Provider chain: health check for '{}' timed out, skipping",
                            provider_id
                        );
                        diagnostics.record_skip(
                            provider_id,
                            SkipReason::HealthCheckTimedOut,
                            check_started.elapsed(),
                        );
                        continue;
                    }
                }
            }

            attempts += 1;
            let attempt_started = Instant::now();

            match timeout(options.timeout, operation(provider.clone())).await {
                Ok(Ok(data)) => {
                    diagnostics.record_success(provider_id.clone(), attempt_started.elapsed());
                    let failed_providers = diagnostics.failed_providers();
                    debug!(
                        "Provider chain: '{}' served by '{}' after {} attempts ({})",
                        operation_name,
                        provider_id,
                        attempts,
                        diagnostics.summary()
                    );
                    return Ok(ChainExecutionResult {
                        data,
                        provider_id,
                        attempts,
                        failed_providers,
                        elapsed: started.elapsed(),
                        diagnostics,
                    });
                }
                Ok(Err(e)) if e.is_circuit_open() => {
                    attempts -= 1;
                    debug!(
                        "Provider chain: circuit open for '{}', skipping",
                        provider_id
                    );
                    diagnostics.record_skip(
                        provider_id,
                        SkipReason::CircuitOpen,
                        attempt_started.elapsed(),
                    );
                }
                Ok(Err(e)) => {
                    debug!(
                        "Provider chain: '{}' failed on '{}': {}, trying next",
                        operation_name, provider_id, e
                    );
                    diagnostics.record_error(provider_id, e.to_string(), attempt_started.elapsed());
                }
                Err(_) => {
                    // The in-flight call is dropped here; a late answer cannot reach the caller
                    debug!(
                        "Provider chain: '{}' timed out on '{}' after {:?}, trying next",
                        operation_name, provider_id, options.timeout
                    );
                    diagnostics.record_timeout(provider_id, options.timeout);
                }
            }
        }

        let elapsed = started.elapsed();
        warn!(
            "Provider chain: '{}' exhausted after {} attempts in {:?} ({})",
            operation_name,
            attempts,
            elapsed,
            diagnostics.summary()
        );

        let error = MarketDataError::ChainExhausted {
            operation: operation_name.to_string(),
            attempts,
            failed_providers: diagnostics.failed_providers(),
            elapsed,
        };
        Err((error, diagnostics))
    }
}

impl Default for ProviderChain {
    fn default() -> Self {
        Self::new()
    }
}
