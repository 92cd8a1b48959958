//! Resilient data service - the façade the rest of the application calls.
//!
//! Owns one circuit breaker per provider and a priority-ordered
//! [`ProviderChain`] built from the same providers. Each call either walks
//! the chain (failover mode) or goes straight to the active provider through
//! its breaker (fast path). Per-provider status is tracked after every
//! attempt and every health sweep, and pushed to status listeners.

use std::borrow::Cow;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use log::{debug, info, warn};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, timeout, Instant, MissedTickBehavior};

use super::config::ResilientServiceConfig;
use super::realtime::{RealtimeSubscriptions, SubscriptionId};
use super::status::{
    ChainNodeStatus, ChainStatus, ListenerId, ProviderStatus, StatusListener, StatusListeners,
    StatusSnapshot,
};
use crate::errors::MarketDataError;
use crate::models::{
    Candle, ExtendedDataOptions, ExtendedPriceData, Interval, PriceData, ProviderId,
};
use crate::provider::{MarketDataProvider, PriceCallback};
use crate::registry::{
    AttemptOutcome, ChainOptions, CircuitBreaker, CircuitState, FetchDiagnostics, ProviderChain,
    SkipReason,
};

/// Multi-provider market data service with failover, circuit breaking and
/// health tracking.
///
/// Construct it once and share it behind an `Arc`. Background health
/// checking is started explicitly with
/// [`start_health_monitor`](Self::start_health_monitor) (or by building the
/// service with [`spawn`](Self::spawn)) and stops on [`destroy`](Self::destroy)
/// or when the service is dropped.
pub struct ResilientDataService {
    state: Arc<ServiceState>,
    monitor: Mutex<Option<HealthMonitorHandle>>,
}

struct HealthMonitorHandle {
    shutdown: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

struct ServiceState {
    config: ResilientServiceConfig,
    chain: ProviderChain,
    breakers: HashMap<ProviderId, CircuitBreaker>,
    statuses: RwLock<HashMap<ProviderId, ProviderStatus>>,
    listeners: StatusListeners,
    subscriptions: RealtimeSubscriptions,
    destroyed: AtomicBool,
}

impl ResilientDataService {
    /// Build a service over `providers`, ordered by ascending priority.
    ///
    /// Ties keep their registration order. The first provider starts out
    /// active and every provider starts out healthy. Fails with
    /// [`MarketDataError::DuplicateProvider`] if two providers share an id.
    pub fn new(
        providers: Vec<Arc<dyn MarketDataProvider>>,
        config: ResilientServiceConfig,
    ) -> Result<Self, MarketDataError> {
        let chain = ProviderChain::from_providers(providers)?;
        chain.reorder_by_priority();
        let ordered = chain.providers();

        let mut breakers = HashMap::with_capacity(ordered.len());
        let mut statuses = HashMap::with_capacity(ordered.len());
        for (position, provider) in ordered.iter().enumerate() {
            let id: ProviderId = Cow::Borrowed(provider.id());
            let breaker = CircuitBreaker::with_config(id.clone(), config.circuit_breaker.clone());
            statuses.insert(
                id.clone(),
                ProviderStatus {
                    provider_id: id.clone(),
                    priority: provider.priority(),
                    is_healthy: true,
                    is_active: position == 0,
                    last_checked: None,
                    consecutive_failures: 0,
                    last_response_time: None,
                    circuit_breaker: breaker.stats(),
                },
            );
            breakers.insert(id, breaker);
        }

        info!(
            "Resilient data service: {} providers [{}], failover {}",
            ordered.len(),
            ordered.iter().map(|p| p.id()).collect::<Vec<_>>().join(", "),
            if config.enable_failover { "enabled" } else { "disabled" }
        );

        Ok(Self {
            state: Arc::new(ServiceState {
                config,
                chain,
                breakers,
                statuses: RwLock::new(statuses),
                listeners: StatusListeners::new(),
                subscriptions: RealtimeSubscriptions::new(),
                destroyed: AtomicBool::new(false),
            }),
            monitor: Mutex::new(None),
        })
    }

    /// Build a service and start its health monitor on the current runtime.
    pub fn spawn(
        providers: Vec<Arc<dyn MarketDataProvider>>,
        config: ResilientServiceConfig,
    ) -> Result<Self, MarketDataError> {
        let service = Self::new(providers, config)?;
        service.start_health_monitor();
        Ok(service)
    }

    pub fn config(&self) -> &ResilientServiceConfig {
        &self.state.config
    }

    /// Current spot price for `symbol`.
    pub async fn get_current_price(&self, symbol: &str) -> Result<PriceData, MarketDataError> {
        self.state
            .run("getCurrentPrice", move |provider| async move {
                provider.get_current_price(symbol).await
            })
            .await
    }

    /// The last `limit` candles for `symbol` at `interval`.
    pub async fn get_historical_data(
        &self,
        symbol: &str,
        interval: Interval,
        limit: usize,
    ) -> Result<Vec<Candle>, MarketDataError> {
        self.state
            .run("getHistoricalData", move |provider| async move {
                provider.get_historical_data(symbol, interval, limit).await
            })
            .await
    }

    /// Price plus market metrics.
    ///
    /// Providers without extended data support answer with their basic price,
    /// returned with `synthesized` set and the extended fields left empty.
    pub async fn get_extended_data(
        &self,
        symbol: &str,
        options: &ExtendedDataOptions,
    ) -> Result<ExtendedPriceData, MarketDataError> {
        self.state
            .run("getExtendedData", move |provider| async move {
                if provider.capabilities().supports_extended {
                    provider.get_extended_data(symbol, options).await
                } else {
                    debug!(
                        "Provider '{}' has no extended data, synthesizing from spot price",
                        provider.id()
                    );
                    provider
                        .get_current_price(symbol)
                        .await
                        .map(ExtendedPriceData::from)
                }
            })
            .await
    }

    /// Make `provider_id` the active provider if its health check passes.
    ///
    /// Returns false for unknown providers, failed or timed out health
    /// checks, and after [`destroy`](Self::destroy).
    pub async fn switch_provider(&self, provider_id: &str) -> bool {
        if self.state.is_destroyed() {
            return false;
        }
        let Some(provider) = self.state.chain.provider(provider_id) else {
            warn!("Cannot switch to unknown provider '{}'", provider_id);
            return false;
        };

        let (healthy, latency) = self.state.probe(&provider).await;
        self.state.record_health(&[(Cow::Borrowed(provider.id()), healthy, latency)]);

        if healthy {
            self.state.set_active(provider.id());
            info!("Switched active provider to '{}'", provider_id);
        } else {
            warn!(
                "Refusing to switch to '{}': health check failed",
                provider_id
            );
        }
        self.state.notify();
        healthy
    }

    /// Health-check every provider concurrently and update their statuses.
    ///
    /// Each check is bounded by `health_check_timeout`; a timed out check
    /// counts as unhealthy. Returns an empty map after destroy.
    pub async fn perform_health_check(&self) -> HashMap<ProviderId, bool> {
        if self.state.is_destroyed() {
            return HashMap::new();
        }
        self.state.health_sweep().await
    }

    /// Id of the active provider, if any.
    pub fn active_provider(&self) -> Option<ProviderId> {
        self.state
            .read_statuses()
            .values()
            .find(|status| status.is_active)
            .map(|status| status.provider_id.clone())
    }

    /// Current status of every provider, with fresh breaker statistics.
    pub fn provider_statuses(&self) -> StatusSnapshot {
        self.state.snapshot()
    }

    /// The chain in traversal order with each provider's health and breaker state.
    pub fn chain_status(&self) -> ChainStatus {
        let statuses = self.state.snapshot();
        let providers: Vec<ChainNodeStatus> = self
            .state
            .chain
            .providers()
            .iter()
            .enumerate()
            .map(|(position, provider)| {
                let status = statuses.get(provider.id());
                let capabilities = provider.capabilities();
                ChainNodeStatus {
                    provider_id: Cow::Borrowed(provider.id()),
                    position,
                    priority: provider.priority(),
                    is_healthy: status.map(|s| s.is_healthy).unwrap_or(false),
                    is_active: status.map(|s| s.is_active).unwrap_or(false),
                    circuit_state: self
                        .state
                        .breakers
                        .get(provider.id())
                        .map(CircuitBreaker::state)
                        .unwrap_or(CircuitState::Closed),
                    supports_extended: capabilities.supports_extended,
                    supports_realtime: capabilities.supports_realtime,
                }
            })
            .collect();

        ChainStatus {
            failover_enabled: self.state.config.enable_failover,
            active_provider: providers
                .iter()
                .find(|node| node.is_active)
                .map(|node| node.provider_id.clone()),
            healthy_providers: providers.iter().filter(|node| node.is_healthy).count(),
            providers,
        }
    }

    /// Register a callback invoked with a full snapshot on every status change.
    pub fn on_status_change(&self, listener: StatusListener) -> ListenerId {
        self.state.listeners.add(listener)
    }

    pub fn remove_status_change_listener(&self, id: ListenerId) -> bool {
        self.state.listeners.remove(id)
    }

    /// Open a provider's circuit until released or its recovery timeout passes.
    pub fn force_open_circuit(&self, provider_id: &str) -> bool {
        self.override_circuit(provider_id, CircuitBreaker::force_open)
    }

    /// Close a provider's circuit and forget its recent failures.
    pub fn force_close_circuit(&self, provider_id: &str) -> bool {
        self.override_circuit(provider_id, CircuitBreaker::force_close)
    }

    fn override_circuit(&self, provider_id: &str, apply: fn(&CircuitBreaker)) -> bool {
        if self.state.is_destroyed() {
            return false;
        }
        let Some(breaker) = self.state.breakers.get(provider_id) else {
            warn!("No circuit breaker for unknown provider '{}'", provider_id);
            return false;
        };
        apply(breaker);
        self.state.refresh_breaker_stats(&[breaker.name().clone()]);
        self.state.notify();
        true
    }

    /// Receive live price updates for `symbol`.
    ///
    /// The first subscriber opens the upstream feed on the active provider,
    /// or on the first provider in chain order that supports real-time data.
    /// Later subscribers share that feed.
    pub async fn subscribe(
        &self,
        symbol: &str,
        callback: PriceCallback,
    ) -> Result<SubscriptionId, MarketDataError> {
        self.state.ensure_live()?;
        let state = &self.state;
        state
            .subscriptions
            .subscribe(symbol, callback, || state.realtime_provider())
            .await
    }

    /// Drop a subscription. The last one for a symbol closes the upstream feed.
    pub async fn unsubscribe(&self, subscription: &SubscriptionId) -> bool {
        self.state.subscriptions.unsubscribe(subscription).await
    }

    /// Start the periodic health sweep on the current tokio runtime.
    ///
    /// Returns false when the sweep is disabled by configuration, already
    /// running, the service is destroyed, or no runtime is available. The
    /// first sweep runs immediately.
    pub fn start_health_monitor(&self) -> bool {
        let Some(period) = self.state.config.health_check_interval else {
            debug!("Health monitor disabled by configuration");
            return false;
        };
        if period.is_zero() {
            warn!("Health monitor interval is zero, not starting");
            return false;
        }
        if self.state.is_destroyed() {
            return false;
        }

        let mut monitor = self.lock_monitor();
        if monitor.is_some() {
            return false;
        }
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!("Cannot start health monitor outside a tokio runtime: {}", e);
                return false;
            }
        };

        let (shutdown, shutdown_rx) = broadcast::channel(1);
        let task = runtime.spawn(run_health_monitor(
            Arc::downgrade(&self.state),
            period,
            shutdown_rx,
        ));
        *monitor = Some(HealthMonitorHandle { shutdown, task });
        true
    }

    /// Whether the background health sweep is running.
    pub fn is_health_monitor_running(&self) -> bool {
        self.lock_monitor()
            .as_ref()
            .is_some_and(|handle| !handle.task.is_finished())
    }

    /// Release all background work, subscriptions and providers.
    ///
    /// Idempotent. Data calls made afterwards fail with
    /// [`MarketDataError::ServiceDestroyed`].
    pub async fn destroy(&self) {
        if self.state.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Resilient data service: shutting down");

        let monitor = self.lock_monitor().take();
        if let Some(handle) = monitor {
            let _ = handle.shutdown.send(());
            if let Err(e) = handle.task.await {
                warn!("Health monitor task ended abnormally: {}", e);
            }
        }

        self.state.listeners.clear();
        self.state.subscriptions.clear().await;
        for provider in self.state.chain.providers() {
            provider.destroy().await;
        }
        self.state.write_statuses().clear();
    }

    fn lock_monitor(&self) -> MutexGuard<'_, Option<HealthMonitorHandle>> {
        self.monitor.lock().unwrap_or_else(|poisoned| {
            warn!("Health monitor mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

impl Drop for ResilientDataService {
    fn drop(&mut self) {
        let monitor = self.lock_monitor().take();
        if let Some(handle) = monitor {
            handle.task.abort();
        }
    }
}

impl std::fmt::Debug for ResilientDataService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientDataService")
            .field("providers", &self.state.chain.len())
            .field("active_provider", &self.active_provider())
            .field("destroyed", &self.state.is_destroyed())
            .finish()
    }
}

async fn run_health_monitor(
    state: Weak<ServiceState>,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    info!("Health monitor starting, interval {:?}", period);
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Some(state) = state.upgrade() else {
                    debug!("Health monitor: service dropped, exiting");
                    break;
                };
                if state.is_destroyed() {
                    break;
                }
                state.health_sweep().await;
            }
            _ = shutdown.recv() => {
                info!("Health monitor received shutdown signal, exiting loop");
                break;
            }
        }
    }
}

impl ServiceState {
    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    fn ensure_live(&self) -> Result<(), MarketDataError> {
        if self.is_destroyed() {
            return Err(MarketDataError::ServiceDestroyed);
        }
        Ok(())
    }

    fn read_statuses(&self) -> RwLockReadGuard<'_, HashMap<ProviderId, ProviderStatus>> {
        self.statuses.read().unwrap_or_else(|poisoned| {
            warn!("Provider status lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write_statuses(&self) -> RwLockWriteGuard<'_, HashMap<ProviderId, ProviderStatus>> {
        self.statuses.write().unwrap_or_else(|poisoned| {
            warn!("Provider status lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn breaker(&self, provider_id: &str) -> Result<&CircuitBreaker, MarketDataError> {
        self.breakers
            .get(provider_id)
            .ok_or_else(|| MarketDataError::ProviderNotFound(provider_id.to_string()))
    }

    fn active_provider(&self) -> Option<Arc<dyn MarketDataProvider>> {
        let active = self
            .read_statuses()
            .values()
            .find(|status| status.is_active)
            .map(|status| status.provider_id.clone())?;
        self.chain.provider(&active)
    }

    async fn run<T, F, Fut>(&self, operation_name: &str, operation: F) -> Result<T, MarketDataError>
    where
        F: Fn(Arc<dyn MarketDataProvider>) -> Fut,
        Fut: Future<Output = Result<T, MarketDataError>>,
    {
        self.ensure_live()?;
        if self.config.enable_failover {
            self.run_chain(operation_name, operation).await
        } else {
            self.run_active(operation_name, operation).await
        }
    }

    /// Walk the chain, each attempt going through the provider's breaker.
    async fn run_chain<T, F, Fut>(
        &self,
        operation_name: &str,
        operation: F,
    ) -> Result<T, MarketDataError>
    where
        F: Fn(Arc<dyn MarketDataProvider>) -> Fut,
        Fut: Future<Output = Result<T, MarketDataError>>,
    {
        let options = ChainOptions {
            max_attempts: self.config.max_attempts,
            skip_unhealthy_providers: self.config.skip_unhealthy_providers,
            timeout: self.config.request_timeout,
        };

        let operation = &operation;
        let outcome = self
            .chain
            .execute_traced(
                operation_name,
                move |provider| self.guarded_call(provider, operation),
                &options,
            )
            .await;

        match outcome {
            Ok(result) => {
                self.apply_diagnostics(&result.diagnostics, Some(&result.provider_id));
                Ok(result.data)
            }
            Err((error, diagnostics)) => {
                self.apply_diagnostics(&diagnostics, None);
                Err(error)
            }
        }
    }

    /// Call only the active provider, through its breaker and bounded by
    /// `request_timeout`. Errors are returned as they occur.
    async fn run_active<T, F, Fut>(
        &self,
        operation_name: &str,
        operation: F,
    ) -> Result<T, MarketDataError>
    where
        F: Fn(Arc<dyn MarketDataProvider>) -> Fut,
        Fut: Future<Output = Result<T, MarketDataError>>,
    {
        let provider = self
            .active_provider()
            .ok_or(MarketDataError::NoActiveProvider)?;
        let provider_id: ProviderId = Cow::Borrowed(provider.id());
        let request_timeout = self.config.request_timeout;
        let started = Instant::now();
        let mut diagnostics = FetchDiagnostics::new();

        let result = match timeout(request_timeout, self.guarded_call(provider, &operation)).await
        {
            Ok(Ok(data)) => {
                diagnostics.record_success(provider_id.clone(), started.elapsed());
                Ok(data)
            }
            Ok(Err(e)) if e.is_circuit_open() => {
                diagnostics.record_skip(
                    provider_id.clone(),
                    SkipReason::CircuitOpen,
                    started.elapsed(),
                );
                Err(e)
            }
            Ok(Err(e)) => {
                diagnostics.record_error(provider_id.clone(), e.to_string(), started.elapsed());
                Err(e)
            }
            Err(_) => {
                diagnostics.record_timeout(provider_id.clone(), request_timeout);
                Err(MarketDataError::Timeout {
                    provider: provider_id.to_string(),
                    after: request_timeout,
                })
            }
        };

        if let Err(e) = &result {
            debug!(
                "'{}' failed on active provider '{}': {}",
                operation_name, provider_id, e
            );
        }
        self.apply_diagnostics(&diagnostics, None);
        result
    }

    async fn guarded_call<T, F, Fut>(
        &self,
        provider: Arc<dyn MarketDataProvider>,
        operation: &F,
    ) -> Result<T, MarketDataError>
    where
        F: Fn(Arc<dyn MarketDataProvider>) -> Fut,
        Fut: Future<Output = Result<T, MarketDataError>>,
    {
        let breaker = self.breaker(provider.id())?;
        breaker.execute(|| operation(provider)).await
    }

    /// Fold the attempts of one call into the provider statuses and notify.
    fn apply_diagnostics(&self, diagnostics: &FetchDiagnostics, promote: Option<&ProviderId>) {
        if diagnostics.attempts.is_empty() {
            return;
        }

        let unhealthy_after = self.config.unhealthy_after_failures.max(1);
        let now = Utc::now();
        {
            let mut statuses = self.write_statuses();
            for attempt in &diagnostics.attempts {
                let Some(status) = statuses.get_mut(&attempt.provider_id) else {
                    continue;
                };
                match &attempt.outcome {
                    AttemptOutcome::Succeeded => {
                        status.is_healthy = true;
                        status.consecutive_failures = 0;
                        status.last_response_time = Some(attempt.duration);
                    }
                    AttemptOutcome::Failed { .. } | AttemptOutcome::TimedOut { .. } => {
                        status.consecutive_failures += 1;
                        status.last_response_time = Some(attempt.duration);
                        if status.consecutive_failures >= unhealthy_after {
                            status.is_healthy = false;
                        }
                    }
                    AttemptOutcome::Skipped(SkipReason::Unhealthy)
                    | AttemptOutcome::Skipped(SkipReason::HealthCheckTimedOut) => {
                        status.is_healthy = false;
                        status.consecutive_failures += 1;
                        status.last_checked = Some(now);
                    }
                    AttemptOutcome::Skipped(SkipReason::CircuitOpen) => {}
                }
            }
        }

        let touched: Vec<ProviderId> = diagnostics
            .attempts
            .iter()
            .map(|attempt| attempt.provider_id.clone())
            .collect();
        self.refresh_breaker_stats(&touched);

        if let Some(provider_id) = promote {
            self.set_active(provider_id);
        }
        self.notify();
    }

    /// Copy fresh breaker statistics into the statuses of `provider_ids`.
    fn refresh_breaker_stats(&self, provider_ids: &[ProviderId]) {
        let stats: Vec<_> = provider_ids
            .iter()
            .filter_map(|id| Some((id, self.breakers.get(id)?.stats())))
            .collect();

        let mut statuses = self.write_statuses();
        for (id, stats) in stats {
            if let Some(status) = statuses.get_mut(id) {
                status.circuit_breaker = stats;
            }
        }
    }

    /// Mark exactly one provider active.
    fn set_active(&self, provider_id: &str) {
        let mut statuses = self.write_statuses();
        if !statuses.contains_key(provider_id) {
            return;
        }
        for status in statuses.values_mut() {
            status.is_active = status.provider_id == provider_id;
        }
    }

    fn snapshot(&self) -> StatusSnapshot {
        let mut snapshot = self.read_statuses().clone();
        for (id, status) in snapshot.iter_mut() {
            if let Some(breaker) = self.breakers.get(id) {
                status.circuit_breaker = breaker.stats();
            }
        }
        snapshot
    }

    fn notify(&self) {
        if self.listeners.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        self.listeners.notify(&snapshot);
    }

    async fn probe(&self, provider: &Arc<dyn MarketDataProvider>) -> (bool, Duration) {
        let started = Instant::now();
        let healthy = match timeout(self.config.health_check_timeout, provider.health_check()).await
        {
            Ok(healthy) => healthy,
            Err(_) => {
                warn!(
                    "Health check for '{}' timed out after {:?}",
                    provider.id(),
                    self.config.health_check_timeout
                );
                false
            }
        };
        (healthy, started.elapsed())
    }

    async fn health_sweep(&self) -> HashMap<ProviderId, bool> {
        let providers = self.chain.providers();
        let results: Vec<(ProviderId, bool, Duration)> =
            join_all(providers.iter().map(move |provider| async move {
                let (healthy, latency) = self.probe(provider).await;
                (Cow::Borrowed(provider.id()), healthy, latency)
            }))
            .await;

        self.record_health(&results);
        self.notify();

        let healthy = results.iter().filter(|(_, healthy, _)| *healthy).count();
        debug!(
            "Health sweep: {}/{} providers healthy",
            healthy,
            results.len()
        );

        results
            .into_iter()
            .map(|(id, healthy, _)| (id, healthy))
            .collect()
    }

    fn record_health(&self, results: &[(ProviderId, bool, Duration)]) {
        let now = Utc::now();
        {
            let mut statuses = self.write_statuses();
            for (id, healthy, latency) in results {
                let Some(status) = statuses.get_mut(id) else {
                    continue;
                };
                if !*healthy && status.is_healthy {
                    warn!("Provider '{}' is now unhealthy", id);
                } else if *healthy && !status.is_healthy {
                    info!("Provider '{}' recovered", id);
                }
                status.is_healthy = *healthy;
                status.last_checked = Some(now);
                status.last_response_time = Some(*latency);
                if *healthy {
                    status.consecutive_failures = 0;
                } else {
                    status.consecutive_failures += 1;
                }
            }
        }

        let ids: Vec<ProviderId> = results.iter().map(|(id, _, _)| id.clone()).collect();
        self.refresh_breaker_stats(&ids);
    }

    fn realtime_provider(&self) -> Result<Arc<dyn MarketDataProvider>, MarketDataError> {
        if let Some(active) = self.active_provider() {
            if active.capabilities().supports_realtime {
                return Ok(active);
            }
        }
        self.chain
            .providers()
            .into_iter()
            .find(|provider| provider.capabilities().supports_realtime)
            .ok_or_else(|| MarketDataError::NotSupported {
                operation: "real-time".to_string(),
                provider: self
                    .active_provider()
                    .map(|p| p.id().to_string())
                    .unwrap_or_else(|| "none".to_string()),
            })
    }
}
