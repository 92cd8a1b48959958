//! Configurable in-memory provider shared by the crate's tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::errors::MarketDataError;
use crate::models::{Candle, ExtendedDataOptions, ExtendedPriceData, Interval, PriceData};

use super::{MarketDataProvider, PriceCallback, ProviderCapabilities};

pub(crate) struct MockProvider {
    id: &'static str,
    priority: u8,
    capabilities: ProviderCapabilities,
    should_fail: AtomicBool,
    healthy: AtomicBool,
    delay_ms: AtomicU64,
    health_delay_ms: AtomicU64,
    pub price_calls: AtomicUsize,
    pub history_calls: AtomicUsize,
    pub extended_calls: AtomicUsize,
    pub health_calls: AtomicUsize,
    pub destroyed: AtomicBool,
    pub subscriptions: Mutex<HashMap<String, PriceCallback>>,
    pub unsubscribe_calls: AtomicUsize,
}

impl MockProvider {
    pub fn new(id: &'static str, priority: u8) -> Self {
        Self {
            id,
            priority,
            capabilities: ProviderCapabilities::basic(),
            should_fail: AtomicBool::new(false),
            healthy: AtomicBool::new(true),
            delay_ms: AtomicU64::new(0),
            health_delay_ms: AtomicU64::new(0),
            price_calls: AtomicUsize::new(0),
            history_calls: AtomicUsize::new(0),
            extended_calls: AtomicUsize::new(0),
            health_calls: AtomicUsize::new(0),
            destroyed: AtomicBool::new(false),
            subscriptions: Mutex::new(HashMap::new()),
            unsubscribe_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(id: &'static str, priority: u8) -> Self {
        let provider = Self::new(id, priority);
        provider.set_failing(true);
        provider
    }

    pub fn with_capabilities(mut self, capabilities: ProviderCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn set_failing(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_health_delay(&self, delay: Duration) {
        self.health_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.price_calls.load(Ordering::SeqCst)
            + self.history_calls.load(Ordering::SeqCst)
            + self.extended_calls.load(Ordering::SeqCst)
    }

    /// Push a live update to the callback registered for `symbol`.
    pub fn emit(&self, symbol: &str, price: Decimal) -> bool {
        let callback = self.subscriptions.lock().unwrap().get(symbol).cloned();
        match callback {
            Some(callback) => {
                callback(PriceData::new(symbol, price, self.id));
                true
            }
            None => false,
        }
    }

    async fn simulate(&self) -> Result<(), MarketDataError> {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(MarketDataError::provider(self.id, "Mock failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl MarketDataProvider for MockProvider {
    fn id(&self) -> &'static str {
        self.id
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    fn capabilities(&self) -> ProviderCapabilities {
        self.capabilities.clone()
    }

    async fn get_current_price(&self, symbol: &str) -> Result<PriceData, MarketDataError> {
        self.price_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate().await?;
        Ok(PriceData::new(symbol, Decimal::new(6400000, 2), self.id))
    }

    async fn get_historical_data(
        &self,
        _symbol: &str,
        interval: Interval,
        limit: usize,
    ) -> Result<Vec<Candle>, MarketDataError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate().await?;
        let start = chrono::Utc::now() - chrono::Duration::seconds(interval.seconds() * limit as i64);
        Ok((0..limit)
            .map(|i| Candle {
                timestamp: start + chrono::Duration::seconds(interval.seconds() * i as i64),
                open: Decimal::from(100),
                high: Decimal::from(105),
                low: Decimal::from(95),
                close: Decimal::from(102),
                volume: Decimal::from(1000),
            })
            .collect())
    }

    async fn get_extended_data(
        &self,
        symbol: &str,
        _options: &ExtendedDataOptions,
    ) -> Result<ExtendedPriceData, MarketDataError> {
        self.extended_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate().await?;
        let mut extended =
            ExtendedPriceData::from(PriceData::new(symbol, Decimal::new(6400000, 2), self.id));
        extended.market_cap = Some(Decimal::from(1_260_000_000_000u64));
        extended.synthesized = false;
        Ok(extended)
    }

    async fn health_check(&self) -> bool {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.health_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.healthy.load(Ordering::SeqCst)
    }

    async fn subscribe_to_real_time(
        &self,
        symbol: &str,
        callback: PriceCallback,
    ) -> Result<(), MarketDataError> {
        if !self.capabilities.supports_realtime {
            return Err(MarketDataError::NotSupported {
                operation: "real-time".to_string(),
                provider: self.id.to_string(),
            });
        }
        self.subscriptions
            .lock()
            .unwrap()
            .insert(symbol.to_string(), callback);
        Ok(())
    }

    async fn unsubscribe_from_real_time(&self, symbol: &str) -> Result<(), MarketDataError> {
        self.unsubscribe_calls.fetch_add(1, Ordering::SeqCst);
        self.subscriptions.lock().unwrap().remove(symbol);
        Ok(())
    }

    async fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
    }
}
