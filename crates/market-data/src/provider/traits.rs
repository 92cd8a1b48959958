//! Market data provider trait definitions.
//!
//! This module defines the core `MarketDataProvider` trait that all
//! upstream price sources must implement.

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::MarketDataError;
use crate::models::{Candle, ExtendedDataOptions, ExtendedPriceData, Interval, PriceData};

use super::capabilities::ProviderCapabilities;

/// Callback invoked for every live price update on a subscribed symbol.
pub type PriceCallback = Arc<dyn Fn(PriceData) + Send + Sync>;

/// Trait for market data providers.
///
/// Implement this trait to add support for a new upstream source.
/// The chain and the data service use the provider's priority and
/// capabilities to decide when and how to call it.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use coinwatch_market_data::provider::{MarketDataProvider, ProviderCapabilities};
///
/// struct MyExchange {
///     base_url: String,
/// }
///
/// #[async_trait]
/// impl MarketDataProvider for MyExchange {
///     fn id(&self) -> &'static str {
///         "MY_EXCHANGE"
///     }
///
///     fn priority(&self) -> u8 {
///         1
///     }
///
///     async fn health_check(&self) -> bool {
///         // ping endpoint
///         true
///     }
///
///     // ... implement price and candle methods
/// }
/// ```
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Unique identifier for this provider.
    ///
    /// Should be a constant string like "BINANCE", "COINGECKO", etc.
    /// Used for logging, circuit breaker tracking, and status reporting.
    fn id(&self) -> &'static str;

    /// Provider priority for ordering.
    ///
    /// Lower values = higher priority. Default is 10.
    fn priority(&self) -> u8 {
        10
    }

    /// Optional features this provider supports.
    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::basic()
    }

    /// Fetch the current price for a symbol.
    async fn get_current_price(&self, symbol: &str) -> Result<PriceData, MarketDataError>;

    /// Fetch up to `limit` candles of width `interval`, oldest first.
    async fn get_historical_data(
        &self,
        symbol: &str,
        interval: Interval,
        limit: usize,
    ) -> Result<Vec<Candle>, MarketDataError>;

    /// Fetch extended market metrics for a symbol.
    ///
    /// Only called when `capabilities().supports_extended` is set.
    /// Default implementation returns `NotSupported`.
    async fn get_extended_data(
        &self,
        symbol: &str,
        options: &ExtendedDataOptions,
    ) -> Result<ExtendedPriceData, MarketDataError> {
        let _ = (symbol, options);
        Err(MarketDataError::NotSupported {
            operation: "extended data".to_string(),
            provider: self.id().to_string(),
        })
    }

    /// Lightweight probe of the upstream service.
    ///
    /// Must not fail: any error is reported as `false`.
    async fn health_check(&self) -> bool;

    /// Start streaming live prices for `symbol` into `callback`.
    ///
    /// Default implementation returns `NotSupported`.
    async fn subscribe_to_real_time(
        &self,
        symbol: &str,
        callback: PriceCallback,
    ) -> Result<(), MarketDataError> {
        let _ = (symbol, callback);
        Err(MarketDataError::NotSupported {
            operation: "real-time".to_string(),
            provider: self.id().to_string(),
        })
    }

    /// Stop streaming live prices for `symbol`.
    async fn unsubscribe_from_real_time(&self, symbol: &str) -> Result<(), MarketDataError> {
        let _ = symbol;
        Ok(())
    }

    /// Release connections and background work held by the provider.
    async fn destroy(&self) {}
}
