//! Coinwatch Market Data Crate
//!
//! This crate provides a resilient, provider-agnostic market data layer for
//! crypto prices. It sits between the application and any number of
//! upstream exchanges or aggregators and keeps data flowing when some of
//! them fail.
//!
//! # Overview
//!
//! The market data crate supports:
//! - Multiple providers tried in priority order, with automatic failover
//! - Per-provider circuit breaking over a sliding failure window
//! - Per-attempt timeouts, so one hung provider cannot stall a request
//! - Periodic background health checks and manual provider switching
//! - Status-change notifications and shared live price subscriptions
//!
//! # Architecture
//!
//! ```text
//! +-----------------------+
//! |  ResilientDataService |  (façade: mode selection, statuses, listeners)
//! +-----------------------+
//!        |            |
//!        |            v
//!        |    +------------------+
//!        |    |  ProviderChain   |  (ordered failover, per-attempt timeout)
//!        |    +------------------+
//!        |            |
//!        v            v
//! +-----------------------+
//! |    CircuitBreaker     |  (one per provider: Closed / Open / HalfOpen)
//! +-----------------------+
//!            |
//!            v
//! +-----------------------+
//! |  MarketDataProvider   |  (Binance, Kraken, CoinGecko, ...)
//! +-----------------------+
//! ```
//!
//! # Core Types
//!
//! - [`ResilientDataService`] - Entry point for price, candle and extended data
//! - [`ResilientServiceConfig`] - Service configuration (serde, JSON)
//! - [`ProviderChain`] - Ordered failover over providers
//! - [`CircuitBreaker`] - Per-provider fault detector
//! - [`MarketDataProvider`] - Trait implemented by each upstream source
//! - [`PriceData`] / [`Candle`] / [`ExtendedPriceData`] - Market data
//! - [`MarketDataError`] - Error taxonomy shared by every layer

pub mod errors;
pub mod models;
pub mod provider;
pub mod registry;
pub mod service;
pub(crate) mod utils;

// Re-export errors
pub use errors::MarketDataError;

// Re-export all public types from models
pub use models::{
    Candle, ExtendedDataOptions, ExtendedPriceData, Interval, PriceData, ProviderId, Symbol,
};

// Re-export provider types
pub use provider::{MarketDataProvider, PriceCallback, ProviderCapabilities};

// Re-export registry types
pub use registry::{
    AttemptOutcome, ChainExecutionResult, ChainOptions, CircuitBreaker, CircuitBreakerConfig,
    CircuitBreakerStats, CircuitState, FetchDiagnostics, ProviderChain, SkipReason,
};

// Re-export service types
pub use service::{
    ChainNodeStatus, ChainStatus, ListenerId, ProviderStatus, ResilientDataService,
    ResilientServiceConfig, StatusListener, StatusSnapshot, SubscriptionId,
};
