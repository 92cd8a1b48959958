//! Error types for the market data crate.
//!
//! A single provider attempt can fail in three distinguishable ways:
//! - [`MarketDataError::ProviderError`]: the provider was called and failed
//! - [`MarketDataError::Timeout`]: the provider was called but did not answer in time
//! - [`MarketDataError::CircuitOpen`]: the provider was never called
//!
//! Those are recovered locally by the provider chain. Only
//! [`MarketDataError::ChainExhausted`] leaves the chain, once every eligible
//! provider has failed or been skipped.

use std::time::Duration;

use thiserror::Error;

use crate::models::ProviderId;

/// Errors that can occur during market data operations.
#[derive(Error, Debug, Clone)]
pub enum MarketDataError {
    /// A single provider attempt failed.
    #[error("Provider error: {provider} - {message}")]
    ProviderError {
        /// The provider that returned the error
        provider: String,
        /// The error message from the provider
        message: String,
    },

    /// The provider did not answer within the attempt timeout.
    #[error("Timeout: {provider} after {after:?}")]
    Timeout {
        /// The provider that timed out
        provider: String,
        /// The bound that was exceeded
        after: Duration,
    },

    /// The circuit breaker is open for this provider.
    /// The operation was rejected without being attempted.
    #[error("Circuit open: {provider}")]
    CircuitOpen {
        /// The provider with an open circuit
        provider: String,
    },

    /// Every eligible provider in the chain failed or was skipped.
    #[error(
        "All providers failed for '{operation}' after {attempts} attempts in {elapsed:?} (failed: {})",
        .failed_providers.join(", ")
    )]
    ChainExhausted {
        /// Logical operation name (e.g. "getCurrentPrice")
        operation: String,
        /// Number of providers actually invoked
        attempts: usize,
        /// Providers that failed or were skipped, in traversal order
        failed_providers: Vec<ProviderId>,
        /// Total time spent walking the chain
        elapsed: Duration,
    },

    /// The provider does not implement the requested operation.
    #[error("Operation '{operation}' not supported by provider '{provider}'")]
    NotSupported {
        /// The unsupported operation
        operation: String,
        /// The provider that lacks it
        provider: String,
    },

    /// No provider is registered under this id.
    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    /// A provider with this id is already part of the chain.
    #[error("Provider already registered: {0}")]
    DuplicateProvider(String),

    /// Fast-path mode was used while no provider is active.
    #[error("No active provider")]
    NoActiveProvider,

    /// The service was torn down with `destroy()`.
    #[error("Data service has been destroyed")]
    ServiceDestroyed,

    /// The candle interval string could not be parsed.
    #[error("Invalid interval: {0}")]
    InvalidInterval(String),

    /// Configuration could not be parsed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl MarketDataError {
    /// Convenience constructor for provider failures.
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderError {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// True when the operation was rejected by a breaker without being attempted.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    /// The provider this error is attributed to, if any.
    pub fn provider_id(&self) -> Option<&str> {
        match self {
            Self::ProviderError { provider, .. }
            | Self::Timeout { provider, .. }
            | Self::CircuitOpen { provider }
            | Self::NotSupported { provider, .. } => Some(provider.as_str()),
            Self::ProviderNotFound(provider) | Self::DuplicateProvider(provider) => {
                Some(provider.as_str())
            }
            _ => None,
        }
    }
}

impl From<serde_json::Error> for MarketDataError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}
