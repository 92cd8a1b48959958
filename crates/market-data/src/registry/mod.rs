//! Provider resilience primitives.
//!
//! This module provides the building blocks the data service composes:
//! - Per-provider circuit breaking with a sliding failure window
//! - Ordered provider failover with per-attempt timeouts
//! - Attempt diagnostics for explaining which provider served a request

mod chain;
mod circuit_breaker;
mod diagnostics;

pub use chain::{ChainExecutionResult, ChainOptions, ProviderChain, DEFAULT_ATTEMPT_TIMEOUT};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState};
pub use diagnostics::{AttemptOutcome, AttemptRecord, FetchDiagnostics, SkipReason};
