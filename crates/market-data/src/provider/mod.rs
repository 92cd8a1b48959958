//! Market data provider abstractions.
//!
//! This module contains:
//! - The `MarketDataProvider` trait that every upstream source implements
//! - Provider capability flags for optional features
//!
//! Concrete exchange adapters live outside this crate. The resilience layer
//! only depends on the trait, so any number of sources can be plugged in
//! and ordered by priority.

mod capabilities;
mod traits;

#[cfg(test)]
pub(crate) mod mock;

pub use capabilities::ProviderCapabilities;
pub use traits::{MarketDataProvider, PriceCallback};
