//! Market data models
//!
//! This module contains the data types exchanged with providers:
//! - `types` - Type aliases for common identifiers (ProviderId, Symbol)
//! - `price` - Spot price data (PriceData) and extended metrics (ExtendedPriceData)
//! - `candle` - Historical OHLCV candles and their interval (Candle, Interval)

mod candle;
mod price;
mod types;

pub use candle::{Candle, Interval};
pub use price::{ExtendedDataOptions, ExtendedPriceData, PriceData};
pub use types::{ProviderId, Symbol};
