//! Provider capability flags.
//!
//! Optional provider features are advertised here instead of being probed
//! at call time. The service consults these flags before deciding whether
//! to call an optional trait method or fall back to a basic one.

/// Describes the optional capabilities of a market data provider.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProviderCapabilities {
    /// Whether `get_extended_data` returns real extended metrics
    /// (market cap, supply, all-time extremes).
    pub supports_extended: bool,

    /// Whether `subscribe_to_real_time` streams live prices.
    pub supports_realtime: bool,
}

impl ProviderCapabilities {
    /// Capabilities of a provider that only serves prices and candles.
    pub const fn basic() -> Self {
        Self {
            supports_extended: false,
            supports_realtime: false,
        }
    }
}
