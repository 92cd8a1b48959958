use std::borrow::Cow;

/// Provider identifier - mostly static constants
pub type ProviderId = Cow<'static, str>;

/// Trading symbol as requested by callers (e.g. "BTCUSDT", "ETH-USD")
pub type Symbol = String;
