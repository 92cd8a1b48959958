use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Spot price snapshot for a symbol
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceData {
    /// Symbol as requested (e.g. "BTCUSDT")
    pub symbol: String,

    /// Last traded price
    pub price: Decimal,

    /// Absolute price change over the last 24 hours
    pub change_24h: Decimal,

    /// Percentage price change over the last 24 hours
    pub change_percent_24h: Decimal,

    /// Traded volume over the last 24 hours
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_24h: Option<Decimal>,

    /// 24 hour high
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high_24h: Option<Decimal>,

    /// 24 hour low
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low_24h: Option<Decimal>,

    /// Time the provider reported the price
    pub timestamp: DateTime<Utc>,

    /// Provider that produced this price
    pub source: String,
}

impl PriceData {
    /// Create a price with only the required fields
    pub fn new(symbol: impl Into<String>, price: Decimal, source: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            change_24h: Decimal::ZERO,
            change_percent_24h: Decimal::ZERO,
            volume_24h: None,
            high_24h: None,
            low_24h: None,
            timestamp: Utc::now(),
            source: source.into(),
        }
    }
}

/// Which extended metrics a caller is interested in
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtendedDataOptions {
    pub include_market_cap: bool,
    pub include_supply: bool,
    pub include_all_time_extremes: bool,
}

impl ExtendedDataOptions {
    /// Request every extended metric
    pub fn all() -> Self {
        Self {
            include_market_cap: true,
            include_supply: true,
            include_all_time_extremes: true,
        }
    }
}

/// Price plus market metrics that only some providers expose
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedPriceData {
    /// Basic price fields
    #[serde(flatten)]
    pub price: PriceData,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub circulating_supply: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_supply: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_time_high: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_time_low: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap_rank: Option<u32>,

    /// True when built locally from a basic price because the provider
    /// has no extended endpoint
    pub synthesized: bool,
}

impl From<PriceData> for ExtendedPriceData {
    fn from(price: PriceData) -> Self {
        Self {
            price,
            market_cap: None,
            circulating_supply: None,
            total_supply: None,
            all_time_high: None,
            all_time_low: None,
            market_cap_rank: None,
            synthesized: true,
        }
    }
}
