//! Reference-counted live price subscriptions.
//!
//! Each symbol has at most one upstream subscription, opened by the first
//! local subscriber and shared by every later one. Updates are fanned out
//! to all local callbacks. The last unsubscribe for a symbol closes the
//! upstream subscription.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use log::{debug, info, warn};
use tokio::sync::Mutex;

use crate::errors::MarketDataError;
use crate::models::PriceData;
use crate::provider::{MarketDataProvider, PriceCallback};

/// Handle identifying one local subscription.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId {
    symbol: String,
    id: u64,
}

impl SubscriptionId {
    pub fn symbol(&self) -> &str {
        &self.symbol
    }
}

type Subscribers = Arc<RwLock<Vec<(u64, PriceCallback)>>>;

struct SymbolFeed {
    provider: Arc<dyn MarketDataProvider>,
    subscribers: Subscribers,
}

/// Registry of live subscriptions, keyed by symbol.
///
/// Opening and closing upstream subscriptions is serialized by one async
/// mutex, so two concurrent first subscribers never open two feeds.
pub(crate) struct RealtimeSubscriptions {
    next_id: AtomicU64,
    feeds: Mutex<HashMap<String, SymbolFeed>>,
}

impl RealtimeSubscriptions {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            feeds: Mutex::new(HashMap::new()),
        }
    }

    /// Register `callback` for `symbol`.
    ///
    /// `select_provider` is only consulted when no feed exists yet for the
    /// symbol. If opening the upstream feed fails, nothing is registered.
    pub async fn subscribe<S>(
        &self,
        symbol: &str,
        callback: PriceCallback,
        select_provider: S,
    ) -> Result<SubscriptionId, MarketDataError>
    where
        S: FnOnce() -> Result<Arc<dyn MarketDataProvider>, MarketDataError>,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut feeds = self.feeds.lock().await;

        if let Some(feed) = feeds.get(symbol) {
            write_subscribers(&feed.subscribers).push((id, callback));
            debug!("Realtime: added subscriber {} to existing '{}' feed", id, symbol);
            return Ok(SubscriptionId {
                symbol: symbol.to_string(),
                id,
            });
        }

        let provider = select_provider()?;
        let subscribers: Subscribers = Arc::new(RwLock::new(vec![(id, callback)]));
        provider
            .subscribe_to_real_time(symbol, fan_out(&subscribers))
            .await?;

        info!(
            "Realtime: opened '{}' feed on provider '{}'",
            symbol,
            provider.id()
        );
        feeds.insert(
            symbol.to_string(),
            SymbolFeed {
                provider,
                subscribers,
            },
        );

        Ok(SubscriptionId {
            symbol: symbol.to_string(),
            id,
        })
    }

    /// Drop one local subscription. Returns false for unknown handles.
    pub async fn unsubscribe(&self, subscription: &SubscriptionId) -> bool {
        let mut feeds = self.feeds.lock().await;

        let Some(feed) = feeds.get(&subscription.symbol) else {
            return false;
        };

        let remaining = {
            let mut subscribers = write_subscribers(&feed.subscribers);
            let before = subscribers.len();
            subscribers.retain(|(id, _)| *id != subscription.id);
            if subscribers.len() == before {
                return false;
            }
            subscribers.len()
        };

        if remaining == 0 {
            if let Some(feed) = feeds.remove(&subscription.symbol) {
                close_feed(&subscription.symbol, feed).await;
            }
        }
        true
    }

    /// Number of local subscribers for `symbol`.
    pub async fn subscriber_count(&self, symbol: &str) -> usize {
        let feeds = self.feeds.lock().await;
        feeds
            .get(symbol)
            .map(|feed| read_subscribers(&feed.subscribers).len())
            .unwrap_or(0)
    }

    /// Symbols with an open upstream feed.
    pub async fn symbols(&self) -> Vec<String> {
        let feeds = self.feeds.lock().await;
        let mut symbols: Vec<_> = feeds.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    /// Close every upstream feed.
    pub async fn clear(&self) {
        let mut feeds = self.feeds.lock().await;
        for (symbol, feed) in feeds.drain() {
            close_feed(&symbol, feed).await;
        }
    }
}

async fn close_feed(symbol: &str, feed: SymbolFeed) {
    match feed.provider.unsubscribe_from_real_time(symbol).await {
        Ok(()) => info!(
            "Realtime: closed '{}' feed on provider '{}'",
            symbol,
            feed.provider.id()
        ),
        Err(e) => warn!(
            "Realtime: failed to close '{}' feed on provider '{}': {}",
            symbol,
            feed.provider.id(),
            e
        ),
    }
}

fn fan_out(subscribers: &Subscribers) -> PriceCallback {
    let subscribers = Arc::clone(subscribers);
    Arc::new(move |price: PriceData| {
        let callbacks: Vec<PriceCallback> = read_subscribers(&subscribers)
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in callbacks {
            callback(price.clone());
        }
    })
}

fn read_subscribers(
    subscribers: &Subscribers,
) -> std::sync::RwLockReadGuard<'_, Vec<(u64, PriceCallback)>> {
    subscribers
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_subscribers(
    subscribers: &Subscribers,
) -> std::sync::RwLockWriteGuard<'_, Vec<(u64, PriceCallback)>> {
    subscribers
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::MockProvider;
    use crate::provider::ProviderCapabilities;
    use rust_decimal_macros::dec;
    use std::sync::atomic::AtomicUsize;

    fn streaming(id: &'static str) -> Arc<MockProvider> {
        Arc::new(MockProvider::new(id, 1).with_capabilities(ProviderCapabilities {
            supports_extended: false,
            supports_realtime: true,
        }))
    }

    fn counting(counter: &Arc<AtomicUsize>) -> PriceCallback {
        let counter = counter.clone();
        Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test]
    async fn test_shared_feed_is_reference_counted() {
        let provider = streaming("BINANCE");
        let registry = RealtimeSubscriptions::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let selected = provider.clone() as Arc<dyn MarketDataProvider>;
        let first = registry
            .subscribe("BTCUSDT", counting(&calls), || Ok(selected))
            .await
            .unwrap();
        let second = registry
            .subscribe("BTCUSDT", counting(&calls), || {
                panic!("provider must not be selected twice")
            })
            .await
            .unwrap();
        assert_eq!(registry.subscriber_count("BTCUSDT").await, 2);

        assert!(provider.emit("BTCUSDT", dec!(64000)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        assert!(registry.unsubscribe(&first).await);
        assert_eq!(provider.unsubscribe_calls.load(Ordering::SeqCst), 0);
        assert!(provider.emit("BTCUSDT", dec!(64010)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        assert!(registry.unsubscribe(&second).await);
        assert_eq!(provider.unsubscribe_calls.load(Ordering::SeqCst), 1);
        assert!(!provider.emit("BTCUSDT", dec!(64020)));
        assert!(registry.symbols().await.is_empty());

        assert!(!registry.unsubscribe(&second).await);
    }

    #[tokio::test]
    async fn test_failed_upstream_subscribe_registers_nothing() {
        let provider = Arc::new(MockProvider::new("REST_ONLY", 1));
        let registry = RealtimeSubscriptions::new();

        let selected = provider as Arc<dyn MarketDataProvider>;
        let err = registry
            .subscribe("ETHUSDT", Arc::new(|_| {}), || Ok(selected))
            .await
            .unwrap_err();

        assert!(matches!(err, MarketDataError::NotSupported { .. }));
        assert_eq!(registry.subscriber_count("ETHUSDT").await, 0);
    }

    #[tokio::test]
    async fn test_clear_closes_every_feed() {
        let provider = streaming("KRAKEN");
        let registry = RealtimeSubscriptions::new();

        for symbol in ["BTCUSD", "ETHUSD"] {
            let selected = provider.clone() as Arc<dyn MarketDataProvider>;
            registry
                .subscribe(symbol, Arc::new(|_| {}), || Ok(selected))
                .await
                .unwrap();
        }
        assert_eq!(registry.symbols().await, vec!["BTCUSD", "ETHUSD"]);

        registry.clear().await;
        assert_eq!(provider.unsubscribe_calls.load(Ordering::SeqCst), 2);
        assert!(provider.subscriptions.lock().unwrap().is_empty());
    }
}
