//! Provider status records and status-change listeners.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::warn;
use serde::Serialize;

use crate::models::ProviderId;
use crate::registry::{CircuitBreakerStats, CircuitState};
use crate::utils::duration_serde::duration_ms_option;

/// Live status of one registered provider.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatus {
    pub provider_id: ProviderId,
    /// Lower values are tried first.
    pub priority: u8,
    pub is_healthy: bool,
    /// At most one provider is active at a time.
    pub is_active: bool,
    pub last_checked: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    /// Latency of the last call or health check, in milliseconds.
    #[serde(with = "duration_ms_option")]
    pub last_response_time: Option<Duration>,
    pub circuit_breaker: CircuitBreakerStats,
}

/// Full status map pushed to listeners.
pub type StatusSnapshot = HashMap<ProviderId, ProviderStatus>;

/// Callback notified with a full snapshot whenever any status changes.
pub type StatusListener = Arc<dyn Fn(&StatusSnapshot) + Send + Sync>;

/// Handle returned by `on_status_change`, used to unregister.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// One provider as seen from the chain.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainNodeStatus {
    pub provider_id: ProviderId,
    /// Position in traversal order, starting at 0.
    pub position: usize,
    pub priority: u8,
    pub is_healthy: bool,
    pub is_active: bool,
    pub circuit_state: CircuitState,
    pub supports_extended: bool,
    pub supports_realtime: bool,
}

/// Overview of the provider chain and how it is being used.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainStatus {
    pub failover_enabled: bool,
    pub active_provider: Option<ProviderId>,
    pub healthy_providers: usize,
    pub providers: Vec<ChainNodeStatus>,
}

/// Owned collection of status listeners.
///
/// Delivery iterates over a copy of the registrations, so a listener may
/// register or unregister listeners from inside its callback. A panicking
/// listener is logged and skipped; the others still receive the snapshot.
pub struct StatusListeners {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, StatusListener)>>,
}

impl StatusListeners {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            listeners: Mutex::new(Vec::new()),
        }
    }

    fn lock_listeners(&self) -> MutexGuard<'_, Vec<(ListenerId, StatusListener)>> {
        self.listeners.lock().unwrap_or_else(|poisoned| {
            warn!("Status listener mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub fn add(&self, listener: StatusListener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock_listeners().push((id, listener));
        id
    }

    pub fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.lock_listeners();
        let before = listeners.len();
        listeners.retain(|(registered, _)| *registered != id);
        listeners.len() != before
    }

    pub fn clear(&self) {
        self.lock_listeners().clear();
    }

    pub fn len(&self) -> usize {
        self.lock_listeners().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_listeners().is_empty()
    }

    /// Deliver `snapshot` to every listener. Returns how many returned normally.
    pub fn notify(&self, snapshot: &StatusSnapshot) -> usize {
        let listeners: Vec<_> = self.lock_listeners().clone();
        let mut delivered = 0;

        for (id, listener) in listeners {
            match catch_unwind(AssertUnwindSafe(|| listener(snapshot))) {
                Ok(()) => delivered += 1,
                Err(_) => warn!("Status listener {:?} panicked, continuing", id),
            }
        }

        delivered
    }
}

impl Default for StatusListeners {
    fn default() -> Self {
        Self::new()
    }
}
