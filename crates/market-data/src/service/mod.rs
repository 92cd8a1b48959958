//! Resilient data service and its supporting types.
//!
//! - [`ResilientDataService`] - failover/fast-path façade over the providers
//! - [`ResilientServiceConfig`] - service configuration, loadable from JSON
//! - [`ProviderStatus`] / [`ChainStatus`] - status records pushed to listeners

mod config;
mod realtime;
mod resilient;
mod status;


pub use config::ResilientServiceConfig;
pub use realtime::SubscriptionId;
pub use resilient::ResilientDataService;
pub use status::{
    ChainNodeStatus, ChainStatus, ListenerId, ProviderStatus, StatusListener, StatusListeners,
    StatusSnapshot,
};
