//! Netsync Core - platform to network-controller synchronization
//!
//! This crate keeps a network controller's object graph in step with the
//! networks and VMs a virtualization platform reports, and tells each host's
//! forwarding agent which ports to plug. The implementation prioritizes:
//!
//! 1. **Convergence** - Every pass rebuilds both views and re-applies the diff
//! 2. **Logging** - Every action logged with pass, network and VM context
//! 3. **Resilience** - Agent caches hold desired state across reconnects
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `model` - Network/VM records and ordered snapshots
//! - `platform` - Inventory interface and platform snapshot builder
//! - `controller` - CRUD interface, controller snapshot, mutation gateway
//! - `reconcile` - Ordered merge and the reconciliation engine
//! - `agent` - Forwarding-agent notifier, registry and TCP transport
//! - `service` - Scheduler and composition root
//! - `config` - JSON configuration
//! - `logging` - Structured logging with pass context

pub mod logging;

pub mod agent;
pub mod config;
pub mod controller;
pub mod model;
pub mod platform;
pub mod reconcile;
pub mod service;

pub use config::{ConfigError, SyncConfig};
pub use reconcile::{PassReport, ReconcileEngine, SyncError};
pub use service::SyncService;

/// Initialize the process-wide logger. Safe to call more than once.
pub fn init_logger() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_millis()
        .try_init();
}
