//! Forwarding-agent notification.
//!
//! - `port` - desired port state and its wire form
//! - `rpc` - agent RPC and connector seams
//! - `notifier` - per-agent cache and session state machine
//! - `registry` - one notifier per agent address
//! - `tcp` - blocking TCP transport
//! - `loopback` - in-process agent for tests and dry runs

pub mod loopback;
pub mod notifier;
pub mod port;
pub mod registry;
pub mod rpc;
pub mod tcp;

pub use loopback::*;
pub use notifier::*;
pub use port::*;
pub use registry::*;
pub use rpc::*;
pub use tcp::*;
