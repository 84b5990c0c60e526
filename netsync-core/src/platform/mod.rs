//! Virtualization-platform side.
//!
//! - `inventory` - the consumed inventory interface and an in-memory version
//! - `snapshot` - platform snapshot builder

pub mod inventory;
pub mod snapshot;

pub use inventory::*;
pub use snapshot::*;
