//! Network-controller side.
//!
//! - `objects` - object kinds and plain records
//! - `api` - the consumed CRUD interface
//! - `memory` - in-process store implementing it
//! - `snapshot` - controller snapshot builder
//! - `gateway` - ordered create/delete of object graphs

pub mod api;
pub mod gateway;
pub mod memory;
pub mod objects;
pub mod snapshot;

pub use api::*;
pub use gateway::*;
pub use memory::*;
pub use objects::*;
pub use snapshot::*;
