//! Reconciliation of controller state toward platform state.
//!
//! - `merge` - two-way ordered merge over sorted keyed sequences
//! - `context` - per-pass id and timing
//! - `report` - what one pass did
//! - `engine` - builds both snapshots and applies the diff

pub mod context;
pub mod engine;
pub mod merge;
pub mod report;

pub use context::*;
pub use engine::*;
pub use merge::*;
pub use report::*;
