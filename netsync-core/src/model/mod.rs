//! Inventory records shared by both sides of a reconciliation.
//!
//! - `records` - network/VM records and the ordered snapshots built from them
//! - `mac` - MAC address parsing and formatting
//! - `identity` - stable keys and subnet helpers
//! - `reserved` - network names excluded from synchronization

pub mod identity;
pub mod mac;
pub mod records;
pub mod reserved;

pub use identity::*;
pub use mac::*;
pub use records::*;
pub use reserved::*;
