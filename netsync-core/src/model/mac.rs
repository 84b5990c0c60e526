//! MAC address handling.
//!
//! The platform reports MACs in whatever case it likes; the forwarding agent
//! wants exactly six lowercase colon-separated groups.

use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

lazy_static! {
    /// Six hex octets, all separated by ':' or all by '-'
    static ref MAC_PATTERN: Regex = Regex::new(
        r"^[0-9A-Fa-f]{2}(:[0-9A-Fa-f]{2}){5}$|^[0-9A-Fa-f]{2}(-[0-9A-Fa-f]{2}){5}$"
    )
    .unwrap();
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid MAC address {0:?}")]
pub struct MacParseError(pub String);

/// A 48-bit hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl FromStr for MacAddress {
    type Err = MacParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if !MAC_PATTERN.is_match(trimmed) {
            return Err(MacParseError(s.to_string()));
        }

        let mut octets = [0u8; 6];
        for (slot, group) in octets.iter_mut().zip(trimmed.split([':', '-'])) {
            let byte = hex::decode(group).map_err(|_| MacParseError(s.to_string()))?;
            *slot = byte[0];
        }
        Ok(MacAddress(octets))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let groups: Vec<String> = self.0.iter().map(|b| hex::encode([*b])).collect();
        write!(f, "{}", groups.join(":"))
    }
}
