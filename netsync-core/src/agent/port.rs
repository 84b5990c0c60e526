//! Port state kept for each forwarding agent.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::MacAddress;

/// What the agent should have plugged for one vif.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortState {
    pub vif: Uuid,
    pub vm: Uuid,
    pub network: Uuid,
    pub name: String,
    pub ip: Ipv4Addr,
    pub mac: MacAddress,
    pub primary_vlan: u16,
    pub isolated_vlan: u16,
}

/// A port as sent to the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub port_id: [u8; 16],
    pub instance_id: [u8; 16],
    pub vn_id: [u8; 16],
    pub tap_name: String,
    pub ip_address: String,
    pub mac_address: String,
    pub primary_vlan_id: u16,
    pub isolated_vlan_id: u16,
}

/// Most-significant 8 bytes, then least-significant 8 bytes, both big-endian.
pub fn uuid_to_bytes(id: Uuid) -> [u8; 16] {
    id.as_u128().to_be_bytes()
}

pub fn uuid_from_bytes(bytes: [u8; 16]) -> Uuid {
    Uuid::from_u128(u128::from_be_bytes(bytes))
}

impl PortState {
    pub fn to_wire(&self) -> Port {
        Port {
            port_id: uuid_to_bytes(self.vif),
            instance_id: uuid_to_bytes(self.vm),
            vn_id: uuid_to_bytes(self.network),
            tap_name: self.name.clone(),
            ip_address: self.ip.to_string(),
            mac_address: self.mac.to_string(),
            primary_vlan_id: self.primary_vlan,
            isolated_vlan_id: self.isolated_vlan,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_bytes_are_msb_then_lsb() {
        let id = Uuid::parse_str("01020304-0506-0708-090a-0b0c0d0e0f10").unwrap();
        let bytes = uuid_to_bytes(id);
        assert_eq!(&bytes[..8], &0x0102030405060708u64.to_be_bytes());
        assert_eq!(&bytes[8..], &0x090a0b0c0d0e0f10u64.to_be_bytes());
        assert_eq!(uuid_from_bytes(bytes), id);
    }

    #[test]
    fn test_to_wire_formats_fields() {
        let port = PortState {
            vif: Uuid::from_u128(1),
            vm: Uuid::from_u128(2),
            network: Uuid::from_u128(3),
            name: "tap00000000-00".to_string(),
            ip: Ipv4Addr::new(10, 0, 0, 5),
            mac: MacAddress([0, 0x50, 0x56, 0xAB, 0xCD, 0xEF]),
            primary_vlan: 100,
            isolated_vlan: 101,
        };
        let wire = port.to_wire();
        assert_eq!(wire.ip_address, "10.0.0.5");
        assert_eq!(wire.mac_address, "00:50:56:ab:cd:ef");
        assert_eq!(wire.vn_id[15], 3);
        assert_eq!(wire.primary_vlan_id, 100);
        assert_eq!(wire.isolated_vlan_id, 101);
    }
}
