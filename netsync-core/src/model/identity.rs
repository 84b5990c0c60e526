//! Stable keys and subnet helpers.

use std::net::Ipv4Addr;

use uuid::Uuid;

/// Derive the key for a port group from its platform-internal opaque key.
///
/// The opaque key survives renames, so the derived key does too. The same
/// opaque key always yields the same UUID.
pub fn network_key(opaque_key: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, opaque_key.as_bytes())
}

/// Convert a dotted netmask to a prefix length.
///
/// Returns `None` for non-contiguous masks such as 255.0.255.0.
pub fn prefix_len(mask: Ipv4Addr) -> Option<u8> {
    let bits = u32::from(mask);
    let ones = bits.leading_ones();
    if bits.checked_shl(ones).unwrap_or(0) != 0 {
        return None;
    }
    Some(ones as u8)
}

/// Interface name the forwarding agent uses for a vif.
///
/// Kernel interface names are capped at 15 bytes.
pub fn tap_name(vif: Uuid) -> String {
    let mut name = format!("tap{}", vif);
    name.truncate(14);
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_key_is_deterministic() {
        let a = network_key("dvportgroup-42");
        let b = network_key("dvportgroup-42");
        let c = network_key("dvportgroup-43");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_prefix_len() {
        assert_eq!(prefix_len(Ipv4Addr::new(255, 255, 255, 0)), Some(24));
        assert_eq!(prefix_len(Ipv4Addr::new(255, 255, 255, 255)), Some(32));
        assert_eq!(prefix_len(Ipv4Addr::new(0, 0, 0, 0)), Some(0));
        assert_eq!(prefix_len(Ipv4Addr::new(255, 255, 240, 0)), Some(20));
        assert_eq!(prefix_len(Ipv4Addr::new(255, 0, 255, 0)), None);
    }

    #[test]
    fn test_tap_name_fits_kernel_limit() {
        let vif = Uuid::parse_str("6f1c2a4e-9b7d-4c3e-8a1f-0d2e3f4a5b6c").unwrap();
        let name = tap_name(vif);
        assert_eq!(name, "tap6f1c2a4e-9b");
        assert!(name.len() <= 15);
    }
}
