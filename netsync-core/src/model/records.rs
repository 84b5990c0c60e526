//! Network and VM records.
//!
//! Both snapshots store their collections in `BTreeMap`s keyed by `Uuid`, so
//! every collection the reconciler walks is already sorted by the same total
//! order. The merge in `reconcile::merge` depends on that.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::mac::MacAddress;

/// A VM attached to a platform network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmRecord {
    pub key: Uuid,
    pub name: String,
    pub mac: MacAddress,
    pub host: String,
    /// `None` when no forwarding agent is reachable for `host`.
    pub agent_address: Option<Ipv4Addr>,
}

/// A platform port group with private-VLAN and IP-pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRecord {
    pub key: Uuid,
    pub name: String,
    pub isolated_vlan: u16,
    pub primary_vlan: u16,
    pub subnet: Ipv4Addr,
    pub mask: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub vms: BTreeMap<Uuid, VmRecord>,
}

impl NetworkRecord {
    pub fn add_vm(&mut self, vm: VmRecord) {
        self.vms.insert(vm.key, vm);
    }
}

/// A VM as reconstructed from the controller's object graph.
///
/// The controller links a VM to a network only through the VM's interface,
/// so the record carries the interface and its address alongside the VM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerVmRecord {
    pub key: Uuid,
    pub name: String,
    pub interface: Uuid,
    pub mac: Option<MacAddress>,
    pub address: Option<Ipv4Addr>,
    pub agent_address: Option<Ipv4Addr>,
}

/// A network as read back from the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerNetworkRecord {
    pub key: Uuid,
    pub name: String,
    pub subnet: Option<(Ipv4Addr, u8)>,
    pub gateway: Option<Ipv4Addr>,
    pub vms: BTreeMap<Uuid, ControllerVmRecord>,
}

impl ControllerNetworkRecord {
    pub fn add_vm(&mut self, vm: ControllerVmRecord) {
        self.vms.insert(vm.key, vm);
    }
}

/// Ordered set of networks captured at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot<N> {
    pub networks: BTreeMap<Uuid, N>,
}

impl<N> Default for Snapshot<N> {
    fn default() -> Self {
        Self {
            networks: BTreeMap::new(),
        }
    }
}

impl<N> Snapshot<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: Uuid, network: N) {
        self.networks.insert(key, network);
    }

    pub fn get(&self, key: &Uuid) -> Option<&N> {
        self.networks.get(key)
    }

    pub fn len(&self) -> usize {
        self.networks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }
}

pub type PlatformSnapshot = Snapshot<NetworkRecord>;
pub type ControllerSnapshot = Snapshot<ControllerNetworkRecord>;

impl PlatformSnapshot {
    pub fn add_network(&mut self, network: NetworkRecord) {
        self.insert(network.key, network);
    }

    pub fn vm_count(&self) -> usize {
        self.networks.values().map(|n| n.vms.len()).sum()
    }
}

impl ControllerSnapshot {
    pub fn add_network(&mut self, network: ControllerNetworkRecord) {
        self.insert(network.key, network);
    }

    pub fn vm_count(&self) -> usize {
        self.networks.values().map(|n| n.vms.len()).sum()
    }
}
