//! Platform inventory interface.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("inventory request failed: {0}")]
    Request(String),

    #[error("port group {0} not found")]
    UnknownPortGroup(String),
}

/// Private-VLAN pair configured on a port group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateVlan {
    pub primary: u16,
    pub isolated: u16,
}

/// IP pool associated with a port group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpPool {
    pub subnet: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub gateway: Ipv4Addr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortGroup {
    /// Platform-internal key; stable across renames.
    pub key: String,
    pub name: String,
    pub private_vlan: Option<PrivateVlan>,
    pub ip_pool: Option<IpPool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformVm {
    pub instance_uuid: Option<String>,
    pub name: String,
    pub mac: Option<String>,
    pub host: String,
}

/// Inventory calls consumed from the virtualization platform.
pub trait PlatformInventory {
    fn port_groups(&mut self) -> Result<Vec<PortGroup>, PlatformError>;

    fn powered_on_vms(&mut self, port_group: &PortGroup) -> Result<Vec<PlatformVm>, PlatformError>;

    /// Management address of the forwarding agent on `host`, found by the
    /// agent VM's name prefix.
    fn agent_address(
        &mut self,
        host: &str,
        name_prefix: &str,
    ) -> Result<Option<Ipv4Addr>, PlatformError>;
}

#[derive(Debug, Default)]
struct Inventory {
    port_groups: Vec<(PortGroup, Vec<PlatformVm>)>,
    agents: HashMap<String, Ipv4Addr>,
    failing: bool,
}

/// In-memory inventory; clones share state.
#[derive(Debug, Clone, Default)]
pub struct StaticInventory {
    inner: Arc<Mutex<Inventory>>,
}

impl StaticInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_port_group(&self, port_group: PortGroup) {
        let mut inner = self.inner.lock();
        inner.port_groups.retain(|(pg, _)| pg.key != port_group.key);
        inner.port_groups.push((port_group, Vec::new()));
    }

    pub fn remove_port_group(&self, key: &str) {
        self.inner.lock().port_groups.retain(|(pg, _)| pg.key != key);
    }

    pub fn add_vm(&self, port_group_key: &str, vm: PlatformVm) -> Result<(), PlatformError> {
        let mut inner = self.inner.lock();
        let (_, vms) = inner
            .port_groups
            .iter_mut()
            .find(|(pg, _)| pg.key == port_group_key)
            .ok_or_else(|| PlatformError::UnknownPortGroup(port_group_key.to_string()))?;
        vms.push(vm);
        Ok(())
    }

    pub fn remove_vm(&self, port_group_key: &str, instance_uuid: &str) {
        let mut inner = self.inner.lock();
        for (pg, vms) in inner.port_groups.iter_mut() {
            if pg.key == port_group_key {
                vms.retain(|vm| vm.instance_uuid.as_deref() != Some(instance_uuid));
            }
        }
    }

    pub fn set_agent(&self, host: &str, address: Ipv4Addr) {
        self.inner.lock().agents.insert(host.to_string(), address);
    }

    /// Make every call fail, as an unreachable platform would.
    pub fn set_failing(&self, failing: bool) {
        self.inner.lock().failing = failing;
    }

    fn check(&self) -> Result<(), PlatformError> {
        if self.inner.lock().failing {
            return Err(PlatformError::Request("platform unreachable".to_string()));
        }
        Ok(())
    }
}

impl PlatformInventory for StaticInventory {
    fn port_groups(&mut self) -> Result<Vec<PortGroup>, PlatformError> {
        self.check()?;
        Ok(self
            .inner
            .lock()
            .port_groups
            .iter()
            .map(|(pg, _)| pg.clone())
            .collect())
    }

    fn powered_on_vms(&mut self, port_group: &PortGroup) -> Result<Vec<PlatformVm>, PlatformError> {
        self.check()?;
        self.inner
            .lock()
            .port_groups
            .iter()
            .find(|(pg, _)| pg.key == port_group.key)
            .map(|(_, vms)| vms.clone())
            .ok_or_else(|| PlatformError::UnknownPortGroup(port_group.key.clone()))
    }

    /// Agents are registered per host; the prefix only matters to a live
    /// inventory that has to search VM names.
    fn agent_address(
        &mut self,
        host: &str,
        _name_prefix: &str,
    ) -> Result<Option<Ipv4Addr>, PlatformError> {
        self.check()?;
        Ok(self.inner.lock().agents.get(host).copied())
    }
}
