//! Controller mutation gateway.
//!
//! Turns one create/delete action into the ordered object-graph operations
//! the controller accepts: network before VM, VM before interface, interface
//! before address on the way in, and the reverse on the way out.

use std::net::Ipv4Addr;

use thiserror::Error;
use uuid::Uuid;

use crate::logging::structured::LogContext;
use crate::model::{prefix_len, ControllerVmRecord, NetworkRecord, VmRecord};

use super::api::{ControllerApi, ControllerApiExt, ControllerError};
use super::objects::{
    fq_child, InstanceIp, IpamSubnet, NetworkIpam, ObjectKind, Project, VirtualMachine,
    VirtualMachineInterface, VirtualNetwork,
};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Controller(#[from] ControllerError),

    #[error("project/IPAM not prepared")]
    NotPrepared,

    #[error("network {network} has non-contiguous mask {mask}")]
    InvalidMask { network: Uuid, mask: Ipv4Addr },

    #[error("VM {vm} has {count} interfaces, expected exactly one")]
    InterfaceCount { vm: Uuid, count: usize },

    #[error("VM {vm} does not own interface {interface}")]
    InterfaceMismatch { vm: Uuid, interface: Uuid },
}

/// Result of creating a VM's port on a network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPort {
    pub interface: Uuid,
    /// Server-assigned; `None` if the network has no subnet.
    pub address: Option<Ipv4Addr>,
}

pub struct MutationGateway<C> {
    api: C,
    project: Vec<String>,
    ipam_name: String,
    ipam_id: Option<Uuid>,
}

impl<C: ControllerApi> MutationGateway<C> {
    pub fn new(api: C, project: Vec<String>, ipam_name: &str) -> Self {
        Self {
            api,
            project,
            ipam_name: ipam_name.to_string(),
            ipam_id: None,
        }
    }

    pub fn api(&self) -> &C {
        &self.api
    }

    pub fn api_mut(&mut self) -> &mut C {
        &mut self.api
    }

    pub fn project(&self) -> &[String] {
        &self.project
    }

    /// Make sure the project and IPAM that synced networks hang off exist.
    pub fn prepare(&mut self, ctx: &LogContext) -> Result<(), GatewayError> {
        let (parent, name) = match self.project.split_last() {
            Some((name, parent)) => (parent.to_vec(), name.clone()),
            None => return Err(GatewayError::NotPrepared),
        };

        if self
            .api
            .find_by_name(ObjectKind::Project, &parent, &name)?
            .is_none()
        {
            let id = Uuid::new_v4();
            self.api.create_typed(Project {
                uuid: id,
                fq_name: self.project.clone(),
            })?;
            log::info!("{} PROJECT_CREATED name={} id={}", ctx, name, id);
        }

        let ipam = match self
            .api
            .find_by_name(ObjectKind::NetworkIpam, &self.project, &self.ipam_name)?
        {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4();
                self.api.create_typed(NetworkIpam {
                    uuid: id,
                    fq_name: fq_child(&self.project, &self.ipam_name),
                })?;
                log::info!("{} IPAM_CREATED name={} id={}", ctx, self.ipam_name, id);
                id
            }
        };
        self.ipam_id = Some(ipam);
        Ok(())
    }

    /// Create the network object with its subnet attached through the IPAM.
    pub fn create_network(
        &mut self,
        network: &NetworkRecord,
        ctx: &LogContext,
    ) -> Result<(), GatewayError> {
        let ipam = self.ipam_id.ok_or(GatewayError::NotPrepared)?;
        let len = prefix_len(network.mask).ok_or(GatewayError::InvalidMask {
            network: network.key,
            mask: network.mask,
        })?;

        self.api.create_typed(VirtualNetwork {
            uuid: network.key,
            fq_name: fq_child(&self.project, &network.name),
            subnet: Some(IpamSubnet {
                ipam,
                prefix: network.subnet,
                prefix_len: len,
                gateway: network.gateway,
            }),
            interface_back_refs: Vec::new(),
        })?;

        log::info!(
            "{} NETWORK_CREATED id={} subnet={}/{} gateway={}",
            ctx,
            network.key,
            network.subnet,
            len,
            network.gateway
        );
        Ok(())
    }

    /// Create VM, interface and address, then read the address back.
    ///
    /// An existing VM object is reused, which happens when a VM moves between
    /// networks and its create on the new network runs before the delete on
    /// the old one.
    pub fn create_vm(
        &mut self,
        network: Uuid,
        vm: &VmRecord,
        ctx: &LogContext,
    ) -> Result<CreatedPort, GatewayError> {
        let created_vm = match self.api.fetch::<VirtualMachine>(vm.key)? {
            Some(mut existing) => {
                if existing.agent_address != vm.agent_address {
                    existing.agent_address = vm.agent_address;
                    self.api.update(&existing.into())?;
                }
                false
            }
            None => {
                self.api.create_typed(VirtualMachine {
                    uuid: vm.key,
                    fq_name: vec![vm.key.to_string()],
                    display_name: vm.name.clone(),
                    agent_address: vm.agent_address,
                    interface_back_refs: Vec::new(),
                })?;
                true
            }
        };

        let interface = Uuid::new_v4();
        let vmi = VirtualMachineInterface {
            uuid: interface,
            fq_name: vec![vm.key.to_string(), interface.to_string()],
            parent_vm: vm.key,
            network,
            mac_addresses: vec![vm.mac],
            instance_ip_back_refs: Vec::new(),
        };
        if let Err(e) = self.api.create_typed(vmi) {
            self.roll_back(vm.key, None, created_vm, ctx);
            return Err(e.into());
        }

        let iip_id = Uuid::new_v4();
        let iip = InstanceIp {
            uuid: iip_id,
            fq_name: vec![iip_id.to_string()],
            network,
            interface,
            address: None,
        };
        if let Err(e) = self.api.create_typed(iip) {
            self.roll_back(vm.key, Some(interface), created_vm, ctx);
            return Err(e.into());
        }

        let address = self
            .api
            .fetch::<InstanceIp>(iip_id)?
            .and_then(|iip| iip.address);

        log::info!(
            "{} VM_CREATED id={} interface={} mac={} address={}",
            ctx,
            vm.key,
            interface,
            vm.mac,
            address.map(|a| a.to_string()).unwrap_or_else(|| "none".to_string())
        );

        Ok(CreatedPort { interface, address })
    }

    /// Give `interface` an address if it has none, and return the address.
    ///
    /// A create whose rollback failed leaves the VM and interface without an
    /// address object; this finishes that create.
    pub fn ensure_address(
        &mut self,
        network: Uuid,
        interface: Uuid,
        ctx: &LogContext,
    ) -> Result<Option<Ipv4Addr>, GatewayError> {
        let vmi = match self.api.fetch::<VirtualMachineInterface>(interface)? {
            Some(vmi) => vmi,
            None => return Ok(None),
        };
        if !vmi.instance_ip_back_refs.is_empty() {
            for iip in &vmi.instance_ip_back_refs {
                let address = self.api.fetch::<InstanceIp>(*iip)?.and_then(|iip| iip.address);
                if address.is_some() {
                    return Ok(address);
                }
            }
            return Ok(None);
        }

        let iip_id = Uuid::new_v4();
        self.api.create_typed(InstanceIp {
            uuid: iip_id,
            fq_name: vec![iip_id.to_string()],
            network,
            interface,
            address: None,
        })?;
        let address = self
            .api
            .fetch::<InstanceIp>(iip_id)?
            .and_then(|iip| iip.address);

        log::info!(
            "{} ADDRESS_REPAIRED interface={} address={}",
            ctx,
            interface,
            address.map(|a| a.to_string()).unwrap_or_else(|| "none".to_string())
        );
        Ok(address)
    }

    /// Record which agent hosts `vm`. Returns whether the object changed.
    pub fn set_agent_address(
        &mut self,
        vm: Uuid,
        agent: Option<Ipv4Addr>,
        ctx: &LogContext,
    ) -> Result<bool, GatewayError> {
        let mut current = match self.api.fetch::<VirtualMachine>(vm)? {
            Some(current) => current,
            None => return Ok(false),
        };
        if current.agent_address == agent {
            return Ok(false);
        }
        let previous = current.agent_address;
        current.agent_address = agent;
        self.api.update(&current.into())?;
        log::info!(
            "{} VM_AGENT_CHANGED id={} from={:?} to={:?}",
            ctx,
            vm,
            previous,
            agent
        );
        Ok(true)
    }

    /// Best effort; whatever survives is picked up again next pass.
    fn roll_back(&mut self, vm: Uuid, interface: Option<Uuid>, created_vm: bool, ctx: &LogContext) {
        if let Some(interface) = interface {
            if let Err(e) = self.api.delete(ObjectKind::VirtualMachineInterface, interface) {
                log::warn!("{} ROLLBACK_FAILED interface={} error={}", ctx, interface, e);
            }
        }
        if created_vm {
            if let Err(e) = self.api.delete(ObjectKind::VirtualMachine, vm) {
                log::warn!("{} ROLLBACK_FAILED vm={} error={}", ctx, vm, e);
            }
        }
    }

    /// Delete a network and everything hanging off it.
    ///
    /// Addresses of every interface go first, then the interfaces, then the
    /// VMs whose only interface was on this network, then the network.
    /// Returns how many VM objects were removed.
    pub fn delete_network(&mut self, network: Uuid, ctx: &LogContext) -> Result<usize, GatewayError> {
        let vn = match self.api.fetch::<VirtualNetwork>(network)? {
            Some(vn) => vn,
            None => return Ok(0),
        };

        let mut interfaces = Vec::with_capacity(vn.interface_back_refs.len());
        for interface_id in &vn.interface_back_refs {
            if let Some(vmi) = self.api.fetch::<VirtualMachineInterface>(*interface_id)? {
                interfaces.push(vmi);
            }
        }

        for vmi in &interfaces {
            self.delete_addresses(vmi)?;
        }

        let mut sole_interface_vms = Vec::new();
        for vmi in &interfaces {
            if let Some(vm) = self.api.fetch::<VirtualMachine>(vmi.parent_vm)? {
                if vm.interface_back_refs == [vmi.uuid] {
                    sole_interface_vms.push(vm.uuid);
                }
            }
            self.api.delete(ObjectKind::VirtualMachineInterface, vmi.uuid)?;
        }

        for vm in &sole_interface_vms {
            self.api.delete(ObjectKind::VirtualMachine, *vm)?;
        }

        self.api.delete(ObjectKind::VirtualNetwork, network)?;
        log::info!(
            "{} NETWORK_DELETED id={} interfaces={} vms={}",
            ctx,
            network,
            interfaces.len(),
            sole_interface_vms.len()
        );
        Ok(sole_interface_vms.len())
    }

    /// Remove a VM's port from one network.
    ///
    /// The VM object goes too unless it still has interfaces elsewhere.
    pub fn delete_vm(&mut self, vm: &ControllerVmRecord, ctx: &LogContext) -> Result<(), GatewayError> {
        let current = match self.api.fetch::<VirtualMachine>(vm.key)? {
            Some(current) => current,
            None => return Ok(()),
        };
        if !current.interface_back_refs.contains(&vm.interface) {
            return Err(GatewayError::InterfaceMismatch {
                vm: vm.key,
                interface: vm.interface,
            });
        }

        self.delete_interface(vm.interface)?;
        if current.interface_back_refs.len() == 1 {
            self.api.delete(ObjectKind::VirtualMachine, vm.key)?;
            log::info!("{} VM_DELETED id={} interface={}", ctx, vm.key, vm.interface);
        } else {
            log::info!(
                "{} VM_DETACHED id={} interface={} remaining={}",
                ctx,
                vm.key,
                vm.interface,
                current.interface_back_refs.len() - 1
            );
        }
        Ok(())
    }

    /// Delete a VM by id; the VM must have exactly one interface.
    pub fn delete_vm_by_id(&mut self, vm: Uuid, ctx: &LogContext) -> Result<(), GatewayError> {
        let current = match self.api.fetch::<VirtualMachine>(vm)? {
            Some(current) => current,
            None => return Ok(()),
        };
        let interface = match current.interface_back_refs.as_slice() {
            [interface] => *interface,
            refs => {
                return Err(GatewayError::InterfaceCount {
                    vm,
                    count: refs.len(),
                })
            }
        };

        self.delete_interface(interface)?;
        self.api.delete(ObjectKind::VirtualMachine, vm)?;
        log::info!("{} VM_DELETED id={} interface={}", ctx, vm, interface);
        Ok(())
    }

    fn delete_interface(&mut self, interface: Uuid) -> Result<(), GatewayError> {
        if let Some(vmi) = self.api.fetch::<VirtualMachineInterface>(interface)? {
            self.delete_addresses(&vmi)?;
            self.api.delete(ObjectKind::VirtualMachineInterface, interface)?;
        }
        Ok(())
    }

    fn delete_addresses(&mut self, vmi: &VirtualMachineInterface) -> Result<(), GatewayError> {
        for iip in &vmi.instance_ip_back_refs {
            self.api.delete(ObjectKind::InstanceIp, *iip)?;
        }
        Ok(())
    }
}
