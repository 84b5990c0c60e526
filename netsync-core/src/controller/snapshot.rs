//! Controller-side snapshot.
//!
//! A VM hangs off a network only through its interface, so the walk is
//! network -> interface back-references -> interface -> parent VM, with the
//! interface's first instance address picked up on the way.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::logging::structured::LogContext;
use crate::model::{ControllerNetworkRecord, ControllerSnapshot, ControllerVmRecord, ReservedNames};

use super::api::{ControllerApi, ControllerApiExt, ControllerError};
use super::objects::{InstanceIp, ObjectKind, VirtualMachine, VirtualMachineInterface, VirtualNetwork};

/// Read every network under `project` back from the controller.
///
/// Read failures abort the snapshot: a partial controller view would turn
/// into spurious creates. Inconsistent entities are skipped with a log line.
pub fn build_controller_snapshot<C: ControllerApi + ?Sized>(
    api: &mut C,
    project: &[String],
    reserved: &ReservedNames,
    ctx: &LogContext,
) -> Result<ControllerSnapshot, ControllerError> {
    let mut snapshot = ControllerSnapshot::new();

    for network_id in api.list(ObjectKind::VirtualNetwork, project)? {
        let vn: VirtualNetwork = match api.fetch(network_id)? {
            Some(vn) => vn,
            None => {
                log::debug!("{} CONTROLLER_NETWORK_VANISHED id={}", ctx, network_id);
                continue;
            }
        };

        let name = vn.fq_name.last().cloned().unwrap_or_default();
        if reserved.contains(&name) {
            log::debug!("{} CONTROLLER_NETWORK_RESERVED name={}", ctx, name);
            continue;
        }

        let net_ctx = ctx.with_network(&name);
        let mut record = ControllerNetworkRecord {
            key: vn.uuid,
            name,
            subnet: vn.subnet.as_ref().map(|s| (s.prefix, s.prefix_len)),
            gateway: vn.subnet.as_ref().map(|s| s.gateway),
            vms: BTreeMap::new(),
        };

        for interface_id in &vn.interface_back_refs {
            if let Some(vm) = read_vm(api, vn.uuid, *interface_id, &net_ctx)? {
                if record.vms.contains_key(&vm.key) {
                    log::error!(
                        "{} CONTROLLER_VM_DUPLICATE vm={} interface={}",
                        net_ctx,
                        vm.key,
                        interface_id
                    );
                    continue;
                }
                record.add_vm(vm);
            }
        }

        snapshot.add_network(record);
    }

    log::info!(
        "{} CONTROLLER_SNAPSHOT networks={} vms={}",
        ctx,
        snapshot.len(),
        snapshot.vm_count()
    );

    Ok(snapshot)
}

fn read_vm<C: ControllerApi + ?Sized>(
    api: &mut C,
    network_id: Uuid,
    interface_id: Uuid,
    ctx: &LogContext,
) -> Result<Option<ControllerVmRecord>, ControllerError> {
    let vmi: VirtualMachineInterface = match api.fetch(interface_id)? {
        Some(vmi) => vmi,
        None => {
            log::warn!("{} CONTROLLER_INTERFACE_MISSING interface={}", ctx, interface_id);
            return Ok(None);
        }
    };

    if vmi.network != network_id {
        log::error!(
            "{} CONTROLLER_INTERFACE_NETWORK_MISMATCH interface={} network={}",
            ctx,
            interface_id,
            vmi.network
        );
        return Ok(None);
    }

    if vmi.mac_addresses.len() > 1 {
        log::error!(
            "{} CONTROLLER_INTERFACE_MACS interface={} count={}",
            ctx,
            interface_id,
            vmi.mac_addresses.len()
        );
        return Ok(None);
    }

    let vm: VirtualMachine = match api.fetch(vmi.parent_vm)? {
        Some(vm) => vm,
        None => {
            log::warn!(
                "{} CONTROLLER_VM_MISSING interface={} vm={}",
                ctx,
                interface_id,
                vmi.parent_vm
            );
            return Ok(None);
        }
    };

    let mut address = None;
    if let Some(iip_id) = vmi.instance_ip_back_refs.first() {
        let iip: Option<InstanceIp> = api.fetch(*iip_id)?;
        address = iip.and_then(|iip| iip.address);
    }

    Ok(Some(ControllerVmRecord {
        key: vm.uuid,
        name: vm.display_name,
        interface: vmi.uuid,
        mac: vmi.mac_addresses.first().copied(),
        address,
        agent_address: vm.agent_address,
    }))
}
