//! Platform-side snapshot.
//!
//! Port groups and VMs that cannot be synchronized (no private VLAN, no IP
//! pool, no instance id, no usable MAC) are left out with a warning. A failed
//! inventory call aborts the whole snapshot instead: leaving out a network
//! because its VM listing failed would get it deleted on the controller.

use std::collections::{BTreeMap, HashMap};
use std::net::Ipv4Addr;

use uuid::Uuid;

use crate::logging::structured::LogContext;
use crate::model::{network_key, MacAddress, NetworkRecord, PlatformSnapshot, ReservedNames, VmRecord};

use super::inventory::{PlatformError, PlatformInventory, PlatformVm};

pub fn build_platform_snapshot<P: PlatformInventory + ?Sized>(
    inventory: &mut P,
    reserved: &ReservedNames,
    agent_prefix: &str,
    ctx: &LogContext,
) -> Result<PlatformSnapshot, PlatformError> {
    let mut snapshot = PlatformSnapshot::new();
    let mut agents: HashMap<String, Option<Ipv4Addr>> = HashMap::new();

    for pg in inventory.port_groups()? {
        if reserved.contains(&pg.name) {
            log::debug!("{} PLATFORM_NETWORK_RESERVED name={}", ctx, pg.name);
            continue;
        }

        let net_ctx = ctx.with_network(&pg.name);
        let vlan = match pg.private_vlan {
            Some(vlan) => vlan,
            None => {
                log::warn!("{} PLATFORM_NETWORK_SKIPPED reason=no_private_vlan", net_ctx);
                continue;
            }
        };
        let pool = match pg.ip_pool {
            Some(pool) => pool,
            None => {
                log::warn!("{} PLATFORM_NETWORK_SKIPPED reason=no_ip_pool", net_ctx);
                continue;
            }
        };

        let mut network = NetworkRecord {
            key: network_key(&pg.key),
            name: pg.name.clone(),
            isolated_vlan: vlan.isolated,
            primary_vlan: vlan.primary,
            subnet: pool.subnet,
            mask: pool.netmask,
            gateway: pool.gateway,
            vms: BTreeMap::new(),
        };

        for vm in inventory.powered_on_vms(&pg)? {
            if let Some(record) = vm_record(inventory, &vm, agent_prefix, &mut agents, &net_ctx) {
                network.add_vm(record);
            }
        }

        log::debug!(
            "{} PLATFORM_NETWORK key={} vlan={}/{} vms={}",
            net_ctx,
            network.key,
            network.primary_vlan,
            network.isolated_vlan,
            network.vms.len()
        );
        snapshot.add_network(network);
    }

    log::info!(
        "{} PLATFORM_SNAPSHOT networks={} vms={}",
        ctx,
        snapshot.len(),
        snapshot.vm_count()
    );

    Ok(snapshot)
}

fn vm_record<P: PlatformInventory + ?Sized>(
    inventory: &mut P,
    vm: &PlatformVm,
    agent_prefix: &str,
    agents: &mut HashMap<String, Option<Ipv4Addr>>,
    ctx: &LogContext,
) -> Option<VmRecord> {
    let vm_ctx = ctx.with_vm(&vm.name);

    let key = match vm.instance_uuid.as_deref().map(Uuid::parse_str) {
        Some(Ok(key)) => key,
        Some(Err(e)) => {
            log::warn!("{} PLATFORM_VM_SKIPPED reason=bad_instance_uuid error={}", vm_ctx, e);
            return None;
        }
        None => {
            log::warn!("{} PLATFORM_VM_SKIPPED reason=no_instance_uuid", vm_ctx);
            return None;
        }
    };

    let mac: MacAddress = match vm.mac.as_deref().map(str::parse::<MacAddress>) {
        Some(Ok(mac)) => mac,
        Some(Err(e)) => {
            log::warn!("{} PLATFORM_VM_SKIPPED reason=bad_mac error={}", vm_ctx, e);
            return None;
        }
        None => {
            log::warn!("{} PLATFORM_VM_SKIPPED reason=no_mac", vm_ctx);
            return None;
        }
    };

    let agent_address = *agents.entry(vm.host.clone()).or_insert_with(|| {
        match inventory.agent_address(&vm.host, agent_prefix) {
            Ok(address) => address,
            Err(e) => {
                log::warn!(
                    "{} AGENT_LOOKUP_FAILED host={} error={}",
                    vm_ctx,
                    vm.host,
                    e
                );
                None
            }
        }
    });

    if agent_address.is_none() {
        log::warn!("{} PLATFORM_VM_NO_AGENT host={}", vm_ctx, vm.host);
    }

    Some(VmRecord {
        key,
        name: vm.name.clone(),
        mac,
        host: vm.host.clone(),
        agent_address,
    })
}
