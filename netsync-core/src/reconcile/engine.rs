//! Reconciliation engine.
//!
//! One pass rebuilds both snapshots from scratch and walks them with the
//! ordered merge, networks first and then the VMs of every matched network.
//! A controller action that fails is logged and left for the next pass; the
//! pass itself only fails when a snapshot cannot be built.

use std::net::Ipv4Addr;

use thiserror::Error;

use crate::agent::{AgentConnector, AgentRegistry, PortState};
use crate::controller::{
    build_controller_snapshot, ControllerApi, ControllerError, GatewayError, MutationGateway,
};
use crate::logging::structured::LogContext;
use crate::model::{
    tap_name, ControllerNetworkRecord, ControllerVmRecord, NetworkRecord, ReservedNames, VmRecord,
};
use crate::platform::{build_platform_snapshot, PlatformError, PlatformInventory};
use crate::{log_debug, log_error, log_info, log_warn};

use super::context::PassContext;
use super::merge::{merge, MergeStep};
use super::report::PassReport;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("platform snapshot failed: {0}")]
    Platform(#[from] PlatformError),

    #[error("controller snapshot failed: {0}")]
    Controller(#[from] ControllerError),

    #[error("controller preparation failed: {0}")]
    Gateway(#[from] GatewayError),
}

pub struct ReconcileEngine<P, C, A: AgentConnector + Clone> {
    inventory: P,
    gateway: MutationGateway<C>,
    registry: AgentRegistry<A>,
    reserved: ReservedNames,
    agent_prefix: String,
}

impl<P, C, A> ReconcileEngine<P, C, A>
where
    P: PlatformInventory,
    C: ControllerApi,
    A: AgentConnector + Clone,
{
    pub fn new(
        inventory: P,
        gateway: MutationGateway<C>,
        registry: AgentRegistry<A>,
        reserved: ReservedNames,
        agent_prefix: &str,
    ) -> Self {
        Self {
            inventory,
            gateway,
            registry,
            reserved,
            agent_prefix: agent_prefix.to_string(),
        }
    }

    pub fn gateway(&self) -> &MutationGateway<C> {
        &self.gateway
    }

    pub fn registry(&self) -> &AgentRegistry<A> {
        &self.registry
    }

    /// Converge the controller and the agents toward the platform once.
    pub fn run_pass(&mut self) -> Result<PassReport, SyncError> {
        let pass = PassContext::new();
        let ctx = pass.log_context();
        let mut report = PassReport::new(&pass);
        log_info!(ctx, "PASS_STARTED", started_at = pass.started_at.to_rfc3339());

        self.gateway.prepare(&ctx)?;

        let platform = build_platform_snapshot(
            &mut self.inventory,
            &self.reserved,
            &self.agent_prefix,
            &ctx,
        )?;
        let project = self.gateway.project().to_vec();
        let controller =
            build_controller_snapshot(self.gateway.api_mut(), &project, &self.reserved, &ctx)?;
        report.platform_networks = platform.len();
        report.controller_networks = controller.len();

        for step in merge(&platform.networks, &controller.networks) {
            match step {
                MergeStep::Create(_, network) => self.create_network(network, &ctx, &mut report),
                MergeStep::Delete(_, network) => self.delete_network(network, &ctx, &mut report),
                MergeStep::Matched(_, source, current) => {
                    self.sync_network(source, current, &ctx, &mut report)
                }
            }
        }

        for (agent, e) in self.registry.check_connections() {
            report.agent_failures += 1;
            log_warn!(ctx, "AGENT_UNREACHABLE", agent = agent, error = e);
        }

        report.finish();
        log_info!(
            ctx,
            "PASS_FINISHED",
            actions = report.actions(),
            failures = report.failures.len(),
            agent_failures = report.agent_failures,
            duration_ms = report.duration_ms,
        );
        Ok(report)
    }

    fn create_network(&mut self, network: &NetworkRecord, ctx: &LogContext, report: &mut PassReport) {
        let net_ctx = ctx.with_network(&network.name);
        if let Err(e) = self.gateway.create_network(network, &net_ctx) {
            log_error!(net_ctx, "NETWORK_CREATE_FAILED", id = network.key, error = e);
            report.record_failure(format!("create network {}: {}", network.name, e));
            return;
        }
        report.networks_created += 1;

        for vm in network.vms.values() {
            self.create_vm(network, vm, &net_ctx, report);
        }
    }

    fn delete_network(
        &mut self,
        network: &ControllerNetworkRecord,
        ctx: &LogContext,
        report: &mut PassReport,
    ) {
        let net_ctx = ctx.with_network(&network.name);
        match self.gateway.delete_network(network.key, &net_ctx) {
            Ok(removed) => {
                report.networks_deleted += 1;
                report.vms_deleted += removed;
            }
            Err(e) => {
                log_error!(net_ctx, "NETWORK_DELETE_FAILED", id = network.key, error = e);
                report.record_failure(format!("delete network {}: {}", network.name, e));
            }
        }

        // The platform no longer has these VMs whether or not the controller
        // side went through.
        for vm in network.vms.values() {
            self.unplug(vm, &net_ctx.with_vm(&vm.name), report);
        }
    }

    fn sync_network(
        &mut self,
        source: &NetworkRecord,
        current: &ControllerNetworkRecord,
        ctx: &LogContext,
        report: &mut PassReport,
    ) {
        let net_ctx = ctx.with_network(&source.name);
        for step in merge(&source.vms, &current.vms) {
            match step {
                MergeStep::Create(_, vm) => self.create_vm(source, vm, &net_ctx, report),
                MergeStep::Delete(_, vm) => self.delete_vm(vm, &net_ctx, report),
                MergeStep::Matched(_, vm, existing) => {
                    self.refresh_vm(source, vm, existing, &net_ctx, report)
                }
            }
        }
    }

    fn create_vm(
        &mut self,
        network: &NetworkRecord,
        vm: &VmRecord,
        ctx: &LogContext,
        report: &mut PassReport,
    ) {
        let vm_ctx = ctx.with_vm(&vm.name);
        let port = match self.gateway.create_vm(network.key, vm, &vm_ctx) {
            Ok(port) => port,
            Err(e) => {
                log_error!(vm_ctx, "VM_CREATE_FAILED", id = vm.key, error = e);
                report.record_failure(format!("create vm {} on {}: {}", vm.name, network.name, e));
                return;
            }
        };
        report.vms_created += 1;

        let existing = ControllerVmRecord {
            key: vm.key,
            name: vm.name.clone(),
            interface: port.interface,
            mac: Some(vm.mac),
            address: port.address,
            agent_address: vm.agent_address,
        };
        self.plug(network, vm, &existing, port.address, &vm_ctx, report);
    }

    fn delete_vm(&mut self, vm: &ControllerVmRecord, ctx: &LogContext, report: &mut PassReport) {
        let vm_ctx = ctx.with_vm(&vm.name);
        match self.gateway.delete_vm(vm, &vm_ctx) {
            Ok(()) => report.vms_deleted += 1,
            Err(e) => {
                log_error!(vm_ctx, "VM_DELETE_FAILED", id = vm.key, error = e);
                report.record_failure(format!("delete vm {}: {}", vm.name, e));
            }
        }
        self.unplug(vm, &vm_ctx, report);
    }

    fn refresh_vm(
        &mut self,
        network: &NetworkRecord,
        vm: &VmRecord,
        existing: &ControllerVmRecord,
        ctx: &LogContext,
        report: &mut PassReport,
    ) {
        let vm_ctx = ctx.with_vm(&vm.name);
        if existing.agent_address != vm.agent_address {
            if let Err(e) = self
                .gateway
                .set_agent_address(vm.key, vm.agent_address, &vm_ctx)
            {
                log_warn!(vm_ctx, "VM_AGENT_UPDATE_FAILED", id = vm.key, error = e);
            }
        }

        let address = match existing.address {
            Some(ip) => Some(ip),
            None => self.repair_address(network, vm, existing, &vm_ctx, report),
        };
        self.plug(network, vm, existing, address, &vm_ctx, report);
    }

    // An interface left without an address by a failed create.
    fn repair_address(
        &mut self,
        network: &NetworkRecord,
        vm: &VmRecord,
        existing: &ControllerVmRecord,
        ctx: &LogContext,
        report: &mut PassReport,
    ) -> Option<Ipv4Addr> {
        match self
            .gateway
            .ensure_address(network.key, existing.interface, ctx)
        {
            Ok(Some(ip)) => {
                report.vms_repaired += 1;
                Some(ip)
            }
            Ok(None) => None,
            Err(e) => {
                log_error!(ctx, "VM_REPAIR_FAILED", id = vm.key, interface = existing.interface, error = e);
                report.record_failure(format!("repair vm {} on {}: {}", vm.name, network.name, e));
                None
            }
        }
    }

    fn plug(
        &mut self,
        network: &NetworkRecord,
        vm: &VmRecord,
        existing: &ControllerVmRecord,
        address: Option<Ipv4Addr>,
        ctx: &LogContext,
        report: &mut PassReport,
    ) {
        let agent = match vm.agent_address {
            Some(agent) => agent,
            None => {
                log_warn!(ctx, "VM_NOT_PLUGGED", reason = "no_agent", host = vm.host);
                // Moved to a host without an agent: take the port off the old one.
                if existing.agent_address.is_some()
                    || self.registry.placement(&existing.interface).is_some()
                {
                    self.unplug(existing, ctx, report);
                }
                return;
            }
        };
        let ip = match address {
            Some(ip) => ip,
            None => {
                log_warn!(ctx, "VM_NOT_PLUGGED", reason = "no_address", interface = existing.interface);
                return;
            }
        };

        let port = PortState {
            vif: existing.interface,
            vm: vm.key,
            network: network.key,
            name: tap_name(existing.interface),
            ip,
            mac: vm.mac,
            primary_vlan: network.primary_vlan,
            isolated_vlan: network.isolated_vlan,
        };
        match self.registry.ensure_port(agent, port) {
            Ok(true) => {
                report.agents_updated += 1;
                log_debug!(ctx, "PORT_PLUGGED", vif = existing.interface, agent = agent);
            }
            Ok(false) => {}
            Err(e) => {
                report.agent_failures += 1;
                log_warn!(ctx, "PORT_PLUG_FAILED", vif = existing.interface, agent = agent, error = e);
            }
        }
    }

    fn unplug(&mut self, vm: &ControllerVmRecord, ctx: &LogContext, report: &mut PassReport) {
        match self.registry.delete_port(vm.interface, vm.agent_address) {
            Ok(()) => log_debug!(ctx, "PORT_UNPLUGGED", vif = vm.interface),
            Err(e) => {
                report.agent_failures += 1;
                log_warn!(ctx, "PORT_UNPLUG_FAILED", vif = vm.interface, error = e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentCall, LoopbackConnector};
    use crate::controller::{InMemoryController, ObjectKind, Verb};
    use crate::model::network_key;
    use crate::platform::{IpPool, PlatformVm, PortGroup, PrivateVlan, StaticInventory};

    const AGENT_A: Ipv4Addr = Ipv4Addr::new(172, 16, 0, 10);
    const AGENT_B: Ipv4Addr = Ipv4Addr::new(172, 16, 0, 11);

    type TestEngine = ReconcileEngine<StaticInventory, InMemoryController, LoopbackConnector>;

    struct World {
        inventory: StaticInventory,
        controller: InMemoryController,
        agents: LoopbackConnector,
        engine: TestEngine,
    }

    fn world() -> World {
        let inventory = StaticInventory::new();
        inventory.set_agent("esx-1", AGENT_A);
        inventory.set_agent("esx-2", AGENT_B);
        let controller = InMemoryController::new();
        let agents = LoopbackConnector::new();
        let gateway = MutationGateway::new(
            controller.clone(),
            vec!["default-domain".to_string(), "vCenter".to_string()],
            "vCenter-ipam",
        );
        let engine = ReconcileEngine::new(
            inventory.clone(),
            gateway,
            AgentRegistry::new(agents.clone()),
            ReservedNames::default(),
            "ContrailVM",
        );
        World {
            inventory,
            controller,
            agents,
            engine,
        }
    }

    fn port_group(key: &str, name: &str, third_octet: u8) -> PortGroup {
        PortGroup {
            key: key.to_string(),
            name: name.to_string(),
            private_vlan: Some(PrivateVlan {
                primary: 100,
                isolated: 100 + third_octet as u16,
            }),
            ip_pool: Some(IpPool {
                subnet: Ipv4Addr::new(10, 0, third_octet, 0),
                netmask: Ipv4Addr::new(255, 255, 255, 0),
                gateway: Ipv4Addr::new(10, 0, third_octet, 1),
            }),
        }
    }

    fn platform_vm(n: u8, host: &str) -> PlatformVm {
        PlatformVm {
            instance_uuid: Some(format!("00000000-0000-0000-0000-0000000000{:02x}", n)),
            name: format!("vm-{}", n),
            mac: Some(format!("00:50:56:00:00:{:02x}", n)),
            host: host.to_string(),
        }
    }

    fn mutations(controller: &InMemoryController) -> usize {
        controller
            .operations()
            .iter()
            .filter(|op| op.verb != Verb::Read)
            .count()
    }

    #[test]
    fn test_first_pass_creates_everything() {
        let mut w = world();
        w.inventory.add_port_group(port_group("dvpg-1", "vn-blue", 1));
        w.inventory.add_vm("dvpg-1", platform_vm(1, "esx-1")).unwrap();
        w.inventory.add_vm("dvpg-1", platform_vm(2, "esx-2")).unwrap();

        let report = w.engine.run_pass().unwrap();
        assert_eq!(report.networks_created, 1);
        assert_eq!(report.vms_created, 2);
        assert!(report.is_converged());

        assert!(w.controller.get(network_key("dvpg-1")).is_some());
        assert_eq!(w.controller.count(ObjectKind::VirtualMachine), 2);
        assert_eq!(w.controller.count(ObjectKind::InstanceIp), 2);
        assert_eq!(w.agents.plugged(AGENT_A).len(), 1);
        assert_eq!(w.agents.plugged(AGENT_B).len(), 1);
    }

    #[test]
    fn test_second_pass_is_idempotent() {
        let mut w = world();
        w.inventory.add_port_group(port_group("dvpg-1", "vn-blue", 1));
        w.inventory.add_vm("dvpg-1", platform_vm(1, "esx-1")).unwrap();
        w.engine.run_pass().unwrap();

        w.controller.clear_operations();
        w.agents.clear_calls();
        let report = w.engine.run_pass().unwrap();

        assert_eq!(report.actions(), 0);
        assert_eq!(report.agents_updated, 0);
        assert_eq!(mutations(&w.controller), 0);
        assert_eq!(w.agents.calls_for(AGENT_A), vec![AgentCall::KeepAliveCheck]);
    }

    #[test]
    fn test_removed_vm_is_deleted_and_unplugged() {
        let mut w = world();
        w.inventory.add_port_group(port_group("dvpg-1", "vn-blue", 1));
        w.inventory.add_vm("dvpg-1", platform_vm(1, "esx-1")).unwrap();
        w.inventory.add_vm("dvpg-1", platform_vm(2, "esx-1")).unwrap();
        w.engine.run_pass().unwrap();
        assert_eq!(w.agents.plugged(AGENT_A).len(), 2);

        w.inventory
            .remove_vm("dvpg-1", "00000000-0000-0000-0000-000000000002");
        let report = w.engine.run_pass().unwrap();

        assert_eq!(report.vms_deleted, 1);
        assert_eq!(w.controller.count(ObjectKind::VirtualMachine), 1);
        assert_eq!(w.agents.plugged(AGENT_A).len(), 1);
    }

    #[test]
    fn test_removed_network_cascades() {
        let mut w = world();
        w.inventory.add_port_group(port_group("dvpg-1", "vn-blue", 1));
        w.inventory.add_port_group(port_group("dvpg-2", "vn-red", 2));
        w.inventory.add_vm("dvpg-2", platform_vm(3, "esx-1")).unwrap();
        w.engine.run_pass().unwrap();

        w.inventory.remove_port_group("dvpg-2");
        let report = w.engine.run_pass().unwrap();

        assert_eq!(report.networks_deleted, 1);
        assert_eq!(report.vms_deleted, 1);
        assert_eq!(w.controller.count(ObjectKind::VirtualNetwork), 1);
        assert_eq!(w.controller.count(ObjectKind::VirtualMachineInterface), 0);
        assert!(w.agents.plugged(AGENT_A).is_empty());
    }

    #[test]
    fn test_reserved_names_are_never_touched() {
        let mut w = world();
        w.inventory.add_port_group(port_group("dvpg-9", "public", 9));
        w.engine.run_pass().unwrap();
        assert_eq!(w.controller.count(ObjectKind::VirtualNetwork), 0);

        let mut gateway = MutationGateway::new(
            w.controller.clone(),
            vec!["default-domain".to_string(), "vCenter".to_string()],
            "vCenter-ipam",
        );
        let ctx = LogContext::new("seed");
        gateway.prepare(&ctx).unwrap();
        let fabric = NetworkRecord {
            key: network_key("fabric"),
            name: "ip-fabric".to_string(),
            isolated_vlan: 1,
            primary_vlan: 1,
            subnet: Ipv4Addr::new(192, 168, 0, 0),
            mask: Ipv4Addr::new(255, 255, 255, 0),
            gateway: Ipv4Addr::new(192, 168, 0, 1),
            vms: Default::default(),
        };
        gateway.create_network(&fabric, &ctx).unwrap();

        w.controller.clear_operations();
        let report = w.engine.run_pass().unwrap();
        assert_eq!(report.actions(), 0);
        assert_eq!(mutations(&w.controller), 0);
        assert!(w.controller.get(network_key("fabric")).is_some());
    }

    #[test]
    fn test_failed_create_is_retried_next_pass() {
        let mut w = world();
        w.inventory.add_port_group(port_group("dvpg-1", "vn-blue", 1));
        w.inventory.add_vm("dvpg-1", platform_vm(1, "esx-1")).unwrap();
        w.controller.fail(Verb::Create, ObjectKind::VirtualMachineInterface);

        let report = w.engine.run_pass().unwrap();
        assert_eq!(report.networks_created, 1);
        assert_eq!(report.vms_created, 0);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(w.controller.count(ObjectKind::VirtualMachine), 0);

        w.controller.clear_failures();
        let report = w.engine.run_pass().unwrap();
        assert_eq!(report.vms_created, 1);
        assert!(report.is_converged());
        assert_eq!(w.agents.plugged(AGENT_A).len(), 1);
    }

    #[test]
    fn test_vm_left_without_address_is_repaired() {
        let mut w = world();
        w.inventory.add_port_group(port_group("dvpg-1", "vn-blue", 1));
        w.inventory.add_vm("dvpg-1", platform_vm(1, "esx-1")).unwrap();
        w.controller.fail(Verb::Create, ObjectKind::InstanceIp);
        w.controller.fail(Verb::Delete, ObjectKind::VirtualMachineInterface);
        w.controller.fail(Verb::Delete, ObjectKind::VirtualMachine);

        let report = w.engine.run_pass().unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(w.controller.count(ObjectKind::VirtualMachineInterface), 1);
        assert_eq!(w.controller.count(ObjectKind::InstanceIp), 0);
        assert!(w.agents.plugged(AGENT_A).is_empty());

        w.controller.clear_failures();
        let report = w.engine.run_pass().unwrap();
        assert_eq!(report.vms_repaired, 1);
        assert!(report.is_converged());
        assert_eq!(w.controller.count(ObjectKind::InstanceIp), 1);
        assert_eq!(w.agents.plugged(AGENT_A).len(), 1);

        let report = w.engine.run_pass().unwrap();
        assert_eq!(report.actions(), 0);
    }

    #[test]
    fn test_failed_network_delete_still_unplugs_and_is_retried() {
        let mut w = world();
        w.inventory.add_port_group(port_group("dvpg-1", "vn-blue", 1));
        w.inventory.add_port_group(port_group("dvpg-2", "vn-red", 2));
        w.inventory.add_vm("dvpg-2", platform_vm(3, "esx-1")).unwrap();
        w.inventory.add_vm("dvpg-2", platform_vm(4, "esx-1")).unwrap();
        w.engine.run_pass().unwrap();
        assert_eq!(w.agents.plugged(AGENT_A).len(), 2);

        w.inventory.remove_port_group("dvpg-2");
        w.controller.fail(Verb::Delete, ObjectKind::VirtualMachineInterface);
        let report = w.engine.run_pass().unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.networks_deleted, 0);
        assert!(w.agents.plugged(AGENT_A).is_empty());
        assert_eq!(w.controller.count(ObjectKind::VirtualNetwork), 2);

        w.controller.clear_failures();
        let report = w.engine.run_pass().unwrap();
        assert_eq!(report.networks_deleted, 1);
        assert_eq!(report.vms_deleted, 2);
        assert!(report.is_converged());
        assert_eq!(w.controller.count(ObjectKind::VirtualNetwork), 1);
        assert_eq!(w.controller.count(ObjectKind::VirtualMachineInterface), 0);
        assert_eq!(w.controller.count(ObjectKind::VirtualMachine), 0);
    }

    #[test]
    fn test_network_delete_counts_only_removed_vms() {
        let mut w = world();
        w.inventory.add_port_group(port_group("dvpg-1", "vn-blue", 1));
        w.inventory.add_port_group(port_group("dvpg-2", "vn-red", 2));
        w.inventory.add_vm("dvpg-1", platform_vm(1, "esx-1")).unwrap();
        w.inventory.add_vm("dvpg-2", platform_vm(1, "esx-1")).unwrap();
        w.inventory.add_vm("dvpg-2", platform_vm(2, "esx-1")).unwrap();
        w.engine.run_pass().unwrap();
        assert_eq!(w.controller.count(ObjectKind::VirtualMachine), 2);

        w.inventory.remove_port_group("dvpg-2");
        let report = w.engine.run_pass().unwrap();
        assert_eq!(report.networks_deleted, 1);
        assert_eq!(report.vms_deleted, 1);
        assert_eq!(w.controller.count(ObjectKind::VirtualMachine), 1);
    }

    #[test]
    fn test_vm_moving_to_host_without_agent_is_withdrawn() {
        let mut w = world();
        w.inventory.add_port_group(port_group("dvpg-1", "vn-blue", 1));
        w.inventory.add_vm("dvpg-1", platform_vm(1, "esx-1")).unwrap();
        w.engine.run_pass().unwrap();
        assert_eq!(w.agents.plugged(AGENT_A).len(), 1);

        w.inventory
            .remove_vm("dvpg-1", "00000000-0000-0000-0000-000000000001");
        w.inventory.add_vm("dvpg-1", platform_vm(1, "esx-9")).unwrap();
        w.engine.run_pass().unwrap();
        assert!(w.agents.plugged(AGENT_A).is_empty());
        assert!(w.engine.registry().get(AGENT_A).is_none());

        w.agents.restart(AGENT_A);
        w.engine.run_pass().unwrap();
        assert!(w.agents.plugged(AGENT_A).is_empty());
    }

    #[test]
    fn test_agent_with_no_vms_left_is_not_contacted() {
        let mut w = world();
        w.inventory.add_port_group(port_group("dvpg-1", "vn-blue", 1));
        w.inventory.add_vm("dvpg-1", platform_vm(1, "esx-1")).unwrap();
        w.engine.run_pass().unwrap();

        w.inventory
            .remove_vm("dvpg-1", "00000000-0000-0000-0000-000000000001");
        w.engine.run_pass().unwrap();

        w.agents.set_unreachable(AGENT_A, true);
        w.agents.clear_calls();
        for _ in 0..3 {
            let report = w.engine.run_pass().unwrap();
            assert_eq!(report.agent_failures, 0);
            assert!(report.is_converged());
        }
        assert!(w.agents.calls_for(AGENT_A).is_empty());
    }

    #[test]
    fn test_platform_failure_aborts_pass_without_deletes() {
        let mut w = world();
        w.inventory.add_port_group(port_group("dvpg-1", "vn-blue", 1));
        w.engine.run_pass().unwrap();

        w.inventory.set_failing(true);
        w.controller.clear_operations();
        let result = w.engine.run_pass();
        assert!(matches!(result, Err(SyncError::Platform(_))));
        assert_eq!(mutations(&w.controller), 0);
    }

    #[test]
    fn test_vm_moving_host_follows_agent() {
        let mut w = world();
        w.inventory.add_port_group(port_group("dvpg-1", "vn-blue", 1));
        w.inventory.add_vm("dvpg-1", platform_vm(1, "esx-1")).unwrap();
        w.engine.run_pass().unwrap();

        w.inventory
            .remove_vm("dvpg-1", "00000000-0000-0000-0000-000000000001");
        w.inventory.add_vm("dvpg-1", platform_vm(1, "esx-2")).unwrap();
        let report = w.engine.run_pass().unwrap();

        assert_eq!(report.actions(), 0);
        assert_eq!(report.agents_updated, 1);
        assert!(w.agents.plugged(AGENT_A).is_empty());
        assert_eq!(w.agents.plugged(AGENT_B).len(), 1);
    }

    #[test]
    fn test_unreachable_agent_does_not_fail_pass() {
        let mut w = world();
        w.agents.set_unreachable(AGENT_A, true);
        w.inventory.add_port_group(port_group("dvpg-1", "vn-blue", 1));
        w.inventory.add_vm("dvpg-1", platform_vm(1, "esx-1")).unwrap();

        let report = w.engine.run_pass().unwrap();
        assert_eq!(report.vms_created, 1);
        assert!(report.failures.is_empty());
        assert!(report.agent_failures >= 1);

        w.agents.set_unreachable(AGENT_A, false);
        let report = w.engine.run_pass().unwrap();
        assert_eq!(report.agent_failures, 0);
        assert_eq!(w.agents.plugged(AGENT_A).len(), 1);
    }
}
