//! In-process controller store.
//!
//! Behaves like the real object store where the synchronizer depends on it:
//! back-references are maintained on every mutation, referenced objects must
//! exist on create, objects with back-references cannot be deleted, and
//! instance addresses are assigned from the network's subnet. Handles are
//! cheap clones sharing one store, so a test can keep one while the engine
//! owns another.

use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use super::api::{ControllerApi, ControllerError};
use super::objects::{fq_child, ControllerObject, ObjectKind};

/// Store operation kinds, also used to inject failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Create,
    Read,
    Update,
    Delete,
}

/// One successful mutation, in the order it was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOp {
    pub verb: Verb,
    pub kind: ObjectKind,
    pub id: Uuid,
}

#[derive(Debug, Default)]
struct Store {
    objects: HashMap<Uuid, ControllerObject>,
    ops: Vec<StoreOp>,
    failures: HashSet<(Verb, ObjectKind)>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryController {
    store: Arc<Mutex<Store>>,
}

impl InMemoryController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `verb` on `kind` fail until `clear_failures`.
    pub fn fail(&self, verb: Verb, kind: ObjectKind) {
        self.store.lock().failures.insert((verb, kind));
    }

    pub fn clear_failures(&self) {
        self.store.lock().failures.clear();
    }

    pub fn operations(&self) -> Vec<StoreOp> {
        self.store.lock().ops.clone()
    }

    pub fn clear_operations(&self) {
        self.store.lock().ops.clear();
    }

    pub fn get(&self, id: Uuid) -> Option<ControllerObject> {
        self.store.lock().objects.get(&id).cloned()
    }

    pub fn count(&self, kind: ObjectKind) -> usize {
        self.store
            .lock()
            .objects
            .values()
            .filter(|o| o.kind() == kind)
            .count()
    }
}

impl Store {
    fn check_failure(&self, verb: Verb, kind: ObjectKind) -> Result<(), ControllerError> {
        if self.failures.contains(&(verb, kind)) {
            return Err(ControllerError::Request(format!(
                "injected {:?} failure for {}",
                verb, kind
            )));
        }
        Ok(())
    }

    fn exists(&self, kind: ObjectKind, id: Uuid) -> bool {
        self.objects.get(&id).map(|o| o.kind() == kind).unwrap_or(false)
    }

    fn find(&self, kind: ObjectKind, fq_name: &[String]) -> Option<Uuid> {
        self.objects
            .values()
            .find(|o| o.kind() == kind && o.fq_name() == fq_name)
            .map(|o| o.uuid())
    }

    fn require(
        &self,
        object: &ControllerObject,
        missing: ObjectKind,
        missing_id: Uuid,
    ) -> Result<(), ControllerError> {
        if self.exists(missing, missing_id) {
            Ok(())
        } else {
            Err(ControllerError::DanglingRef {
                kind: object.kind(),
                id: object.uuid(),
                missing,
                missing_id,
            })
        }
    }

    fn require_parent_project(&self, object: &ControllerObject) -> Result<(), ControllerError> {
        let parent = object.parent_fq_name();
        if self.find(ObjectKind::Project, parent).is_some() {
            Ok(())
        } else {
            Err(ControllerError::MissingParent {
                kind: object.kind(),
                id: object.uuid(),
                parent: parent.join(":"),
            })
        }
    }

    fn allocate_address(&self, network: Uuid) -> Result<Option<Ipv4Addr>, ControllerError> {
        let subnet = match self.objects.get(&network) {
            Some(ControllerObject::VirtualNetwork(vn)) => vn.subnet.clone(),
            _ => None,
        };
        let subnet = match subnet {
            Some(subnet) => subnet,
            None => return Ok(None),
        };

        let used: HashSet<Ipv4Addr> = self
            .objects
            .values()
            .filter_map(|o| match o {
                ControllerObject::InstanceIp(iip) if iip.network == network => iip.address,
                _ => None,
            })
            .collect();

        let host_bits = 32 - u32::from(subnet.prefix_len.min(32));
        let mask = u32::MAX.checked_shl(host_bits).unwrap_or(0);
        let base = u32::from(subnet.prefix) & mask;
        let size = 1u64 << host_bits;

        // Skip the network and broadcast addresses.
        for offset in 1..size.saturating_sub(1) {
            let candidate = Ipv4Addr::from(base.wrapping_add(offset as u32));
            if candidate != subnet.gateway && !used.contains(&candidate) {
                return Ok(Some(candidate));
            }
        }

        Err(ControllerError::Request(format!(
            "subnet {}/{} exhausted",
            subnet.prefix, subnet.prefix_len
        )))
    }

    fn create(&mut self, object: &ControllerObject) -> Result<(), ControllerError> {
        let kind = object.kind();
        let id = object.uuid();
        self.check_failure(Verb::Create, kind)?;

        if self.objects.contains_key(&id) || self.find(kind, object.fq_name()).is_some() {
            return Err(ControllerError::AlreadyExists { kind, id });
        }

        let mut stored = object.clone();
        match &mut stored {
            ControllerObject::Project(_) => {}
            ControllerObject::NetworkIpam(_) => self.require_parent_project(object)?,
            ControllerObject::VirtualNetwork(vn) => {
                self.require_parent_project(object)?;
                if let Some(subnet) = &vn.subnet {
                    self.require(object, ObjectKind::NetworkIpam, subnet.ipam)?;
                }
                vn.interface_back_refs.clear();
            }
            ControllerObject::VirtualMachine(vm) => vm.interface_back_refs.clear(),
            ControllerObject::VirtualMachineInterface(vmi) => {
                self.require(object, ObjectKind::VirtualMachine, vmi.parent_vm)?;
                self.require(object, ObjectKind::VirtualNetwork, vmi.network)?;
                vmi.instance_ip_back_refs.clear();
                let (vm_id, vn_id) = (vmi.parent_vm, vmi.network);
                if let Some(ControllerObject::VirtualMachine(vm)) = self.objects.get_mut(&vm_id) {
                    vm.interface_back_refs.push(id);
                }
                if let Some(ControllerObject::VirtualNetwork(vn)) = self.objects.get_mut(&vn_id) {
                    vn.interface_back_refs.push(id);
                }
            }
            ControllerObject::InstanceIp(iip) => {
                self.require(object, ObjectKind::VirtualMachineInterface, iip.interface)?;
                self.require(object, ObjectKind::VirtualNetwork, iip.network)?;
                if iip.address.is_none() {
                    iip.address = self.allocate_address(iip.network)?;
                }
                let vmi_id = iip.interface;
                if let Some(ControllerObject::VirtualMachineInterface(vmi)) =
                    self.objects.get_mut(&vmi_id)
                {
                    vmi.instance_ip_back_refs.push(id);
                }
            }
        }

        self.objects.insert(id, stored);
        self.ops.push(StoreOp {
            verb: Verb::Create,
            kind,
            id,
        });
        Ok(())
    }

    fn update(&mut self, object: &ControllerObject) -> Result<(), ControllerError> {
        let kind = object.kind();
        let id = object.uuid();
        self.check_failure(Verb::Update, kind)?;

        let current = match self.objects.get(&id) {
            Some(current) if current.kind() == kind => current,
            _ => return Err(ControllerError::NotFound { kind, id }),
        };

        // Server-maintained fields survive client updates.
        let mut updated = object.clone();
        match (&mut updated, current) {
            (ControllerObject::VirtualNetwork(new), ControllerObject::VirtualNetwork(old)) => {
                new.interface_back_refs = old.interface_back_refs.clone();
            }
            (ControllerObject::VirtualMachine(new), ControllerObject::VirtualMachine(old)) => {
                new.interface_back_refs = old.interface_back_refs.clone();
            }
            (
                ControllerObject::VirtualMachineInterface(new),
                ControllerObject::VirtualMachineInterface(old),
            ) => {
                new.instance_ip_back_refs = old.instance_ip_back_refs.clone();
            }
            (ControllerObject::InstanceIp(new), ControllerObject::InstanceIp(old)) => {
                if new.address.is_none() {
                    new.address = old.address;
                }
            }
            _ => {}
        }

        self.objects.insert(id, updated);
        self.ops.push(StoreOp {
            verb: Verb::Update,
            kind,
            id,
        });
        Ok(())
    }

    fn delete(&mut self, kind: ObjectKind, id: Uuid) -> Result<(), ControllerError> {
        self.check_failure(Verb::Delete, kind)?;

        let in_use = match self.objects.get(&id) {
            Some(object) if object.kind() == kind => match object {
                ControllerObject::VirtualNetwork(vn) => !vn.interface_back_refs.is_empty(),
                ControllerObject::VirtualMachine(vm) => !vm.interface_back_refs.is_empty(),
                ControllerObject::VirtualMachineInterface(vmi) => {
                    !vmi.instance_ip_back_refs.is_empty()
                }
                _ => false,
            },
            _ => return Err(ControllerError::NotFound { kind, id }),
        };
        if in_use {
            return Err(ControllerError::InUse { kind, id });
        }

        match self.objects.remove(&id) {
            Some(ControllerObject::VirtualMachineInterface(vmi)) => {
                if let Some(ControllerObject::VirtualMachine(vm)) =
                    self.objects.get_mut(&vmi.parent_vm)
                {
                    vm.interface_back_refs.retain(|r| *r != id);
                }
                if let Some(ControllerObject::VirtualNetwork(vn)) =
                    self.objects.get_mut(&vmi.network)
                {
                    vn.interface_back_refs.retain(|r| *r != id);
                }
            }
            Some(ControllerObject::InstanceIp(iip)) => {
                if let Some(ControllerObject::VirtualMachineInterface(vmi)) =
                    self.objects.get_mut(&iip.interface)
                {
                    vmi.instance_ip_back_refs.retain(|r| *r != id);
                }
            }
            _ => {}
        }

        self.ops.push(StoreOp {
            verb: Verb::Delete,
            kind,
            id,
        });
        Ok(())
    }
}

impl ControllerApi for InMemoryController {
    fn create(&mut self, object: &ControllerObject) -> Result<(), ControllerError> {
        self.store.lock().create(object)
    }

    fn read(
        &mut self,
        kind: ObjectKind,
        id: Uuid,
    ) -> Result<Option<ControllerObject>, ControllerError> {
        let store = self.store.lock();
        store.check_failure(Verb::Read, kind)?;
        Ok(store.objects.get(&id).filter(|o| o.kind() == kind).cloned())
    }

    fn update(&mut self, object: &ControllerObject) -> Result<(), ControllerError> {
        self.store.lock().update(object)
    }

    fn delete(&mut self, kind: ObjectKind, id: Uuid) -> Result<(), ControllerError> {
        self.store.lock().delete(kind, id)
    }

    fn find_by_name(
        &mut self,
        kind: ObjectKind,
        parent: &[String],
        name: &str,
    ) -> Result<Option<Uuid>, ControllerError> {
        let store = self.store.lock();
        store.check_failure(Verb::Read, kind)?;
        Ok(store.find(kind, &fq_child(parent, name)))
    }

    fn list(&mut self, kind: ObjectKind, parent: &[String]) -> Result<Vec<Uuid>, ControllerError> {
        let store = self.store.lock();
        store.check_failure(Verb::Read, kind)?;
        let mut ids: Vec<Uuid> = store
            .objects
            .values()
            .filter(|o| o.kind() == kind && o.parent_fq_name() == parent)
            .map(|o| o.uuid())
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::api::ControllerApiExt;
    use crate::controller::objects::*;
    use crate::model::MacAddress;

    fn project_path() -> Vec<String> {
        vec!["default-domain".to_string(), "vCenter".to_string()]
    }

    fn seeded() -> (InMemoryController, Uuid) {
        let mut api = InMemoryController::new();
        api.create_typed(Project {
            uuid: Uuid::new_v4(),
            fq_name: project_path(),
        })
        .unwrap();
        let ipam = Uuid::new_v4();
        api.create_typed(NetworkIpam {
            uuid: ipam,
            fq_name: fq_child(&project_path(), "vCenter-ipam"),
        })
        .unwrap();
        let vn = Uuid::new_v4();
        api.create_typed(VirtualNetwork {
            uuid: vn,
            fq_name: fq_child(&project_path(), "vn-blue"),
            subnet: Some(IpamSubnet {
                ipam,
                prefix: Ipv4Addr::new(192, 168, 1, 0),
                prefix_len: 24,
                gateway: Ipv4Addr::new(192, 168, 1, 1),
            }),
            interface_back_refs: Vec::new(),
        })
        .unwrap();
        (api, vn)
    }

    fn attach_vm(api: &mut InMemoryController, vn: Uuid) -> (Uuid, Uuid, Uuid) {
        let vm = Uuid::new_v4();
        api.create_typed(VirtualMachine {
            uuid: vm,
            fq_name: vec![vm.to_string()],
            display_name: "web-1".to_string(),
            agent_address: None,
            interface_back_refs: Vec::new(),
        })
        .unwrap();
        let vmi = Uuid::new_v4();
        api.create_typed(VirtualMachineInterface {
            uuid: vmi,
            fq_name: vec![vm.to_string(), vmi.to_string()],
            parent_vm: vm,
            network: vn,
            mac_addresses: vec![MacAddress([0, 0x50, 0x56, 0, 0, 1])],
            instance_ip_back_refs: Vec::new(),
        })
        .unwrap();
        let iip = Uuid::new_v4();
        api.create_typed(InstanceIp {
            uuid: iip,
            fq_name: vec![iip.to_string()],
            network: vn,
            interface: vmi,
            address: None,
        })
        .unwrap();
        (vm, vmi, iip)
    }

    #[test]
    fn test_back_refs_and_address_assignment() {
        let (mut api, vn) = seeded();
        let (vm, vmi, iip) = attach_vm(&mut api, vn);

        let network: VirtualNetwork = api.fetch(vn).unwrap().unwrap();
        assert_eq!(network.interface_back_refs, vec![vmi]);
        let machine: VirtualMachine = api.fetch(vm).unwrap().unwrap();
        assert_eq!(machine.interface_back_refs, vec![vmi]);
        let address: InstanceIp = api.fetch(iip).unwrap().unwrap();
        // .1 is the gateway
        assert_eq!(address.address, Some(Ipv4Addr::new(192, 168, 1, 2)));

        let (_, _, second) = attach_vm(&mut api, vn);
        let address: InstanceIp = api.fetch(second).unwrap().unwrap();
        assert_eq!(address.address, Some(Ipv4Addr::new(192, 168, 1, 3)));
    }

    #[test]
    fn test_delete_refused_while_referenced() {
        let (mut api, vn) = seeded();
        let (vm, vmi, iip) = attach_vm(&mut api, vn);

        assert_eq!(
            api.delete(ObjectKind::VirtualNetwork, vn),
            Err(ControllerError::InUse {
                kind: ObjectKind::VirtualNetwork,
                id: vn
            })
        );
        assert!(api.delete(ObjectKind::VirtualMachineInterface, vmi).is_err());

        api.delete(ObjectKind::InstanceIp, iip).unwrap();
        api.delete(ObjectKind::VirtualMachineInterface, vmi).unwrap();
        api.delete(ObjectKind::VirtualMachine, vm).unwrap();
        api.delete(ObjectKind::VirtualNetwork, vn).unwrap();
        assert_eq!(api.count(ObjectKind::VirtualNetwork), 0);
    }

    #[test]
    fn test_create_rejects_dangling_reference() {
        let (mut api, vn) = seeded();
        let missing_vm = Uuid::new_v4();
        let vmi = Uuid::new_v4();
        let result = api.create_typed(VirtualMachineInterface {
            uuid: vmi,
            fq_name: vec![missing_vm.to_string(), vmi.to_string()],
            parent_vm: missing_vm,
            network: vn,
            mac_addresses: Vec::new(),
            instance_ip_back_refs: Vec::new(),
        });
        assert!(matches!(result, Err(ControllerError::DanglingRef { .. })));
    }

    #[test]
    fn test_injected_failure() {
        let (mut api, _) = seeded();
        api.fail(Verb::Read, ObjectKind::VirtualNetwork);
        assert!(api.list(ObjectKind::VirtualNetwork, &project_path()).is_err());
        api.clear_failures();
        assert_eq!(
            api.list(ObjectKind::VirtualNetwork, &project_path())
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_find_by_name() {
        let (mut api, vn) = seeded();
        assert_eq!(
            api.find_by_name(ObjectKind::VirtualNetwork, &project_path(), "vn-blue")
                .unwrap(),
            Some(vn)
        );
        assert_eq!(
            api.find_by_name(ObjectKind::VirtualNetwork, &project_path(), "vn-red")
                .unwrap(),
            None
        );
    }
}
