//! Controller object kinds and records.
//!
//! Each kind is a plain record. Per-kind behavior (type name on the wire,
//! default parent kind) comes from a lookup table instead of a trait object
//! hierarchy.

use std::fmt;
use std::net::Ipv4Addr;

use uuid::Uuid;

use crate::model::MacAddress;

/// Kinds of objects the synchronizer reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectKind {
    Project,
    NetworkIpam,
    VirtualNetwork,
    VirtualMachine,
    VirtualMachineInterface,
    InstanceIp,
}

/// Static per-kind metadata.
#[derive(Debug)]
pub struct KindInfo {
    pub kind: ObjectKind,
    pub type_name: &'static str,
    pub parent: Option<ObjectKind>,
}

/// Indexed by `ObjectKind as usize`; order must match the enum.
static KIND_TABLE: [KindInfo; 6] = [
    KindInfo {
        kind: ObjectKind::Project,
        type_name: "project",
        parent: None,
    },
    KindInfo {
        kind: ObjectKind::NetworkIpam,
        type_name: "network-ipam",
        parent: Some(ObjectKind::Project),
    },
    KindInfo {
        kind: ObjectKind::VirtualNetwork,
        type_name: "virtual-network",
        parent: Some(ObjectKind::Project),
    },
    KindInfo {
        kind: ObjectKind::VirtualMachine,
        type_name: "virtual-machine",
        parent: None,
    },
    KindInfo {
        kind: ObjectKind::VirtualMachineInterface,
        type_name: "virtual-machine-interface",
        parent: Some(ObjectKind::VirtualMachine),
    },
    KindInfo {
        kind: ObjectKind::InstanceIp,
        type_name: "instance-ip",
        parent: None,
    },
];

impl ObjectKind {
    pub const ALL: [ObjectKind; 6] = [
        ObjectKind::Project,
        ObjectKind::NetworkIpam,
        ObjectKind::VirtualNetwork,
        ObjectKind::VirtualMachine,
        ObjectKind::VirtualMachineInterface,
        ObjectKind::InstanceIp,
    ];

    pub fn info(self) -> &'static KindInfo {
        &KIND_TABLE[self as usize]
    }

    pub fn type_name(self) -> &'static str {
        self.info().type_name
    }

    pub fn default_parent(self) -> Option<ObjectKind> {
        self.info().parent
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Build a fully-qualified name under `parent`.
pub fn fq_child(parent: &[String], name: &str) -> Vec<String> {
    let mut fq_name = parent.to_vec();
    fq_name.push(name.to_string());
    fq_name
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub uuid: Uuid,
    pub fq_name: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkIpam {
    pub uuid: Uuid,
    pub fq_name: Vec<String>,
}

/// Subnet attached to a network through an IPAM reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpamSubnet {
    pub ipam: Uuid,
    pub prefix: Ipv4Addr,
    pub prefix_len: u8,
    pub gateway: Ipv4Addr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualNetwork {
    pub uuid: Uuid,
    pub fq_name: Vec<String>,
    pub subnet: Option<IpamSubnet>,
    /// Server-maintained.
    pub interface_back_refs: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualMachine {
    pub uuid: Uuid,
    pub fq_name: Vec<String>,
    pub display_name: String,
    /// Forwarding agent serving the VM's host, kept as an annotation so a VM
    /// that vanished from the platform can still be unplugged.
    pub agent_address: Option<Ipv4Addr>,
    /// Server-maintained.
    pub interface_back_refs: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualMachineInterface {
    pub uuid: Uuid,
    pub fq_name: Vec<String>,
    pub parent_vm: Uuid,
    pub network: Uuid,
    pub mac_addresses: Vec<MacAddress>,
    /// Server-maintained.
    pub instance_ip_back_refs: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceIp {
    pub uuid: Uuid,
    pub fq_name: Vec<String>,
    pub network: Uuid,
    pub interface: Uuid,
    /// Assigned by the controller; `None` on create.
    pub address: Option<Ipv4Addr>,
}

/// Any object the controller stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerObject {
    Project(Project),
    NetworkIpam(NetworkIpam),
    VirtualNetwork(VirtualNetwork),
    VirtualMachine(VirtualMachine),
    VirtualMachineInterface(VirtualMachineInterface),
    InstanceIp(InstanceIp),
}

impl ControllerObject {
    pub fn kind(&self) -> ObjectKind {
        match self {
            ControllerObject::Project(_) => ObjectKind::Project,
            ControllerObject::NetworkIpam(_) => ObjectKind::NetworkIpam,
            ControllerObject::VirtualNetwork(_) => ObjectKind::VirtualNetwork,
            ControllerObject::VirtualMachine(_) => ObjectKind::VirtualMachine,
            ControllerObject::VirtualMachineInterface(_) => ObjectKind::VirtualMachineInterface,
            ControllerObject::InstanceIp(_) => ObjectKind::InstanceIp,
        }
    }

    pub fn uuid(&self) -> Uuid {
        match self {
            ControllerObject::Project(o) => o.uuid,
            ControllerObject::NetworkIpam(o) => o.uuid,
            ControllerObject::VirtualNetwork(o) => o.uuid,
            ControllerObject::VirtualMachine(o) => o.uuid,
            ControllerObject::VirtualMachineInterface(o) => o.uuid,
            ControllerObject::InstanceIp(o) => o.uuid,
        }
    }

    pub fn fq_name(&self) -> &[String] {
        match self {
            ControllerObject::Project(o) => &o.fq_name,
            ControllerObject::NetworkIpam(o) => &o.fq_name,
            ControllerObject::VirtualNetwork(o) => &o.fq_name,
            ControllerObject::VirtualMachine(o) => &o.fq_name,
            ControllerObject::VirtualMachineInterface(o) => &o.fq_name,
            ControllerObject::InstanceIp(o) => &o.fq_name,
        }
    }

    /// Last component of the fully-qualified name.
    pub fn name(&self) -> &str {
        self.fq_name().last().map(String::as_str).unwrap_or("")
    }

    /// Fully-qualified name of the parent, if any.
    pub fn parent_fq_name(&self) -> &[String] {
        let fq_name = self.fq_name();
        &fq_name[..fq_name.len().saturating_sub(1)]
    }
}

/// Conversion between a concrete record and `ControllerObject`.
pub trait TypedObject: Sized {
    const KIND: ObjectKind;

    fn from_object(object: ControllerObject) -> Option<Self>;

    fn into_object(self) -> ControllerObject;
}

macro_rules! typed_object {
    ($ty:ident) => {
        impl TypedObject for $ty {
            const KIND: ObjectKind = ObjectKind::$ty;

            fn from_object(object: ControllerObject) -> Option<Self> {
                match object {
                    ControllerObject::$ty(inner) => Some(inner),
                    _ => None,
                }
            }

            fn into_object(self) -> ControllerObject {
                ControllerObject::$ty(self)
            }
        }

        impl From<$ty> for ControllerObject {
            fn from(inner: $ty) -> Self {
                ControllerObject::$ty(inner)
            }
        }
    };
}

typed_object!(Project);
typed_object!(NetworkIpam);
typed_object!(VirtualNetwork);
typed_object!(VirtualMachine);
typed_object!(VirtualMachineInterface);
typed_object!(InstanceIp);
