//! In-process agent double.
//!
//! Records every call, keeps the set of plugged vifs per agent, and can
//! refuse connections or fail calls on demand. Clones share state.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::io;
use std::net::Ipv4Addr;
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use super::port::{uuid_from_bytes, Port};
use super::rpc::{AgentConnector, AgentRpc, RpcError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentCall {
    Open,
    Connect,
    AddPorts(Vec<Uuid>),
    DeletePort(Uuid),
    KeepAliveCheck,
}

#[derive(Debug, Default)]
struct Agents {
    calls: Vec<(Ipv4Addr, AgentCall)>,
    unreachable: HashSet<Ipv4Addr>,
    failing_calls: usize,
    plugged: HashMap<Ipv4Addr, BTreeSet<Uuid>>,
}

#[derive(Debug, Clone, Default)]
pub struct LoopbackConnector {
    inner: Arc<Mutex<Agents>>,
}

impl LoopbackConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<(Ipv4Addr, AgentCall)> {
        self.inner.lock().calls.clone()
    }

    pub fn calls_for(&self, agent: Ipv4Addr) -> Vec<AgentCall> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|(a, _)| *a == agent)
            .map(|(_, call)| call.clone())
            .collect()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }

    /// Refuse new sessions and fail calls on open ones.
    pub fn set_unreachable(&self, agent: Ipv4Addr, unreachable: bool) {
        let mut inner = self.inner.lock();
        if unreachable {
            inner.unreachable.insert(agent);
        } else {
            inner.unreachable.remove(&agent);
        }
    }

    /// Fail the next `count` session calls on any agent.
    pub fn fail_next_calls(&self, count: usize) {
        self.inner.lock().failing_calls = count;
    }

    pub fn plugged(&self, agent: Ipv4Addr) -> BTreeSet<Uuid> {
        self.inner
            .lock()
            .plugged
            .get(&agent)
            .cloned()
            .unwrap_or_default()
    }

    /// Forget everything the agent had plugged, as a restarted agent would.
    pub fn restart(&self, agent: Ipv4Addr) {
        self.inner.lock().plugged.remove(&agent);
    }
}

impl AgentConnector for LoopbackConnector {
    type Session = LoopbackSession;

    fn open(&self, agent: Ipv4Addr) -> Result<LoopbackSession, RpcError> {
        let mut inner = self.inner.lock();
        inner.calls.push((agent, AgentCall::Open));
        if inner.unreachable.contains(&agent) {
            return Err(io::Error::from(io::ErrorKind::ConnectionRefused).into());
        }
        Ok(LoopbackSession {
            agent,
            inner: Arc::clone(&self.inner),
        })
    }
}

pub struct LoopbackSession {
    agent: Ipv4Addr,
    inner: Arc<Mutex<Agents>>,
}

impl LoopbackSession {
    fn call(&mut self, call: AgentCall) -> Result<(), RpcError> {
        let mut inner = self.inner.lock();
        inner.calls.push((self.agent, call.clone()));

        if inner.unreachable.contains(&self.agent) {
            return Err(io::Error::from(io::ErrorKind::ConnectionReset).into());
        }
        if inner.failing_calls > 0 {
            inner.failing_calls -= 1;
            return Err(io::Error::from(io::ErrorKind::BrokenPipe).into());
        }

        let plugged = inner.plugged.entry(self.agent).or_default();
        match call {
            AgentCall::AddPorts(vifs) => plugged.extend(vifs),
            AgentCall::DeletePort(vif) => {
                plugged.remove(&vif);
            }
            _ => {}
        }
        Ok(())
    }
}

impl AgentRpc for LoopbackSession {
    fn connect(&mut self) -> Result<(), RpcError> {
        self.call(AgentCall::Connect)
    }

    fn add_ports(&mut self, ports: &[Port]) -> Result<(), RpcError> {
        let vifs = ports.iter().map(|p| uuid_from_bytes(p.port_id)).collect();
        self.call(AgentCall::AddPorts(vifs))
    }

    fn delete_port(&mut self, vif: [u8; 16]) -> Result<(), RpcError> {
        self.call(AgentCall::DeletePort(uuid_from_bytes(vif)))
    }

    fn keep_alive_check(&mut self) -> Result<(), RpcError> {
        self.call(AgentCall::KeepAliveCheck)
    }
}
