//! Per-agent port cache and session state machine.
//!
//! The cache holds the ports the agent *should* have plugged. It is updated
//! before any RPC is attempted and never rolled back when one fails. An RPC
//! failure only drops the session; the next call of any kind reconnects and
//! replays the whole cache, which also repairs an agent that restarted and
//! lost its state.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use uuid::Uuid;

use super::port::{uuid_to_bytes, Port, PortState};
use super::rpc::{AgentConnector, AgentRpc, RpcError};

enum Session<S> {
    Disconnected,
    Connected(S),
}

pub struct Notifier<C: AgentConnector> {
    agent: Ipv4Addr,
    connector: C,
    ports: BTreeMap<Uuid, PortState>,
    session: Session<C::Session>,
}

impl<C: AgentConnector> Notifier<C> {
    pub fn new(agent: Ipv4Addr, connector: C) -> Self {
        Self {
            agent,
            connector,
            ports: BTreeMap::new(),
            session: Session::Disconnected,
        }
    }

    pub fn agent(&self) -> Ipv4Addr {
        self.agent
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.session, Session::Connected(_))
    }

    pub fn port(&self, vif: &Uuid) -> Option<&PortState> {
        self.ports.get(vif)
    }

    pub fn ports(&self) -> impl Iterator<Item = &PortState> {
        self.ports.values()
    }

    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    /// Record `port` as desired and push it to the agent.
    ///
    /// When disconnected this reconnects and replays the full cache rather
    /// than sending `port` alone.
    pub fn add_port(&mut self, port: PortState) -> Result<(), RpcError> {
        let wire = port.to_wire();
        self.ports.insert(port.vif, port);

        if let Session::Connected(session) = &mut self.session {
            let result = session.add_ports(&[wire]);
            return self.settle(result, "AddPort");
        }
        self.resync()
    }

    /// Like `add_port`, but a no-op when the cache already holds `port`.
    ///
    /// Returns whether anything was sent.
    pub fn ensure_port(&mut self, port: PortState) -> Result<bool, RpcError> {
        if self.ports.get(&port.vif) == Some(&port) {
            return Ok(false);
        }
        self.add_port(port).map(|()| true)
    }

    /// Forget `vif` and tell the agent to unplug it.
    pub fn delete_port(&mut self, vif: Uuid) -> Result<(), RpcError> {
        self.ports.remove(&vif);

        if let Session::Connected(session) = &mut self.session {
            let result = session.delete_port(uuid_to_bytes(vif));
            return self.settle(result, "DeletePort");
        }
        self.resync()
    }

    /// Heartbeat when connected, reconnect and resync otherwise.
    pub fn check_connection(&mut self) -> Result<(), RpcError> {
        if let Session::Connected(session) = &mut self.session {
            let result = session.keep_alive_check();
            return self.settle(result, "KeepAliveCheck");
        }
        self.resync()
    }

    fn resync(&mut self) -> Result<(), RpcError> {
        let mut session = match self.connector.open(self.agent) {
            Ok(session) => session,
            Err(e) => {
                log::warn!("AGENT_CONNECT_FAILED agent={} error={}", self.agent, e);
                return Err(e);
            }
        };

        if let Err(e) = session.connect() {
            log::warn!("AGENT_CONNECT_FAILED agent={} error={}", self.agent, e);
            return Err(e);
        }

        let ports: Vec<Port> = self.ports.values().map(PortState::to_wire).collect();
        if !ports.is_empty() {
            if let Err(e) = session.add_ports(&ports) {
                log::warn!(
                    "AGENT_RESYNC_FAILED agent={} ports={} error={}",
                    self.agent,
                    ports.len(),
                    e
                );
                return Err(e);
            }
        }

        self.session = Session::Connected(session);
        log::info!("AGENT_RESYNCED agent={} ports={}", self.agent, ports.len());
        Ok(())
    }

    fn settle(&mut self, result: Result<(), RpcError>, method: &str) -> Result<(), RpcError> {
        if let Err(e) = &result {
            log::warn!(
                "AGENT_DISCONNECTED agent={} method={} error={}",
                self.agent,
                method,
                e
            );
            self.session = Session::Disconnected;
        }
        result
    }
}
