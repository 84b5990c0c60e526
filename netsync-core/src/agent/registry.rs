//! One notifier per forwarding agent.

use std::collections::{BTreeMap, HashMap};
use std::net::Ipv4Addr;

use uuid::Uuid;

use super::notifier::Notifier;
use super::port::PortState;
use super::rpc::{AgentConnector, RpcError};

/// Routes port updates to the notifier for the agent that hosts the vif.
///
/// Notifiers are created on first use and outlast individual reconciliation
/// passes. A notifier whose cache empties is retired once the agent has been
/// told, so agents with nothing left on them stop being checked.
pub struct AgentRegistry<C: AgentConnector + Clone> {
    connector: C,
    agents: BTreeMap<Ipv4Addr, Notifier<C>>,
    placements: HashMap<Uuid, Ipv4Addr>,
}

impl<C: AgentConnector + Clone> AgentRegistry<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            agents: BTreeMap::new(),
            placements: HashMap::new(),
        }
    }

    pub fn get(&self, agent: Ipv4Addr) -> Option<&Notifier<C>> {
        self.agents.get(&agent)
    }

    pub fn agents(&self) -> impl Iterator<Item = Ipv4Addr> + '_ {
        self.agents.keys().copied()
    }

    /// Agent currently holding `vif`, if any.
    pub fn placement(&self, vif: &Uuid) -> Option<Ipv4Addr> {
        self.placements.get(vif).copied()
    }

    pub fn add_port(&mut self, agent: Ipv4Addr, port: PortState) -> Result<(), RpcError> {
        self.place(agent, port.vif);
        self.notifier(agent).add_port(port)
    }

    /// Returns whether an update was sent.
    pub fn ensure_port(&mut self, agent: Ipv4Addr, port: PortState) -> Result<bool, RpcError> {
        self.place(agent, port.vif);
        self.notifier(agent).ensure_port(port)
    }

    /// Unplug `vif` from whichever agent holds it.
    ///
    /// `hint` is used when the registry has not seen the vif, which is the
    /// case for ports plugged before the process started.
    pub fn delete_port(&mut self, vif: Uuid, hint: Option<Ipv4Addr>) -> Result<(), RpcError> {
        match self.placements.remove(&vif).or(hint) {
            Some(agent) => {
                let result = self.notifier(agent).delete_port(vif);
                if result.is_ok() {
                    self.retire_if_idle(agent);
                }
                result
            }
            None => {
                log::debug!("AGENT_DELETE_SKIPPED vif={} reason=no_agent", vif);
                Ok(())
            }
        }
    }

    /// Heartbeat or resync every known agent. Returns the agents that failed.
    ///
    /// Agents with an empty cache get this one attempt to learn they should
    /// hold nothing, then are retired whether or not it succeeded.
    pub fn check_connections(&mut self) -> Vec<(Ipv4Addr, RpcError)> {
        let mut failed = Vec::new();
        let mut idle = Vec::new();
        for (agent, notifier) in self.agents.iter_mut() {
            if let Err(e) = notifier.check_connection() {
                failed.push((*agent, e));
            }
            if notifier.port_count() == 0 {
                idle.push(*agent);
            }
        }
        for agent in idle {
            self.retire(agent);
        }
        failed
    }

    fn notifier(&mut self, agent: Ipv4Addr) -> &mut Notifier<C> {
        let connector = &self.connector;
        self.agents
            .entry(agent)
            .or_insert_with(|| Notifier::new(agent, connector.clone()))
    }

    // A VM that moved host keeps its vif; take it off the old agent.
    fn place(&mut self, agent: Ipv4Addr, vif: Uuid) {
        let previous = match self.placements.insert(vif, agent) {
            Some(previous) if previous != agent => previous,
            _ => return,
        };
        if let Some(notifier) = self.agents.get_mut(&previous) {
            match notifier.delete_port(vif) {
                Ok(()) => self.retire_if_idle(previous),
                Err(e) => log::warn!(
                    "AGENT_WITHDRAW_FAILED vif={} agent={} error={}",
                    vif,
                    previous,
                    e
                ),
            }
        }
    }

    // Only a connected notifier is known to have left the agent empty.
    fn retire_if_idle(&mut self, agent: Ipv4Addr) {
        let idle = self
            .agents
            .get(&agent)
            .map_or(false, |n| n.port_count() == 0 && n.is_connected());
        if idle {
            self.retire(agent);
        }
    }

    fn retire(&mut self, agent: Ipv4Addr) {
        if self.agents.remove(&agent).is_some() {
            log::info!("AGENT_RETIRED agent={}", agent);
        }
    }
}
