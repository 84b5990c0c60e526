//! Forwarding-agent RPC interface.

use std::net::Ipv4Addr;

use thiserror::Error;

use super::port::Port;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("agent I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("agent frame encoding error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("frame of {0} bytes exceeds limit")]
    FrameTooLarge(usize),

    #[error("agent rejected {method}: {reason}")]
    Rejected { method: &'static str, reason: String },
}

/// Calls an agent session supports.
pub trait AgentRpc {
    fn connect(&mut self) -> Result<(), RpcError>;

    fn add_ports(&mut self, ports: &[Port]) -> Result<(), RpcError>;

    fn delete_port(&mut self, vif: [u8; 16]) -> Result<(), RpcError>;

    fn keep_alive_check(&mut self) -> Result<(), RpcError>;
}

/// Opens sessions to agents.
pub trait AgentConnector {
    type Session: AgentRpc;

    fn open(&self, agent: Ipv4Addr) -> Result<Self::Session, RpcError>;
}
