//! Blocking TCP transport to forwarding agents.
//!
//! Every request and reply is one frame: a 4-byte big-endian length followed
//! by that many bytes of bincode.

use std::io::{Read, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::AgentConfig;

use super::port::Port;
use super::rpc::{AgentConnector, AgentRpc, RpcError};

/// Largest frame either side will accept.
pub const MAX_FRAME: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    Connect,
    AddPort(Vec<Port>),
    DeletePort([u8; 16]),
    KeepAliveCheck,
}

impl Request {
    pub fn method(&self) -> &'static str {
        match self {
            Request::Connect => "Connect",
            Request::AddPort(_) => "AddPort",
            Request::DeletePort(_) => "DeletePort",
            Request::KeepAliveCheck => "KeepAliveCheck",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reply {
    Ok,
    Failed(String),
}

pub fn write_frame<W: Write, T: Serialize>(writer: &mut W, value: &T) -> Result<(), RpcError> {
    let buf = bincode::serialize(value)?;
    if buf.len() > MAX_FRAME {
        return Err(RpcError::FrameTooLarge(buf.len()));
    }
    let size = buf.len() as u32;
    writer.write_all(&size.to_be_bytes())?;
    writer.write_all(&buf)?;
    writer.flush()?;
    Ok(())
}

pub fn read_frame<R: Read, T: DeserializeOwned>(reader: &mut R) -> Result<T, RpcError> {
    let mut size_buf = [0u8; 4];
    reader.read_exact(&mut size_buf)?;
    let size = u32::from_be_bytes(size_buf) as usize;
    if size > MAX_FRAME {
        return Err(RpcError::FrameTooLarge(size));
    }
    let mut buf = vec![0; size];
    reader.read_exact(&mut buf)?;
    Ok(bincode::deserialize(&buf)?)
}

/// Opens a TCP session per agent on a fixed port.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    port: u16,
    connect_timeout: Duration,
    io_timeout: Duration,
}

impl TcpConnector {
    pub fn new(port: u16, connect_timeout: Duration, io_timeout: Duration) -> Self {
        Self {
            port,
            connect_timeout,
            io_timeout,
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(config.port, config.connect_timeout(), config.io_timeout())
    }
}

impl AgentConnector for TcpConnector {
    type Session = TcpSession;

    fn open(&self, agent: Ipv4Addr) -> Result<TcpSession, RpcError> {
        let addr = SocketAddr::from((agent, self.port));
        let stream = TcpStream::connect_timeout(&addr, self.connect_timeout)?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(self.io_timeout))?;
        stream.set_write_timeout(Some(self.io_timeout))?;
        log::debug!("AGENT_SESSION_OPENED agent={}", addr);
        Ok(TcpSession { sock: stream })
    }
}

pub struct TcpSession {
    sock: TcpStream,
}

impl TcpSession {
    fn call(&mut self, request: &Request) -> Result<(), RpcError> {
        write_frame(&mut self.sock, request)?;
        match read_frame(&mut self.sock)? {
            Reply::Ok => Ok(()),
            Reply::Failed(reason) => Err(RpcError::Rejected {
                method: request.method(),
                reason,
            }),
        }
    }
}

impl AgentRpc for TcpSession {
    fn connect(&mut self) -> Result<(), RpcError> {
        self.call(&Request::Connect)
    }

    fn add_ports(&mut self, ports: &[Port]) -> Result<(), RpcError> {
        self.call(&Request::AddPort(ports.to_vec()))
    }

    fn delete_port(&mut self, vif: [u8; 16]) -> Result<(), RpcError> {
        self.call(&Request::DeletePort(vif))
    }

    fn keep_alive_check(&mut self) -> Result<(), RpcError> {
        self.call(&Request::KeepAliveCheck)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::net::TcpListener;
    use std::thread;

    fn connector(port: u16) -> TcpConnector {
        TcpConnector::new(port, Duration::from_secs(2), Duration::from_secs(2))
    }

    #[test]
    fn test_frame_has_big_endian_length_prefix() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &Request::KeepAliveCheck).unwrap();
        let body = bincode::serialize(&Request::KeepAliveCheck).unwrap();
        assert_eq!(&buf[..4], &(body.len() as u32).to_be_bytes());
        assert_eq!(&buf[4..], &body[..]);
    }

    #[test]
    fn test_oversized_frame_is_rejected() {
        let mut cursor = Cursor::new(((MAX_FRAME + 1) as u32).to_be_bytes().to_vec());
        let result: Result<Request, _> = read_frame(&mut cursor);
        assert!(matches!(result, Err(RpcError::FrameTooLarge(_))));
    }

    #[test]
    fn test_truncated_frame_is_io_error() {
        let mut cursor = Cursor::new(vec![0, 0, 0, 8, 1, 2]);
        let result: Result<Request, _> = read_frame(&mut cursor);
        assert!(matches!(result, Err(RpcError::Io(_))));
    }

    #[test]
    fn test_session_against_local_agent() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut seen = Vec::new();
            for _ in 0..3 {
                let request: Request = read_frame(&mut stream).unwrap();
                let reply = match &request {
                    Request::DeletePort(_) => Reply::Failed("unknown vif".to_string()),
                    _ => Reply::Ok,
                };
                seen.push(request);
                write_frame(&mut stream, &reply).unwrap();
            }
            seen
        });

        let mut session = connector(port).open(Ipv4Addr::LOCALHOST).unwrap();
        session.connect().unwrap();
        session.keep_alive_check().unwrap();
        let err = session.delete_port([7; 16]).unwrap_err();
        assert!(matches!(
            err,
            RpcError::Rejected {
                method: "DeletePort",
                ..
            }
        ));

        let seen = server.join().unwrap();
        assert_eq!(
            seen,
            vec![
                Request::Connect,
                Request::KeepAliveCheck,
                Request::DeletePort([7; 16])
            ]
        );
    }

    #[test]
    fn test_connector_from_config() {
        let config = AgentConfig {
            port: 9191,
            connect_timeout_ms: 250,
            ..AgentConfig::default()
        };
        let connector = TcpConnector::from_config(&config);
        assert_eq!(connector.port, 9191);
        assert_eq!(connector.connect_timeout, Duration::from_millis(250));
        assert_eq!(connector.io_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_refused_connection_is_io_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = connector(port).open(Ipv4Addr::LOCALHOST);
        assert!(matches!(result, Err(RpcError::Io(_))));
    }
}
