//! Blocking transports for the control channel.
//!
//! The production channel is length-prefixed JSON over a TCP socket with the
//! connection timeout applied to every read and write. Tests script the seam
//! with canned responses instead of a socket.

use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::trace;

use crate::error::ClientError;
use crate::protocol::{Request, Response};

/// Upper bound on a single control or payload frame, bytes. Guards against a
/// corrupt length prefix.
const MAX_FRAME: u32 = 64 * 1024 * 1024;

/// Blocking request/response seam to the simulator bridge.
///
/// # Implementations
///
/// - **Production**: [`TcpControlChannel`], framed JSON over TCP
/// - **Tests**: [`ScriptedChannel`], canned responses without a socket
pub trait ControlChannel: Send {
    /// Sends a request and blocks for its response.
    fn request(&mut self, request: &Request) -> Result<Response, ClientError>;

    /// Sends a request and blocks for its response plus one binary payload
    /// frame. Used by `Tick`, whose snapshot rides behind the JSON reply.
    fn request_with_payload(
        &mut self,
        request: &Request,
    ) -> Result<(Response, Vec<u8>), ClientError>;
}

pub(crate) fn resolve(host: &str, port: u16) -> Result<SocketAddr, ClientError> {
    (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| ClientError::protocol(format!("no address for {host}:{port}")))
}

pub(crate) fn connect_stream(
    host: &str,
    port: u16,
    timeout: Duration,
) -> Result<TcpStream, ClientError> {
    let addr = resolve(host, port)?;
    TcpStream::connect_timeout(&addr, timeout).map_err(|e| {
        if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock {
            ClientError::ConnectTimeout {
                ms: timeout.as_millis() as u64,
            }
        } else {
            ClientError::Io(e)
        }
    })
}

fn map_read_err(e: std::io::Error) -> ClientError {
    match e.kind() {
        ErrorKind::UnexpectedEof => ClientError::Disconnected,
        _ => ClientError::Io(e),
    }
}

/// Length-prefixed JSON control channel over TCP.
pub struct TcpControlChannel {
    stream: TcpStream,
}

impl TcpControlChannel {
    /// Connects with `timeout` applied to the connect itself and to every
    /// subsequent read and write.
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, ClientError> {
        let stream = connect_stream(host, port, timeout)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        stream.set_nodelay(true)?;
        Ok(Self { stream })
    }

    fn send_frame(&mut self, payload: &[u8]) -> Result<(), ClientError> {
        let len = payload.len() as u32;
        self.stream.write_all(&len.to_le_bytes())?;
        self.stream.write_all(payload)?;
        Ok(())
    }

    fn recv_frame(&mut self) -> Result<Vec<u8>, ClientError> {
        let mut len_buf = [0u8; 4];
        self.stream.read_exact(&mut len_buf).map_err(map_read_err)?;

        let len = u32::from_le_bytes(len_buf);
        if len > MAX_FRAME {
            return Err(ClientError::protocol(format!(
                "frame length {len} exceeds limit"
            )));
        }

        let mut buf = vec![0u8; len as usize];
        self.stream.read_exact(&mut buf).map_err(map_read_err)?;
        Ok(buf)
    }

    fn send_request(&mut self, request: &Request) -> Result<Response, ClientError> {
        let encoded =
            serde_json::to_vec(request).map_err(|e| ClientError::protocol(e.to_string()))?;
        trace!("-> {} bytes", encoded.len());
        self.send_frame(&encoded)?;

        let reply = self.recv_frame()?;
        trace!("<- {} bytes", reply.len());
        serde_json::from_slice(&reply).map_err(|e| ClientError::protocol(e.to_string()))
    }
}

impl ControlChannel for TcpControlChannel {
    fn request(&mut self, request: &Request) -> Result<Response, ClientError> {
        reject_error(self.send_request(request)?)
    }

    fn request_with_payload(
        &mut self,
        request: &Request,
    ) -> Result<(Response, Vec<u8>), ClientError> {
        let response = reject_error(self.send_request(request)?)?;
        let payload = self.recv_frame()?;
        Ok((response, payload))
    }
}

/// Converts bridge-side `Error` replies into [`ClientError::Rejected`].
fn reject_error(response: Response) -> Result<Response, ClientError> {
    match response {
        Response::Error { message } => Err(ClientError::Rejected(message)),
        other => Ok(other),
    }
}

/// Test double replaying canned responses and recording every request.
#[derive(Default)]
pub struct ScriptedChannel {
    replies: std::collections::VecDeque<(Response, Vec<u8>)>,
    pub requests: Vec<Request>,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_reply(&mut self, response: Response) {
        self.replies.push_back((response, Vec::new()));
    }

    pub fn push_reply_with_payload(&mut self, response: Response, payload: Vec<u8>) {
        self.replies.push_back((response, payload));
    }

    fn next_reply(&mut self, request: &Request) -> Result<(Response, Vec<u8>), ClientError> {
        self.requests.push(request.clone());
        self.replies.pop_front().ok_or(ClientError::Disconnected)
    }
}

impl ControlChannel for ScriptedChannel {
    fn request(&mut self, request: &Request) -> Result<Response, ClientError> {
        let (response, _) = self.next_reply(request)?;
        reject_error(response)
    }

    fn request_with_payload(
        &mut self,
        request: &Request,
    ) -> Result<(Response, Vec<u8>), ClientError> {
        let (response, payload) = self.next_reply(request)?;
        Ok((reject_error(response)?, payload))
    }
}
