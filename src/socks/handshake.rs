//! SOCKS5 handshake state machine and relay hand-off.
//!
//! # Data Flow
//! ```text
//! AwaitGreeting ──▶ AwaitRequestHead ──▶ AwaitRequestFull
//!       │ (re-read until NMETHODS+2 buffered)      │
//!       ▼                                          ▼
//!   method select                          ParseAndDispatch
//!                                                  │ CMD=CONNECT
//!                                                  ▼
//!                     Relay ◀── Reply ◀── AwaitUpstream (connector)
//! ```
//!
//! # Design Decisions
//! - Strictly sequential awaits per connection: the next socket operation
//!   is only issued from behind the previous one's completion
//! - Rejections reply first, then the session ends; the unknown-ATYP case
//!   closes without any reply
//! - The bound address in the success reply is always 0.0.0.0:0

use std::io;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::net::buffer::{BufferError, StagingBuffer};
use crate::net::connection::ConnectionId;
use crate::net::io::{read_at_least, send_all};
use crate::observability::metrics;
use crate::socks::proto::{self, Destination, ReplyKind};
use crate::upstream::Upstream;

/// Per-direction staging capacity; ample for the largest SOCKS5 request
/// (262 bytes) and a sensible relay chunk.
const BUFFER_CAPACITY: usize = 1024;

/// Error type for one client session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Peer closed mid-handshake.
    #[error("client disconnected during handshake")]
    Disconnected,

    /// Socket fault on either side.
    #[error("transport failure: {0}")]
    Io(#[from] io::Error),

    /// First byte was not the SOCKS5 version marker.
    #[error("client is not speaking SOCKS5 (version {0:#04x})")]
    NotSocks5(u8),

    /// Client offered no acceptable authentication method.
    #[error("no acceptable authentication method")]
    NoAcceptableMethod,

    /// Request carried an unknown address type.
    #[error("unsupported address type {0:#04x}")]
    UnsupportedAddressType(u8),

    /// Request carried a command other than CONNECT.
    #[error("unsupported command {0:#04x}")]
    UnsupportedCommand(u8),
}

impl SessionError {
    fn reason(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Io(_) => "io",
            Self::NotSocks5(_) => "not_socks5",
            Self::NoAcceptableMethod => "no_method",
            Self::UnsupportedAddressType(_) => "bad_atyp",
            Self::UnsupportedCommand(_) => "bad_cmd",
        }
    }
}

// Cursor violations cannot occur for the fixed-size handshake frames, but
// the conversion keeps them inside the session error taxonomy if they do.
fn staged(err: BufferError) -> SessionError {
    SessionError::Io(io::Error::new(io::ErrorKind::InvalidInput, err))
}

/// One client connection's protocol engine: owns the client stream, the
/// two staging buffers, and the upstream connector.
pub struct ClientSession<S> {
    id: ConnectionId,
    stream: S,
    inbound: StagingBuffer,
    outbound: StagingBuffer,
    upstream: Box<dyn Upstream<S>>,
}

impl<S> ClientSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(id: ConnectionId, stream: S, upstream: Box<dyn Upstream<S>>) -> Self {
        Self {
            id,
            stream,
            inbound: StagingBuffer::new(BUFFER_CAPACITY),
            outbound: StagingBuffer::new(BUFFER_CAPACITY),
            upstream,
        }
    }

    /// Drive the handshake to completion and, on a successful CONNECT,
    /// the relay until either side closes.
    pub async fn run(&mut self) -> Result<(), SessionError> {
        let result = self.drive().await;
        if let Err(err) = &result {
            metrics::record_handshake_failure(err.reason());
        }
        result
    }

    /// Release the upstream socket. The client socket closes when the
    /// session is dropped. Safe to call repeatedly.
    pub fn shutdown(&mut self) {
        self.upstream.close();
    }

    async fn drive(&mut self) -> Result<(), SessionError> {
        self.negotiate_method().await?;
        let (cmd, destination) = self.read_request().await?;

        if cmd != proto::CMD_CONNECT {
            self.send_reply(ReplyKind::CommandNotSupported).await?;
            return Err(SessionError::UnsupportedCommand(cmd));
        }

        tracing::debug!(
            connection_id = %self.id,
            destination = %destination,
            "connect requested"
        );
        let outcome = self
            .upstream
            .connect(&destination.host, destination.port)
            .await;
        self.send_reply(outcome).await?;

        if outcome != ReplyKind::Succeeded {
            metrics::record_upstream_connect("failed");
            tracing::debug!(
                connection_id = %self.id,
                destination = %destination,
                reply = ?outcome,
                "upstream connect failed"
            );
            return Ok(());
        }

        metrics::record_upstream_connect("succeeded");
        tracing::debug!(connection_id = %self.id, "entering relay");
        self.upstream
            .relay(&mut self.stream, &mut self.inbound, &mut self.outbound)
            .await?;
        Ok(())
    }

    /// Method negotiation: read the greeting, require the no-auth method,
    /// answer with the selected method.
    async fn negotiate_method(&mut self) -> Result<(), SessionError> {
        if !read_at_least(&mut self.stream, &mut self.inbound, 3).await? {
            return Err(SessionError::Disconnected);
        }

        let (version, n_methods) = {
            let head = self.inbound.require_read(2).map_err(staged)?;
            (head[0], head[1] as usize)
        };
        if version != proto::VERSION {
            self.send_raw(&proto::NON_SOCKS5_REJECTION).await?;
            return Err(SessionError::NotSocks5(version));
        }

        let greeting_len = n_methods + 2;
        if self.inbound.len() < greeting_len
            && !read_at_least(&mut self.stream, &mut self.inbound, greeting_len).await?
        {
            return Err(SessionError::Disconnected);
        }

        let no_auth_offered = {
            let greeting = self.inbound.require_read(greeting_len).map_err(staged)?;
            greeting[2..].contains(&proto::METHOD_NO_AUTH)
        };
        // Consume exactly the greeting; a pipelined request stays staged.
        self.inbound.confirm_read(greeting_len).map_err(staged)?;

        if !no_auth_offered {
            self.send_raw(&[proto::VERSION, proto::METHOD_NO_ACCEPTABLE])
                .await?;
            return Err(SessionError::NoAcceptableMethod);
        }
        self.send_raw(&[proto::VERSION, proto::METHOD_NO_AUTH]).await
    }

    /// Read the full request header and decode command plus destination.
    async fn read_request(&mut self) -> Result<(u8, Destination), SessionError> {
        // VER CMD RSV ATYP plus one address byte: enough to size the rest.
        if !read_at_least(&mut self.stream, &mut self.inbound, 5).await? {
            return Err(SessionError::Disconnected);
        }
        let header_len = {
            let head = self.inbound.require_read(5).map_err(staged)?;
            proto::request_header_len(head)
                .ok_or(SessionError::UnsupportedAddressType(head[3]))?
        };

        if !read_at_least(&mut self.stream, &mut self.inbound, header_len).await? {
            return Err(SessionError::Disconnected);
        }
        let (cmd, destination) = {
            let header = self.inbound.require_read(header_len).map_err(staged)?;
            proto::decode_request(header)
                .ok_or(SessionError::UnsupportedAddressType(header[3]))?
        };
        self.inbound.confirm_read(header_len).map_err(staged)?;
        Ok((cmd, destination))
    }

    /// Fixed-format 10-byte reply; the bound address is always reported
    /// as 0.0.0.0:0.
    async fn send_reply(&mut self, kind: ReplyKind) -> Result<(), SessionError> {
        let reply = [
            proto::VERSION,
            kind.into(),
            0x00,
            proto::ATYP_IPV4,
            0,
            0,
            0,
            0,
            0,
            0,
        ];
        self.send_raw(&reply).await
    }

    /// Stage `bytes` in the outbound buffer and send them all.
    async fn send_raw(&mut self, bytes: &[u8]) -> Result<(), SessionError> {
        self.outbound.clear();
        let view = self
            .outbound
            .require_write(bytes.len(), true, false)
            .map_err(staged)?;
        view[..bytes.len()].copy_from_slice(bytes);
        self.outbound.confirm_write(bytes.len()).map_err(staged)?;
        send_all(&mut self.stream, &mut self.outbound, bytes.len()).await?;
        Ok(())
    }
}
