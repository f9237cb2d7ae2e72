//! Upstream connector capability.
//!
//! # Data Flow
//! ```text
//! socks::handshake (CONNECT parsed)
//!     → Upstream::connect (resolve + dial, outcome as a reply code)
//!     → Upstream::relay   (full-duplex pump until either side closes)
//!     → Upstream::close   (release the destination socket)
//! ```
//!
//! # Design Decisions
//! - The protocol engine depends only on the trait, never on a concrete
//!   connector; a factory builds one connector per accepted connection
//! - Generic over the client stream type so the engine runs against
//!   in-memory streams in tests
//! - No fault escapes this boundary: `connect` always reports an outcome,
//!   `relay` returns faults as values

pub mod reject;
pub mod tcp;

pub use reject::{RejectUpstream, RejectUpstreamFactory};
pub use tcp::{TcpUpstream, TcpUpstreamFactory};

use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::net::buffer::StagingBuffer;
use crate::socks::proto::ReplyKind;

/// Capability for reaching the CONNECT-requested destination.
#[async_trait]
pub trait Upstream<S>: Send
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Resolve and connect to `host:port`. The outcome is the reply code
    /// the engine sends back to the client.
    async fn connect(&mut self, host: &str, port: u16) -> ReplyKind;

    /// Pump bytes both ways between the connected destination and
    /// `client` until either side closes or errors. `inbound` stages
    /// client-to-destination bytes, `outbound` the reverse direction.
    async fn relay(
        &mut self,
        client: &mut S,
        inbound: &mut StagingBuffer,
        outbound: &mut StagingBuffer,
    ) -> io::Result<()>;

    /// Release the destination socket. Safe to call repeatedly, and before
    /// any connect ever completed.
    fn close(&mut self);
}

/// Builds one connector per accepted connection.
pub trait UpstreamFactory: Send + Sync + 'static {
    fn create(&self) -> Box<dyn Upstream<TcpStream>>;
}
