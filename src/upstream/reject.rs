//! Always-failing connector stub.
//!
//! Stands a listener up without granting any outbound reach: every
//! CONNECT is answered with a general failure and no destination socket
//! is ever opened.

use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use super::{Upstream, UpstreamFactory};
use crate::net::buffer::StagingBuffer;
use crate::socks::proto::ReplyKind;

pub struct RejectUpstream;

#[async_trait]
impl<S> Upstream<S> for RejectUpstream
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn connect(&mut self, host: &str, port: u16) -> ReplyKind {
        tracing::debug!(host, port, "connect rejected by stub connector");
        ReplyKind::GeneralServerFailure
    }

    async fn relay(
        &mut self,
        _client: &mut S,
        _inbound: &mut StagingBuffer,
        _outbound: &mut StagingBuffer,
    ) -> io::Result<()> {
        // A rejected connect never reaches the relay phase.
        Ok(())
    }

    fn close(&mut self) {}
}

/// Factory for the rejecting stub connector.
pub struct RejectUpstreamFactory;

impl UpstreamFactory for RejectUpstreamFactory {
    fn create(&self) -> Box<dyn Upstream<TcpStream>> {
        Box::new(RejectUpstream)
    }
}
