//! TCP upstream connector: resolve, dial, relay.

use std::io;
use std::net::{IpAddr, SocketAddr};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{lookup_host, TcpStream};

use super::{Upstream, UpstreamFactory};
use crate::config::UpstreamConfig;
use crate::net::buffer::StagingBuffer;
use crate::net::io::pump;
use crate::socks::proto::ReplyKind;

/// Production connector: dials the requested destination over TCP and
/// owns the destination socket once connected.
pub struct TcpUpstream {
    config: UpstreamConfig,
    stream: Option<TcpStream>,
}

impl TcpUpstream {
    pub fn new(config: UpstreamConfig) -> Self {
        Self {
            config,
            stream: None,
        }
    }

    fn family_enabled(&self, addr: &IpAddr) -> bool {
        match addr {
            IpAddr::V4(_) => self.config.enable_ipv4,
            IpAddr::V6(_) => self.config.enable_ipv6,
        }
    }

    /// First resolved address whose family is enabled, if any.
    async fn resolve(&self, host: &str, port: u16) -> io::Result<Option<SocketAddr>> {
        Ok(lookup_host((host, port))
            .await?
            .find(|addr| self.family_enabled(&addr.ip())))
    }

    async fn dial(&mut self, addr: SocketAddr) -> ReplyKind {
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                self.stream = Some(stream);
                ReplyKind::Succeeded
            }
            Err(err) => {
                tracing::debug!(address = %addr, error = %err, "upstream dial failed");
                ReplyKind::from_dial_error(&err)
            }
        }
    }
}

#[async_trait]
impl<S> Upstream<S> for TcpUpstream
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn connect(&mut self, host: &str, port: u16) -> ReplyKind {
        // Bracketed IPv6 literals arrive from the request decoder as-is.
        let literal = host.trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = literal.parse::<IpAddr>() {
            if !self.family_enabled(&ip) {
                return ReplyKind::HostUnreachable;
            }
            return self.dial(SocketAddr::new(ip, port)).await;
        }

        match self.resolve(host, port).await {
            Ok(Some(addr)) => self.dial(addr).await,
            Ok(None) => ReplyKind::HostUnreachable,
            Err(err) => {
                tracing::debug!(host, error = %err, "resolution failed");
                ReplyKind::HostUnreachable
            }
        }
    }

    async fn relay(
        &mut self,
        client: &mut S,
        inbound: &mut StagingBuffer,
        outbound: &mut StagingBuffer,
    ) -> io::Result<()> {
        let destination = self.stream.take().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, "relay requested before connect")
        })?;

        let (mut dest_read, mut dest_write) = destination.into_split();
        let (mut client_read, mut client_write) = tokio::io::split(client);

        // Two independently suspended chains; the first side to close or
        // fault ends both.
        let client_to_dest = pump(&mut client_read, &mut dest_write, inbound);
        let dest_to_client = pump(&mut dest_read, &mut client_write, outbound);
        tokio::select! {
            result = client_to_dest => result,
            result = dest_to_client => result,
        }
    }

    fn close(&mut self) {
        self.stream.take();
    }
}

/// Factory for the production TCP connector.
pub struct TcpUpstreamFactory {
    config: UpstreamConfig,
}

impl TcpUpstreamFactory {
    pub fn new(config: UpstreamConfig) -> Self {
        Self { config }
    }
}

impl UpstreamFactory for TcpUpstreamFactory {
    fn create(&self) -> Box<dyn Upstream<TcpStream>> {
        Box::new(TcpUpstream::new(self.config.clone()))
    }
}
