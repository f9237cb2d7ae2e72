//! Admission-controlled SOCKS5 listener.
//!
//! # Responsibilities
//! - Bind the listening socket and accept client connections
//! - Enforce `max_connections` by acquiring an admission permit before
//!   each accept (credit-based backpressure)
//! - Register every connection before its handshake starts
//! - Stop exactly once: detach the session, quit the accept loop, and
//!   stop every registered connection
//!
//! # Design Decisions
//! - The permit semaphore makes "accept outstanding" and "registry full"
//!   a single condition: at most one accept is pending, and none is
//!   issued without registry room; a permit returns to the pool only
//!   when a connection's exit notification fires
//! - `max_connections <= 0` means unlimited: accepts are re-issued
//!   unconditionally from every completion

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

use crate::config::ProxyConfig;
use crate::lifecycle::Shutdown;
use crate::net::connection::{ConnControl, ConnectionIdCounter};
use crate::observability::metrics;
use crate::socks::handshake::ClientSession;
use crate::upstream::{TcpUpstreamFactory, UpstreamFactory};

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Bind address did not parse as a socket address.
    #[error("invalid bind address: {0}")]
    Address(#[from] std::net::AddrParseError),

    /// Failed to bind or inspect the listening socket.
    #[error("failed to bind: {0}")]
    Bind(#[from] std::io::Error),

    /// A session is already active.
    #[error("listener already started")]
    AlreadyStarted,
}

/// State shared by the accept loop, the registry, and every connection
/// task of one listening session.
struct Session {
    admission: Option<Arc<Semaphore>>,
    ids: ConnectionIdCounter,
    registry: DashMap<u64, Arc<ConnControl>>,
    shutdown: Shutdown,
    factory: Arc<dyn UpstreamFactory>,
}

/// One active listening session plus its accept task.
struct ActiveSession {
    session: Arc<Session>,
    _accept_task: JoinHandle<()>,
}

/// A SOCKS5 listener with credit-based admission control. At most one
/// listening session is active at a time; `stop` detaches it atomically.
pub struct SocksListener {
    config: ProxyConfig,
    factory: Arc<dyn UpstreamFactory>,
    active: Mutex<Option<ActiveSession>>,
}

impl SocksListener {
    /// Listener using the production TCP connector.
    pub fn new(config: ProxyConfig) -> Self {
        let factory = Arc::new(TcpUpstreamFactory::new(config.upstream.clone()));
        Self::with_upstream_factory(config, factory)
    }

    /// Listener with a custom connector factory (e.g. the rejecting stub).
    pub fn with_upstream_factory(config: ProxyConfig, factory: Arc<dyn UpstreamFactory>) -> Self {
        Self {
            config,
            factory,
            active: Mutex::new(None),
        }
    }

    /// Bind and start accepting. Returns the bound address. Errors if a
    /// session is already active.
    pub async fn start(&self) -> Result<SocketAddr, ListenerError> {
        let addr: SocketAddr = self.config.listener.bind_address.parse()?;
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        let max_connections = self.config.listener.max_connections;
        let admission = (max_connections > 0)
            .then(|| Arc::new(Semaphore::new(max_connections as usize)));
        let session = Arc::new(Session {
            admission,
            ids: ConnectionIdCounter::default(),
            registry: DashMap::new(),
            shutdown: Shutdown::new(),
            factory: Arc::clone(&self.factory),
        });

        let mut active = self.active.lock().expect("listener state poisoned");
        if active.is_some() {
            return Err(ListenerError::AlreadyStarted);
        }

        tracing::info!(
            address = %local_addr,
            max_connections,
            "listener bound"
        );

        // Subscribe before spawning so a stop racing the startup cannot
        // be missed by the accept loop.
        let shutdown_rx = session.shutdown.subscribe();
        let accept_task = tokio::spawn(accept_loop(listener, Arc::clone(&session), shutdown_rx));
        *active = Some(ActiveSession {
            session,
            _accept_task: accept_task,
        });
        Ok(local_addr)
    }

    /// Detach the active session and stop every registered connection.
    /// Safe to call repeatedly and concurrently; later calls are no-ops.
    pub fn stop(&self) {
        let detached = self.active.lock().expect("listener state poisoned").take();
        let Some(active) = detached else {
            return;
        };

        active.session.shutdown.trigger();
        let mut stopped = 0usize;
        for entry in active.session.registry.iter() {
            if entry.value().stop.trigger() {
                stopped += 1;
            }
        }
        tracing::info!(connections = stopped, "listener stopped");
    }

    /// Number of currently registered client connections.
    pub fn connection_count(&self) -> usize {
        self.active
            .lock()
            .expect("listener state poisoned")
            .as_ref()
            .map(|active| active.session.registry.len())
            .unwrap_or(0)
    }
}

async fn accept_loop(
    listener: TcpListener,
    session: Arc<Session>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        // Admission: a permit stands for registry room. Waiting here is
        // the deferred accept the client never observes.
        let permit = match &session.admission {
            Some(semaphore) => {
                let acquired = tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    acquired = Arc::clone(semaphore).acquire_owned() => acquired,
                };
                match acquired {
                    Ok(permit) => Some(permit),
                    Err(_) => break,
                }
            }
            None => None,
        };

        let (stream, peer) = tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => match accepted {
                Ok(pair) => pair,
                Err(err) => {
                    tracing::warn!(error = %err, "accept failed");
                    continue;
                }
            },
        };

        spawn_connection(stream, peer, permit, &session);
    }
    // Dropping the listener here closes the listening socket; any peer
    // still in the backlog is reset.
    tracing::debug!("accept loop exited");
}

fn spawn_connection(
    stream: TcpStream,
    peer: SocketAddr,
    permit: Option<OwnedSemaphorePermit>,
    session: &Arc<Session>,
) {
    let id = session.ids.next_id();
    let control = ConnControl::new(id);
    // Registered before the handshake starts so stop always observes a
    // consistent membership.
    session.registry.insert(id.as_u64(), Arc::clone(&control));
    metrics::connection_opened();
    tracing::debug!(connection_id = %id, peer = %peer, "connection accepted");

    let session = Arc::clone(session);
    tokio::spawn(async move {
        let upstream = session.factory.create();
        let mut conn = ClientSession::new(id, stream, upstream);

        tokio::select! {
            _ = control.stop.triggered() => {
                tracing::debug!(connection_id = %id, "connection stopped");
            }
            result = conn.run() => match result {
                Ok(()) => tracing::debug!(connection_id = %id, "connection finished"),
                Err(err) => {
                    tracing::debug!(connection_id = %id, error = %err, "connection ended")
                }
            },
        }

        // Exit notification first: deregister and release the admission
        // slot, then release the sockets.
        control.stop.trigger();
        session.registry.remove(&id.as_u64());
        metrics::connection_closed();
        drop(permit);
        conn.shutdown();
    });
}
