//! Connection identity and single-fire stop control.
//!
//! # Responsibilities
//! - Generate session-scoped monotonic connection ids for tracing
//! - Provide the idempotent stop signal each connection task races against
//! - Carry the registry entry shared between session and connection task

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// Unique identifier for a client connection, scoped to one listening
/// session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Get the raw id value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Hands out monotonically increasing connection ids. One counter lives in
/// each listening session, so ids restart when a listener restarts.
#[derive(Debug, Default)]
pub struct ConnectionIdCounter {
    next: AtomicU64,
}

impl ConnectionIdCounter {
    /// Relaxed ordering is sufficient; only uniqueness matters.
    pub fn next_id(&self) -> ConnectionId {
        ConnectionId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// Single-fire stop signal. The first `trigger` wins; every later call is
/// a no-op.
#[derive(Debug, Default)]
pub struct StopFlag {
    fired: AtomicBool,
    notify: Notify,
}

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the flag and wake anything waiting on it. Returns `true` only
    /// for the invocation that actually fired it.
    pub fn trigger(&self) -> bool {
        if self.fired.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.notify.notify_waiters();
        true
    }

    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Resolve once the flag fires; immediately if it already has.
    pub async fn triggered(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        // Register interest before checking the flag so a concurrent
        // trigger cannot slip between check and await.
        notified.as_mut().enable();
        if self.is_fired() {
            return;
        }
        notified.await;
    }
}

/// Per-connection control block shared between the session registry and
/// the connection task.
#[derive(Debug)]
pub struct ConnControl {
    pub id: ConnectionId,
    pub stop: StopFlag,
}

impl ConnControl {
    pub fn new(id: ConnectionId) -> Arc<Self> {
        Arc::new(Self {
            id,
            stop: StopFlag::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_monotonic() {
        let counter = ConnectionIdCounter::default();
        let first = counter.next_id();
        let second = counter.next_id();
        assert_ne!(first, second);
        assert!(second.as_u64() > first.as_u64());
    }

    #[test]
    fn trigger_fires_exactly_once() {
        let flag = StopFlag::new();
        assert!(flag.trigger());
        assert!(!flag.trigger());
        assert!(!flag.trigger());
        assert!(flag.is_fired());
    }

    #[tokio::test]
    async fn triggered_resolves_after_fire() {
        let counter = ConnectionIdCounter::default();
        let control = ConnControl::new(counter.next_id());
        let waiter = {
            let control = Arc::clone(&control);
            tokio::spawn(async move { control.stop.triggered().await })
        };
        tokio::task::yield_now().await;
        control.stop.trigger();
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn triggered_resolves_when_already_fired() {
        let flag = StopFlag::new();
        flag.trigger();
        flag.triggered().await;
    }
}
