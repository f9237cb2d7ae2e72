//! Admission-control behavior under a connection cap, and listener
//! stop/restart semantics.

mod common;

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use socks_gate::net::listener::{ListenerError, SocksListener};

#[tokio::test]
async fn second_connection_waits_for_first_exit() {
    let echo = common::start_echo_backend().await;
    let listener = SocksListener::new(common::proxy_config(1));
    let proxy = listener.start().await.unwrap();

    // The first connection occupies the only slot.
    let mut first = common::greet(proxy).await;
    assert_eq!(common::connect_ipv4(&mut first, echo).await, 0x00);

    // The second connection completes at the TCP level (kernel backlog)
    // but is never accepted by the proxy: its greeting goes unanswered
    // while the slot is taken.
    let mut second = TcpStream::connect(proxy).await.unwrap();
    second.write_all(&[0x05, 0x01, 0x00]).await.unwrap();
    let mut selected = [0u8; 2];
    let starved = timeout(
        Duration::from_millis(300),
        second.read_exact(&mut selected),
    )
    .await;
    assert!(starved.is_err(), "second connection served while at capacity");

    // Closing the first connection fires its exit notification, which
    // frees the slot; the pending greeting is then answered.
    drop(first);
    timeout(Duration::from_secs(2), second.read_exact(&mut selected))
        .await
        .expect("second connection never admitted")
        .unwrap();
    assert_eq!(selected, [0x05, 0x00]);

    listener.stop();
}

#[tokio::test]
async fn unlimited_listener_accepts_concurrently() {
    let echo = common::start_echo_backend().await;
    let listener = SocksListener::new(common::proxy_config(0));
    let proxy = listener.start().await.unwrap();

    let mut streams = Vec::new();
    for _ in 0..3 {
        let mut stream = common::greet(proxy).await;
        assert_eq!(common::connect_ipv4(&mut stream, echo).await, 0x00);
        streams.push(stream);
    }

    listener.stop();
}

#[tokio::test]
async fn stop_tears_down_live_connections() {
    let echo = common::start_echo_backend().await;
    let listener = SocksListener::new(common::proxy_config(0));
    let proxy = listener.start().await.unwrap();

    let mut stream = common::greet(proxy).await;
    assert_eq!(common::connect_ipv4(&mut stream, echo).await, 0x00);

    listener.stop();
    // A second stop is a no-op.
    listener.stop();

    let mut buf = [0u8; 1];
    let n = timeout(Duration::from_secs(2), stream.read(&mut buf))
        .await
        .expect("connection not torn down")
        .unwrap();
    assert_eq!(n, 0);
    assert_eq!(listener.connection_count(), 0);
}

#[tokio::test]
async fn listener_restarts_after_stop() {
    let echo = common::start_echo_backend().await;
    let listener = SocksListener::new(common::proxy_config(2));

    let first_addr = listener.start().await.unwrap();
    listener.stop();

    let second_addr = listener.start().await.unwrap();
    assert_ne!(first_addr.port(), 0);
    assert_ne!(second_addr.port(), 0);

    let mut stream = common::greet(second_addr).await;
    assert_eq!(common::connect_ipv4(&mut stream, echo).await, 0x00);

    listener.stop();
}

#[tokio::test]
async fn double_start_is_rejected() {
    let listener = SocksListener::new(common::proxy_config(0));
    listener.start().await.unwrap();
    assert!(matches!(
        listener.start().await,
        Err(ListenerError::AlreadyStarted)
    ));
    listener.stop();
}
