//! Connection-limited SOCKS5 proxy library.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌──────────────────────────────────────────────┐
//!                  │                 SOCKS5 PROXY                  │
//!   Client TCP     │  ┌──────────┐   ┌───────────┐   ┌──────────┐ │
//!   ───────────────┼─▶│   net    │──▶│   socks   │──▶│ upstream │─┼──▶ Destination
//!                  │  │ listener │   │ handshake │   │ dial +   │ │
//!                  │  │+admission│   │  engine   │   │  relay   │ │
//!                  │  └──────────┘   └─────┬─────┘   └────┬─────┘ │
//!                  │                       │              │       │
//!                  │              net::buffer + net::io ◀─┘       │
//!                  │                                              │
//!                  │  ┌────────────────────────────────────────┐  │
//!                  │  │  config · lifecycle · observability    │  │
//!                  │  └────────────────────────────────────────┘  │
//!                  └──────────────────────────────────────────────┘
//! ```
//!
//! The listener enforces a global cap on concurrent client connections by
//! acquiring an admission permit before each accept; permits return to
//! the pool only when a connection's exit notification fires.

// Core subsystems
pub mod config;
pub mod net;
pub mod socks;
pub mod upstream;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::ProxyConfig;
pub use lifecycle::Shutdown;
pub use net::listener::SocksListener;
pub use socks::proto::ReplyKind;
