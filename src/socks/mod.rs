//! SOCKS5 protocol subsystem.
//!
//! # Data Flow
//! ```text
//! accepted client stream
//!     → handshake.rs (method negotiation, CONNECT request, reply)
//!     → upstream connector (dial + full-duplex relay)
//!
//! proto.rs holds the wire constants, reply codes, and request decoding
//! shared by the engine and the connectors.
//! ```

pub mod handshake;
pub mod proto;

pub use handshake::{ClientSession, SessionError};
pub use proto::ReplyKind;
