//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Init observability → Start listener
//!
//! Shutdown:
//!     Signal received (signals.rs) → Listener stop → Connections stop
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: detach the session, quit the accept loop, then
//!   stop every connection

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
