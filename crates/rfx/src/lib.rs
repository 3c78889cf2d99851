//! Minimal remote file exchange over TCP.
//!
//! rfx pairs an interactive client (`rfx`) with a worker-per-connection
//! server (`rfxd`). Every exchange is a fixed binary header and, for the
//! transferring commands, a raw payload.
//!
//! # Crate Structure
//!
//! - [`transport`] — TCP connect/bind/accept and the stream wrapper
//! - [`wire`] — fixed-header codec and exact-byte packet framing
//! - [`session`] — client command loop, server dispatcher, acceptor, reaper

pub mod exit;
pub mod logging;

/// Re-export transport types.
pub mod transport {
    pub use rfx_transport::*;
}

/// Re-export wire types.
pub mod wire {
    pub use rfx_wire::*;
}

/// Re-export session types.
pub mod session {
    pub use rfx_session::*;
}

/// Host the client connects to when none is given.
pub const DEFAULT_HOST: &str = "localhost";

/// Port used by both binaries when none is given.
pub const DEFAULT_PORT: u16 = 50505;
