//! Client and server session logic for the rfx file exchange protocol.
//!
//! This is the layer that gives the wire format meaning:
//!
//! - [`client`] — the interactive command loop driving one request/response
//!   cycle per user command
//! - [`dispatcher`] — the per-connection server loop and its GET/LS/PUT/RM
//!   handlers
//! - [`server`] — the accept loop handing each connection to an isolated
//!   worker thread
//! - [`reaper`] — collection of finished workers, synchronous and
//!   asynchronous

pub mod client;
pub mod dispatcher;
pub mod error;
pub mod reaper;
pub mod server;

pub use client::{parse_request, ClientSession, Request};
pub use dispatcher::Dispatcher;
pub use error::{Result, SessionError};
pub use reaper::WorkerSet;
pub use server::FileServer;
