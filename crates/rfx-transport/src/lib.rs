//! TCP transport for the rfx remote file exchange protocol.
//!
//! Provides connect/bind/accept over `std::net` plus the [`RfxStream`]
//! wrapper every higher layer reads and writes. The protocol treats the
//! stream as a byte-exact, order-preserving, reliable channel; everything
//! above this crate assumes exactly that and nothing more.

pub mod error;
pub mod retry;
pub mod stream;
pub mod tcp;

pub use error::{Result, TransportError};
pub use retry::retry_interrupted;
pub use stream::RfxStream;
pub use tcp::TcpSocket;
