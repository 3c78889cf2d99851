/// Errors that end a client session or a server connection.
///
/// Anything here is fatal to the enclosing session: protocol-level
/// surprises (an unexpected response command, a NAK) are *not* errors in
/// this sense — they are reported and the session moves on.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] rfx_transport::TransportError),

    /// Wire-level error (framing, byte-exact I/O).
    #[error("wire error: {0}")]
    Wire(#[from] rfx_wire::WireError),

    /// Reading user input or writing console output failed.
    #[error("console I/O error: {0}")]
    Console(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;
