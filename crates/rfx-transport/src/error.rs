/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind the listening port.
    #[error("failed to bind port {port}: {source}")]
    Bind { port: u16, source: std::io::Error },

    /// Failed to connect to the server.
    #[error("failed to connect to {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
