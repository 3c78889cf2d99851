/// Errors that can occur while framing packets on a stream.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The payload does not fit the header's 32-bit byte count.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing a packet.
    #[error("wire I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the stream before a complete header or payload
    /// arrived. Every exchange has a known byte count, so a clean shutdown
    /// mid-packet is a failure, not end-of-stream.
    #[error("connection closed (incomplete packet)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, WireError>;
