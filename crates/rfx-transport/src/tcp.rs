use std::net::{SocketAddr, TcpListener, TcpStream};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::retry::retry_interrupted;
use crate::stream::RfxStream;

/// TCP socket endpoint: bind/accept on the server side, connect on the
/// client side.
pub struct TcpSocket {
    listener: TcpListener,
}

impl TcpSocket {
    /// Bind and listen on the given port, on all interfaces.
    ///
    /// Port 0 asks the platform for an ephemeral port; use
    /// [`local_addr`](Self::local_addr) to learn which one was assigned.
    pub fn bind(port: u16) -> Result<Self> {
        let listener =
            TcpListener::bind(("0.0.0.0", port)).map_err(|e| TransportError::Bind {
                port,
                source: e,
            })?;
        info!(addr = ?listener.local_addr().ok(), "listening");
        Ok(Self { listener })
    }

    /// Accept the next incoming connection (blocking).
    ///
    /// An accept interrupted by signal delivery is retried transparently;
    /// it is not an error.
    pub fn accept(&self) -> Result<RfxStream> {
        let (stream, addr) =
            retry_interrupted(|| self.listener.accept()).map_err(TransportError::Accept)?;
        debug!(peer = %addr, "accepted connection");
        Ok(RfxStream::from_tcp(stream))
    }

    /// Connect to a listening server (blocking).
    pub fn connect(host: &str, port: u16) -> Result<RfxStream> {
        let stream = TcpStream::connect((host, port)).map_err(|e| TransportError::Connect {
            host: host.to_string(),
            port,
            source: e,
        })?;
        debug!(host, port, "connected");
        Ok(RfxStream::from_tcp(stream))
    }

    /// The address this socket is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}
