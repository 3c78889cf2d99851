use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};

use crate::error::Result;

/// A connected rfx byte stream — implements Read + Write.
///
/// Wraps a TCP stream in blocking mode. One stream is owned by exactly one
/// session (or one server worker) for its whole lifetime.
pub struct RfxStream {
    inner: TcpStream,
}

impl RfxStream {
    pub(crate) fn from_tcp(inner: TcpStream) -> Self {
        Self { inner }
    }

    /// Address of the remote endpoint.
    pub fn peer_addr(&self) -> Result<SocketAddr> {
        Ok(self.inner.peer_addr()?)
    }

    /// Address of the local endpoint.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.inner.local_addr()?)
    }

    /// Clone this stream (creates a new file descriptor).
    ///
    /// Used to split one connection into an owned read half and an owned
    /// write half.
    pub fn try_clone(&self) -> Result<Self> {
        let cloned = self.inner.try_clone()?;
        Ok(Self::from_tcp(cloned))
    }
}

impl Read for RfxStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for RfxStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl std::fmt::Debug for RfxStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RfxStream")
            .field("peer", &self.inner.peer_addr().ok())
            .finish()
    }
}
