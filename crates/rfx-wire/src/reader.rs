use std::io::{ErrorKind, Read};

use bytes::{Bytes, BytesMut};
use tracing::trace;

use crate::codec::{decode_header, Header, HEADER_SIZE};
use crate::error::{Result, WireError};

/// Reads complete packets from any `Read` stream.
///
/// Every receive has a known byte count — a header is always `HEADER_SIZE`
/// bytes, a payload exactly `nbytes` — so short reads loop until the count
/// is satisfied or the connection fails. Callers never see a partial
/// packet.
pub struct PacketReader<T> {
    inner: T,
}

impl<T: Read> PacketReader<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Read exactly one header (blocking).
    pub fn recv_header(&mut self) -> Result<Header> {
        let mut raw = [0u8; HEADER_SIZE];
        self.recv_exact(&mut raw)?;

        let mut src = BytesMut::from(&raw[..]);
        match decode_header(&mut src) {
            Some(header) => {
                trace!(header = ?header, "read header");
                Ok(header)
            }
            // Unreachable after a full HEADER_SIZE read; keep the stream
            // failure shape rather than panicking.
            None => Err(WireError::ConnectionClosed),
        }
    }

    /// Read exactly `nbytes` payload bytes following a header (blocking).
    pub fn recv_payload(&mut self, nbytes: u32) -> Result<Bytes> {
        let mut buf = BytesMut::zeroed(nbytes as usize);
        self.recv_exact(&mut buf)?;
        trace!(nbytes, "read payload");
        Ok(buf.freeze())
    }

    /// Fill `buf` completely or fail.
    ///
    /// `Ok(0)` from the stream is a peer shutdown; mid-packet that is a
    /// protocol failure, never a clean end of stream.
    fn recv_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0usize;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => return Err(WireError::ConnectionClosed),
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(WireError::Io(err)),
            }
        }
        Ok(())
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}
