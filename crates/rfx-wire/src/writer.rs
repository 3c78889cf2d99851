use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use tracing::trace;

use crate::codec::{encode_header, payload_len, Header, HEADER_SIZE};
use crate::error::{Result, WireError};

/// Writes complete packets to any `Write` stream.
///
/// Short writes loop until the packet's exact byte count has been accepted
/// by the stream; a zero-length write means the peer is gone.
pub struct PacketWriter<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Write> PacketWriter<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(HEADER_SIZE),
        }
    }

    /// Write one header (blocking).
    pub fn send_header(&mut self, header: &Header) -> Result<()> {
        self.buf.clear();
        encode_header(header, &mut self.buf);

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(WireError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(WireError::Io(err)),
            }
        }

        trace!(header = ?header, "wrote header");
        self.flush()
    }

    /// Write a payload of exactly `payload.len()` bytes (blocking).
    ///
    /// The caller has already announced the length in a header; anything
    /// beyond the 32-bit byte count is rejected before touching the stream.
    pub fn send_payload(&mut self, payload: &[u8]) -> Result<()> {
        payload_len(payload)?;

        let mut offset = 0usize;
        while offset < payload.len() {
            match self.inner.write(&payload[offset..]) {
                Ok(0) => return Err(WireError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(WireError::Io(err)),
            }
        }

        trace!(nbytes = payload.len(), "wrote payload");
        self.flush()
    }

    fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(WireError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::codec::Command;
    use crate::reader::PacketReader;

    #[test]
    fn written_header_decodes() {
        let mut writer = PacketWriter::new(Cursor::new(Vec::<u8>::new()));
        let mut header = Header::new(Command::Put);
        header.nbytes = 9;
        header.set_filename("song.flac");
        writer.send_header(&header).unwrap();

        let wire = writer.into_inner().into_inner();
        let mut reader = PacketReader::new(Cursor::new(wire));
        assert_eq!(reader.recv_header().unwrap(), header);
    }

    #[test]
    fn header_then_payload_frame_layout() {
        let mut writer = PacketWriter::new(Cursor::new(Vec::<u8>::new()));
        let mut header = Header::new(Command::FileOut);
        header.nbytes = 4;
        writer.send_header(&header).unwrap();
        writer.send_payload(b"data").unwrap();

        let wire = writer.into_inner().into_inner();
        assert_eq!(wire.len(), HEADER_SIZE + 4);
        assert_eq!(&wire[HEADER_SIZE..], b"data");
    }

    #[test]
    fn zero_write_is_connection_closed() {
        struct ZeroWriter;
        impl Write for ZeroWriter {
            fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
                Ok(0)
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut writer = PacketWriter::new(ZeroWriter);
        let err = writer.send_header(&Header::new(Command::Ack)).unwrap_err();
        assert!(matches!(err, WireError::ConnectionClosed));
    }

    #[test]
    fn interrupted_write_and_flush_are_retried() {
        let mut writer = PacketWriter::new(InterruptedWriteThenFlush {
            wrote_once: false,
            flush_interrupted: false,
            data: Vec::new(),
        });
        writer.send_header(&Header::new(Command::Ack)).unwrap();

        let inner = writer.into_inner();
        assert_eq!(inner.data.len(), HEADER_SIZE);
    }

    struct InterruptedWriteThenFlush {
        wrote_once: bool,
        flush_interrupted: bool,
        data: Vec<u8>,
    }

    impl Write for InterruptedWriteThenFlush {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.wrote_once {
                self.wrote_once = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            if !self.flush_interrupted {
                self.flush_interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            Ok(())
        }
    }

    #[test]
    fn short_writes_are_looped() {
        let mut writer = PacketWriter::new(OneBytePerWrite { data: Vec::new() });
        writer.send_header(&Header::new(Command::Ls)).unwrap();
        writer.send_payload(b"chunked").unwrap();

        let inner = writer.into_inner();
        assert_eq!(inner.data.len(), HEADER_SIZE + 7);
        assert_eq!(&inner.data[HEADER_SIZE..], b"chunked");
    }

    struct OneBytePerWrite {
        data: Vec<u8>,
    }

    impl Write for OneBytePerWrite {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if buf.is_empty() {
                return Ok(0);
            }
            self.data.push(buf[0]);
            Ok(1)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    #[cfg(unix)]
    fn roundtrip_over_socket_pair() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = PacketWriter::new(left);
        let mut reader = PacketReader::new(right);

        let mut header = Header::new(Command::Put);
        header.nbytes = 4;
        header.set_filename("ping.txt");
        writer.send_header(&header).unwrap();
        writer.send_payload(b"ping").unwrap();

        let read = reader.recv_header().unwrap();
        assert_eq!(read, header);
        assert_eq!(reader.recv_payload(read.nbytes).unwrap().as_ref(), b"ping");
    }
}
