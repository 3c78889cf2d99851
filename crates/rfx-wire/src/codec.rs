use std::borrow::Cow;
use std::fmt;

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Result, WireError};

/// Fixed capacity of the filename field, including the NUL terminator.
///
/// Contract point: both endpoints must agree on this value bit-for-bit. A
/// filename longer than `FILENAME_SIZE - 1` bytes is cut at that boundary
/// on the wire.
pub const FILENAME_SIZE: usize = 256;

/// Wire size of the header: command (1) + nbytes (4) + filename (256).
pub const HEADER_SIZE: usize = 1 + 4 + FILENAME_SIZE;

/// Protocol command tags.
///
/// Wire values are fixed for compatibility. `EXIT` and `HELP` never reach
/// the wire (the client handles them locally) but keep their tag values
/// reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    Error = 0,
    Exit = 1,
    Get = 2,
    Help = 3,
    Ls = 4,
    Put = 5,
    Rm = 6,
    Ack = 7,
    Nak = 8,
    FileOut = 9,
    LsOut = 10,
}

impl Command {
    /// The wire tag for this command.
    pub fn to_wire(self) -> u8 {
        self as u8
    }

    /// Decode a wire tag. Total: out-of-range bytes decode to [`Error`],
    /// which no handler serves, so the receiver logs and ignores them.
    ///
    /// [`Error`]: Command::Error
    pub fn from_wire(byte: u8) -> Self {
        match byte {
            1 => Command::Exit,
            2 => Command::Get,
            3 => Command::Help,
            4 => Command::Ls,
            5 => Command::Put,
            6 => Command::Rm,
            7 => Command::Ack,
            8 => Command::Nak,
            9 => Command::FileOut,
            10 => Command::LsOut,
            _ => Command::Error,
        }
    }

    /// Upper-case protocol name of this command.
    pub fn name(self) -> &'static str {
        match self {
            Command::Error => "ERROR",
            Command::Exit => "EXIT",
            Command::Get => "GET",
            Command::Help => "HELP",
            Command::Ls => "LS",
            Command::Put => "PUT",
            Command::Rm => "RM",
            Command::Ack => "ACK",
            Command::Nak => "NAK",
            Command::FileOut => "FILEOUT",
            Command::LsOut => "LSOUT",
        }
    }

    /// Whether a payload of `nbytes` bytes follows a header with this tag.
    pub fn carries_payload(self) -> bool {
        matches!(self, Command::Put | Command::FileOut | Command::LsOut)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The fixed-format header preceding every protocol exchange.
///
/// Constructed fresh per request/response. The filename buffer is always
/// fully zeroed before any name is copied in, so padding bytes never carry
/// stale contents onto the wire.
#[derive(Clone, PartialEq, Eq)]
pub struct Header {
    pub command: Command,
    pub nbytes: u32,
    filename: [u8; FILENAME_SIZE],
}

impl Header {
    /// A header with the given command, a zero byte count, and an empty
    /// filename field.
    pub fn new(command: Command) -> Self {
        Self {
            command,
            nbytes: 0,
            filename: [0u8; FILENAME_SIZE],
        }
    }

    /// Bounded copy of `name` into the filename field.
    ///
    /// The field holds at most `FILENAME_SIZE - 1` bytes plus a NUL
    /// terminator; a longer name is cut at that boundary, exactly as the
    /// wire format demands. Returns `true` when the name was truncated so
    /// callers can surface the loss even though the wire stays silent.
    pub fn set_filename(&mut self, name: &str) -> bool {
        let bytes = name.as_bytes();
        let limit = FILENAME_SIZE - 1;
        let len = bytes.len().min(limit);
        self.filename = [0u8; FILENAME_SIZE];
        self.filename[..len].copy_from_slice(&bytes[..len]);
        bytes.len() > limit
    }

    /// Re-zero the filename field. Response headers that need not echo a
    /// name are cleared before sending.
    pub fn clear_filename(&mut self) {
        self.filename = [0u8; FILENAME_SIZE];
    }

    /// The filename as carried on the wire: bytes up to the first NUL.
    pub fn filename(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.filename_bytes())
    }

    fn filename_bytes(&self) -> &[u8] {
        let end = self
            .filename
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(FILENAME_SIZE);
        &self.filename[..end]
    }
}

impl fmt::Debug for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Header")
            .field("command", &self.command)
            .field("nbytes", &self.nbytes)
            .field("filename", &self.filename())
            .finish()
    }
}

/// Byte count of a payload as carried in a header, guarding the 32-bit
/// `nbytes` field.
pub fn payload_len(payload: &[u8]) -> Result<u32> {
    u32::try_from(payload.len()).map_err(|_| WireError::PayloadTooLarge {
        size: payload.len(),
        max: u32::MAX as usize,
    })
}

/// Encode a header into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬──────────────┬────────────────────────────┐
/// │ Command (1B) │ Nbytes       │ Filename (256B,            │
/// │              │ (4B LE)      │ NUL-terminated, 0-padded)  │
/// └──────────────┴──────────────┴────────────────────────────┘
/// ```
///
/// Encoding is pure and total: any header value has a wire form.
pub fn encode_header(header: &Header, dst: &mut BytesMut) {
    dst.reserve(HEADER_SIZE);
    dst.put_u8(header.command.to_wire());
    dst.put_u32_le(header.nbytes);
    dst.put_slice(&header.filename);
}

/// Decode a header from a buffer.
///
/// Returns `None` if the buffer holds fewer than `HEADER_SIZE` bytes. On
/// complete input decoding is total: it consumes the header bytes and never
/// fails (unknown command tags become [`Command::Error`]).
pub fn decode_header(src: &mut BytesMut) -> Option<Header> {
    if src.len() < HEADER_SIZE {
        return None;
    }

    let command = Command::from_wire(src.get_u8());
    let nbytes = src.get_u32_le();
    let mut filename = [0u8; FILENAME_SIZE];
    src.copy_to_slice(&mut filename);

    Some(Header {
        command,
        nbytes,
        filename,
    })
}
