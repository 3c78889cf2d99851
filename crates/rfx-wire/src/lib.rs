//! Fixed-header packet framing for the rfx file exchange protocol.
//!
//! Every protocol exchange starts with a fixed 261-byte header:
//! - a 1-byte command tag
//! - a 4-byte little-endian payload byte count
//! - a 256-byte zero-padded filename field
//!
//! followed by exactly `nbytes` raw payload bytes when the command implies a
//! payload (`PUT`, `FILEOUT`, `LSOUT`). No partial reads, no buffer
//! management in user code: the framer loops until the exact byte count has
//! moved or the connection has failed.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_header, encode_header, payload_len, Command, Header, FILENAME_SIZE, HEADER_SIZE,
};
pub use error::{Result, WireError};
pub use reader::PacketReader;
pub use writer::PacketWriter;
