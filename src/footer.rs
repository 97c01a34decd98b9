//! The fixed 20-byte trailer at the end of every DVPL container.
//!
//! ```text
//! offset  size  field
//!      0     4  original_size    (u32 LE)
//!      4     4  compressed_size  (u32 LE)
//!      8     4  crc32            (u32 LE, IEEE, over the stored payload)
//!     12     4  type             (u32 LE, 0 = stored, 2 = LZ4 block)
//!     16     4  magic            ("DVPL")
//! ```

use std::io::{self, Write};

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use serde::Serialize;

use crate::codec::{CodecError, CompressionType};

pub const FOOTER_SIZE: usize = 20;
pub const MAGIC: &[u8; 4] = b"DVPL";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Footer {
    pub original_size:   u32,
    pub compressed_size: u32,
    pub crc32:           u32,
    /// Raw type tag; unknown values are rejected by `container`, not here.
    #[serde(rename = "type")]
    pub kind:            u32,
}

impl Footer {
    pub fn new(original_size: u32, compressed_size: u32, crc32: u32, kind: CompressionType) -> Self {
        Self {
            original_size,
            compressed_size,
            crc32,
            kind: kind.tag(),
        }
    }

    pub fn compression_type(&self) -> Option<CompressionType> {
        CompressionType::from_tag(self.kind)
    }

    pub fn encode(&self) -> [u8; FOOTER_SIZE] {
        let mut buf = [0u8; FOOTER_SIZE];
        LittleEndian::write_u32(&mut buf[0..4], self.original_size);
        LittleEndian::write_u32(&mut buf[4..8], self.compressed_size);
        LittleEndian::write_u32(&mut buf[8..12], self.crc32);
        LittleEndian::write_u32(&mut buf[12..16], self.kind);
        buf[16..].copy_from_slice(MAGIC);
        buf
    }

    /// Stream the footer to `w`; byte-for-byte the same as [`Footer::encode`].
    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.original_size)?;
        w.write_u32::<LittleEndian>(self.compressed_size)?;
        w.write_u32::<LittleEndian>(self.crc32)?;
        w.write_u32::<LittleEndian>(self.kind)?;
        w.write_all(MAGIC)
    }

    /// Decode the footer from the last [`FOOTER_SIZE`] bytes of `container`.
    pub fn decode(container: &[u8]) -> Result<Self, CodecError> {
        Self::split(container).map(|(_, footer)| footer)
    }

    /// Split `container` into its payload view and decoded footer.
    ///
    /// Only the magic is checked here; size, checksum and type consistency
    /// belong to [`crate::container`].
    pub fn split(container: &[u8]) -> Result<(&[u8], Self), CodecError> {
        let payload_len = container
            .len()
            .checked_sub(FOOTER_SIZE)
            .ok_or(CodecError::InvalidFooter)?;
        let (payload, tail) = container.split_at(payload_len);
        if &tail[16..] != MAGIC {
            return Err(CodecError::InvalidFooter);
        }
        let footer = Self {
            original_size:   LittleEndian::read_u32(&tail[0..4]),
            compressed_size: LittleEndian::read_u32(&tail[4..8]),
            crc32:           LittleEndian::read_u32(&tail[8..12]),
            kind:            LittleEndian::read_u32(&tail[12..16]),
        };
        Ok((payload, footer))
    }
}
