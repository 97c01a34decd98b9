//! Payload codecs and the error type shared by the whole container layer.
//!
//! # Type tags
//! The footer carries a u32 type tag. Only two values exist on disk:
//!   - `0` stored verbatim
//!   - `2` LZ4 block (raw block, no frame header, no size prefix)
//!
//! The encoder always writes tag 2, even when LZ4 expands the input. Tag 0
//! is decode-only.

use std::borrow::Cow;
use thiserror::Error;

// ── CompressionType ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionType {
    Stored,
    Lz4,
}

impl CompressionType {
    /// On-disk tag written into the footer.
    #[inline]
    pub fn tag(self) -> u32 {
        match self {
            CompressionType::Stored => 0,
            CompressionType::Lz4    => 2,
        }
    }

    /// Returns `None` for tags this build does not understand.
    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(CompressionType::Stored),
            2 => Some(CompressionType::Lz4),
            _ => None,
        }
    }

    /// Human-readable name (diagnostics only).
    pub fn name(self) -> &'static str {
        match self {
            CompressionType::Stored => "stored",
            CompressionType::Lz4    => "lz4",
        }
    }
}

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("invalid DVPL footer")]
    InvalidFooter,
    #[error("payload size mismatch: footer says {expected} bytes, found {actual}")]
    SizeMismatch { expected: u32, actual: usize },
    #[error("CRC32 mismatch: footer says {expected:08x}, payload hashes to {actual:08x}")]
    ChecksumMismatch { expected: u32, actual: u32 },
    #[error("stored payload with original size {original} != compressed size {compressed}")]
    TypeSizeMismatch { original: u32, compressed: u32 },
    #[error("decoded {actual} bytes, footer says {expected}")]
    DecodeSizeMismatch { expected: u32, actual: usize },
    #[error("unknown DVPL format (type {0})")]
    UnknownFormat(u32),
    #[error("compression failed: {0}")]
    CompressionFailure(String),
    #[error("decompression failed: {0}")]
    Decompression(String),
    #[error("{0} bytes does not fit a 32-bit footer field")]
    TooLarge(usize),
}

// ── Codec trait ──────────────────────────────────────────────────────────────

pub trait PayloadCodec {
    fn compression_type(&self) -> CompressionType;
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;
    /// Decode `payload` into exactly `original_size` bytes.
    fn decode<'a>(&self, payload: &'a [u8], original_size: u32) -> Result<Cow<'a, [u8]>, CodecError>;
}

// ── Built-in codec implementations ──────────────────────────────────────────

pub struct StoredCodec;
impl PayloadCodec for StoredCodec {
    fn compression_type(&self) -> CompressionType { CompressionType::Stored }
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> { Ok(data.to_vec()) }
    fn decode<'a>(&self, payload: &'a [u8], original_size: u32) -> Result<Cow<'a, [u8]>, CodecError> {
        if payload.len() != original_size as usize {
            return Err(CodecError::TypeSizeMismatch {
                original:   original_size,
                compressed: payload.len() as u32,
            });
        }
        Ok(Cow::Borrowed(payload))
    }
}

pub struct Lz4BlockCodec;
impl PayloadCodec for Lz4BlockCodec {
    fn compression_type(&self) -> CompressionType { CompressionType::Lz4 }
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut out = vec![0u8; lz4_flex::block::get_maximum_output_size(data.len())];
        let n = lz4_flex::block::compress_into(data, &mut out)
            .map_err(|e| CodecError::CompressionFailure(e.to_string()))?;
        out.truncate(n);
        Ok(out)
    }
    fn decode<'a>(&self, payload: &'a [u8], original_size: u32) -> Result<Cow<'a, [u8]>, CodecError> {
        let mut out = vec![0u8; original_size as usize];
        let n = lz4_flex::block::decompress_into(payload, &mut out)
            .map_err(|e| CodecError::Decompression(e.to_string()))?;
        if n != out.len() {
            return Err(CodecError::DecodeSizeMismatch { expected: original_size, actual: n });
        }
        Ok(Cow::Owned(out))
    }
}

// ── Factory ──────────────────────────────────────────────────────────────────

pub fn get_codec(kind: CompressionType) -> Box<dyn PayloadCodec> {
    match kind {
        CompressionType::Stored => Box::new(StoredCodec),
        CompressionType::Lz4    => Box::new(Lz4BlockCodec),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_roundtrip() {
        for kind in [CompressionType::Stored, CompressionType::Lz4] {
            assert_eq!(CompressionType::from_tag(kind.tag()), Some(kind));
            assert_eq!(get_codec(kind).compression_type(), kind);
        }
        assert_eq!(CompressionType::from_tag(1), None);
        assert_eq!(CompressionType::from_tag(3), None);
    }

    #[test]
    fn stored_borrows_payload() {
        let payload = b"verbatim";
        let out = StoredCodec.decode(payload, payload.len() as u32).unwrap();
        assert!(matches!(out, Cow::Borrowed(_)));
        assert_eq!(&*out, payload);
    }

    #[test]
    fn stored_rejects_size_disagreement() {
        let err = StoredCodec.decode(b"abcd", 5).unwrap_err();
        assert!(matches!(err, CodecError::TypeSizeMismatch { original: 5, compressed: 4 }));
    }

    #[test]
    fn lz4_block_roundtrip() {
        let data: Vec<u8> = b"asset bundle ".iter().copied().cycle().take(8192).collect();
        let encoded = Lz4BlockCodec.encode(&data).unwrap();
        assert!(encoded.len() < data.len());
        let decoded = Lz4BlockCodec.decode(&encoded, data.len() as u32).unwrap();
        assert_eq!(&*decoded, &data[..]);
    }

    #[test]
    fn lz4_short_output_is_detected() {
        let data = vec![7u8; 1000];
        let encoded = Lz4BlockCodec.encode(&data).unwrap();
        let err = Lz4BlockCodec.decode(&encoded, 1001).unwrap_err();
        assert!(matches!(err, CodecError::DecodeSizeMismatch { expected: 1001, actual: 1000 }));
    }

    #[test]
    fn lz4_garbage_fails_cleanly() {
        let err = Lz4BlockCodec.decode(&[0xF0, 0xFF, 0xFF], 64).unwrap_err();
        assert!(matches!(err, CodecError::Decompression(_)));
    }
}
