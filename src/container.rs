//! Whole-buffer DVPL encode / decode / verify.
//!
//! ```
//! let raw = b"hello, dava".to_vec();
//! let packed = dvpl::compress(&raw)?;
//! dvpl::verify(&packed)?;
//! assert_eq!(dvpl::decompress(&packed)?, raw);
//! # Ok::<(), dvpl::CodecError>(())
//! ```
//!
//! Decoding checks, in order: footer magic, payload length against
//! `compressed_size`, CRC32 of the stored payload, then the type tag. LZ4
//! only sees payloads that passed all of those.

use std::borrow::Cow;
use crc32fast::Hasher;

use crate::codec::{get_codec, CodecError, CompressionType};
use crate::footer::Footer;

/// Pack `raw` into an LZ4 DVPL container.
pub fn compress(raw: &[u8]) -> Result<Vec<u8>, CodecError> {
    let original_size = footer_field(raw.len())?;
    let mut out = get_codec(CompressionType::Lz4).encode(raw)?;
    let compressed_size = footer_field(out.len())?;
    let footer = Footer::new(original_size, compressed_size, checksum(&out), CompressionType::Lz4);
    out.extend_from_slice(&footer.encode());
    Ok(out)
}

/// Unpack a DVPL container into its original bytes.
pub fn decompress(container: &[u8]) -> Result<Vec<u8>, CodecError> {
    decode(container).map(Cow::into_owned)
}

/// Run every check [`decompress`] runs, including the LZ4 decode, and drop
/// the output.
pub fn verify(container: &[u8]) -> Result<(), CodecError> {
    decode(container).map(drop)
}

/// Return the footer once magic, size and checksum hold. The payload is not
/// decoded.
pub fn inspect(container: &[u8]) -> Result<Footer, CodecError> {
    checked_payload(container).map(|(_, footer)| footer)
}

fn decode(container: &[u8]) -> Result<Cow<'_, [u8]>, CodecError> {
    let (payload, footer) = checked_payload(container)?;
    let kind = footer
        .compression_type()
        .ok_or(CodecError::UnknownFormat(footer.kind))?;
    get_codec(kind).decode(payload, footer.original_size)
}

fn checked_payload(container: &[u8]) -> Result<(&[u8], Footer), CodecError> {
    let (payload, footer) = Footer::split(container)?;
    if payload.len() != footer.compressed_size as usize {
        return Err(CodecError::SizeMismatch {
            expected: footer.compressed_size,
            actual:   payload.len(),
        });
    }
    let actual = checksum(payload);
    if actual != footer.crc32 {
        return Err(CodecError::ChecksumMismatch { expected: footer.crc32, actual });
    }
    Ok((payload, footer))
}

fn checksum(bytes: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(bytes);
    hasher.finalize()
}

fn footer_field(len: usize) -> Result<u32, CodecError> {
    u32::try_from(len).map_err(|_| CodecError::TooLarge(len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::footer::FOOTER_SIZE;

    fn stored_container(payload: &[u8], original_size: u32) -> Vec<u8> {
        let footer = Footer::new(original_size, payload.len() as u32, checksum(payload), CompressionType::Stored);
        let mut out = payload.to_vec();
        out.extend_from_slice(&footer.encode());
        out
    }

    #[test]
    fn roundtrip_text() {
        let raw = b"Hello, DVPL! Hello, DVPL! Hello, DVPL!";
        let packed = compress(raw).unwrap();
        assert_eq!(&packed[packed.len() - 4..], b"DVPL");
        assert_eq!(decompress(&packed).unwrap(), raw);
        verify(&packed).unwrap();
    }

    #[test]
    fn roundtrip_empty() {
        let packed = compress(&[]).unwrap();
        let footer = inspect(&packed).unwrap();
        assert_eq!(footer.original_size, 0);
        assert_eq!(packed.len(), footer.compressed_size as usize + FOOTER_SIZE);
        assert!(decompress(&packed).unwrap().is_empty());
    }

    #[test]
    fn encoder_always_writes_lz4_tag() {
        // Random-looking bytes expand under LZ4; the tag must still be 2.
        let raw: Vec<u8> = (0u32..512).map(|i| (i.wrapping_mul(2654435761) >> 13) as u8).collect();
        let footer = inspect(&compress(&raw).unwrap()).unwrap();
        assert_eq!(footer.compression_type(), Some(CompressionType::Lz4));
        assert_eq!(footer.original_size, 512);
    }

    #[test]
    fn footer_fields_describe_payload() {
        let raw = vec![b'z'; 4096];
        let packed = compress(&raw).unwrap();
        let footer = Footer::decode(&packed).unwrap();
        let payload = &packed[..packed.len() - FOOTER_SIZE];
        assert_eq!(footer.original_size, 4096);
        assert_eq!(footer.compressed_size as usize, payload.len());
        assert_eq!(footer.crc32, crc32fast::hash(payload));
    }

    #[test]
    fn tampered_payload_is_checksum_mismatch() {
        let mut packed = compress(b"some asset payload that is long enough").unwrap();
        packed[0] ^= 0x01;
        assert!(matches!(decompress(&packed), Err(CodecError::ChecksumMismatch { .. })));
        assert!(matches!(verify(&packed), Err(CodecError::ChecksumMismatch { .. })));
    }

    #[test]
    fn extra_payload_byte_is_size_mismatch() {
        let packed = compress(b"payload").unwrap();
        let split = packed.len() - FOOTER_SIZE;
        let mut grown = packed[..split].to_vec();
        grown.push(0);
        grown.extend_from_slice(&packed[split..]);
        let err = decompress(&grown).unwrap_err();
        assert!(matches!(err, CodecError::SizeMismatch { actual, .. } if actual == split + 1));
    }

    #[test]
    fn size_is_checked_before_checksum() {
        // Both the size and the CRC are wrong; size must win.
        let mut packed = compress(b"payload").unwrap();
        let n = packed.len();
        packed[n - 16] = packed[n - 16].wrapping_add(1);
        packed[0] ^= 0xFF;
        assert!(matches!(decompress(&packed), Err(CodecError::SizeMismatch { .. })));
    }

    #[test]
    fn truncated_container_is_invalid_footer() {
        let packed = compress(b"payload").unwrap();
        assert!(matches!(decompress(&packed[..FOOTER_SIZE - 1]), Err(CodecError::InvalidFooter)));
        assert!(matches!(decompress(&packed[..packed.len() - 1]), Err(CodecError::InvalidFooter)));
    }

    #[test]
    fn stored_type_passes_through() {
        let container = stored_container(b"plain bytes", 11);
        assert_eq!(decompress(&container).unwrap(), b"plain bytes");
    }

    #[test]
    fn stored_type_with_size_disagreement() {
        let container = stored_container(b"plain bytes", 12);
        assert!(matches!(decompress(&container), Err(CodecError::TypeSizeMismatch { .. })));
    }

    #[test]
    fn unknown_type_tag() {
        let payload = b"abc";
        let mut container = payload.to_vec();
        let mut footer = Footer::new(3, 3, checksum(payload), CompressionType::Stored);
        footer.kind = 1;
        container.extend_from_slice(&footer.encode());
        assert!(matches!(decompress(&container), Err(CodecError::UnknownFormat(1))));
    }

    #[test]
    fn overstated_original_size_is_decode_mismatch() {
        let packed = compress(&[5u8; 300]).unwrap();
        let (payload, mut footer) = Footer::split(&packed).unwrap();
        footer.original_size = 301;
        let mut forged = payload.to_vec();
        forged.extend_from_slice(&footer.encode());
        assert!(matches!(
            decompress(&forged),
            Err(CodecError::DecodeSizeMismatch { expected: 301, actual: 300 })
        ));
        // inspect does not decode, so it still accepts the container.
        assert_eq!(inspect(&forged).unwrap().original_size, 301);
    }
}
