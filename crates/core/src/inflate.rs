//! zlib decompression of sized blobs at known offsets.

use std::io::Read;

use flate2::read::ZlibDecoder;

use crate::error::{Result, RptError};

/// Decompress `compressed_size` bytes at `offset` in `data`.
///
/// The blob must inflate to exactly `uncompressed_size` bytes; a short or
/// long result means the table entry and the payload disagree and the whole
/// run is reported as a decompression failure.
pub fn inflate_at(
    data: &[u8],
    offset: usize,
    compressed_size: usize,
    uncompressed_size: usize,
) -> Result<Vec<u8>> {
    let end = offset
        .checked_add(compressed_size)
        .ok_or_else(|| RptError::Read(format!("compressed blob offset overflow at {offset:#x}")))?;
    let blob = data.get(offset..end).ok_or_else(|| {
        RptError::Read(format!(
            "compressed blob at {offset:#x}+{compressed_size} extends past end of file"
        ))
    })?;

    let mut decoder = ZlibDecoder::new(blob);
    // Capacity hint only; a hostile size field must not pre-allocate.
    let mut out = Vec::with_capacity(uncompressed_size.min(1 << 24));
    decoder
        .read_to_end(&mut out)
        .map_err(|e| RptError::Decompression(format!("zlib error at {offset:#x}: {e}")))?;

    if out.len() != uncompressed_size {
        return Err(RptError::Decompression(format!(
            "blob at {offset:#x} inflated to {} bytes, expected {uncompressed_size}",
            out.len()
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use std::io::Write;

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn test_roundtrip_at_offset() {
        let payload = b"line one\r\nline two\r\n";
        let compressed = deflate(payload);
        let mut file = vec![0u8; 16];
        file.extend_from_slice(&compressed);
        let out = inflate_at(&file, 16, compressed.len(), payload.len()).unwrap();
        assert_eq!(out, payload);
    }

    #[test]
    fn test_size_mismatch_is_decompression_error() {
        let compressed = deflate(b"hello");
        let err = inflate_at(&compressed, 0, compressed.len(), 99).unwrap_err();
        assert!(matches!(err, RptError::Decompression(_)));
    }

    #[test]
    fn test_garbage_is_decompression_error() {
        let err = inflate_at(&[0u8; 32], 0, 32, 10).unwrap_err();
        assert!(matches!(err, RptError::Decompression(_)));
    }

    #[test]
    fn test_out_of_bounds_is_read_error() {
        let err = inflate_at(&[0u8; 4], 2, 10, 10).unwrap_err();
        assert!(matches!(err, RptError::Read(_)));
    }
}
