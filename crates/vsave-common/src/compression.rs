// compression.rs -- raw deflate for package entries and legacy blobs
//
// Entries use raw deflate (no zlib header). The expected decompressed size is
// always stored next to the data, so decompression can pre-allocate and
// reject both short output and decompression bombs.

use flate2::read::{DeflateDecoder, DeflateEncoder};
use flate2::Compression;
use std::io::Read;

use crate::error::{SaveError, SaveResult};

/// Largest decompressed entry or blob the loader will accept (64 MiB).
pub const MAX_DECOMPRESS_SIZE: usize = 64 * 1024 * 1024;

/// Highest deflate level accepted by `save_compression_level`.
pub const MAX_COMPRESSION_LEVEL: u32 = 9;

/// Compress `data` with raw deflate at `level` (clamped to 1..=9).
pub fn compress_data(data: &[u8], level: u32) -> SaveResult<Vec<u8>> {
    let level = level.clamp(1, MAX_COMPRESSION_LEVEL);
    let mut encoder = DeflateEncoder::new(data, Compression::new(level));
    let mut compressed = Vec::with_capacity(data.len() / 2 + 16);

    encoder.read_to_end(&mut compressed)?;
    Ok(compressed)
}

/// Compress `data` if `level` is non-zero and deflate actually shrinks it.
///
/// Returns `Some(compressed)` when the compressed form should be stored,
/// `None` when the entry is better stored as-is.
pub fn compress_if_smaller(data: &[u8], level: u32) -> SaveResult<Option<Vec<u8>>> {
    if level == 0 || data.is_empty() {
        return Ok(None);
    }
    let compressed = compress_data(data, level)?;
    if compressed.len() < data.len() {
        Ok(Some(compressed))
    } else {
        Ok(None)
    }
}

/// Decompress raw deflate data with a known uncompressed size.
pub fn decompress_with_size(data: &[u8], uncompressed_size: usize) -> SaveResult<Vec<u8>> {
    if uncompressed_size > MAX_DECOMPRESS_SIZE {
        return Err(SaveError::Decompress(format!(
            "uncompressed size {} exceeds maximum {}",
            uncompressed_size, MAX_DECOMPRESS_SIZE
        )));
    }

    // Read one byte past the expected size so overlong output is caught
    let decoder = DeflateDecoder::new(data);
    let mut decompressed = Vec::with_capacity(uncompressed_size);
    decoder
        .take(uncompressed_size as u64 + 1)
        .read_to_end(&mut decompressed)
        .map_err(|e| SaveError::Decompress(e.to_string()))?;

    if decompressed.len() != uncompressed_size {
        return Err(SaveError::Decompress(format!(
            "size mismatch: expected {}, got {}",
            uncompressed_size,
            decompressed.len()
        )));
    }

    Ok(decompressed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_decompress_roundtrip() {
        let original = b"Thinker Thinker Thinker Thinker Thinker Thinker Thinker \
            Thinker Thinker Thinker Thinker Thinker Thinker Thinker Thinker";
        let compressed = compress_data(original, 6).unwrap();
        let decompressed = decompress_with_size(&compressed, original.len()).unwrap();
        assert_eq!(original.as_slice(), decompressed.as_slice());
    }

    #[test]
    fn test_level_zero_stores_raw() {
        let data = vec![7u8; 4096];
        assert!(compress_if_smaller(&data, 0).unwrap().is_none());
        assert!(compress_if_smaller(&data, 1).unwrap().is_some());
    }

    #[test]
    fn test_tiny_data_not_compressed() {
        assert!(compress_if_smaller(b"ab", 9).unwrap().is_none());
        assert!(compress_if_smaller(b"", 9).unwrap().is_none());
    }

    #[test]
    fn test_size_mismatch_rejected() {
        let original = vec![0u8; 10000];
        let compressed = compress_data(&original, 6).unwrap();
        assert!(matches!(
            decompress_with_size(&compressed, 100),
            Err(SaveError::Decompress(_))
        ));
        assert!(matches!(
            decompress_with_size(&compressed, 20000),
            Err(SaveError::Decompress(_))
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        let garbage = [0xffu8, 0xfe, 0x00, 0x13, 0x37];
        assert!(decompress_with_size(&garbage, 64).is_err());
    }

    #[test]
    fn test_bomb_limit() {
        assert!(decompress_with_size(&[], MAX_DECOMPRESS_SIZE + 1).is_err());
    }
}
