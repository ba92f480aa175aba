//! This module contains the pure, stateless kernels for Zstandard compression and
//! decompression. The bundled opaque patch codec stores its row buffers through it.
//!
//! Frames are prefixed with the uncompressed length as a little-endian `u64`, which
//! the decoder checks against the length the caller expects.

use std::io::Read;

use crate::error::PointCloudError;

const LEN_HEADER: usize = 8;

//==================================================================================
// 1. Public API
//==================================================================================

/// Compresses `input_bytes` into a length-prefixed zstd frame.
pub fn encode(input_bytes: &[u8], level: i32) -> Result<Vec<u8>, PointCloudError> {
    let mut output_buf = Vec::with_capacity(input_bytes.len() / 2 + LEN_HEADER);
    output_buf.extend_from_slice(&(input_bytes.len() as u64).to_le_bytes());

    let mut encoder = zstd::stream::Encoder::new(&mut output_buf, level)
        .map_err(|e| PointCloudError::ZstdError(e.to_string()))?;
    std::io::Write::write_all(&mut encoder, input_bytes)
        .map_err(|e| PointCloudError::ZstdError(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| PointCloudError::ZstdError(e.to_string()))?;

    Ok(output_buf)
}

/// Decompresses a length-prefixed zstd frame that must hold `expected_len` bytes.
///
/// The header is checked against `expected_len` before decoding, and the stream is
/// read without pre-allocating from either length.
pub fn decode(input_bytes: &[u8], expected_len: usize) -> Result<Vec<u8>, PointCloudError> {
    if input_bytes.len() < LEN_HEADER {
        return Err(PointCloudError::ZstdError(
            "Input stream too short to contain size header.".to_string(),
        ));
    }
    let mut len_bytes = [0u8; LEN_HEADER];
    len_bytes.copy_from_slice(&input_bytes[..LEN_HEADER]);
    let header_len = u64::from_le_bytes(len_bytes);
    if header_len != expected_len as u64 {
        return Err(PointCloudError::ZstdError(format!(
            "Size header says {} bytes, expected {}.",
            header_len, expected_len
        )));
    }

    let decoder = zstd::stream::read::Decoder::new(&input_bytes[LEN_HEADER..])
        .map_err(|e| PointCloudError::ZstdError(e.to_string()))?;
    let mut decompressed = Vec::new();
    decoder
        .take(header_len.saturating_add(1))
        .read_to_end(&mut decompressed)
        .map_err(|e| PointCloudError::ZstdError(e.to_string()))?;

    if decompressed.len() != expected_len {
        return Err(PointCloudError::ZstdError(format!(
            "Decompressed size does not match header. Expected {}, got {}.",
            expected_len,
            decompressed.len()
        )));
    }
    Ok(decompressed)
}

//==================================================================================
// 2. Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zstd_roundtrip_highly_compressible_data() {
        let original = vec![42u8; 10_000];
        let compressed = encode(&original, 5).unwrap();
        assert!(compressed.len() < 50);
        assert_eq!(decode(&compressed, original.len()).unwrap(), original);
    }

    #[test]
    fn test_zstd_empty_roundtrip() {
        let compressed = encode(&[], 3).unwrap();
        assert!(decode(&compressed, 0).unwrap().is_empty());
    }

    #[test]
    fn test_zstd_decompress_invalid_data() {
        let result = decode(&[1, 2, 3, 4, 5], 5);
        assert!(matches!(result, Err(PointCloudError::ZstdError(_))));
    }

    #[test]
    fn test_zstd_rejects_untrusted_size_header() {
        let mut forged = u64::MAX.to_le_bytes().to_vec();
        forged.extend_from_slice(&[0, 0, 0, 0]);
        assert!(matches!(decode(&forged, 4), Err(PointCloudError::ZstdError(_))));

        let compressed = encode(&[7u8; 64], 3).unwrap();
        assert!(matches!(
            decode(&compressed, 32),
            Err(PointCloudError::ZstdError(_))
        ));
    }
}
