//! This module contains the pure, stateless kernels for zlib ("deflate") compression
//! of column payloads. It is a panic-free wrapper around `flate2`.

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression as ZlibLevel;
use std::io::{Read, Write};

use crate::error::PointCloudError;

/// Upper bound on the output buffer reserved before inflating. The expected length
/// comes from the wire and is only trusted once the stream has produced it.
const MAX_PREALLOC: usize = 1 << 20;

//==================================================================================
// 1. Public API
//==================================================================================

/// Compresses `input_bytes` into a complete zlib stream.
pub fn encode(input_bytes: &[u8], level: u32) -> Result<Vec<u8>, PointCloudError> {
    let mut encoder = ZlibEncoder::new(
        Vec::with_capacity(input_bytes.len() / 2 + 16),
        ZlibLevel::new(level.min(9)),
    );
    encoder
        .write_all(input_bytes)
        .map_err(|e| PointCloudError::DeflateError(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| PointCloudError::DeflateError(e.to_string()))
}

/// Inflates a zlib stream and checks it yields exactly `expected_len` bytes.
///
/// Inflation stops one byte past `expected_len`, so an oversized stream is
/// rejected without being expanded in full.
pub fn decode(input_bytes: &[u8], expected_len: usize) -> Result<Vec<u8>, PointCloudError> {
    let limit = (expected_len as u64).saturating_add(1);
    let mut decoder = ZlibDecoder::new(input_bytes).take(limit);
    let mut output = Vec::with_capacity(expected_len.min(MAX_PREALLOC));
    decoder
        .read_to_end(&mut output)
        .map_err(|e| PointCloudError::DeflateError(e.to_string()))?;

    if output.len() != expected_len {
        return Err(PointCloudError::DeflateError(format!(
            "inflated size does not match the column. Expected {}, got {}.",
            expected_len,
            output.len()
        )));
    }
    Ok(output)
}

//==================================================================================
// 2. Unit Tests
//==================================================================================
