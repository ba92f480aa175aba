//! This module contains the pure, stateless kernels for run-length encoding
//! fixed-width elements.
//!
//! The payload is a sequence of `(count: u8, value: element)` pairs. Elements are
//! compared by their raw bytes, so floats are run-length encoded by bit pattern and
//! `-0.0` never merges with `0.0`. Runs longer than 255 are split.

use crate::error::PointCloudError;
use crate::utils::swap_elements_in_place;

/// The largest run a single pair can describe.
const MAX_RUN: usize = u8::MAX as usize;

//==================================================================================
// 1. Core Logic
//==================================================================================

/// Counts the maximal runs of bitwise-equal elements.
pub fn run_count(input_bytes: &[u8], element_size: usize) -> usize {
    let mut elements = input_bytes.chunks_exact(element_size);
    let Some(mut previous) = elements.next() else {
        return 0;
    };
    let mut runs = 1;
    for element in elements {
        if element != previous {
            runs += 1;
            previous = element;
        }
    }
    runs
}

//==================================================================================
// 2. Public API
//==================================================================================

/// Run-length encodes `input_bytes` into `output_buf`.
pub fn encode(input_bytes: &[u8], element_size: usize, output_buf: &mut Vec<u8>) {
    output_buf.clear();
    let mut elements = input_bytes.chunks_exact(element_size);
    let Some(mut current) = elements.next() else {
        return;
    };
    let mut run = 1usize;
    for element in elements {
        if element == current && run < MAX_RUN {
            run += 1;
            continue;
        }
        output_buf.push(run as u8);
        output_buf.extend_from_slice(current);
        current = element;
        run = 1;
    }
    output_buf.push(run as u8);
    output_buf.extend_from_slice(current);
}

/// Expands an RLE payload, checking that it yields exactly `num_values` elements.
///
/// The run counts are summed and checked before any output is reserved.
pub fn decode(
    input_bytes: &[u8],
    element_size: usize,
    num_values: usize,
    output_buf: &mut Vec<u8>,
) -> Result<(), PointCloudError> {
    output_buf.clear();

    let pair_size = element_size + 1;
    if input_bytes.len() % pair_size != 0 {
        return Err(PointCloudError::RleDecodeError(format!(
            "payload of {} bytes is not a whole number of {} byte pairs",
            input_bytes.len(),
            pair_size
        )));
    }

    let mut produced = 0usize;
    for pair in input_bytes.chunks_exact(pair_size) {
        if pair[0] == 0 {
            return Err(PointCloudError::RleDecodeError(
                "zero length run".to_string(),
            ));
        }
        produced += pair[0] as usize;
    }
    if produced != num_values {
        return Err(PointCloudError::RleDecodeError(format!(
            "runs expand to {} elements, expected {}",
            produced, num_values
        )));
    }

    output_buf.reserve(num_values * element_size);
    for pair in input_bytes.chunks_exact(pair_size) {
        let value = &pair[1..];
        for _ in 0..pair[0] {
            output_buf.extend_from_slice(value);
        }
    }
    Ok(())
}

/// Byte-swaps the value of every pair in place. Counts are single bytes.
pub fn flip_endian(payload: &mut [u8], element_size: usize) {
    for pair in payload.chunks_exact_mut(element_size + 1) {
        swap_elements_in_place(&mut pair[1..], element_size);
    }
}

//==================================================================================
// 3. Unit Tests
//==================================================================================
