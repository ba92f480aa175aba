//! This module contains the pure, stateless kernels for common-bit removal
//! ("significant bits") of fixed-width elements.
//!
//! When every element of a buffer shares its leading bits, only the remaining low
//! bits need to be stored. The payload layout is:
//!
//! ```text
//! [common_bit_count: element] [common_value: element] [unique bits, MSB-first]
//! ```
//!
//! Both header words are element-width unsigned integers in machine order. The
//! unique bits of each element are appended to a contiguous bit stream, most
//! significant bit first, padded with zeros to a byte boundary. Elements are
//! handled as the unsigned integer of the same width, so floats go through their
//! bit pattern.

use bitvec::prelude::*;
use bytemuck::Pod;
use num_traits::{PrimInt, Unsigned};

use crate::error::PointCloudError;
use crate::utils::read_unaligned_vec;

//==================================================================================
// 1. Generic Core Logic
//==================================================================================

fn width<T>() -> u32 {
    (std::mem::size_of::<T>() * 8) as u32
}

/// Mask selecting the `count` most significant bits of `T`.
fn high_mask<T: PrimInt + Unsigned>(count: u32) -> T {
    if count == 0 {
        T::zero()
    } else if count >= width::<T>() {
        !T::zero()
    } else {
        !(!T::zero() >> count as usize)
    }
}

/// Returns the number of leading bits shared by every value and the value of those
/// bits (low bits cleared).
///
/// An empty slice or a slice of identical values shares all of its bits.
pub fn common_bits<T: PrimInt + Unsigned>(values: &[T]) -> (u32, T) {
    if values.is_empty() {
        return (width::<T>(), T::zero());
    }
    let mut and_all = !T::zero();
    let mut or_all = T::zero();
    for &value in values {
        and_all = and_all & value;
        or_all = or_all | value;
    }
    let count = (and_all ^ or_all).leading_zeros();
    (count, and_all & high_mask::<T>(count))
}

fn encode_slice<T>(input: &[T], output_buf: &mut Vec<u8>)
where
    T: PrimInt + Unsigned + Pod,
{
    let (count, common) = common_bits(input);
    let count_word: T = num_traits::cast(count).unwrap_or_else(T::zero);
    output_buf.extend_from_slice(bytemuck::bytes_of(&count_word));
    output_buf.extend_from_slice(bytemuck::bytes_of(&common));

    let unique = (width::<T>() - count) as usize;
    if unique == 0 || input.is_empty() {
        return;
    }

    let mut bit_vec = BitVec::<u8, Msb0>::with_capacity(input.len() * unique);
    for &value in input {
        let value_u64 = value.to_u64().unwrap_or(0);
        bit_vec.extend_from_bitslice(&value_u64.view_bits::<Msb0>()[64 - unique..]);
    }
    bit_vec.set_uninitialized(false);
    output_buf.extend_from_slice(bit_vec.as_raw_slice());
}

fn decode_slice<T>(
    input_bytes: &[u8],
    output_buf: &mut Vec<u8>,
    num_values: usize,
) -> Result<(), PointCloudError>
where
    T: PrimInt + Unsigned + Pod,
{
    let size = std::mem::size_of::<T>();
    if input_bytes.len() < 2 * size {
        return Err(PointCloudError::SigbitsDecodeError(format!(
            "payload of {} bytes cannot hold the {} byte header",
            input_bytes.len(),
            2 * size
        )));
    }
    let count_word: T = bytemuck::pod_read_unaligned(&input_bytes[..size]);
    let common: T = bytemuck::pod_read_unaligned(&input_bytes[size..2 * size]);
    let count = count_word
        .to_u32()
        .filter(|&count| count <= width::<T>())
        .ok_or_else(|| {
            PointCloudError::SigbitsDecodeError(format!(
                "common bit count exceeds the element width of {} bits",
                width::<T>()
            ))
        })?;

    let unique = (width::<T>() - count) as usize;
    let body = &input_bytes[2 * size..];
    let needed = num_values.saturating_mul(unique).div_ceil(8);
    if body.len() < needed {
        return Err(PointCloudError::SigbitsDecodeError(format!(
            "bit stream of {} bytes is shorter than the {} bytes needed",
            body.len(),
            needed
        )));
    }

    // With no unique bits the payload does not bound `num_values`, so the
    // reservation must be allowed to fail.
    output_buf
        .try_reserve_exact(num_values.saturating_mul(size))
        .map_err(|e| {
            PointCloudError::SigbitsDecodeError(format!(
                "cannot hold {} elements of {} bytes: {}",
                num_values, size, e
            ))
        })?;
    if unique == 0 {
        for _ in 0..num_values {
            output_buf.extend_from_slice(bytemuck::bytes_of(&common));
        }
        return Ok(());
    }

    let bits = BitSlice::<u8, Msb0>::from_slice(body);
    for chunk in bits.chunks(unique).take(num_values) {
        let mut container = 0u64;
        for bit in chunk.iter().by_vals() {
            container = (container << 1) | bit as u64;
        }
        let low: T = num_traits::cast(container).ok_or_else(|| {
            PointCloudError::SigbitsDecodeError("unique bits overflow the element".to_string())
        })?;
        output_buf.extend_from_slice(bytemuck::bytes_of(&(common | low)));
    }
    Ok(())
}

//==================================================================================
// 2. Public API
//==================================================================================

fn unsupported_width(element_size: usize) -> PointCloudError {
    PointCloudError::UnsupportedConversion(format!(
        "sigbits needs a 1, 2, 4 or 8 byte element, got {}",
        element_size
    ))
}

/// Counts the leading bits shared by every element of a raw buffer.
pub fn common_bit_count(input_bytes: &[u8], element_size: usize) -> Result<u32, PointCloudError> {
    Ok(match element_size {
        1 => common_bits(&read_unaligned_vec::<u8>(input_bytes)).0,
        2 => common_bits(&read_unaligned_vec::<u16>(input_bytes)).0,
        4 => common_bits(&read_unaligned_vec::<u32>(input_bytes)).0,
        8 => common_bits(&read_unaligned_vec::<u64>(input_bytes)).0,
        other => return Err(unsupported_width(other)),
    })
}

/// Encodes a raw element buffer into a sigbits payload.
pub fn encode(
    input_bytes: &[u8],
    element_size: usize,
    output_buf: &mut Vec<u8>,
) -> Result<(), PointCloudError> {
    output_buf.clear();
    match element_size {
        1 => encode_slice(&read_unaligned_vec::<u8>(input_bytes), output_buf),
        2 => encode_slice(&read_unaligned_vec::<u16>(input_bytes), output_buf),
        4 => encode_slice(&read_unaligned_vec::<u32>(input_bytes), output_buf),
        8 => encode_slice(&read_unaligned_vec::<u64>(input_bytes), output_buf),
        other => return Err(unsupported_width(other)),
    }
    Ok(())
}

/// Decodes a sigbits payload into `num_values` raw elements.
pub fn decode(
    input_bytes: &[u8],
    element_size: usize,
    num_values: usize,
    output_buf: &mut Vec<u8>,
) -> Result<(), PointCloudError> {
    output_buf.clear();
    match element_size {
        1 => decode_slice::<u8>(input_bytes, output_buf, num_values),
        2 => decode_slice::<u16>(input_bytes, output_buf, num_values),
        4 => decode_slice::<u32>(input_bytes, output_buf, num_values),
        8 => decode_slice::<u64>(input_bytes, output_buf, num_values),
        other => Err(unsupported_width(other)),
    }
}

/// Byte-swaps the two header words in place. The bit stream is byte-order free.
pub fn flip_endian(payload: &mut [u8], element_size: usize) {
    if element_size <= 1 || payload.len() < 2 * element_size {
        return;
    }
    payload[..element_size].reverse();
    payload[element_size..2 * element_size].reverse();
}

//==================================================================================
// 3. Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::typed_slice_to_bytes;
    use rand::Rng;

    #[test]
    fn test_common_bits_known_values() {
        let (count, common) = common_bits(&[0b1010_0001u8, 0b1010_0110, 0b1010_1111]);
        assert_eq!(count, 4);
        assert_eq!(common, 0b1010_0000);

        assert_eq!(common_bits(&[42u16, 42, 42]), (16, 42));
        assert_eq!(common_bits::<u32>(&[]), (32, 0));
        assert_eq!(common_bits(&[0u8, 0xff]).0, 0);
    }

    #[test]
    fn test_payload_layout_u16() {
        let values: Vec<u16> = vec![0x0f01, 0x0f02, 0x0f03];
        let bytes = typed_slice_to_bytes(&values);
        let mut encoded = Vec::new();
        encode(&bytes, 2, &mut encoded).unwrap();

        // 14 common bits leave 2 unique bits per value: 01 10 11 -> 0b0110_1100.
        let count: u16 = bytemuck::pod_read_unaligned(&encoded[0..2]);
        let common: u16 = bytemuck::pod_read_unaligned(&encoded[2..4]);
        assert_eq!(count, 14);
        assert_eq!(common, 0x0f00);
        assert_eq!(&encoded[4..], &[0b0110_1100]);

        let mut decoded = Vec::new();
        decode(&encoded, 2, values.len(), &mut decoded).unwrap();
        assert_eq!(decoded, bytes);
    }

    #[test]
    fn test_constant_column_has_header_only() {
        let bytes = typed_slice_to_bytes(&[9u32; 50]);
        let mut encoded = Vec::new();
        encode(&bytes, 4, &mut encoded).unwrap();
        assert_eq!(encoded.len(), 8);
        assert_eq!(common_bit_count(&bytes, 4).unwrap(), 32);

        let mut decoded = Vec::new();
        decode(&encoded, 4, 50, &mut decoded).unwrap();
        assert_eq!(decoded, bytes);
    }

    #[test]
    fn test_random_u64_and_float_patterns_roundtrip() {
        let mut rng = rand::rng();
        let base: u64 = 0x7ff0_0000_0000_0000;
        let values: Vec<u64> = (0..257).map(|_| base | rng.random_range(0..1u64 << 20)).collect();
        let bytes = typed_slice_to_bytes(&values);
        let mut encoded = Vec::new();
        encode(&bytes, 8, &mut encoded).unwrap();
        assert!(encoded.len() < bytes.len());
        let mut decoded = Vec::new();
        decode(&encoded, 8, values.len(), &mut decoded).unwrap();
        assert_eq!(decoded, bytes);

        let floats: Vec<f32> = (0..33).map(|i| 100.0 + i as f32 * 0.25).collect();
        let bytes = typed_slice_to_bytes(&floats);
        encode(&bytes, 4, &mut encoded).unwrap();
        decode(&encoded, 4, floats.len(), &mut decoded).unwrap();
        assert_eq!(decoded, bytes);
    }

    #[test]
    fn test_truncated_payloads_fail() {
        let bytes = typed_slice_to_bytes(&[1u16, 200, 3000]);
        let mut encoded = Vec::new();
        encode(&bytes, 2, &mut encoded).unwrap();
        encoded.pop();
        let mut decoded = Vec::new();
        assert!(matches!(
            decode(&encoded, 2, 3, &mut decoded),
            Err(PointCloudError::SigbitsDecodeError(_))
        ));
        assert!(matches!(
            decode(&[1], 2, 0, &mut decoded),
            Err(PointCloudError::SigbitsDecodeError(_))
        ));
    }

    #[test]
    fn test_header_only_payload_with_absurd_count_fails() {
        let mut encoded = Vec::new();
        encode(&typed_slice_to_bytes(&[5u64, 5]), 8, &mut encoded).unwrap();
        assert_eq!(encoded.len(), 16);
        let mut decoded = Vec::new();
        assert!(matches!(
            decode(&encoded, 8, usize::MAX / 2, &mut decoded),
            Err(PointCloudError::SigbitsDecodeError(_))
        ));
    }

    #[test]
    fn test_flip_endian_touches_header_only() {
        let mut payload = vec![0x00, 0x0e, 0x0f, 0x00, 0xab];
        flip_endian(&mut payload, 2);
        assert_eq!(payload, vec![0x0e, 0x00, 0x00, 0x0f, 0xab]);
    }
}
