//! This module provides a set of shared, low-level utility functions used
//! throughout the pointcloud core: byte-order swapping of fixed-width element
//! buffers and typed reads of unaligned elements.

use bytemuck::Pod;

//==================================================================================
// 1. Core Utility Functions
//==================================================================================

/// Reverses the byte order of every `element_size`-wide element in `bytes`, in place.
///
/// Trailing bytes that do not form a whole element are left untouched; callers
/// validate lengths before swapping.
pub fn swap_elements_in_place(bytes: &mut [u8], element_size: usize) {
    if element_size <= 1 {
        return;
    }
    for chunk in bytes.chunks_exact_mut(element_size) {
        chunk.reverse();
    }
}

/// Reads a slice of native-order elements into an owned, properly aligned `Vec<T>`.
///
/// Column buffers are plain `Vec<u8>` and carry no alignment guarantee, so this
/// copies through `pod_read_unaligned` instead of casting in place.
pub fn read_unaligned_vec<T: Pod>(bytes: &[u8]) -> Vec<T> {
    bytes
        .chunks_exact(std::mem::size_of::<T>())
        .map(bytemuck::pod_read_unaligned::<T>)
        .collect()
}

/// Converts a slice of primitive values into a `Vec<u8>` in native byte order.
#[cfg(test)]
pub fn typed_slice_to_bytes<T: Pod>(data: &[T]) -> Vec<u8> {
    bytemuck::cast_slice(data).to_vec()
}
