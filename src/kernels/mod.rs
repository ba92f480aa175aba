//! Pure, stateless compression kernels for column buffers.
//!
//! Every kernel works on raw element bytes in machine order and knows nothing about
//! schemas or patches. The column codec picks the kernel from the buffer's
//! compression tag.

pub mod deflate;
pub mod rle;
pub mod sigbits;
pub mod zstd;
