//! This module defines the core, strongly-typed data representations shared by
//! schemas, points, column buffers and patches.
//!
//! It currently includes the canonical `Interpretation` enum (the stored element
//! type of a dimension) and the `Compression` enum (the patch representation a
//! schema asks new patches to be stored in).

pub mod interpretation;

// Re-export the main type(s) for easier access.
pub use interpretation::{Compression, Interpretation};
