//! This file is the root of the `pointcloud` Rust crate.
//!
//! Its responsibilities are strictly limited to:
//! 1.  Declaring all the top-level modules of the library (`schema`, `patch`,
//!     `kernels`, etc.) so the Rust compiler knows they exist.
//! 2.  Re-exporting the types an application needs to load schemas, build and
//!     convert patches and move them over the wire.

//==================================================================================
// 0. Constants
//==================================================================================
/// The crate version, automatically set from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//==================================================================================
// 1. Module Declarations
//==================================================================================
#[macro_use]
mod observability; // Make macros available throughout the crate

pub mod column;
pub mod config;
pub mod dimstats;
pub mod error;
pub mod kernels;
pub mod patch;
pub mod point;
pub mod schema;
pub mod traits;
pub mod types;
pub mod wire;

mod utils;

#[doc(hidden)]
pub use log as __log;

//==================================================================================
// 2. Public API
//==================================================================================
pub use column::{ColumnBuffer, ColumnCompression};
pub use config::{EngineConfig, EngineContext};
pub use dimstats::{DimStat, DimStats};
pub use error::PointCloudError;
pub use observability::enable_verbose_logging;
pub use patch::{
    Bounds, DimensionalPatch, OpaquePatch, Patch, PatchStats, StatKind, UncompressedPatch,
    ZstdOpaqueCodec,
};
pub use point::{Point, PointList};
pub use schema::{Dimension, Schema, SchemaRef};
pub use traits::OpaqueCodec;
pub use types::{Compression, Interpretation};
pub use wire::{peek_pcid, Endian};
