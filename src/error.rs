// In: src/error.rs

//! This module defines the single, unified error type for the entire pointcloud library.
//! It uses the `thiserror` crate to provide ergonomic, context-aware error handling.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PointCloudError {
    // =========================================================================
    // === High-Level, Semantic Errors (Specific to our library's logic)
    // =========================================================================
    #[error("Schema document could not be parsed: {0}")]
    SchemaParseError(String),

    #[error("Wire data schema id ({wire}) does not match schema id ({schema})")]
    SchemaIdMismatch { wire: u32, schema: u32 },

    #[error("Dimension \"{0}\" does not exist in the schema")]
    DimensionNotFound(String),

    #[error("Unsupported conversion: {0}")]
    UnsupportedConversion(String),

    #[error("Inconsistent input: {0}")]
    InconsistentInput(String),

    #[error("Corrupt wire data: {0}")]
    CorruptWireData(String),

    #[error("Unknown patch representation tag {0}")]
    UnknownRepresentation(u32),

    #[error("Unknown column compression scheme {0}")]
    UnknownCompressionScheme(u32),

    #[error("Index {index} is out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    // =========================================================================
    // === Low-Level Kernel Errors
    // =========================================================================
    #[error("RLE decoding error: {0}")]
    RleDecodeError(String),

    #[error("Sigbits decoding error: {0}")]
    SigbitsDecodeError(String),

    #[error("Deflate operation failed: {0}")]
    DeflateError(String),

    #[error("Zstd operation failed: {0}")]
    ZstdError(String),

    // =========================================================================
    // === External Error Wrappers (Using #[from] for automatic conversion)
    // =========================================================================
    /// An error originating from the underlying I/O subsystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error from the Serde JSON library, typically during config loading or rendering.
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

// =============================================================================
// === Manual `From` Implementations ===
// =============================================================================

impl From<roxmltree::Error> for PointCloudError {
    fn from(err: roxmltree::Error) -> Self {
        PointCloudError::SchemaParseError(err.to_string())
    }
}
