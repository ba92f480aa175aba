//! Defines the seams where the engine hands work to collaborators it does not own.

use std::fmt::Debug;

use crate::error::PointCloudError;
use crate::schema::Schema;

/// Produces and consumes the blob carried by the opaque patch representation.
///
/// The engine treats the blob as uninterpreted bytes: it stores it, serializes it
/// after the point count and hands it back on decode. Row buffers exchanged with a
/// codec are always in machine byte order and exactly `schema.size * npoints` long.
pub trait OpaqueCodec: Send + Sync + Debug {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Encodes `npoints` rows of `schema` into a blob.
    fn encode(&self, schema: &Schema, rows: &[u8], npoints: u32)
        -> Result<Vec<u8>, PointCloudError>;

    /// Decodes a blob back into exactly `schema.size * npoints` row bytes.
    fn decode(&self, schema: &Schema, blob: &[u8], npoints: u32)
        -> Result<Vec<u8>, PointCloudError>;
}
