//! The opaque patch representation and the bundled zstd codec for it.
//!
//! The engine never looks inside an opaque blob. Encoding and decoding go through
//! the `OpaqueCodec` registered in the `EngineContext`.

use crate::error::PointCloudError;
use crate::kernels::zstd;
use crate::schema::{Schema, SchemaRef};
use crate::traits::OpaqueCodec;
use crate::wire::{WireReader, WireWriter};

use super::stats::{Bounds, PatchStats};
use super::uncompressed::UncompressedPatch;
use super::PatchHeader;

#[derive(Debug, Clone)]
pub struct OpaquePatch {
    pub(crate) header: PatchHeader,
    blob: Vec<u8>,
}

impl OpaquePatch {
    pub fn from_uncompressed(
        patch: &UncompressedPatch,
        codec: &dyn OpaqueCodec,
    ) -> Result<Self, PointCloudError> {
        let blob = codec.encode(patch.schema(), patch.data(), patch.npoints() as u32)?;
        log::debug!(
            "opaque codec {} stored {} points in {} bytes",
            codec.name(),
            patch.npoints(),
            blob.len()
        );
        Ok(Self {
            header: patch.header.clone(),
            blob,
        })
    }

    pub fn to_uncompressed(&self, codec: &dyn OpaqueCodec) -> Result<UncompressedPatch, PointCloudError> {
        let schema = &self.header.schema;
        let rows = codec.decode(schema, &self.blob, self.header.npoints as u32)?;
        if rows.len() != schema.size() * self.header.npoints {
            return Err(PointCloudError::CorruptWireData(format!(
                "opaque codec {} returned {} bytes for {} points of {} bytes",
                codec.name(),
                rows.len(),
                self.header.npoints,
                schema.size()
            )));
        }
        Ok(UncompressedPatch::from_parts(self.header.clone(), rows))
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.header.schema
    }

    pub fn npoints(&self) -> usize {
        self.header.npoints
    }

    pub fn bounds(&self) -> &Bounds {
        &self.header.bounds
    }

    pub fn stats(&self) -> Option<&PatchStats> {
        self.header.stats.as_ref()
    }

    pub fn blob(&self) -> &[u8] {
        &self.blob
    }

    pub(crate) fn payload_size(&self) -> usize {
        4 + self.blob.len()
    }

    pub(crate) fn write_payload(&self, writer: &mut WireWriter) {
        writer.write_u32(self.header.npoints as u32);
        writer.write_bytes(&self.blob);
    }

    pub(crate) fn read_payload(
        schema: SchemaRef,
        reader: &mut WireReader<'_>,
    ) -> Result<Self, PointCloudError> {
        let npoints = reader.read_u32()? as usize;
        let blob = reader.remaining().to_vec();
        Ok(Self {
            header: PatchHeader::new(schema, npoints),
            blob,
        })
    }
}

//==================================================================================
// Bundled codec
//==================================================================================

/// Stores the machine-order row buffer as a zstd frame.
#[derive(Debug, Clone)]
pub struct ZstdOpaqueCodec {
    level: i32,
}

impl ZstdOpaqueCodec {
    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

impl Default for ZstdOpaqueCodec {
    fn default() -> Self {
        Self::new(3)
    }
}

impl OpaqueCodec for ZstdOpaqueCodec {
    fn name(&self) -> &str {
        "zstd"
    }

    fn encode(&self, schema: &Schema, rows: &[u8], npoints: u32) -> Result<Vec<u8>, PointCloudError> {
        if rows.len() != schema.size() * npoints as usize {
            return Err(PointCloudError::InconsistentInput(format!(
                "{} row bytes do not hold {} points of schema {}",
                rows.len(),
                npoints,
                schema.pcid()
            )));
        }
        zstd::encode(rows, self.level)
    }

    fn decode(&self, schema: &Schema, blob: &[u8], npoints: u32) -> Result<Vec<u8>, PointCloudError> {
        let expected = schema.size().checked_mul(npoints as usize).ok_or_else(|| {
            PointCloudError::CorruptWireData(format!("{} points overflow the row buffer", npoints))
        })?;
        zstd::decode(blob, expected)
    }
}
