//! The patch model and the conversion engine.
//!
//! A `Patch` is a collection of points under one schema, held in one of three
//! representations. Conversions between them always pass through the
//! uncompressed form; `compress` drives a patch toward the representation its
//! schema asks for, `uncompress` always lands on the row-major form.

mod dimensional;
mod filter;
mod opaque;
mod stats;
mod uncompressed;

#[cfg(test)]
mod tests;

pub use dimensional::DimensionalPatch;
pub use opaque::{OpaquePatch, ZstdOpaqueCodec};
pub use stats::{Bounds, PatchStats, StatKind};
pub use uncompressed::UncompressedPatch;

use std::borrow::Cow;
use std::sync::Arc;

use crate::config::EngineContext;
use crate::dimstats::DimStats;
use crate::error::PointCloudError;
use crate::point::PointList;
use crate::schema::SchemaRef;
use crate::types::Compression;
use crate::wire::{read_patch_header, Endian, WireWriter, PATCH_HEADER_SIZE};

//==================================================================================
// I. Shared Header
//==================================================================================

/// State common to every representation.
#[derive(Debug, Clone)]
pub struct PatchHeader {
    pub(crate) schema: SchemaRef,
    pub(crate) npoints: usize,
    pub(crate) bounds: Bounds,
    pub(crate) stats: Option<PatchStats>,
}

impl PatchHeader {
    pub(crate) fn new(schema: SchemaRef, npoints: usize) -> Self {
        Self {
            schema,
            npoints,
            bounds: Bounds::empty(),
            stats: None,
        }
    }
}

//==================================================================================
// II. Patch
//==================================================================================

#[derive(Debug, Clone)]
pub enum Patch {
    Uncompressed(UncompressedPatch),
    Dimensional(DimensionalPatch),
    Opaque(OpaquePatch),
}

impl Patch {
    fn header(&self) -> &PatchHeader {
        match self {
            Patch::Uncompressed(p) => &p.header,
            Patch::Dimensional(p) => &p.header,
            Patch::Opaque(p) => &p.header,
        }
    }

    fn header_mut(&mut self) -> &mut PatchHeader {
        match self {
            Patch::Uncompressed(p) => &mut p.header,
            Patch::Dimensional(p) => &mut p.header,
            Patch::Opaque(p) => &mut p.header,
        }
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.header().schema
    }

    pub fn npoints(&self) -> usize {
        self.header().npoints
    }

    pub fn bounds(&self) -> &Bounds {
        &self.header().bounds
    }

    pub fn stats(&self) -> Option<&PatchStats> {
        self.header().stats.as_ref()
    }

    /// The representation this patch is currently held in.
    pub fn representation(&self) -> Compression {
        match self {
            Patch::Uncompressed(_) => Compression::None,
            Patch::Dimensional(_) => Compression::Dimensional,
            Patch::Opaque(_) => Compression::Opaque,
        }
    }

    //==============================================================================
    // Construction
    //==============================================================================

    /// Builds an uncompressed patch holding a copy of every point in `list`.
    pub fn from_pointlist(list: &PointList<'_>) -> Result<Patch, PointCloudError> {
        Ok(Patch::Uncompressed(UncompressedPatch::from_pointlist(list)?))
    }

    /// Concatenates `patches` into one uncompressed patch.
    ///
    /// Every input must carry the same schema id. Rows keep list order, bounds are
    /// the union of the input bounds and statistics are recomputed.
    pub fn from_patchlist(patches: &[Patch], ctx: &EngineContext) -> Result<Patch, PointCloudError> {
        let first = patches.first().ok_or_else(|| {
            PointCloudError::InconsistentInput("cannot merge an empty patch list".to_string())
        })?;
        let schema = first.schema().clone();
        if let Some(other) = patches.iter().find(|p| p.schema().pcid() != schema.pcid()) {
            return Err(PointCloudError::InconsistentInput(format!(
                "inconsistent schemas in input: {} and {}",
                schema.pcid(),
                other.schema().pcid()
            )));
        }

        let total_points: usize = patches.iter().map(Patch::npoints).sum();
        let mut data = Vec::with_capacity(total_points * schema.size());
        let mut bounds = Bounds::empty();
        for patch in patches {
            bounds.merge(patch.bounds());
            data.extend_from_slice(patch.uncompress(ctx)?.data());
        }

        let header = PatchHeader {
            schema,
            npoints: total_points,
            bounds,
            stats: None,
        };
        let mut merged = UncompressedPatch::from_parts(header, data);
        merged.compute_stats();
        log_metric!(
            "event" = "merge",
            "inputs" = patches.len(),
            "npoints" = total_points
        );
        Ok(Patch::Uncompressed(merged))
    }

    //==============================================================================
    // Conversion
    //==============================================================================

    /// Converts toward the schema's target representation.
    ///
    /// Returns the patch itself when it already has the target form, except for
    /// dimensional patches, which are always re-encoded with the current
    /// recommendations. Without `stats` a fresh accumulator is used.
    pub fn compress<'p>(
        &'p self,
        stats: Option<&mut DimStats>,
        ctx: &EngineContext,
    ) -> Result<Cow<'p, Patch>, PointCloudError> {
        let schema = self.schema();
        let mut fresh;
        let stats = match stats {
            Some(stats) => stats,
            None => {
                fresh = DimStats::new(schema);
                &mut fresh
            }
        };

        let target = schema.compression();
        let converted = match (target, self) {
            (Compression::None, Patch::Uncompressed(_)) | (Compression::Opaque, Patch::Opaque(_)) => {
                return Ok(Cow::Borrowed(self));
            }
            (Compression::None, _) => Patch::Uncompressed(self.uncompress(ctx)?.into_owned()),
            (Compression::Dimensional, Patch::Dimensional(p)) => {
                Patch::Dimensional(p.compress(stats, &ctx.config)?)
            }
            (Compression::Dimensional, _) => {
                let uncompressed = self.uncompress(ctx)?;
                let raw = DimensionalPatch::from_uncompressed(&uncompressed);
                Patch::Dimensional(raw.compress(stats, &ctx.config)?)
            }
            (Compression::Opaque, _) => {
                let codec = ctx.opaque_codec()?;
                let uncompressed = self.uncompress(ctx)?;
                Patch::Opaque(OpaquePatch::from_uncompressed(&uncompressed, codec)?)
            }
        };

        log_metric!(
            "event" = "compress",
            "from" = self.representation(),
            "to" = converted.representation(),
            "npoints" = self.npoints(),
            "serialized_size" = converted.serialized_size()
        );
        Ok(Cow::Owned(converted))
    }

    /// The row-major form of this patch, borrowed when it already is one.
    pub fn uncompress(&self, ctx: &EngineContext) -> Result<Cow<'_, UncompressedPatch>, PointCloudError> {
        match self {
            Patch::Uncompressed(p) => Ok(Cow::Borrowed(p)),
            Patch::Dimensional(p) => Ok(Cow::Owned(p.to_uncompressed()?)),
            Patch::Opaque(p) => Ok(Cow::Owned(p.to_uncompressed(ctx.opaque_codec()?)?)),
        }
    }

    /// Keeps only the named dimensions, in the given order.
    ///
    /// Only dimensional patches can be reduced; convert other forms first.
    pub fn reduce_dimension(&self, names: &[&str]) -> Result<Patch, PointCloudError> {
        let schema = self.schema();
        let positions = names
            .iter()
            .map(|name| {
                schema
                    .position_by_name(name)
                    .ok_or_else(|| PointCloudError::DimensionNotFound(name.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        match self {
            Patch::Dimensional(p) => {
                let subset = Arc::new(schema.clone_subset(&positions)?);
                Ok(Patch::Dimensional(p.subset(subset, &positions)?))
            }
            other => Err(PointCloudError::UnsupportedConversion(format!(
                "reduce_dimension needs a dimensional patch, found {}",
                other.representation()
            ))),
        }
    }

    //==============================================================================
    // Summaries
    //==============================================================================

    /// Recomputes the XY bounds from the point values.
    pub fn compute_extent(&mut self, ctx: &EngineContext) -> Result<(), PointCloudError> {
        if let Patch::Uncompressed(p) = self {
            p.compute_extent();
            return Ok(());
        }
        let mut raw = self.uncompress(ctx)?.into_owned();
        raw.compute_extent();
        self.header_mut().bounds = *raw.bounds();
        Ok(())
    }

    /// Recomputes the per-dimension statistics.
    pub fn compute_stats(&mut self, ctx: &EngineContext) -> Result<(), PointCloudError> {
        if let Patch::Uncompressed(p) = self {
            p.compute_stats();
            return Ok(());
        }
        let mut raw = self.uncompress(ctx)?.into_owned();
        raw.compute_stats();
        self.header_mut().stats = raw.header.stats.take();
        Ok(())
    }

    fn refresh_summaries(&mut self, ctx: &EngineContext) -> Result<(), PointCloudError> {
        if let Patch::Uncompressed(p) = self {
            p.compute_extent();
            p.compute_stats();
            return Ok(());
        }
        let mut raw = self.uncompress(ctx)?.into_owned();
        raw.compute_extent();
        raw.compute_stats();
        let header = self.header_mut();
        header.bounds = *raw.bounds();
        header.stats = raw.header.stats.take();
        Ok(())
    }

    /// Reads one statistic of a named dimension. `None` when no statistics exist.
    pub fn stat_by_name(&self, name: &str, kind: StatKind) -> Result<Option<f64>, PointCloudError> {
        let dim = self.schema().require_dimension(name)?;
        Ok(self.stats().map(|stats| stats.get(kind).get_double(dim)))
    }

    /// True when the bounds of the two patches overlap.
    pub fn intersects(&self, other: &Patch) -> Result<bool, PointCloudError> {
        if self.schema().pcid() != other.schema().pcid() {
            return Err(PointCloudError::InconsistentInput(format!(
                "cannot intersect patches of schemas {} and {}",
                self.schema().pcid(),
                other.schema().pcid()
            )));
        }
        Ok(self.bounds().intersects(other.bounds()))
    }

    /// A compact JSON description: schema id, representation, size and extent.
    pub fn summary_json(&self) -> Result<String, PointCloudError> {
        let bounds = if self.bounds().is_empty() {
            None
        } else {
            Some(self.bounds())
        };
        let compressions = match self {
            Patch::Dimensional(p) => Some(p.column_compressions()),
            _ => None,
        };
        let value = serde_json::json!({
            "pcid": self.schema().pcid(),
            "representation": self.representation(),
            "npoints": self.npoints(),
            "serialized_size": self.serialized_size(),
            "bounds": bounds,
            "compressions": compressions,
        });
        Ok(serde_json::to_string(&value)?)
    }

    //==============================================================================
    // Wire
    //==============================================================================

    /// Size of the machine-order wire form.
    pub fn serialized_size(&self) -> usize {
        PATCH_HEADER_SIZE
            + match self {
                Patch::Uncompressed(p) => p.payload_size(),
                Patch::Dimensional(p) => p.payload_size(),
                Patch::Opaque(p) => p.payload_size(),
            }
    }

    /// Serializes in the configured default byte order.
    pub fn to_wire(&self, ctx: &EngineContext) -> Result<Vec<u8>, PointCloudError> {
        self.to_wire_with_endian(ctx.config.default_endian, ctx)
    }

    /// Serializes in the current representation with an explicit byte order.
    pub fn to_wire_with_endian(
        &self,
        endian: Endian,
        ctx: &EngineContext,
    ) -> Result<Vec<u8>, PointCloudError> {
        let mut writer = WireWriter::with_capacity(endian, self.serialized_size());
        writer.write_patch_header(self.schema().pcid(), self.representation());
        match self {
            Patch::Uncompressed(p) => p.write_payload(&mut writer),
            Patch::Dimensional(p) => p.write_payload(&mut writer, ctx.config.deflate_level)?,
            Patch::Opaque(p) => p.write_payload(&mut writer),
        }
        Ok(writer.into_inner())
    }

    /// Reads a patch serialized by `to_wire`, recomputing its bounds and statistics.
    pub fn from_wire(
        schema: SchemaRef,
        bytes: &[u8],
        ctx: &EngineContext,
    ) -> Result<Patch, PointCloudError> {
        let (header, mut reader) = read_patch_header(bytes)?;
        if header.pcid != schema.pcid() {
            return Err(PointCloudError::SchemaIdMismatch {
                wire: header.pcid,
                schema: schema.pcid(),
            });
        }

        let mut patch = match header.representation {
            Compression::None => {
                return Ok(Patch::Uncompressed(UncompressedPatch::read_payload(
                    schema,
                    &mut reader,
                )?));
            }
            Compression::Dimensional => {
                let patch =
                    DimensionalPatch::read_payload(schema, &mut reader, ctx.config.deflate_level)?;
                let trailing = reader.remaining().len();
                if trailing != 0 {
                    return Err(PointCloudError::CorruptWireData(format!(
                        "{} trailing bytes after the last column",
                        trailing
                    )));
                }
                Patch::Dimensional(patch)
            }
            Compression::Opaque => Patch::Opaque(OpaquePatch::read_payload(schema, &mut reader)?),
        };
        patch.refresh_summaries(ctx)?;
        Ok(patch)
    }
}
