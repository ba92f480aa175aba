//! The dimensional patch representation: one column buffer per dimension.

use crate::column::{ColumnBuffer, ColumnCompression};
use crate::config::EngineConfig;
use crate::dimstats::DimStats;
use crate::error::PointCloudError;
use crate::schema::SchemaRef;
use crate::wire::{WireReader, WireWriter};

use super::stats::{Bounds, PatchStats};
use super::uncompressed::UncompressedPatch;
use super::PatchHeader;

#[derive(Debug, Clone)]
pub struct DimensionalPatch {
    pub(crate) header: PatchHeader,
    columns: Vec<ColumnBuffer>,
}

impl DimensionalPatch {
    /// Splits the rows of `patch` into raw columns. Bounds and statistics carry over.
    pub fn from_uncompressed(patch: &UncompressedPatch) -> Self {
        let schema = patch.schema();
        let columns = schema
            .dimensions()
            .map(|dim| {
                ColumnBuffer::gather(dim.interpretation, patch.data(), schema.size(), dim.byteoffset)
            })
            .collect();
        Self {
            header: patch.header.clone(),
            columns,
        }
    }

    /// Reassembles the rows, decoding compressed columns.
    ///
    /// Every column is decoded and checked against the point count before the row
    /// buffer is allocated, so a corrupt count fails instead of sizing the buffer.
    pub fn to_uncompressed(&self) -> Result<UncompressedPatch, PointCloudError> {
        let schema = &self.header.schema;
        let npoints = self.header.npoints;
        let raw_columns = self
            .columns
            .iter()
            .map(ColumnBuffer::decode)
            .collect::<Result<Vec<_>, _>>()?;
        for (dim, column) in schema.dimensions().zip(&raw_columns) {
            if column.npoints() != npoints || column.bytes().len() != npoints * dim.size {
                return Err(PointCloudError::CorruptWireData(format!(
                    "column \"{}\" decodes to {} bytes, expected {} points",
                    dim.name,
                    column.bytes().len(),
                    npoints
                )));
            }
        }

        let len = schema.size().checked_mul(npoints).ok_or_else(|| {
            PointCloudError::CorruptWireData(format!("{} points overflow the row buffer", npoints))
        })?;
        let mut rows = Vec::new();
        rows.try_reserve_exact(len).map_err(|e| {
            PointCloudError::CorruptWireData(format!("cannot hold {} points: {}", npoints, e))
        })?;
        rows.resize(len, 0);
        for (dim, column) in schema.dimensions().zip(&raw_columns) {
            column.scatter(&mut rows, schema.size(), dim.byteoffset);
        }
        Ok(UncompressedPatch::from_parts(self.header.clone(), rows))
    }

    /// Encodes every column with the mode `stats` recommends for it.
    ///
    /// Columns are decoded first, so an already compressed patch is re-encoded.
    /// The statistics are only updated while they hold fewer than
    /// `config.sample_threshold` points.
    pub fn compress(
        &self,
        stats: &mut DimStats,
        config: &EngineConfig,
    ) -> Result<DimensionalPatch, PointCloudError> {
        let raw = self.decompress()?;
        // A failed encode must leave the caller's statistics as they were.
        let mut updated = stats.clone();
        if updated.total_points < config.sample_threshold {
            updated.update(&raw)?;
        }
        let columns = raw
            .columns
            .iter()
            .enumerate()
            .map(|(position, column)| {
                let mode = updated.recommendation(position).ok_or_else(|| {
                    PointCloudError::InconsistentInput(format!(
                        "statistics have no entry for dimension {}",
                        position
                    ))
                })?;
                column.encode(mode, config.deflate_level)
            })
            .collect::<Result<Vec<_>, _>>()?;
        *stats = updated;
        Ok(DimensionalPatch {
            header: self.header.clone(),
            columns,
        })
    }

    /// A copy with every column decoded.
    pub fn decompress(&self) -> Result<DimensionalPatch, PointCloudError> {
        let columns = self
            .columns
            .iter()
            .map(ColumnBuffer::decode)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DimensionalPatch {
            header: self.header.clone(),
            columns,
        })
    }

    /// Keeps the columns at `positions` under an already reduced schema.
    pub(crate) fn subset(
        &self,
        schema: SchemaRef,
        positions: &[usize],
    ) -> Result<DimensionalPatch, PointCloudError> {
        let columns = positions
            .iter()
            .map(|&position| {
                self.columns
                    .get(position)
                    .cloned()
                    .ok_or(PointCloudError::IndexOutOfRange {
                        index: position,
                        len: self.columns.len(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let stats = match &self.header.stats {
            Some(stats) => Some(stats.rekey(&schema)?),
            None => None,
        };
        Ok(DimensionalPatch {
            header: PatchHeader {
                schema,
                npoints: self.header.npoints,
                bounds: self.header.bounds,
                stats,
            },
            columns,
        })
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

    pub fn columns(&self) -> &[ColumnBuffer] {
        &self.columns
    }

    pub fn column_compressions(&self) -> Vec<ColumnCompression> {
        self.columns.iter().map(ColumnBuffer::compression).collect()
    }

    //==============================================================================
    // Wire
    //==============================================================================

    pub(crate) fn payload_size(&self) -> usize {
        4 + self
            .columns
            .iter()
            .map(ColumnBuffer::serialized_size)
            .sum::<usize>()
    }

    pub(crate) fn write_payload(
        &self,
        writer: &mut WireWriter,
        deflate_level: u32,
    ) -> Result<(), PointCloudError> {
        writer.write_u32(self.header.npoints as u32);
        for column in &self.columns {
            column.write_to(writer, deflate_level)?;
        }
        Ok(())
    }

    pub(crate) fn read_payload(
        schema: SchemaRef,
        reader: &mut WireReader<'_>,
        deflate_level: u32,
    ) -> Result<Self, PointCloudError> {
        let npoints = reader.read_u32()? as usize;
        let columns = schema
            .dimensions()
            .map(|dim| ColumnBuffer::read_from(reader, dim.interpretation, npoints, deflate_level))
            .collect::<Result<Vec<_>, _>>()?;
        if columns.len() != schema.ndims() {
            return Err(PointCloudError::InconsistentInput(format!(
                "schema {} has unfilled dimension slots",
                schema.pcid()
            )));
        }
        Ok(Self {
            header: PatchHeader::new(schema, npoints),
            columns,
        })
    }
}
