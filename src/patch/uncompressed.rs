//! The row-major, uncompressed patch representation.

use crate::error::PointCloudError;
use crate::point::{Point, PointList};
use crate::schema::SchemaRef;
use crate::wire::{WireReader, WireWriter};

use super::stats::{Bounds, PatchStats};
use super::PatchHeader;

/// Points stored back to back, `schema.size` bytes each.
#[derive(Debug, Clone)]
pub struct UncompressedPatch {
    pub(crate) header: PatchHeader,
    data: Vec<u8>,
    max_points: usize,
}

impl UncompressedPatch {
    /// An empty patch with room for `max_points` points.
    pub fn new(schema: SchemaRef, max_points: usize) -> Self {
        let data = Vec::with_capacity(schema.size() * max_points);
        Self {
            header: PatchHeader::new(schema, 0),
            data,
            max_points,
        }
    }

    /// Wraps a row-major buffer and computes its bounds and statistics.
    pub fn from_rows(schema: SchemaRef, data: Vec<u8>) -> Result<Self, PointCloudError> {
        let npoints = rows_in(&schema, data.len())?;
        let mut patch = Self {
            header: PatchHeader::new(schema, npoints),
            data,
            max_points: npoints,
        };
        patch.compute_extent();
        patch.compute_stats();
        Ok(patch)
    }

    /// Assembles a patch whose header was computed elsewhere.
    pub(crate) fn from_parts(header: PatchHeader, data: Vec<u8>) -> Self {
        let max_points = header.npoints;
        Self {
            header,
            data,
            max_points,
        }
    }

    /// Builds a patch from every point of `list`, which must share one schema id.
    pub fn from_pointlist(list: &PointList<'_>) -> Result<Self, PointCloudError> {
        let first = list.get(0).map_err(|_| {
            PointCloudError::InconsistentInput("cannot build a patch from an empty point list".to_string())
        })?;
        let mut patch = Self::new(first.schema().clone(), list.len());
        for point in list {
            patch.add_point(point)?;
        }
        patch.compute_stats();
        Ok(patch)
    }

    /// Appends a copy of `point`, growing the capacity geometrically.
    pub fn add_point(&mut self, point: &Point<'_>) -> Result<(), PointCloudError> {
        let schema = &self.header.schema;
        if point.schema().pcid() != schema.pcid() || point.data().len() != schema.size() {
            return Err(PointCloudError::InconsistentInput(format!(
                "point of schema {} cannot be added to a patch of schema {}",
                point.schema().pcid(),
                schema.pcid()
            )));
        }
        if self.header.npoints == self.max_points {
            self.max_points = (self.max_points * 2).max(1);
            self.data.reserve(self.max_points * schema.size() - self.data.len());
        }
        self.data.extend_from_slice(point.data());
        self.header.npoints += 1;
        if let (Ok(x), Ok(y)) = (point.x(), point.y()) {
            self.header.bounds.expand(x, y);
        }
        Ok(())
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.header.schema
    }

    pub fn npoints(&self) -> usize {
        self.header.npoints
    }

    pub fn max_points(&self) -> usize {
        self.max_points
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn bounds(&self) -> &Bounds {
        &self.header.bounds
    }

    pub fn stats(&self) -> Option<&PatchStats> {
        self.header.stats.as_ref()
    }

    /// A read-only view of the point at `index`.
    pub fn point(&self, index: usize) -> Result<Point<'_>, PointCloudError> {
        if index >= self.header.npoints {
            return Err(PointCloudError::IndexOutOfRange {
                index,
                len: self.header.npoints,
            });
        }
        let size = self.header.schema.size();
        Point::from_data(
            self.header.schema.clone(),
            &self.data[index * size..(index + 1) * size],
        )
    }

    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        let size = self.header.schema.size().max(1);
        self.data.chunks_exact(size)
    }

    /// Recomputes the XY bounds. Schemas without X or Y leave the bounds empty.
    pub fn compute_extent(&mut self) {
        let schema = &self.header.schema;
        let mut bounds = Bounds::empty();
        if let (Some(xd), Some(yd)) = (
            schema.x_position().and_then(|p| schema.dimension(p)),
            schema.y_position().and_then(|p| schema.dimension(p)),
        ) {
            for row in self.data.chunks_exact(schema.size()) {
                bounds.expand(xd.read_double(row), yd.read_double(row));
            }
        }
        self.header.bounds = bounds;
    }

    pub fn compute_stats(&mut self) {
        self.header.stats = PatchStats::compute(&self.header.schema, &self.data);
    }

    //==============================================================================
    // Wire
    //==============================================================================

    pub(crate) fn payload_size(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn write_payload(&self, writer: &mut WireWriter) {
        if writer.endian().is_foreign() {
            let mut rows = self.data.clone();
            self.header.schema.flip_rows_endian(&mut rows);
            writer.write_bytes(&rows);
        } else {
            writer.write_bytes(&self.data);
        }
    }

    pub(crate) fn read_payload(
        schema: SchemaRef,
        reader: &mut WireReader<'_>,
    ) -> Result<Self, PointCloudError> {
        let swap = reader.endian().is_foreign();
        let mut data = reader.remaining().to_vec();
        rows_in(&schema, data.len())?;
        if swap {
            schema.flip_rows_endian(&mut data);
        }
        Self::from_rows(schema, data)
    }
}

/// Number of whole rows in `len` bytes, failing on a partial row.
fn rows_in(schema: &SchemaRef, len: usize) -> Result<usize, PointCloudError> {
    let size = schema.size();
    if size == 0 {
        return if len == 0 {
            Ok(0)
        } else {
            Err(PointCloudError::CorruptWireData(format!(
                "schema {} has zero-width rows but {} bytes were supplied",
                schema.pcid(),
                len
            )))
        };
    }
    if len % size != 0 {
        return Err(PointCloudError::CorruptWireData(format!(
            "{} bytes is not a whole number of {} byte rows",
            len, size
        )));
    }
    Ok(len / size)
}
