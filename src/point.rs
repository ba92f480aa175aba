//! Fixed-width point records and ordered collections of them.
//!
//! A `Point` either owns its bytes or is a read-only view over memory it borrows,
//! such as one row of an uncompressed patch. Writing through a view copies the
//! row first, so the borrowed memory is never modified.

use std::borrow::Cow;

use crate::config::EngineContext;
use crate::error::PointCloudError;
use crate::patch::Patch;
use crate::schema::{Dimension, SchemaRef};
use crate::wire::{Endian, WireReader, WireWriter};

//==================================================================================
// I. Point
//==================================================================================

#[derive(Debug, Clone)]
pub struct Point<'a> {
    schema: SchemaRef,
    data: Cow<'a, [u8]>,
}

impl Point<'static> {
    /// A zero-filled point that owns its buffer.
    pub fn new(schema: SchemaRef) -> Self {
        let data = Cow::Owned(vec![0u8; schema.size()]);
        Self { schema, data }
    }

    /// Builds an owned point from one scaled value per dimension.
    ///
    /// Integer dimensions round to nearest and clamp into their range.
    pub fn from_doubles(schema: SchemaRef, values: &[f64]) -> Result<Self, PointCloudError> {
        if values.len() != schema.ndims() {
            return Err(PointCloudError::InconsistentInput(format!(
                "schema {} has {} dimensions, got {} values",
                schema.pcid(),
                schema.ndims(),
                values.len()
            )));
        }
        let mut data = vec![0u8; schema.size()];
        for (dim, &value) in schema.dimensions().zip(values) {
            dim.write_double(value, &mut data);
        }
        Ok(Self {
            schema,
            data: Cow::Owned(data),
        })
    }

    /// Reads a point from its wire form: `u8 endian, u32 pcid, row bytes`.
    pub fn from_wire(schema: SchemaRef, bytes: &[u8]) -> Result<Self, PointCloudError> {
        let flag = *bytes.first().ok_or_else(|| {
            PointCloudError::CorruptWireData("zero length point buffer".to_string())
        })?;
        let endian = Endian::from_flag(flag)?;
        let mut reader = WireReader::new(&bytes[1..], endian);
        let pcid = reader.read_u32()?;
        if pcid != schema.pcid() {
            return Err(PointCloudError::SchemaIdMismatch {
                wire: pcid,
                schema: schema.pcid(),
            });
        }
        let row = reader.remaining();
        if row.len() != schema.size() {
            return Err(PointCloudError::CorruptWireData(format!(
                "point payload is {} bytes, schema {} needs {}",
                row.len(),
                schema.pcid(),
                schema.size()
            )));
        }
        let mut data = row.to_vec();
        if endian.is_foreign() {
            schema.flip_rows_endian(&mut data);
        }
        Ok(Self {
            schema,
            data: Cow::Owned(data),
        })
    }
}

impl<'a> Point<'a> {
    /// A read-only view over exactly one row of `schema`.
    pub fn from_data(schema: SchemaRef, data: &'a [u8]) -> Result<Self, PointCloudError> {
        if data.len() != schema.size() {
            return Err(PointCloudError::CorruptWireData(format!(
                "point data is {} bytes, schema {} needs {}",
                data.len(),
                schema.pcid(),
                schema.size()
            )));
        }
        Ok(Self {
            schema,
            data: Cow::Borrowed(data),
        })
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// True while the point still borrows its bytes.
    pub fn is_view(&self) -> bool {
        matches!(self.data, Cow::Borrowed(_))
    }

    pub fn into_owned(self) -> Point<'static> {
        Point {
            schema: self.schema,
            data: Cow::Owned(self.data.into_owned()),
        }
    }

    pub fn get_double(&self, dim: &Dimension) -> f64 {
        dim.read_double(&self.data)
    }

    pub fn get_double_by_index(&self, index: usize) -> Result<f64, PointCloudError> {
        let dim = self.dimension_at(index)?;
        Ok(dim.read_double(&self.data))
    }

    pub fn get_double_by_name(&self, name: &str) -> Result<f64, PointCloudError> {
        let dim = self.schema.require_dimension(name)?;
        Ok(dim.read_double(&self.data))
    }

    pub fn set_double(&mut self, dim: &Dimension, value: f64) {
        dim.write_double(value, self.data.to_mut());
    }

    pub fn set_double_by_index(&mut self, index: usize, value: f64) -> Result<(), PointCloudError> {
        let schema = self.schema.clone();
        let dim = schema.dimension(index).ok_or(PointCloudError::IndexOutOfRange {
            index,
            len: schema.ndims(),
        })?;
        self.set_double(dim, value);
        Ok(())
    }

    pub fn set_double_by_name(&mut self, name: &str, value: f64) -> Result<(), PointCloudError> {
        let schema = self.schema.clone();
        let dim = schema.require_dimension(name)?;
        self.set_double(dim, value);
        Ok(())
    }

    fn dimension_at(&self, index: usize) -> Result<&Dimension, PointCloudError> {
        self.schema
            .dimension(index)
            .ok_or(PointCloudError::IndexOutOfRange {
                index,
                len: self.schema.ndims(),
            })
    }

    fn xy_position(&self, x: bool) -> Result<usize, PointCloudError> {
        let position = if x {
            self.schema.x_position()
        } else {
            self.schema.y_position()
        };
        position.ok_or_else(|| {
            PointCloudError::DimensionNotFound(if x { "X" } else { "Y" }.to_string())
        })
    }

    pub fn x(&self) -> Result<f64, PointCloudError> {
        self.get_double_by_index(self.xy_position(true)?)
    }

    pub fn y(&self) -> Result<f64, PointCloudError> {
        self.get_double_by_index(self.xy_position(false)?)
    }

    pub fn set_x(&mut self, value: f64) -> Result<(), PointCloudError> {
        let position = self.xy_position(true)?;
        self.set_double_by_index(position, value)
    }

    pub fn set_y(&mut self, value: f64) -> Result<(), PointCloudError> {
        let position = self.xy_position(false)?;
        self.set_double_by_index(position, value)
    }

    /// Every dimension value, scaled, in position order.
    pub fn to_doubles(&self) -> Vec<f64> {
        self.schema
            .dimensions()
            .map(|dim| dim.read_double(&self.data))
            .collect()
    }

    /// Serializes the point in the given byte order.
    pub fn to_wire(&self, endian: Endian) -> Vec<u8> {
        let mut writer = WireWriter::with_capacity(endian, 5 + self.data.len());
        writer.write_u8(endian.flag());
        writer.write_u32(self.schema.pcid());
        if endian.is_foreign() {
            let mut row = self.data.to_vec();
            self.schema.flip_rows_endian(&mut row);
            writer.write_bytes(&row);
        } else {
            writer.write_bytes(&self.data);
        }
        writer.into_inner()
    }
}

//==================================================================================
// II. PointList
//==================================================================================

/// An ordered, growable sequence of points.
#[derive(Debug, Clone, Default)]
pub struct PointList<'a> {
    points: Vec<Point<'a>>,
}

impl<'a> PointList<'a> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, point: Point<'a>) {
        self.points.push(point);
    }

    pub fn get(&self, index: usize) -> Result<&Point<'a>, PointCloudError> {
        self.points.get(index).ok_or(PointCloudError::IndexOutOfRange {
            index,
            len: self.points.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Point<'a>> {
        self.points.iter()
    }
}

impl PointList<'static> {
    /// Unnests a patch of any representation into owned points.
    pub fn from_patch(patch: &Patch, ctx: &EngineContext) -> Result<Self, PointCloudError> {
        let uncompressed = patch.uncompress(ctx)?;
        let schema = uncompressed.schema().clone();
        let size = schema.size();
        let mut list = PointList::with_capacity(uncompressed.npoints());
        if size == 0 {
            return Ok(list);
        }
        for row in uncompressed.data().chunks_exact(size) {
            list.push(Point {
                schema: schema.clone(),
                data: Cow::Owned(row.to_vec()),
            });
        }
        Ok(list)
    }
}

impl<'a> FromIterator<Point<'a>> for PointList<'a> {
    fn from_iter<I: IntoIterator<Item = Point<'a>>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for PointList<'a> {
    type Item = Point<'a>;
    type IntoIter = std::vec::IntoIter<Point<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.into_iter()
    }
}

impl<'l, 'a> IntoIterator for &'l PointList<'a> {
    type Item = &'l Point<'a>;
    type IntoIter = std::slice::Iter<'l, Point<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

//==================================================================================
// III. Unit Tests
//==================================================================================
