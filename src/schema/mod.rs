//! The schema registry model: dimensions, schemas and their byte layout.
//!
//! A `Schema` describes the fixed-width record every point and patch built
//! against it uses. It is assembled once (by hand or from an XML schema document)
//! and then shared read-only as a `SchemaRef`.

mod xml;

use hashbrown::HashMap;
use serde::Serialize;
use std::sync::Arc;

use crate::error::PointCloudError;
use crate::types::{Compression, Interpretation};

/// Shared, immutable handle to a schema.
pub type SchemaRef = Arc<Schema>;

const X_NAMES: [&str; 3] = ["x", "longitude", "lon"];
const Y_NAMES: [&str; 3] = ["y", "latitude", "lat"];

//==================================================================================
// I. Dimension
//==================================================================================

/// One named, typed slot of a record.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Dimension {
    pub name: String,
    pub description: String,
    /// 0-based slot within the record.
    pub position: usize,
    pub interpretation: Interpretation,
    /// Derived from `interpretation`.
    pub size: usize,
    /// Derived by the owning schema.
    pub byteoffset: usize,
    pub scale: f64,
    pub offset: f64,
    pub active: bool,
}

impl Dimension {
    pub fn new(name: impl Into<String>, position: usize, interpretation: Interpretation) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            position,
            interpretation,
            size: interpretation.size(),
            byteoffset: 0,
            scale: 1.0,
            offset: 0.0,
            active: true,
        }
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Reads this dimension out of a record as a scaled double.
    pub fn read_double(&self, row: &[u8]) -> f64 {
        let raw = self
            .interpretation
            .read_f64(&row[self.byteoffset..self.byteoffset + self.size]);
        raw * self.scale + self.offset
    }

    /// Writes a scaled double into a record, inverting scale and offset first.
    pub fn write_double(&self, value: f64, row: &mut [u8]) {
        let raw = (value - self.offset) / self.scale;
        self.interpretation
            .write_f64(raw, &mut row[self.byteoffset..self.byteoffset + self.size]);
    }
}

//==================================================================================
// II. Schema
//==================================================================================

#[derive(Debug, Clone)]
pub struct Schema {
    pcid: u32,
    srid: u32,
    dims: Vec<Option<Dimension>>,
    x_position: Option<usize>,
    y_position: Option<usize>,
    compression: Compression,
    size: usize,
    /// Lowercased dimension name to position.
    names: HashMap<String, usize>,
}

impl Schema {
    /// Creates a schema with `ndims` empty slots.
    pub fn new(ndims: usize) -> Self {
        Self {
            pcid: 0,
            srid: 0,
            dims: vec![None; ndims],
            x_position: None,
            y_position: None,
            compression: Compression::None,
            size: 0,
            names: HashMap::with_capacity(ndims),
        }
    }

    pub fn with_pcid(mut self, pcid: u32) -> Self {
        self.pcid = pcid;
        self
    }

    pub fn with_srid(mut self, srid: u32) -> Self {
        self.srid = srid;
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Stores `dim` at its declared position and recomputes the byte layout.
    pub fn set_dimension(&mut self, dim: Dimension) -> Result<(), PointCloudError> {
        let position = dim.position;
        if position >= self.dims.len() {
            return Err(PointCloudError::IndexOutOfRange {
                index: position,
                len: self.dims.len(),
            });
        }
        if let Some(previous) = self.dims[position].take() {
            self.names.remove(&previous.name.to_lowercase());
        }
        self.names.insert(dim.name.to_lowercase(), position);
        self.dims[position] = Some(dim);
        self.calculate_byteoffsets();
        Ok(())
    }

    fn calculate_byteoffsets(&mut self) {
        let mut byteoffset = 0;
        for dim in self.dims.iter_mut().flatten() {
            dim.size = dim.interpretation.size();
            dim.byteoffset = byteoffset;
            byteoffset += dim.size;
        }
        self.size = byteoffset;
    }

    /// Resolves the X and Y positions from the dimension names.
    ///
    /// Returns true when both were found.
    pub fn check_xy(&mut self) -> bool {
        self.x_position = self.find_any(&X_NAMES);
        self.y_position = self.find_any(&Y_NAMES);
        if self.x_position.is_none() {
            log::debug!("schema {} has no X dimension", self.pcid);
        }
        if self.y_position.is_none() {
            log::debug!("schema {} has no Y dimension", self.pcid);
        }
        self.x_position.is_some() && self.y_position.is_some()
    }

    fn find_any(&self, names: &[&str]) -> Option<usize> {
        self.dims
            .iter()
            .flatten()
            .find(|dim| names.iter().any(|n| dim.name.eq_ignore_ascii_case(n)))
            .map(|dim| dim.position)
    }

    /// Checks that the schema can back points and patches, logging the first problem.
    pub fn is_valid(&self) -> bool {
        if self.x_position.is_none() {
            log::warn!("schema does not include an X coordinate");
            return false;
        }
        if self.y_position.is_none() {
            log::warn!("schema does not include a Y coordinate");
            return false;
        }
        if self.dims.is_empty() {
            log::warn!("schema has no dimensions");
            return false;
        }
        if let Some(missing) = self.dims.iter().position(Option::is_none) {
            log::warn!("schema is missing a dimension at position {}", missing);
            return false;
        }
        true
    }

    /// Deep copy of the whole schema.
    pub fn clone_full(&self) -> Schema {
        self.clone()
    }

    /// Builds a new schema keeping only `positions`, renumbered in the given order.
    ///
    /// X and Y are re-resolved by name and may end up unset.
    pub fn clone_subset(&self, positions: &[usize]) -> Result<Schema, PointCloudError> {
        let mut subset = Schema::new(positions.len())
            .with_pcid(self.pcid)
            .with_srid(self.srid)
            .with_compression(self.compression);
        for (new_position, &position) in positions.iter().enumerate() {
            let dim = self
                .dims
                .get(position)
                .ok_or(PointCloudError::IndexOutOfRange {
                    index: position,
                    len: self.dims.len(),
                })?;
            if let Some(dim) = dim {
                let mut dim = dim.clone();
                dim.position = new_position;
                subset.set_dimension(dim)?;
            }
        }
        subset.x_position = subset.find_any(&X_NAMES);
        subset.y_position = subset.find_any(&Y_NAMES);
        Ok(subset)
    }

    pub fn pcid(&self) -> u32 {
        self.pcid
    }

    pub fn srid(&self) -> u32 {
        self.srid
    }

    pub fn ndims(&self) -> usize {
        self.dims.len()
    }

    /// Size of one record in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    pub fn x_position(&self) -> Option<usize> {
        self.x_position
    }

    pub fn y_position(&self) -> Option<usize> {
        self.y_position
    }

    pub fn dimension(&self, position: usize) -> Option<&Dimension> {
        self.dims.get(position).and_then(Option::as_ref)
    }

    /// Case-insensitive lookup.
    pub fn dimension_by_name(&self, name: &str) -> Option<&Dimension> {
        self.position_by_name(name)
            .and_then(|position| self.dimension(position))
    }

    pub fn position_by_name(&self, name: &str) -> Option<usize> {
        self.names.get(&name.to_lowercase()).copied()
    }

    /// Like `dimension_by_name`, failing with `DimensionNotFound`.
    pub fn require_dimension(&self, name: &str) -> Result<&Dimension, PointCloudError> {
        self.dimension_by_name(name)
            .ok_or_else(|| PointCloudError::DimensionNotFound(name.to_string()))
    }

    /// Filled dimensions in position order.
    pub fn dimensions(&self) -> impl Iterator<Item = &Dimension> {
        self.dims.iter().flatten()
    }

    /// Reverses the byte order of every dimension value in a row-major buffer.
    pub(crate) fn flip_rows_endian(&self, rows: &mut [u8]) {
        if self.size == 0 {
            return;
        }
        for row in rows.chunks_exact_mut(self.size) {
            for dim in self.dimensions() {
                row[dim.byteoffset..dim.byteoffset + dim.size].reverse();
            }
        }
    }

    /// Renders the schema as a JSON object.
    pub fn to_json(&self) -> Result<String, PointCloudError> {
        let dims: Vec<&Dimension> = self.dimensions().collect();
        let value = serde_json::json!({
            "pcid": self.pcid,
            "ndims": self.ndims(),
            "srid": self.srid,
            "compression": self.compression,
            "size": self.size,
            "x_position": self.x_position,
            "y_position": self.y_position,
            "dims": dims,
        });
        Ok(serde_json::to_string_pretty(&value)?)
    }
}

//==================================================================================
// III. Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn xyz_schema() -> Schema {
        let mut schema = Schema::new(3).with_pcid(7);
        schema
            .set_dimension(Dimension::new("X", 0, Interpretation::Int32).with_scale(0.01))
            .unwrap();
        schema
            .set_dimension(Dimension::new("Y", 1, Interpretation::Int32).with_scale(0.01))
            .unwrap();
        schema
            .set_dimension(Dimension::new("Intensity", 2, Interpretation::UInt16))
            .unwrap();
        schema.check_xy();
        schema
    }

    #[test]
    fn test_byteoffsets_follow_position_order() {
        let mut schema = Schema::new(3);
        schema
            .set_dimension(Dimension::new("c", 2, Interpretation::Float64))
            .unwrap();
        schema
            .set_dimension(Dimension::new("a", 0, Interpretation::UInt8))
            .unwrap();
        schema
            .set_dimension(Dimension::new("b", 1, Interpretation::Int16))
            .unwrap();
        let offsets: Vec<usize> = schema.dimensions().map(|d| d.byteoffset).collect();
        assert_eq!(offsets, vec![0, 1, 3]);
        assert_eq!(schema.size(), 11);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let schema = xyz_schema();
        assert_eq!(schema.position_by_name("intensity"), Some(2));
        assert_eq!(schema.dimension_by_name("INTENSITY").unwrap().size, 2);
        assert!(schema.dimension_by_name("Z").is_none());
        assert!(matches!(
            schema.require_dimension("Z"),
            Err(PointCloudError::DimensionNotFound(_))
        ));
        assert_eq!(schema.x_position(), Some(0));
        assert_eq!(schema.y_position(), Some(1));
        assert!(schema.is_valid());
    }

    #[test]
    fn test_set_dimension_out_of_range() {
        let mut schema = Schema::new(1);
        assert!(matches!(
            schema.set_dimension(Dimension::new("x", 1, Interpretation::Int8)),
            Err(PointCloudError::IndexOutOfRange { index: 1, len: 1 })
        ));
    }

    #[test]
    fn test_validity_failures() {
        let mut schema = Schema::new(2);
        schema
            .set_dimension(Dimension::new("lon", 0, Interpretation::Float64))
            .unwrap();
        assert!(!schema.check_xy());
        assert!(!schema.is_valid());

        let mut gap = Schema::new(3);
        gap.set_dimension(Dimension::new("x", 0, Interpretation::Float64))
            .unwrap();
        gap.set_dimension(Dimension::new("lat", 1, Interpretation::Float64))
            .unwrap();
        assert!(gap.check_xy());
        assert!(!gap.is_valid());
    }

    #[test]
    fn test_clone_subset_renumbers() {
        let schema = xyz_schema();
        let subset = schema.clone_subset(&[2, 0]).unwrap();
        assert_eq!(subset.ndims(), 2);
        assert_eq!(subset.pcid(), 7);
        let intensity = subset.dimension(0).unwrap();
        assert_eq!(intensity.name, "Intensity");
        assert_eq!(intensity.byteoffset, 0);
        assert_eq!(subset.dimension(1).unwrap().byteoffset, 2);
        assert_eq!(subset.size(), 6);
        assert_eq!(subset.x_position(), Some(1));
        assert_eq!(subset.y_position(), None);
        assert_eq!(subset.position_by_name("x"), Some(1));

        assert!(matches!(
            schema.clone_subset(&[0, 3]),
            Err(PointCloudError::IndexOutOfRange { index: 3, len: 3 })
        ));
    }

    #[test]
    fn test_to_json_lists_dimensions() {
        let json = xyz_schema().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["pcid"], 7);
        assert_eq!(value["size"], 10);
        assert_eq!(value["dims"][2]["name"], "Intensity");
        assert_eq!(value["dims"][2]["interpretation"], "uint16_t");
    }
}
