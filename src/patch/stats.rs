//! Patch bounds and per-dimension summary statistics.

use serde::Serialize;
use std::str::FromStr;

use crate::error::PointCloudError;
use crate::point::Point;
use crate::schema::SchemaRef;

//==================================================================================
// I. Bounds
//==================================================================================

/// The XY extent of a patch. A patch with no points has the empty sentinel, which
/// merges as the identity and intersects nothing.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
}

impl Default for Bounds {
    fn default() -> Self {
        Self::empty()
    }
}

impl Bounds {
    pub fn empty() -> Self {
        Self {
            xmin: f64::MAX,
            xmax: f64::MIN,
            ymin: f64::MAX,
            ymax: f64::MIN,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.xmin > self.xmax || self.ymin > self.ymax
    }

    pub fn expand(&mut self, x: f64, y: f64) {
        self.xmin = self.xmin.min(x);
        self.xmax = self.xmax.max(x);
        self.ymin = self.ymin.min(y);
        self.ymax = self.ymax.max(y);
    }

    pub fn merge(&mut self, other: &Bounds) {
        self.xmin = self.xmin.min(other.xmin);
        self.xmax = self.xmax.max(other.xmax);
        self.ymin = self.ymin.min(other.ymin);
        self.ymax = self.ymax.max(other.ymax);
    }

    /// True when the two extents overlap or touch.
    pub fn intersects(&self, other: &Bounds) -> bool {
        !(self.xmin > other.xmax
            || self.xmax < other.xmin
            || self.ymin > other.ymax
            || self.ymax < other.ymin)
    }
}

//==================================================================================
// II. PatchStats
//==================================================================================

/// Which of the three summary points to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatKind {
    Min,
    Max,
    Avg,
}

impl FromStr for StatKind {
    type Err = PointCloudError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("min") {
            Ok(StatKind::Min)
        } else if s.eq_ignore_ascii_case("max") {
            Ok(StatKind::Max)
        } else if s.eq_ignore_ascii_case("avg") {
            Ok(StatKind::Avg)
        } else {
            Err(PointCloudError::InconsistentInput(format!(
                "unknown statistic \"{}\", expected min, max or avg",
                s
            )))
        }
    }
}

/// Per-dimension minimum, maximum and average, each stored as an owned point.
///
/// Values are written back through the dimension's interpretation, so integer
/// dimensions hold the rounded average.
#[derive(Debug, Clone)]
pub struct PatchStats {
    pub min: Point<'static>,
    pub max: Point<'static>,
    pub avg: Point<'static>,
}

impl PatchStats {
    /// Computes statistics over a row-major buffer. Returns `None` when it holds no rows.
    pub fn compute(schema: &SchemaRef, rows: &[u8]) -> Option<PatchStats> {
        let size = schema.size();
        if size == 0 || rows.len() < size {
            return None;
        }
        let ndims = schema.ndims();
        let mut mins = vec![f64::MAX; ndims];
        let mut maxs = vec![f64::MIN; ndims];
        let mut sums = vec![0.0; ndims];
        let mut npoints = 0usize;

        for row in rows.chunks_exact(size) {
            for (i, dim) in schema.dimensions().enumerate() {
                let value = dim.read_double(row);
                mins[i] = mins[i].min(value);
                maxs[i] = maxs[i].max(value);
                sums[i] += value;
            }
            npoints += 1;
        }

        let mut stats = PatchStats {
            min: Point::new(schema.clone()),
            max: Point::new(schema.clone()),
            avg: Point::new(schema.clone()),
        };
        for (i, dim) in schema.dimensions().enumerate() {
            stats.min.set_double(dim, mins[i]);
            stats.max.set_double(dim, maxs[i]);
            stats.avg.set_double(dim, sums[i] / npoints as f64);
        }
        Some(stats)
    }

    pub fn get(&self, kind: StatKind) -> &Point<'static> {
        match kind {
            StatKind::Min => &self.min,
            StatKind::Max => &self.max,
            StatKind::Avg => &self.avg,
        }
    }

    /// Moves the statistics onto a subset schema by copying each retained
    /// dimension's bytes into the new layout.
    pub(crate) fn rekey(&self, subset: &SchemaRef) -> Result<PatchStats, PointCloudError> {
        let rekey_point = |point: &Point<'static>| -> Result<Point<'static>, PointCloudError> {
            let source_schema = point.schema();
            let mut data = vec![0u8; subset.size()];
            for dim in subset.dimensions() {
                let source = source_schema.require_dimension(&dim.name)?;
                data[dim.byteoffset..dim.byteoffset + dim.size].copy_from_slice(
                    &point.data()[source.byteoffset..source.byteoffset + source.size],
                );
            }
            Ok(Point::from_data(subset.clone(), &data)?.into_owned())
        };
        Ok(PatchStats {
            min: rekey_point(&self.min)?,
            max: rekey_point(&self.max)?,
            avg: rekey_point(&self.avg)?,
        })
    }

    /// Renders `{"min": [...], "max": [...], "avg": [...]}` with scaled values.
    pub fn to_json(&self) -> Result<String, PointCloudError> {
        let value = serde_json::json!({
            "pcid": self.min.schema().pcid(),
            "min": self.min.to_doubles(),
            "max": self.max.to_doubles(),
            "avg": self.avg.to_doubles(),
        });
        Ok(serde_json::to_string(&value)?)
    }
}
