//! Running per-dimension statistics that choose a column compression.
//!
//! A `DimStats` accumulates run counts and shared-bit counts over a stream of
//! dimensional patches and, after each update, recommends for every dimension
//! the mode expected to beat the others: run-length, common-bit removal or
//! deflate (the fallback).

use serde::Serialize;

use crate::column::ColumnCompression;
use crate::error::PointCloudError;
use crate::patch::DimensionalPatch;
use crate::schema::Schema;
use crate::types::Interpretation;

/// Sigbits is chosen when it beats raw storage by more than this ratio.
const SIGBITS_MIN_RATIO: f64 = 1.6;
/// RLE is chosen when it beats raw storage by more than this ratio.
const RLE_MIN_RATIO: f64 = 4.0;

/// Counters for one dimension.
#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DimStat {
    pub total_runs: u64,
    pub total_commonbits: u64,
    pub recommended_compression: ColumnCompression,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct DimStats {
    pub total_points: u64,
    pub total_patches: u64,
    pub stats: Vec<DimStat>,
}

impl DimStats {
    pub fn new(schema: &Schema) -> Self {
        Self {
            total_points: 0,
            total_patches: 0,
            stats: vec![DimStat::default(); schema.ndims()],
        }
    }

    pub fn ndims(&self) -> usize {
        self.stats.len()
    }

    /// Recommended mode for the dimension at `position`.
    pub fn recommendation(&self, position: usize) -> Option<ColumnCompression> {
        self.stats.get(position).map(|s| s.recommended_compression)
    }

    /// Folds one patch into the counters and recomputes every recommendation.
    ///
    /// Compressed columns are decoded first; counts are always taken on raw values.
    pub fn update(&mut self, patch: &DimensionalPatch) -> Result<(), PointCloudError> {
        let schema = patch.schema();
        if schema.ndims() != self.stats.len() {
            return Err(PointCloudError::InconsistentInput(format!(
                "statistics track {} dimensions, patch schema {} has {}",
                self.stats.len(),
                schema.pcid(),
                schema.ndims()
            )));
        }

        let mut counts = Vec::with_capacity(self.stats.len());
        for column in patch.columns() {
            let raw;
            let column = if column.compression() == ColumnCompression::None {
                column
            } else {
                raw = column.decode()?;
                &raw
            };
            counts.push((column.run_count()? as u64, column.sigbits_count()? as u64));
        }

        self.total_points += patch.npoints() as u64;
        self.total_patches += 1;
        for (stat, (runs, commonbits)) in self.stats.iter_mut().zip(counts) {
            stat.total_runs += runs;
            stat.total_commonbits += commonbits;
        }

        for (position, dim) in schema.dimensions().enumerate() {
            let recommended = self.recommend(position, dim.size, dim.interpretation);
            self.stats[position].recommended_compression = recommended;
            log_metric!(
                "event" = "dimstats_recommend",
                "dimension" = &dim.name,
                "total_points" = &self.total_points,
                "mode" = recommended
            );
        }
        Ok(())
    }

    fn recommend(&self, position: usize, size: usize, interpretation: Interpretation) -> ColumnCompression {
        let stat = &self.stats[position];
        let size = size as u64;

        let raw_size = (self.total_points * size) as f64;
        let rle_size = (stat.total_runs * (size + 1)) as f64;
        let avg_commonbits = stat.total_commonbits / self.total_patches.max(1);
        let avg_uniquebits = (8 * size).saturating_sub(avg_commonbits);
        let sigbits_size = (self.total_patches * 2 * size) as f64
            + self.total_points as f64 * avg_uniquebits as f64 / 8.0;

        let mut recommended = ColumnCompression::Deflate;
        if interpretation != Interpretation::Float64 {
            if raw_size / sigbits_size > SIGBITS_MIN_RATIO {
                recommended = ColumnCompression::Sigbits;
            }
            if raw_size / rle_size > RLE_MIN_RATIO {
                recommended = ColumnCompression::Rle;
            }
        }
        recommended
    }

    /// Keeps only the counters of `positions`, renumbered in the given order.
    pub fn clone_subset(&self, positions: &[usize]) -> Result<DimStats, PointCloudError> {
        let stats = positions
            .iter()
            .map(|&position| {
                self.stats
                    .get(position)
                    .copied()
                    .ok_or(PointCloudError::IndexOutOfRange {
                        index: position,
                        len: self.stats.len(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DimStats {
            total_points: self.total_points,
            total_patches: self.total_patches,
            stats,
        })
    }

    /// Renders the counters as JSON.
    pub fn to_json(&self) -> Result<String, PointCloudError> {
        let value = serde_json::json!({
            "ndims": self.ndims(),
            "total_points": self.total_points,
            "total_patches": self.total_patches,
            "dims": self.stats,
        });
        Ok(serde_json::to_string(&value)?)
    }
}
