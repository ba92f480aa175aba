//! Value filters over a named dimension.
//!
//! Every filter materializes the patch, keeps the rows whose converted double
//! value passes the predicate and returns them as a fresh uncompressed patch with
//! bounds and statistics recomputed. An empty result is a valid patch.

use crate::config::EngineContext;
use crate::error::PointCloudError;
use crate::schema::Dimension;

use super::{Patch, UncompressedPatch};

impl Patch {
    /// Keeps points whose value is strictly below `value`.
    pub fn filter_lt_by_name(
        &self,
        name: &str,
        value: f64,
        ctx: &EngineContext,
    ) -> Result<Patch, PointCloudError> {
        self.filter_by_name(name, ctx, |v| v < value)
    }

    /// Keeps points whose value is strictly above `value`.
    pub fn filter_gt_by_name(
        &self,
        name: &str,
        value: f64,
        ctx: &EngineContext,
    ) -> Result<Patch, PointCloudError> {
        self.filter_by_name(name, ctx, |v| v > value)
    }

    pub fn filter_eq_by_name(
        &self,
        name: &str,
        value: f64,
        ctx: &EngineContext,
    ) -> Result<Patch, PointCloudError> {
        self.filter_by_name(name, ctx, |v| v == value)
    }

    /// Keeps points whose value lies in the closed range between the two bounds.
    /// The bounds may be given in either order.
    pub fn filter_between_by_name(
        &self,
        name: &str,
        value1: f64,
        value2: f64,
        ctx: &EngineContext,
    ) -> Result<Patch, PointCloudError> {
        let (lo, hi) = if value1 <= value2 {
            (value1, value2)
        } else {
            (value2, value1)
        };
        self.filter_by_name(name, ctx, |v| v >= lo && v <= hi)
    }

    fn filter_by_name<F>(
        &self,
        name: &str,
        ctx: &EngineContext,
        keep: F,
    ) -> Result<Patch, PointCloudError>
    where
        F: Fn(f64) -> bool,
    {
        let dim = self.schema().require_dimension(name)?.clone();
        let raw = self.uncompress(ctx)?;
        let data = filter_rows(&raw, &dim, keep);
        let filtered = UncompressedPatch::from_rows(raw.schema().clone(), data)?;
        log_metric!(
            "event" = "filter",
            "dimension" = &dim.name,
            "npoints_in" = raw.npoints(),
            "npoints_out" = filtered.npoints()
        );
        Ok(Patch::Uncompressed(filtered))
    }
}

fn filter_rows<F>(patch: &UncompressedPatch, dim: &Dimension, keep: F) -> Vec<u8>
where
    F: Fn(f64) -> bool,
{
    let mut data = Vec::with_capacity(patch.data().len());
    for row in patch.rows() {
        if keep(dim.read_double(row)) {
            data.extend_from_slice(row);
        }
    }
    data
}
