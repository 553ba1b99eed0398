//! Linear depth interpolation of each hourly profile.

use std::collections::btree_map::Entry;

use chrono::NaiveDateTime;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::grid::{Cell, CellOrigin, Grid};
use crate::timeline::{dates_between, Step};
use crate::FieldError;

pub const DEFAULT_DEPTH_STEP: f64 = 0.1;
const MIN_DEPTH_STEP: f64 = 0.001;
const DEPTH_EPS: f64 = 1e-9;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterpolationReport {
    pub profiles_extended: usize,
    pub depths_added: usize,
    /// Hourly timestamps in range with no profile at all.
    pub missing_timestamps: usize,
    /// Profiles with fewer than two depths, left as they were.
    pub sparse_profiles: usize,
}

/// Extend every hourly profile between `start` and `end` with depths at
/// multiples of `depth_step` lying strictly between consecutive known depths.
/// Existing cells are never overwritten, so repeating the call with the same
/// step is a no-op.
pub fn interpolate_depths(
    grid: &mut Grid,
    start: NaiveDateTime,
    end: NaiveDateTime,
    depth_step: f64,
) -> Result<InterpolationReport, FieldError> {
    if !depth_step.is_finite() || depth_step < MIN_DEPTH_STEP {
        return Err(FieldError::InvalidParameter(format!(
            "depth step must be at least {}, got {}",
            MIN_DEPTH_STEP, depth_step
        )));
    }

    let mut report = InterpolationReport::default();
    for timestamp in dates_between(start, end, Step::Hourly) {
        let Some(profile) = grid.profile_mut(&timestamp) else {
            report.missing_timestamps += 1;
            continue;
        };
        if profile.len() < 2 {
            report.sparse_profiles += 1;
            continue;
        }

        let known: Vec<(f64, f64)> = profile
            .iter()
            .map(|(depth, cell)| (depth.0, cell.temperature))
            .collect();
        let mut added = 0usize;
        for pair in known.windows(2) {
            let (lo, hi) = (pair[0], pair[1]);
            let slope = slope(lo, hi).ok_or(FieldError::DegenerateInterpolation {
                timestamp,
                depth: lo.0,
            })?;
            for depth in step_positions(lo.0, hi.0, depth_step) {
                if let Entry::Vacant(slot) = profile.entry(OrderedFloat(depth)) {
                    let temperature = round3(hi.1 - slope * (hi.0 - depth));
                    slot.insert(Cell::synthetic(temperature, CellOrigin::Interpolated));
                    added += 1;
                }
            }
        }
        if added > 0 {
            report.profiles_extended += 1;
            report.depths_added += added;
        }
    }

    info!(
        "interpolation: {} profiles extended, {} depths added, {} hours missing, {} sparse profiles",
        report.profiles_extended,
        report.depths_added,
        report.missing_timestamps,
        report.sparse_profiles
    );
    Ok(report)
}

/// Temperature on the line through two known (depth, temperature) points.
/// `None` when the depths coincide.
pub fn temperature_at(lo: (f64, f64), hi: (f64, f64), depth: f64) -> Option<f64> {
    let slope = slope(lo, hi)?;
    Some(round3(hi.1 - slope * (hi.0 - depth)))
}

fn slope(lo: (f64, f64), hi: (f64, f64)) -> Option<f64> {
    let run = hi.0 - lo.0;
    if !run.is_finite() || run.abs() <= f64::EPSILON {
        return None;
    }
    Some((hi.1 - lo.1) / run)
}

/// Multiples of `step` strictly between `lo` and `hi`, rounded to 3 decimals.
fn step_positions(lo: f64, hi: f64, step: f64) -> impl Iterator<Item = f64> {
    let first = (lo / step).floor() as i64;
    let last = (hi / step).ceil() as i64;
    (first..=last)
        .map(move |k| round3(k as f64 * step))
        .filter(move |depth| *depth > lo + DEPTH_EPS && *depth < hi - DEPTH_EPS)
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
