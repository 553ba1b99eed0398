//! Climatological gap filling for one target year.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::climatology::{ClimatologyTable, SlotKey};
use crate::grid::{Cell, CellOrigin, Grid, Profile};
use crate::timeline::{dates_between, year_bounds, Step};
use crate::FieldError;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapFillReport {
    /// Timestamps that were entirely absent and got a climatological profile.
    pub filled_timestamps: usize,
    /// Cells created inside those new profiles.
    pub filled_timestamp_cells: usize,
    /// Single depths backfilled at timestamps that already existed.
    pub filled_depths: usize,
    /// Expected timestamps with no climatology entry for their slot.
    pub skipped_slots: usize,
}

/// Fill every hour of `year` that the grid lacks, or lacks depths for, from
/// the climatology table. Observed cells are never replaced, and slots
/// without a climatology entry stay empty.
pub fn fill_gaps(
    grid: &mut Grid,
    climatology: &ClimatologyTable,
    year: i32,
) -> Result<GapFillReport, FieldError> {
    let (first, last) = year_bounds(year)?;
    let expected = dates_between(first, last, Step::Hourly);
    let candidate_depths = grid.depths_in(first..=last);
    debug!(
        "gap fill {}: {} expected hours, {} candidate depths",
        year,
        expected.len(),
        candidate_depths.len()
    );

    let mut report = GapFillReport::default();
    for timestamp in expected {
        let Some(slot) = climatology.slot(&SlotKey::of(&timestamp)) else {
            report.skipped_slots += 1;
            continue;
        };

        match grid.profile(&timestamp) {
            None => {
                let profile: Profile = candidate_depths
                    .iter()
                    .filter_map(|depth| {
                        slot.get(depth)
                            .map(|mean| (*depth, Cell::synthetic(*mean, CellOrigin::Climatology)))
                    })
                    .collect();
                let cells = profile.len();
                if grid.insert_profile(timestamp, profile) {
                    report.filled_timestamps += 1;
                    report.filled_timestamp_cells += cells;
                }
            }
            Some(existing) => {
                let missing: Vec<_> = candidate_depths
                    .iter()
                    .filter(|depth| !existing.contains_key(*depth))
                    .filter_map(|depth| slot.get(depth).map(|mean| (*depth, *mean)))
                    .collect();
                for (depth, mean) in missing {
                    if grid.insert_cell(
                        timestamp,
                        depth.0,
                        Cell::synthetic(mean, CellOrigin::Climatology),
                    ) {
                        report.filled_depths += 1;
                    }
                }
            }
        }
    }

    info!(
        "gap fill {}: {} missing hours ({} cells), {} missing depths, {} slots without climatology",
        year,
        report.filled_timestamps,
        report.filled_timestamp_cells,
        report.filled_depths,
        report.skipped_slots
    );
    Ok(report)
}
