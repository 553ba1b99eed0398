//! Stage sequencing: climatology, gap fill, interpolation, fitness.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::climatology::ClimatologyTable;
use crate::fitness::{FitnessGrid, FitnessModel};
use crate::gapfill::{fill_gaps, GapFillReport};
use crate::grid::Grid;
use crate::ingest::ParsedReadings;
use crate::interpolate::{interpolate_depths, InterpolationReport, DEFAULT_DEPTH_STEP};
use crate::movement::Simulation;
use crate::sun::SunTable;
use crate::timeline::{year_bounds, Step};
use crate::FieldError;

/// Field-building parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldParams {
    pub year: i32,
    pub step: Step,
    pub depth_step: f64,
    pub fitness: FitnessModel,
}

impl Default for FieldParams {
    fn default() -> Self {
        Self {
            year: 2005,
            step: Step::Hourly,
            depth_step: DEFAULT_DEPTH_STEP,
            fitness: FitnessModel::default(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldReports {
    pub climatology_slots: usize,
    pub gap_fill: GapFillReport,
    pub interpolation: InterpolationReport,
}

/// Dense grid and fitness for one target year.
#[derive(Clone, Debug)]
pub struct LakeField {
    pub grid: Grid,
    pub fitness: FitnessGrid,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub step: Step,
    pub reports: FieldReports,
}

impl LakeField {
    pub fn simulation(&self) -> Simulation<'_> {
        Simulation::new(&self.grid, &self.fitness, self.start, self.end, self.step)
    }

    pub fn simulation_with_sun<'a>(&'a self, sun: &'a SunTable) -> Simulation<'a> {
        self.simulation().with_sun_table(sun)
    }
}

/// Raw grid from parsed readings; duplicate (timestamp, depth) keys keep the
/// first reading.
pub fn grid_from_readings(parsed: &ParsedReadings) -> Result<Grid, FieldError> {
    if parsed.readings.is_empty() {
        return Err(FieldError::InsufficientData);
    }
    let (grid, duplicates) = Grid::from_readings(&parsed.readings);
    if duplicates > 0 {
        warn!("dropped {} duplicate readings (first reading kept)", duplicates);
    }
    info!(
        "raw grid: {} timestamps, {} cells, {} rejected rows",
        grid.len(),
        grid.cell_count(),
        parsed.rejected.len()
    );
    Ok(grid)
}

/// Run every stage against `grid` for `params.year`.
pub fn build_field(mut grid: Grid, params: &FieldParams) -> Result<LakeField, FieldError> {
    if grid.is_empty() {
        return Err(FieldError::InsufficientData);
    }
    let (start, end) = year_bounds(params.year)?;

    let climatology = ClimatologyTable::from_grid(&grid);
    info!("climatology: {} slots", climatology.len());

    let gap_fill = fill_gaps(&mut grid, &climatology, params.year)?;
    let interpolation = interpolate_depths(&mut grid, start, end, params.depth_step)?;
    let fitness = FitnessGrid::evaluate(&grid, &params.fitness, start, end);
    info!("fitness: {} timestamps scored", fitness.len());

    Ok(LakeField {
        grid,
        fitness,
        start,
        end,
        step: params.step,
        reports: FieldReports {
            climatology_slots: climatology.len(),
            gap_fill,
            interpolation,
        },
    })
}
