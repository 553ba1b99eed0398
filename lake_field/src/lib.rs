//! Lake thermal field reconstruction and organism movement simulation.
//!
//! Sparse (timestamp, depth) temperature readings are turned into a dense
//! time × depth grid by climatological gap filling and linear depth
//! interpolation. A growth/mortality model scores every cell, and a set of
//! movement policies walk the scored grid.

use chrono::NaiveDateTime;
use thiserror::Error;

pub mod climatology;
pub mod fitness;
pub mod gapfill;
pub mod grid;
pub mod ingest;
pub mod interpolate;
pub mod movement;
pub mod pipeline;
pub mod sun;
pub mod timeline;

pub use climatology::{ClimatologyTable, SlotKey};
pub use fitness::{FitnessGrid, FitnessModel};
pub use gapfill::{fill_gaps, GapFillReport};
pub use grid::{Cell, CellOrigin, Depth, Grid, GridRow, Profile, Reading};
pub use ingest::{parse_readings, ParsedReadings, RejectedLine, Resolution};
pub use interpolate::{interpolate_depths, InterpolationReport, DEFAULT_DEPTH_STEP};
pub use movement::{rng_from_seed, Policy, Simulation, Speed, Trajectory, DEFAULT_PROBABILITY_FACTOR};
pub use pipeline::{build_field, grid_from_readings, FieldParams, FieldReports, LakeField};
pub use sun::{parse_sun_table, ParsedSunTable, SunTable, SunWindow, DEFAULT_HEADER_LINES};
pub use timeline::{aligned_dates, dates_between, year_bounds, Step};

#[derive(Error, Debug)]
pub enum FieldError {
    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to read CSV input: {0}")]
    Csv(#[from] csv::Error),
    #[error("no usable readings in input")]
    InsufficientData,
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("degenerate interpolation at {timestamp}: two depths coincide at {depth}")]
    DegenerateInterpolation {
        timestamp: NaiveDateTime,
        depth: f64,
    },
    #[error("unknown movement policy: {0}")]
    UnknownPolicy(String),
    #[error("no depths available at {0}")]
    EmptyDepthSet(NaiveDateTime),
    #[error("no fitness value at {timestamp} for depth {depth}")]
    MissingFitness {
        timestamp: NaiveDateTime,
        depth: f64,
    },
}
