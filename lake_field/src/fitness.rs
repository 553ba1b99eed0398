//! Temperature-driven growth/mortality fitness.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::grid::{Depth, Grid};

/// Birth/death rate model evaluated at a single temperature (°C).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum FitnessModel {
    /// Mortality expressed relative to the temperature of maximal growth.
    OptimumRelative {
        /// Birth rate at 0 °C.
        b1: f64,
        /// Change in birth rate with temperature.
        b2: f64,
        /// Temperature-independent mortality.
        d0: f64,
        /// Exponential mortality coefficient (unused by this form).
        d1: f64,
        /// Exponential mortality rate.
        d2: f64,
        /// Temperature at which growth peaks.
        t_opt: f64,
    },
    /// Two independent exponentials, scaled down by `scale`.
    DoubleExponential {
        b1: f64,
        b2: f64,
        d0: f64,
        d1: f64,
        d2: f64,
        scale: f64,
    },
}

impl FitnessModel {
    /// Synechococcus calibration for Sparkling Lake.
    pub fn synechococcus() -> Self {
        FitnessModel::OptimumRelative {
            b1: 14.59829888,
            b2: 0.008383057,
            d0: 9.301242586,
            d1: 5.545155413,
            d2: 0.016661372,
            t_opt: 33.95619378,
        }
    }

    pub fn double_exponential() -> Self {
        FitnessModel::DoubleExponential {
            b1: 1.174,
            b2: 0.064,
            d0: 1.119,
            d1: 0.267,
            d2: 0.103,
            scale: 1.2,
        }
    }

    /// Growth rate at `temperature`. The timestamp does not enter the
    /// current models.
    pub fn evaluate(&self, temperature: f64, _timestamp: NaiveDateTime) -> f64 {
        match *self {
            FitnessModel::OptimumRelative {
                b1,
                b2,
                d0,
                d2,
                t_opt,
                ..
            } => {
                let birth = b1 * (b2 * temperature).exp();
                let death =
                    d0 + (b1 * b2 / d2) * ((b2 - d2) * t_opt).exp() * (d2 * temperature).exp();
                birth - death
            }
            FitnessModel::DoubleExponential {
                b1,
                b2,
                d0,
                d1,
                d2,
                scale,
            } => (b1 * (b2 * temperature).exp() - (d0 + d1 * (d2 * temperature).exp())) / scale,
        }
    }
}

impl Default for FitnessModel {
    fn default() -> Self {
        FitnessModel::synechococcus()
    }
}

/// Fitness of every grid cell between two timestamps.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FitnessGrid {
    values: BTreeMap<NaiveDateTime, BTreeMap<Depth, f64>>,
}

impl FitnessGrid {
    pub fn evaluate(
        grid: &Grid,
        model: &FitnessModel,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Self {
        if start > end {
            return Self::default();
        }
        let values = grid
            .range(start..=end)
            .map(|(timestamp, profile)| {
                let scores = profile
                    .iter()
                    .map(|(depth, cell)| (*depth, model.evaluate(cell.temperature, *timestamp)))
                    .collect();
                (*timestamp, scores)
            })
            .collect();
        Self { values }
    }

    pub fn get(&self, timestamp: &NaiveDateTime, depth: f64) -> Option<f64> {
        self.values.get(timestamp)?.get(&OrderedFloat(depth)).copied()
    }

    pub fn profile(&self, timestamp: &NaiveDateTime) -> Option<&BTreeMap<Depth, f64>> {
        self.values.get(timestamp)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NaiveDateTime, &BTreeMap<Depth, f64>)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Cell;
    use chrono::NaiveDate;

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2005, 7, day)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn optimum_relative_peaks_at_t_opt() {
        let model = FitnessModel::synechococcus();
        let peak = model.evaluate(33.95619378, at(1));
        for t in [0.0, 10.0, 25.0, 33.0, 35.0, 40.0] {
            assert!(model.evaluate(t, at(1)) < peak, "fitness at {} exceeds peak", t);
        }
    }

    #[test]
    fn warm_water_beats_cold_water_below_optimum() {
        let model = FitnessModel::default();
        assert!(model.evaluate(24.0, at(1)) > model.evaluate(6.0, at(1)));
        assert!(model.evaluate(4.0, at(1)) < 0.0);
    }

    #[test]
    fn double_exponential_matches_closed_form() {
        let model = FitnessModel::double_exponential();
        let t = 20.0_f64;
        let expected = (1.174 * (0.064 * t).exp() - (1.119 + 0.267 * (0.103 * t).exp())) / 1.2;
        assert!((model.evaluate(t, at(1)) - expected).abs() < 1e-12);
    }

    #[test]
    fn date_does_not_change_score() {
        let model = FitnessModel::default();
        assert_eq!(model.evaluate(18.5, at(1)), model.evaluate(18.5, at(20)));
    }

    #[test]
    fn model_loads_from_json() {
        let json = r#"{"model":"double_exponential","b1":1.0,"b2":0.05,"d0":1.0,"d1":0.2,"d2":0.1,"scale":1.0}"#;
        let model: FitnessModel = serde_json::from_str(json).unwrap();
        assert!(matches!(model, FitnessModel::DoubleExponential { scale, .. } if scale == 1.0));
    }

    #[test]
    fn grid_covers_only_requested_range() {
        let mut grid = Grid::new();
        grid.insert_cell(at(1), 1.0, Cell::observed(20.0, ""));
        grid.insert_cell(at(1), 5.0, Cell::observed(12.0, ""));
        grid.insert_cell(at(3), 1.0, Cell::observed(21.0, ""));
        let model = FitnessModel::default();
        let fitness = FitnessGrid::evaluate(&grid, &model, at(1), at(2));
        assert_eq!(fitness.len(), 1);
        assert_eq!(fitness.get(&at(1), 5.0), Some(model.evaluate(12.0, at(1))));
        assert_eq!(fitness.get(&at(3), 1.0), None);
    }
}
