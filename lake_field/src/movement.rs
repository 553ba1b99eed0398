//! Depth-selection policies for a simulated organism.
//!
//! Every policy walks the same aligned timestamp sequence (requested range ∩
//! grid timestamps) and picks one depth per step from that timestamp's
//! sorted depth list.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::fitness::FitnessGrid;
use crate::grid::Grid;
use crate::sun::SunTable;
use crate::timeline::{aligned_dates, Step};
use crate::FieldError;

pub const DEFAULT_PROBABILITY_FACTOR: f64 = 0.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Speed {
    Slow,
    Fast,
}

impl Speed {
    /// Depth indices moved per step.
    pub fn distance(self) -> usize {
        match self {
            Speed::Slow => 2,
            Speed::Fast => 4,
        }
    }
}

impl FromStr for Speed {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "slow" => Ok(Speed::Slow),
            "fast" => Ok(Speed::Fast),
            other => Err(FieldError::UnknownPolicy(format!("circadian:{}", other))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Policy {
    /// Best-fitness depth at every step.
    Oracle,
    /// Uniformly random depth at every step.
    RandomWalk,
    /// One index deeper with probability `probability_factor`, else one
    /// index shallower.
    DirectionalRandomWalk { probability_factor: f64 },
    HillClimbing,
    /// Diel migration: shallower by day, deeper by night.
    Circadian { speed: Speed },
    /// Fixed depth baseline.
    StableDepth { depth: f64 },
}

impl Policy {
    fn needs_sun_table(&self) -> bool {
        matches!(self, Policy::Circadian { .. })
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::Oracle => write!(f, "oracle"),
            Policy::RandomWalk => write!(f, "random-walk"),
            Policy::DirectionalRandomWalk { probability_factor } => {
                write!(f, "directional-random-walk:{}", probability_factor)
            }
            Policy::HillClimbing => write!(f, "hill-climbing"),
            Policy::Circadian { speed: Speed::Slow } => write!(f, "circadian:slow"),
            Policy::Circadian { speed: Speed::Fast } => write!(f, "circadian:fast"),
            Policy::StableDepth { depth } => write!(f, "stable:{}", depth),
        }
    }
}

impl FromStr for Policy {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        let (name, arg) = match lowered.split_once(':') {
            Some((name, arg)) => (name, Some(arg)),
            None => (lowered.as_str(), None),
        };
        let unknown = || FieldError::UnknownPolicy(s.to_string());
        match (name, arg) {
            ("oracle", None) => Ok(Policy::Oracle),
            ("random-walk", None) => Ok(Policy::RandomWalk),
            ("hill-climbing", None) => Ok(Policy::HillClimbing),
            ("directional-random-walk", arg) => {
                let probability_factor = match arg {
                    Some(raw) => raw.parse::<f64>().map_err(|_| unknown())?,
                    None => DEFAULT_PROBABILITY_FACTOR,
                };
                Ok(Policy::DirectionalRandomWalk { probability_factor })
            }
            ("circadian", Some(speed)) => Ok(Policy::Circadian {
                speed: speed.parse()?,
            }),
            ("stable", Some(depth)) => {
                let depth = depth.parse::<f64>().map_err(|_| unknown())?;
                Ok(Policy::StableDepth { depth })
            }
            _ => Err(unknown()),
        }
    }
}

/// Parallel per-step sequences produced by one simulator run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub policy: String,
    pub dates: Vec<NaiveDateTime>,
    pub depths: Vec<f64>,
    pub temperatures: Vec<f64>,
    pub fitnesses: Vec<f64>,
}

impl Trajectory {
    fn new(policy: &Policy) -> Self {
        Self {
            policy: policy.to_string(),
            ..Self::default()
        }
    }

    fn push(&mut self, date: NaiveDateTime, depth: f64, temperature: f64, fitness: f64) {
        self.dates.push(date);
        self.depths.push(depth);
        self.temperatures.push(temperature);
        self.fitnesses.push(fitness);
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn total_fitness(&self) -> f64 {
        self.fitnesses.iter().sum()
    }

    pub fn mean_fitness(&self) -> Option<f64> {
        if self.is_empty() {
            None
        } else {
            Some(self.total_fitness() / self.len() as f64)
        }
    }
}

/// Seeded runs are reproducible; unseeded runs draw from OS entropy.
pub fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Read-only view of a processed field over one time range.
#[derive(Clone, Copy, Debug)]
pub struct Simulation<'a> {
    grid: &'a Grid,
    fitness: &'a FitnessGrid,
    sun: Option<&'a SunTable>,
    start: NaiveDateTime,
    end: NaiveDateTime,
    step: Step,
}

impl<'a> Simulation<'a> {
    pub fn new(
        grid: &'a Grid,
        fitness: &'a FitnessGrid,
        start: NaiveDateTime,
        end: NaiveDateTime,
        step: Step,
    ) -> Self {
        Self {
            grid,
            fitness,
            sun: None,
            start,
            end,
            step,
        }
    }

    pub fn with_sun_table(mut self, sun: &'a SunTable) -> Self {
        self.sun = Some(sun);
        self
    }

    pub fn dates(&self) -> Vec<NaiveDateTime> {
        aligned_dates(self.grid, self.start, self.end, self.step)
    }

    pub fn run<R: Rng>(&self, policy: &Policy, rng: &mut R) -> Result<Trajectory, FieldError> {
        if policy.needs_sun_table() && self.sun.is_none() {
            return Err(FieldError::InvalidParameter(format!(
                "{} needs a sunrise/sunset table",
                policy
            )));
        }
        let dates = self.dates();
        debug!("{}: {} aligned steps", policy, dates.len());
        let trajectory = match policy {
            Policy::Oracle => self.oracle(policy, &dates)?,
            Policy::RandomWalk => self.random_walk(policy, &dates, rng)?,
            Policy::DirectionalRandomWalk { probability_factor } => {
                self.directional_walk(policy, &dates, *probability_factor, rng)?
            }
            Policy::HillClimbing => self.hill_climbing(policy, &dates, rng)?,
            Policy::Circadian { speed } => self.circadian(policy, &dates, *speed, rng)?,
            Policy::StableDepth { depth } => self.stable_depth(policy, &dates, *depth)?,
        };
        Ok(trajectory)
    }

    fn oracle(&self, policy: &Policy, dates: &[NaiveDateTime]) -> Result<Trajectory, FieldError> {
        let mut out = Trajectory::new(policy);
        for &date in dates {
            let mut best: Option<(f64, f64)> = None;
            for depth in self.depths_at(date)? {
                let fitness = self.fitness_at(date, depth)?;
                // Strict comparison keeps the shallowest depth on ties.
                if best.map_or(true, |(_, top)| fitness > top) {
                    best = Some((depth, fitness));
                }
            }
            let (depth, _) = best.ok_or(FieldError::EmptyDepthSet(date))?;
            self.record(&mut out, date, depth)?;
        }
        Ok(out)
    }

    fn random_walk<R: Rng>(
        &self,
        policy: &Policy,
        dates: &[NaiveDateTime],
        rng: &mut R,
    ) -> Result<Trajectory, FieldError> {
        let mut out = Trajectory::new(policy);
        for &date in dates {
            let depths = self.depths_at(date)?;
            let depth = *depths.choose(rng).ok_or(FieldError::EmptyDepthSet(date))?;
            self.record(&mut out, date, depth)?;
        }
        Ok(out)
    }

    fn directional_walk<R: Rng>(
        &self,
        policy: &Policy,
        dates: &[NaiveDateTime],
        probability_factor: f64,
        rng: &mut R,
    ) -> Result<Trajectory, FieldError> {
        if !(0.0..=1.0).contains(&probability_factor) {
            return Err(FieldError::InvalidParameter(format!(
                "probability factor must be within [0, 1], got {}",
                probability_factor
            )));
        }
        let mut out = Trajectory::new(policy);
        let mut index: Option<usize> = None;
        for &date in dates {
            let depths = self.depths_at(date)?;
            let last = depths.len() - 1;
            let next = match index {
                None => rng.gen_range(0..depths.len()),
                Some(previous) => {
                    let previous = previous.min(last);
                    if rng.gen::<f64>() <= probability_factor {
                        (previous + 1).min(last)
                    } else {
                        previous.saturating_sub(1)
                    }
                }
            };
            index = Some(next);
            self.record(&mut out, date, depths[next])?;
        }
        Ok(out)
    }

    fn hill_climbing<R: Rng>(
        &self,
        policy: &Policy,
        dates: &[NaiveDateTime],
        rng: &mut R,
    ) -> Result<Trajectory, FieldError> {
        let mut out = Trajectory::new(policy);
        let mut current: Option<f64> = None;
        for &date in dates {
            let depths = self.depths_at(date)?;
            let chosen = match current {
                None => *depths.choose(rng).ok_or(FieldError::EmptyDepthSet(date))?,
                Some(previous) => {
                    let idx = nearest_index(&depths, previous);
                    let mut best = (idx, self.fitness_at(date, depths[idx])?);
                    // Deeper neighbour first; a tie never displaces the current pick.
                    let neighbours = [idx.checked_add(1), idx.checked_sub(1)];
                    for candidate in neighbours.into_iter().flatten() {
                        if candidate >= depths.len() {
                            continue;
                        }
                        let fitness = self.fitness_at(date, depths[candidate])?;
                        if fitness > best.1 {
                            best = (candidate, fitness);
                        }
                    }
                    depths[best.0]
                }
            };
            current = Some(chosen);
            self.record(&mut out, date, chosen)?;
        }
        Ok(out)
    }

    fn circadian<R: Rng>(
        &self,
        policy: &Policy,
        dates: &[NaiveDateTime],
        speed: Speed,
        rng: &mut R,
    ) -> Result<Trajectory, FieldError> {
        let sun = self.sun.ok_or_else(|| {
            FieldError::InvalidParameter(format!("{} needs a sunrise/sunset table", policy))
        })?;
        let distance = speed.distance();
        let mut out = Trajectory::new(policy);
        let mut current: Option<f64> = None;
        let mut unlit_steps = 0usize;
        for &date in dates {
            let depths = self.depths_at(date)?;
            let chosen = match current {
                None => *depths.choose(rng).ok_or(FieldError::EmptyDepthSet(date))?,
                Some(previous) => {
                    let idx = nearest_index(&depths, previous);
                    let next = match sun.is_daytime(date) {
                        Some(true) => idx.saturating_sub(distance),
                        Some(false) => (idx + distance).min(depths.len() - 1),
                        None => {
                            unlit_steps += 1;
                            idx
                        }
                    };
                    depths[next]
                }
            };
            current = Some(chosen);
            self.record(&mut out, date, chosen)?;
        }
        if unlit_steps > 0 {
            warn!(
                "{}: {} steps had no sunrise/sunset entry and held depth",
                policy, unlit_steps
            );
        }
        Ok(out)
    }

    fn stable_depth(
        &self,
        policy: &Policy,
        dates: &[NaiveDateTime],
        depth: f64,
    ) -> Result<Trajectory, FieldError> {
        let mut out = Trajectory::new(policy);
        for &date in dates {
            if self.grid.cell(&date, depth).is_some() {
                self.record(&mut out, date, depth)?;
            }
        }
        if out.len() < dates.len() {
            debug!(
                "{}: depth missing at {} of {} steps",
                policy,
                dates.len() - out.len(),
                dates.len()
            );
        }
        Ok(out)
    }

    /// Sorted depths at `date`; never empty.
    fn depths_at(&self, date: NaiveDateTime) -> Result<Vec<f64>, FieldError> {
        let depths: Vec<f64> = self
            .grid
            .profile(&date)
            .map(|profile| profile.keys().map(|d| d.0).collect())
            .unwrap_or_default();
        if depths.is_empty() {
            return Err(FieldError::EmptyDepthSet(date));
        }
        Ok(depths)
    }

    fn fitness_at(&self, date: NaiveDateTime, depth: f64) -> Result<f64, FieldError> {
        self.fitness
            .get(&date, depth)
            .ok_or(FieldError::MissingFitness {
                timestamp: date,
                depth,
            })
    }

    fn record(
        &self,
        out: &mut Trajectory,
        date: NaiveDateTime,
        depth: f64,
    ) -> Result<(), FieldError> {
        let temperature = self
            .grid
            .cell(&date, depth)
            .map(|cell| cell.temperature)
            .ok_or(FieldError::EmptyDepthSet(date))?;
        let fitness = self.fitness_at(date, depth)?;
        out.push(date, depth, temperature, fitness);
        Ok(())
    }
}

/// Index of the depth closest to `target`; ties go to the shallower depth.
fn nearest_index(depths: &[f64], target: f64) -> usize {
    let mut best = (0usize, f64::INFINITY);
    for (idx, depth) in depths.iter().enumerate() {
        let distance = (depth - target).abs();
        if distance < best.1 {
            best = (idx, distance);
        }
    }
    best.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fitness::FitnessModel;
    use crate::grid::Cell;
    use crate::sun::SunWindow;
    use chrono::{Duration, NaiveDate};

    fn at(hour: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2005, 7, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::hours(hour)
    }

    /// Ten depths, warmest (and fittest) at 5 m.
    fn peaked_lake(hours: i64) -> Grid {
        let mut grid = Grid::new();
        for hour in 0..hours {
            for depth in 0..10 {
                let d = depth as f64;
                let temperature = 30.0 - 2.0 * (d - 5.0).abs();
                grid.insert_cell(at(hour), d, Cell::observed(temperature, ""));
            }
        }
        grid
    }

    fn fitness_for(grid: &Grid) -> FitnessGrid {
        FitnessGrid::evaluate(grid, &FitnessModel::default(), at(0), at(10_000))
    }

    fn index_of(depth: f64) -> usize {
        depth as usize
    }

    #[test]
    fn policy_names_round_trip() {
        for name in [
            "oracle",
            "random-walk",
            "directional-random-walk:0.25",
            "hill-climbing",
            "circadian:slow",
            "circadian:fast",
            "stable:2.5",
        ] {
            let policy: Policy = name.parse().unwrap();
            assert_eq!(policy.to_string(), name);
        }
        assert_eq!(
            "Directional-Random-Walk".parse::<Policy>().unwrap(),
            Policy::DirectionalRandomWalk {
                probability_factor: DEFAULT_PROBABILITY_FACTOR
            }
        );
    }

    #[test]
    fn unknown_policies_fail() {
        for name in ["teleport", "circadian:medium", "circadian", "stable:deep", "oracle:1"] {
            let err = name.parse::<Policy>().unwrap_err();
            assert!(matches!(err, FieldError::UnknownPolicy(_)), "{}", name);
        }
    }

    #[test]
    fn oracle_is_maximal_at_every_step() {
        let grid = peaked_lake(24);
        let fitness = fitness_for(&grid);
        let sim = Simulation::new(&grid, &fitness, at(0), at(23), Step::Hourly);
        let mut rng = rng_from_seed(Some(1));
        let path = sim.run(&Policy::Oracle, &mut rng).unwrap();
        assert_eq!(path.len(), 24);
        for (date, chosen) in path.dates.iter().zip(&path.fitnesses) {
            for (_, other) in fitness.profile(date).unwrap() {
                assert!(chosen >= other);
            }
        }
        assert!(path.depths.iter().all(|d| *d == 5.0));
    }

    #[test]
    fn oracle_ties_go_to_shallowest() {
        let mut grid = Grid::new();
        for depth in [3.0, 1.0, 2.0] {
            grid.insert_cell(at(0), depth, Cell::observed(18.0, ""));
        }
        let fitness = fitness_for(&grid);
        let sim = Simulation::new(&grid, &fitness, at(0), at(0), Step::Hourly);
        let path = sim.run(&Policy::Oracle, &mut rng_from_seed(Some(3))).unwrap();
        assert_eq!(path.depths, vec![1.0]);
    }

    #[test]
    fn hill_climbing_never_steps_downhill() {
        let grid = peaked_lake(48);
        let fitness = fitness_for(&grid);
        let sim = Simulation::new(&grid, &fitness, at(0), at(47), Step::Hourly);
        for seed in 0..20 {
            let path = sim.run(&Policy::HillClimbing, &mut rng_from_seed(Some(seed))).unwrap();
            for pair in path.fitnesses.windows(2) {
                assert!(pair[1] >= pair[0]);
            }
            for pair in path.depths.windows(2) {
                assert!((index_of(pair[1]) as i64 - index_of(pair[0]) as i64).abs() <= 1);
            }
            assert_eq!(path.depths.last(), Some(&5.0));
        }
    }

    #[test]
    fn hill_climbing_snaps_to_nearest_available_depth() {
        let mut grid = Grid::new();
        // Hour 0 only offers 4.0; hour 1 lacks 4.0 but has 3.9 and 6.0.
        grid.insert_cell(at(0), 4.0, Cell::observed(20.0, ""));
        grid.insert_cell(at(1), 3.9, Cell::observed(10.0, ""));
        grid.insert_cell(at(1), 6.0, Cell::observed(20.0, ""));
        grid.insert_cell(at(1), 9.0, Cell::observed(25.0, ""));
        let fitness = fitness_for(&grid);
        let sim = Simulation::new(&grid, &fitness, at(0), at(1), Step::Hourly);
        let path = sim.run(&Policy::HillClimbing, &mut rng_from_seed(Some(9))).unwrap();
        // Snapped to 3.9, whose only neighbour 6.0 is fitter.
        assert_eq!(path.depths, vec![4.0, 6.0]);
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let grid = peaked_lake(72);
        let fitness = fitness_for(&grid);
        let sun = SunTable::new(vec![SunWindow {
            sunrise: at(6),
            sunset: at(20),
        }]);
        let sim = Simulation::new(&grid, &fitness, at(0), at(71), Step::Hourly).with_sun_table(&sun);
        for policy in [
            Policy::RandomWalk,
            Policy::DirectionalRandomWalk {
                probability_factor: 0.4,
            },
            Policy::HillClimbing,
            Policy::Circadian { speed: Speed::Slow },
        ] {
            let first = sim.run(&policy, &mut rng_from_seed(Some(2))).unwrap();
            let second = sim.run(&policy, &mut rng_from_seed(Some(2))).unwrap();
            assert_eq!(first, second, "{}", policy);
        }
    }

    #[test]
    fn unseeded_random_walks_vary() {
        let grid = peaked_lake(200);
        let fitness = fitness_for(&grid);
        let sim = Simulation::new(&grid, &fitness, at(0), at(199), Step::Hourly);
        let first = sim.run(&Policy::RandomWalk, &mut rng_from_seed(None)).unwrap();
        let second = sim.run(&Policy::RandomWalk, &mut rng_from_seed(None)).unwrap();
        assert_ne!(first.depths, second.depths);
    }

    #[test]
    fn directional_walk_with_certain_descent_increases_index() {
        let grid = peaked_lake(30);
        let fitness = fitness_for(&grid);
        let sim = Simulation::new(&grid, &fitness, at(0), at(29), Step::Hourly);
        let policy = Policy::DirectionalRandomWalk {
            probability_factor: 1.0,
        };
        let path = sim.run(&policy, &mut rng_from_seed(Some(5))).unwrap();
        for pair in path.depths.windows(2) {
            let (prev, next) = (index_of(pair[0]), index_of(pair[1]));
            assert_eq!(next, (prev + 1).min(9));
        }
        assert_eq!(path.depths.last(), Some(&9.0));
    }

    #[test]
    fn directional_walk_with_zero_factor_surfaces() {
        let grid = peaked_lake(30);
        let fitness = fitness_for(&grid);
        let sim = Simulation::new(&grid, &fitness, at(0), at(29), Step::Hourly);
        let policy = Policy::DirectionalRandomWalk {
            probability_factor: 0.0,
        };
        let path = sim.run(&policy, &mut rng_from_seed(Some(5))).unwrap();
        for pair in path.depths.windows(2) {
            let (prev, next) = (index_of(pair[0]), index_of(pair[1]));
            assert_eq!(next, prev.saturating_sub(1));
        }
        assert_eq!(path.depths.last(), Some(&0.0));
    }

    #[test]
    fn directional_walk_rejects_bad_factor() {
        let grid = peaked_lake(2);
        let fitness = fitness_for(&grid);
        let sim = Simulation::new(&grid, &fitness, at(0), at(1), Step::Hourly);
        let policy = Policy::DirectionalRandomWalk {
            probability_factor: 1.5,
        };
        let err = sim.run(&policy, &mut rng_from_seed(Some(0))).unwrap_err();
        assert!(matches!(err, FieldError::InvalidParameter(_)));
    }

    #[test]
    fn circadian_rises_by_day_and_sinks_by_night() {
        let grid = peaked_lake(24);
        let fitness = fitness_for(&grid);
        let sun = SunTable::new(vec![SunWindow {
            sunrise: at(6),
            sunset: at(18),
        }]);
        let sim = Simulation::new(&grid, &fitness, at(0), at(23), Step::Hourly).with_sun_table(&sun);
        let policy = Policy::Circadian { speed: Speed::Slow };
        let path = sim.run(&policy, &mut rng_from_seed(Some(11))).unwrap();
        assert_eq!(path.len(), 24);
        for i in 1..path.len() {
            let prev = index_of(path.depths[i - 1]);
            let next = index_of(path.depths[i]);
            let hour = i as i64;
            if (6..18).contains(&hour) {
                assert_eq!(next, prev.saturating_sub(2), "hour {}", hour);
            } else {
                assert_eq!(next, (prev + 2).min(9), "hour {}", hour);
            }
        }
        // Twelve daylight hours pin the organism at the surface by dusk.
        assert_eq!(path.depths[17], 0.0);
    }

    #[test]
    fn circadian_holds_depth_on_days_without_sun_entry() {
        let grid = peaked_lake(24);
        let fitness = fitness_for(&grid);
        let sun = SunTable::default();
        let sim = Simulation::new(&grid, &fitness, at(0), at(23), Step::Hourly).with_sun_table(&sun);
        let policy = Policy::Circadian { speed: Speed::Fast };
        let path = sim.run(&policy, &mut rng_from_seed(Some(4))).unwrap();
        assert_eq!(path.len(), 24);
        assert!(path.depths.iter().all(|d| *d == path.depths[0]));
    }

    #[test]
    fn circadian_requires_a_sun_table() {
        let grid = peaked_lake(2);
        let fitness = fitness_for(&grid);
        let sim = Simulation::new(&grid, &fitness, at(0), at(1), Step::Hourly);
        let policy = Policy::Circadian { speed: Speed::Slow };
        let err = sim.run(&policy, &mut rng_from_seed(Some(0))).unwrap_err();
        assert!(matches!(err, FieldError::InvalidParameter(_)));
    }

    #[test]
    fn stable_depth_skips_steps_without_that_depth() {
        let mut grid = peaked_lake(3);
        grid.insert_cell(at(5), 1.5, Cell::observed(12.0, ""));
        let fitness = fitness_for(&grid);
        let sim = Simulation::new(&grid, &fitness, at(0), at(5), Step::Hourly);
        let path = sim
            .run(&Policy::StableDepth { depth: 2.0 }, &mut rng_from_seed(Some(0)))
            .unwrap();
        assert_eq!(path.dates, vec![at(0), at(1), at(2)]);
        assert_eq!(path.temperatures, vec![24.0; 3]);
    }

    #[test]
    fn steps_outside_range_or_grid_are_skipped() {
        let grid = peaked_lake(10);
        let fitness = fitness_for(&grid);
        let sim = Simulation::new(&grid, &fitness, at(-5), at(3), Step::Hourly);
        let path = sim.run(&Policy::RandomWalk, &mut rng_from_seed(Some(8))).unwrap();
        assert_eq!(path.dates, vec![at(0), at(1), at(2), at(3)]);
        assert_eq!(path.depths.len(), path.temperatures.len());
        assert_eq!(path.depths.len(), path.fitnesses.len());

        let daily = Simulation::new(&grid, &fitness, at(0), at(9), Step::Daily);
        assert_eq!(daily.dates(), vec![at(0)]);
    }

    #[test]
    fn missing_fitness_is_reported() {
        let grid = peaked_lake(4);
        let fitness = FitnessGrid::evaluate(&grid, &FitnessModel::default(), at(0), at(1));
        let sim = Simulation::new(&grid, &fitness, at(0), at(3), Step::Hourly);
        let err = sim.run(&Policy::Oracle, &mut rng_from_seed(Some(0))).unwrap_err();
        assert!(matches!(err, FieldError::MissingFitness { .. }));
    }

    #[test]
    fn trajectory_summary() {
        let grid = peaked_lake(4);
        let fitness = fitness_for(&grid);
        let sim = Simulation::new(&grid, &fitness, at(0), at(3), Step::Hourly);
        let path = sim.run(&Policy::Oracle, &mut rng_from_seed(Some(0))).unwrap();
        let expected = FitnessModel::default().evaluate(30.0, at(0));
        assert!((path.mean_fitness().unwrap() - expected).abs() < 1e-12);
        assert!(Trajectory::default().mean_fitness().is_none());
        assert_eq!(path.policy, "oracle");
    }
}
