//! Sparse/dense temperature field keyed by timestamp, then depth.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::RangeInclusive;

use chrono::NaiveDateTime;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Depth key in meters. Totally ordered so profiles iterate shallow to deep.
pub type Depth = OrderedFloat<f64>;

/// One depth profile: every known cell at a single timestamp.
pub type Profile = BTreeMap<Depth, Cell>;

/// A single parsed sensor row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: NaiveDateTime,
    pub depth: f64,
    pub temperature: f64,
    pub flag: String,
    pub frequency: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellOrigin {
    Observed,
    Climatology,
    Interpolated,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub temperature: f64,
    pub flag: String,
    pub frequency: Option<String>,
    pub origin: CellOrigin,
}

impl Cell {
    pub fn observed(temperature: f64, flag: impl Into<String>) -> Self {
        Self {
            temperature,
            flag: flag.into(),
            frequency: None,
            origin: CellOrigin::Observed,
        }
    }

    /// Synthetic cells never carry a quality flag.
    pub fn synthetic(temperature: f64, origin: CellOrigin) -> Self {
        Self {
            temperature,
            flag: String::new(),
            frequency: None,
            origin,
        }
    }

    pub fn is_observed(&self) -> bool {
        self.origin == CellOrigin::Observed
    }
}

/// Flat form of one grid cell, used for export and caching.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridRow {
    pub timestamp: NaiveDateTime,
    pub depth: f64,
    pub temperature: f64,
    pub flag: String,
    pub frequency: Option<String>,
    pub origin: CellOrigin,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Grid {
    profiles: BTreeMap<NaiveDateTime, Profile>,
}

impl Grid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a grid from readings. The first reading for a (timestamp, depth)
    /// key wins; the second value is the number of dropped duplicates.
    pub fn from_readings<'a, I>(readings: I) -> (Self, usize)
    where
        I: IntoIterator<Item = &'a Reading>,
    {
        let mut grid = Self::new();
        let mut duplicates = 0usize;
        for reading in readings {
            if !grid.insert_reading(reading) {
                duplicates += 1;
            }
        }
        (grid, duplicates)
    }

    /// Returns false when the key was already occupied.
    pub fn insert_reading(&mut self, reading: &Reading) -> bool {
        let cell = Cell {
            temperature: reading.temperature,
            flag: reading.flag.clone(),
            frequency: reading.frequency.clone(),
            origin: CellOrigin::Observed,
        };
        self.insert_cell(reading.timestamp, reading.depth, cell)
    }

    /// Inserts only into a vacant key. Returns false when occupied.
    pub fn insert_cell(&mut self, timestamp: NaiveDateTime, depth: f64, cell: Cell) -> bool {
        let profile = self.profiles.entry(timestamp).or_default();
        match profile.entry(OrderedFloat(depth)) {
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(cell);
                true
            }
            std::collections::btree_map::Entry::Occupied(_) => false,
        }
    }

    /// Adds a whole profile for a timestamp not yet in the grid. Empty
    /// profiles and occupied timestamps are refused.
    pub fn insert_profile(&mut self, timestamp: NaiveDateTime, profile: Profile) -> bool {
        if profile.is_empty() || self.profiles.contains_key(&timestamp) {
            return false;
        }
        self.profiles.insert(timestamp, profile);
        true
    }

    pub fn profile(&self, timestamp: &NaiveDateTime) -> Option<&Profile> {
        self.profiles.get(timestamp)
    }

    pub(crate) fn profile_mut(&mut self, timestamp: &NaiveDateTime) -> Option<&mut Profile> {
        self.profiles.get_mut(timestamp)
    }

    pub fn cell(&self, timestamp: &NaiveDateTime, depth: f64) -> Option<&Cell> {
        self.profiles.get(timestamp)?.get(&OrderedFloat(depth))
    }

    pub fn contains(&self, timestamp: &NaiveDateTime) -> bool {
        self.profiles.contains_key(timestamp)
    }

    pub fn timestamps(&self) -> impl Iterator<Item = &NaiveDateTime> {
        self.profiles.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NaiveDateTime, &Profile)> {
        self.profiles.iter()
    }

    pub fn range(
        &self,
        span: RangeInclusive<NaiveDateTime>,
    ) -> impl Iterator<Item = (&NaiveDateTime, &Profile)> {
        self.profiles.range(span)
    }

    /// Every depth seen at any timestamp inside `span`.
    pub fn depths_in(&self, span: RangeInclusive<NaiveDateTime>) -> BTreeSet<Depth> {
        self.profiles
            .range(span)
            .flat_map(|(_, profile)| profile.keys().copied())
            .collect()
    }

    /// Number of timestamps.
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn cell_count(&self) -> usize {
        self.profiles.values().map(|p| p.len()).sum()
    }

    pub fn rows(&self) -> Vec<GridRow> {
        let mut out = Vec::with_capacity(self.cell_count());
        for (timestamp, profile) in &self.profiles {
            for (depth, cell) in profile {
                out.push(GridRow {
                    timestamp: *timestamp,
                    depth: depth.0,
                    temperature: cell.temperature,
                    flag: cell.flag.clone(),
                    frequency: cell.frequency.clone(),
                    origin: cell.origin,
                });
            }
        }
        out
    }

    pub fn from_rows(rows: Vec<GridRow>) -> Self {
        let mut grid = Self::new();
        for row in rows {
            let cell = Cell {
                temperature: row.temperature,
                flag: row.flag,
                frequency: row.frequency,
                origin: row.origin,
            };
            grid.insert_cell(row.timestamp, row.depth, cell);
        }
        grid
    }
}
