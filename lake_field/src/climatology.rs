//! Year-independent mean temperature per calendar slot and depth.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{Datelike, NaiveDateTime, Timelike};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::grid::{Depth, Grid};

/// Month, day and time of day, without the year.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotKey {
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl SlotKey {
    pub fn of(timestamp: &NaiveDateTime) -> Self {
        Self {
            month: timestamp.month(),
            day: timestamp.day(),
            hour: timestamp.hour(),
            minute: timestamp.minute(),
            second: timestamp.second(),
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}-{:02} {:02}:{:02}:{:02}",
            self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

#[derive(Default)]
struct MeanAccumulator {
    sum: f64,
    count: usize,
}

impl MeanAccumulator {
    fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn mean(&self) -> f64 {
        self.sum / self.count as f64
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClimatologyTable {
    slots: HashMap<SlotKey, BTreeMap<Depth, f64>>,
}

impl ClimatologyTable {
    /// Average every observed temperature sharing a slot and depth across
    /// all years in the grid. Synthetic cells are ignored.
    pub fn from_grid(grid: &Grid) -> Self {
        let mut acc: HashMap<SlotKey, BTreeMap<Depth, MeanAccumulator>> = HashMap::new();
        for (timestamp, profile) in grid.iter() {
            let slot = acc.entry(SlotKey::of(timestamp)).or_default();
            for (depth, cell) in profile.iter().filter(|(_, c)| c.is_observed()) {
                slot.entry(*depth).or_default().push(cell.temperature);
            }
        }
        let slots = acc
            .into_iter()
            .map(|(key, depths)| {
                let means = depths
                    .into_iter()
                    .map(|(depth, acc)| (depth, acc.mean()))
                    .collect::<BTreeMap<_, _>>();
                (key, means)
            })
            .filter(|(_, means)| !means.is_empty())
            .collect();
        Self { slots }
    }

    pub fn insert(&mut self, slot: SlotKey, depth: f64, mean: f64) {
        self.slots
            .entry(slot)
            .or_default()
            .insert(OrderedFloat(depth), mean);
    }

    pub fn slot(&self, key: &SlotKey) -> Option<&BTreeMap<Depth, f64>> {
        self.slots.get(key)
    }

    pub fn mean(&self, key: &SlotKey, depth: f64) -> Option<f64> {
        self.slots.get(key)?.get(&OrderedFloat(depth)).copied()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
