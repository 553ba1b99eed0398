//! Date sequences and the grid-aligned walk shared by every consumer.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::grid::Grid;
use crate::FieldError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Step {
    #[default]
    Hourly,
    Daily,
}

impl Step {
    pub fn from_hourly(hourly: bool) -> Self {
        if hourly {
            Step::Hourly
        } else {
            Step::Daily
        }
    }

    pub fn duration(self) -> Duration {
        match self {
            Step::Hourly => Duration::hours(1),
            Step::Daily => Duration::days(1),
        }
    }

    /// Whether `timestamp` is reachable from `start` in whole steps.
    pub fn on_lattice(self, start: NaiveDateTime, timestamp: NaiveDateTime) -> bool {
        let offset = (timestamp - start).num_seconds();
        offset >= 0 && offset % self.duration().num_seconds() == 0
    }
}

/// `start`, `start + step`, ... up to and including `end`.
pub fn dates_between(start: NaiveDateTime, end: NaiveDateTime, step: Step) -> Vec<NaiveDateTime> {
    let mut out = Vec::new();
    let delta = step.duration();
    let mut current = Some(start);
    while let Some(date) = current.filter(|date| *date <= end) {
        out.push(date);
        // None past the last representable date.
        current = date.checked_add_signed(delta);
    }
    out
}

/// First and last hour of a calendar year.
pub fn year_bounds(year: i32) -> Result<(NaiveDateTime, NaiveDateTime), FieldError> {
    let start = NaiveDate::from_ymd_opt(year, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0));
    let end = NaiveDate::from_ymd_opt(year, 12, 31).and_then(|d| d.and_hms_opt(23, 0, 0));
    match (start, end) {
        (Some(start), Some(end)) => Ok((start, end)),
        _ => Err(FieldError::InvalidParameter(format!(
            "year {} is out of range",
            year
        ))),
    }
}

/// Ascending intersection of the requested date sequence and the grid.
pub fn aligned_dates(
    grid: &Grid,
    start: NaiveDateTime,
    end: NaiveDateTime,
    step: Step,
) -> Vec<NaiveDateTime> {
    if start > end {
        return Vec::new();
    }
    grid.range(start..=end)
        .map(|(timestamp, _)| *timestamp)
        .filter(|timestamp| step.on_lattice(start, *timestamp))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Cell, Grid};
    use chrono::Datelike;

    fn at(month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2005, month, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn hourly_range_includes_both_endpoints() {
        let dates = dates_between(at(1, 1, 0, 0), at(1, 1, 3, 0), Step::Hourly);
        assert_eq!(dates.len(), 4);
        assert_eq!(dates.first(), Some(&at(1, 1, 0, 0)));
        assert_eq!(dates.last(), Some(&at(1, 1, 3, 0)));
    }

    #[test]
    fn range_never_overshoots_unaligned_end() {
        let dates = dates_between(at(1, 1, 0, 0), at(1, 1, 2, 30), Step::Hourly);
        assert_eq!(dates.last(), Some(&at(1, 1, 2, 0)));
    }

    #[test]
    fn full_year_has_one_entry_per_hour() {
        let (start, end) = year_bounds(2005).unwrap();
        assert_eq!(dates_between(start, end, Step::Hourly).len(), 365 * 24);
        assert_eq!(dates_between(start, end, Step::Daily).len(), 365);
        let (start, end) = year_bounds(2004).unwrap();
        assert_eq!(dates_between(start, end, Step::Hourly).len(), 366 * 24);
    }

    #[test]
    fn range_stops_at_the_last_representable_date() {
        let last = NaiveDate::MAX.and_hms_opt(23, 0, 0).unwrap();
        let hourly = dates_between(last - Duration::hours(2), last, Step::Hourly);
        assert_eq!(hourly.len(), 3);
        assert_eq!(hourly.last(), Some(&last));
        assert_eq!(dates_between(last, last, Step::Daily), vec![last]);

        let (start, end) = year_bounds(NaiveDate::MAX.year()).unwrap();
        let year = dates_between(start, end, Step::Hourly);
        assert_eq!(year.last(), Some(&end));
    }

    #[test]
    fn aligned_dates_skips_off_lattice_and_out_of_range() {
        let mut grid = Grid::new();
        for t in [
            at(1, 1, 0, 0),
            at(1, 1, 0, 30),
            at(1, 1, 5, 0),
            at(1, 2, 0, 0),
            at(1, 9, 0, 0),
        ] {
            grid.insert_cell(t, 1.0, Cell::observed(4.0, ""));
        }
        let hourly = aligned_dates(&grid, at(1, 1, 0, 0), at(1, 2, 0, 0), Step::Hourly);
        assert_eq!(hourly, vec![at(1, 1, 0, 0), at(1, 1, 5, 0), at(1, 2, 0, 0)]);
        let daily = aligned_dates(&grid, at(1, 1, 0, 0), at(1, 2, 0, 0), Step::Daily);
        assert_eq!(daily, vec![at(1, 1, 0, 0), at(1, 2, 0, 0)]);
    }
}
