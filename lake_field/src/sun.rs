//! Sunrise/sunset tables in the fixed-width almanac layout.
//!
//! After the header lines, every row is one day of the month: a two
//! character day number, two separator characters, then twelve 11-character
//! month columns of `HHMM HHMM` (rise, set). Blank columns are days that do
//! not exist in that month.

use std::io::BufRead;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ingest::{parse_hhmm, RejectedLine};
use crate::FieldError;

pub const DEFAULT_HEADER_LINES: usize = 3;
const DAY_WIDTH: usize = 2;
const ROW_PREFIX: usize = 4;
const MONTH_WIDTH: usize = 11;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SunWindow {
    pub sunrise: NaiveDateTime,
    pub sunset: NaiveDateTime,
}

impl SunWindow {
    /// Daytime is `[sunrise, sunset)`.
    pub fn is_daytime(&self, timestamp: NaiveDateTime) -> bool {
        timestamp >= self.sunrise && timestamp < self.sunset
    }
}

/// One window per day, sorted by date.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SunTable {
    windows: Vec<SunWindow>,
}

impl SunTable {
    pub fn new(mut windows: Vec<SunWindow>) -> Self {
        windows.sort_by_key(|w| w.sunrise);
        windows.dedup_by_key(|w| w.sunrise.date());
        Self { windows }
    }

    pub fn lookup(&self, date: NaiveDate) -> Option<&SunWindow> {
        self.windows
            .binary_search_by_key(&date, |w| w.sunrise.date())
            .ok()
            .map(|idx| &self.windows[idx])
    }

    /// `None` when the table has no entry for the timestamp's day.
    pub fn is_daytime(&self, timestamp: NaiveDateTime) -> Option<bool> {
        self.lookup(timestamp.date()).map(|w| w.is_daytime(timestamp))
    }

    pub fn windows(&self) -> &[SunWindow] {
        &self.windows
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

#[derive(Clone, Debug, Default)]
pub struct ParsedSunTable {
    pub header: Vec<String>,
    pub table: SunTable,
    pub rejected: Vec<RejectedLine>,
}

/// Parse a year's almanac. Rows whose day number is unreadable are
/// rejected whole; unreadable month cells only drop that day.
pub fn parse_sun_table<R: BufRead>(
    input: R,
    year: i32,
    header_lines: usize,
) -> Result<ParsedSunTable, FieldError> {
    let mut out = ParsedSunTable::default();
    let mut windows = Vec::new();

    for (idx, line) in input.lines().enumerate() {
        let line = line?;
        if idx < header_lines {
            out.header.push(line);
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }
        let line_no = idx as u64 + 1;
        let day = match line.get(..DAY_WIDTH).and_then(|s| s.trim().parse::<u32>().ok()) {
            Some(day) => day,
            None => {
                debug!("sun table line {}: unreadable day number", line_no);
                out.rejected.push(RejectedLine {
                    line: line_no,
                    raw: line.clone(),
                    reason: "unreadable day number".to_string(),
                });
                continue;
            }
        };
        let columns = line.as_bytes().get(ROW_PREFIX..).unwrap_or_default();
        for (month_idx, cell) in columns.chunks(MONTH_WIDTH).enumerate().take(12) {
            let month = month_idx as u32 + 1;
            let Ok(text) = std::str::from_utf8(cell) else {
                continue;
            };
            if text.trim().is_empty() {
                continue;
            }
            match parse_cell(text, year, month, day) {
                Some(window) => windows.push(window),
                None => debug!(
                    "sun table line {}: skipping malformed cell for month {}: '{}'",
                    line_no,
                    month,
                    text.trim()
                ),
            }
        }
    }

    out.table = SunTable::new(windows);
    Ok(out)
}

fn parse_cell(text: &str, year: i32, month: u32, day: u32) -> Option<SunWindow> {
    let values: Vec<&str> = text.split_whitespace().collect();
    let [rise, set] = values.as_slice() else {
        return None;
    };
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let (rise_h, rise_m) = parse_hhmm(rise)?;
    let (set_h, set_m) = parse_hhmm(set)?;
    Some(SunWindow {
        sunrise: date.and_hms_opt(rise_h, rise_m, 0)?,
        sunset: date.and_hms_opt(set_h, set_m, 0)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(day: u32, cells: &[&str]) -> String {
        let mut line = format!("{:02}  ", day);
        for cell in cells {
            line.push_str(&format!("{:<11}", cell));
        }
        line
    }

    fn table_text() -> String {
        let mut text = String::from("WAUSAU, WISCONSIN\nRise and Set for the Sun\n       Jan.       Feb.\n");
        text.push_str(&row(1, &["0738 1638", "0718 1715", "0640 1752"]));
        text.push('\n');
        text.push_str(&row(2, &["0738 1639", "   ", "0638 1753"]));
        text.push('\n');
        text.push_str(&row(3, &["0738 1640", "07x8 1717", "0636 1755"]));
        text.push('\n');
        text.push_str("xx  0738 1640\n");
        text.push_str(&row(30, &["0734 1706", "", "0545 1830"]));
        text.push('\n');
        text
    }

    fn at(month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2005, month, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn parses_windows_sorted_by_date() {
        let parsed = parse_sun_table(table_text().as_bytes(), 2005, DEFAULT_HEADER_LINES).unwrap();
        assert_eq!(parsed.header.len(), 3);
        let dates: Vec<_> = parsed
            .table
            .windows()
            .iter()
            .map(|w| w.sunrise.date())
            .collect();
        let mut sorted = dates.clone();
        sorted.sort();
        assert_eq!(dates, sorted);
        // Jan 1-3, Jan 30, Feb 1, Mar 1-3, Mar 30.
        assert_eq!(parsed.table.len(), 9);
        let jan1 = parsed.table.lookup(at(1, 1, 0, 0).date()).unwrap();
        assert_eq!(jan1.sunrise, at(1, 1, 7, 38));
        assert_eq!(jan1.sunset, at(1, 1, 16, 38));
    }

    #[test]
    fn blank_and_malformed_cells_leave_no_entry() {
        let parsed = parse_sun_table(table_text().as_bytes(), 2005, DEFAULT_HEADER_LINES).unwrap();
        assert!(parsed.table.lookup(at(2, 2, 0, 0).date()).is_none());
        assert!(parsed.table.lookup(at(2, 3, 0, 0).date()).is_none());
        assert!(parsed.table.is_daytime(at(2, 3, 12, 0)).is_none());
    }

    #[test]
    fn unreadable_day_rejects_the_line() {
        let parsed = parse_sun_table(table_text().as_bytes(), 2005, DEFAULT_HEADER_LINES).unwrap();
        assert_eq!(parsed.rejected.len(), 1);
        assert_eq!(parsed.rejected[0].raw, "xx  0738 1640");
        assert_eq!(parsed.rejected[0].line, 7);
    }

    #[test]
    fn daytime_is_half_open() {
        let parsed = parse_sun_table(table_text().as_bytes(), 2005, DEFAULT_HEADER_LINES).unwrap();
        let table = &parsed.table;
        assert_eq!(table.is_daytime(at(1, 2, 7, 38)), Some(true));
        assert_eq!(table.is_daytime(at(1, 2, 16, 39)), Some(false));
        assert_eq!(table.is_daytime(at(1, 2, 3, 0)), Some(false));
        assert_eq!(table.is_daytime(at(3, 30, 12, 0)), Some(true));
    }
}
