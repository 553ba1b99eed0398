//! Sensor file parsing for the hourly, daily and high-resolution exports.
//!
//! Rows that do not parse are collected as [`RejectedLine`]s so the caller
//! can write them to an error sidecar; they never abort a run.

use std::io::Read;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::grid::Reading;
use crate::FieldError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    /// `sampledate,year4,month,daynum,hour,depth,wtemp,flag_wtemp`
    #[default]
    Hourly,
    /// `sampledate,year4,month,daynum,depth,wtemp,flag_wtemp`
    Daily,
    /// `sampledate,year4,month,daynum,sample_time,data_freq,depth,wtemp,flag_wtemp`
    Hires,
}

impl Resolution {
    fn column_count(self) -> usize {
        match self {
            Resolution::Hourly => 8,
            Resolution::Daily => 7,
            Resolution::Hires => 9,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RejectedLine {
    pub line: u64,
    pub raw: String,
    pub reason: String,
}

#[derive(Clone, Debug, Default)]
pub struct ParsedReadings {
    pub header: Option<String>,
    pub readings: Vec<Reading>,
    pub rejected: Vec<RejectedLine>,
}

/// Parse a sensor export. Only I/O failures on the reader itself are errors.
///
/// Fields are split on bare commas; quote characters carry no meaning, so a
/// stray `"` cannot merge later rows into one field. Rejected rows keep the
/// input bytes of their line (lossily decoded) for the error sidecar.
pub fn parse_readings<R: Read>(input: R, resolution: Resolution) -> Result<ParsedReadings, FieldError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(input);

    let mut out = ParsedReadings::default();
    for (idx, result) in reader.byte_records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(err) => {
                if matches!(err.kind(), csv::ErrorKind::Io(_)) {
                    return Err(FieldError::Csv(err));
                }
                let line = err.position().map(|p| p.line()).unwrap_or(idx as u64 + 1);
                debug!("line {}: unreadable row: {}", line, err);
                out.rejected.push(RejectedLine {
                    line,
                    raw: String::new(),
                    reason: err.to_string(),
                });
                continue;
            }
        };
        // Unquoted, untrimmed fields rejoin to the original line.
        let line_bytes = record.iter().collect::<Vec<_>>().join(&b',');
        let raw = String::from_utf8_lossy(&line_bytes).into_owned();
        if idx == 0 {
            out.header = Some(raw);
            continue;
        }
        let line = record.position().map(|p| p.line()).unwrap_or(idx as u64 + 1);
        let parsed = record
            .iter()
            .map(|field| std::str::from_utf8(field).map(str::trim))
            .collect::<Result<Vec<&str>, _>>()
            .map_err(|err| format!("invalid UTF-8: {}", err))
            .and_then(|fields| parse_row(&fields, resolution));
        match parsed {
            Ok(reading) => out.readings.push(reading),
            Err(reason) => {
                debug!("line {}: rejected ({})", line, reason);
                out.rejected.push(RejectedLine { line, raw, reason });
            }
        }
    }
    Ok(out)
}

fn parse_row(fields: &[&str], resolution: Resolution) -> Result<Reading, String> {
    let expected = resolution.column_count();
    if fields.len() != expected {
        return Err(format!("expected {} columns, found {}", expected, fields.len()));
    }
    match resolution {
        Resolution::Hourly => {
            let hour_raw = parse_float(fields[4], "hour")?;
            // Military time: 100 -> 01:00.
            let hour = (hour_raw / 100.0).trunc();
            let timestamp = parse_sample_date(fields[0])?
                .with_hour(hour as u32)
                .filter(|_| (0.0..24.0).contains(&hour))
                .ok_or_else(|| format!("invalid hour '{}'", fields[4]))?;
            Ok(Reading {
                timestamp,
                depth: parse_float(fields[5], "depth")?,
                temperature: parse_float(fields[6], "wtemp")?,
                flag: fields[7].to_string(),
                frequency: None,
            })
        }
        Resolution::Daily => {
            let timestamp = parse_sample_date(fields[0])?
                .date()
                .and_hms_opt(0, 0, 0)
                .ok_or_else(|| format!("invalid sampledate '{}'", fields[0]))?;
            Ok(Reading {
                timestamp,
                depth: parse_float(fields[4], "depth")?,
                temperature: parse_float(fields[5], "wtemp")?,
                flag: fields[6].to_string(),
                frequency: None,
            })
        }
        Resolution::Hires => {
            let (hour, minute) = parse_hhmm(fields[4])
                .ok_or_else(|| format!("invalid sample_time '{}'", fields[4]))?;
            let timestamp = parse_sample_date(fields[0])?
                .date()
                .and_hms_opt(hour, minute, 0)
                .ok_or_else(|| format!("invalid sample_time '{}'", fields[4]))?;
            Ok(Reading {
                timestamp,
                depth: parse_float(fields[6], "depth")?,
                temperature: parse_float(fields[7], "wtemp")?,
                flag: fields[8].to_string(),
                frequency: Some(fields[5].to_string()),
            })
        }
    }
}

fn parse_sample_date(value: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| format!("invalid sampledate '{}'", value))
}

fn parse_float(value: &str, column: &str) -> Result<f64, String> {
    let parsed: f64 = value
        .parse()
        .map_err(|_| format!("non-numeric {} '{}'", column, value))?;
    if !parsed.is_finite() {
        return Err(format!("non-finite {} '{}'", column, value));
    }
    Ok(parsed)
}

/// `HHMM`, `HMM`, or `HH:MM` clock values.
pub(crate) fn parse_hhmm(value: &str) -> Option<(u32, u32)> {
    let digits: String = value.chars().filter(|c| *c != ':').collect();
    if digits.is_empty() || digits.len() > 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let number: u32 = digits.parse().ok()?;
    let (hour, minute) = (number / 100, number % 100);
    if hour < 24 && minute < 60 {
        Some((hour, minute))
    } else {
        None
    }
}
