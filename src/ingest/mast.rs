use std::io::Read;
use std::path::Path;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::{info, warn};
use u_numflow::stats;

use super::time::parse_timestamp;
use super::{column_index, line_of, parse_optional_f64};
use crate::config::MastColumns;
use crate::error::{Error, Result};

const INPUT: &str = "mast";

/// One valid wind-speed observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindRecord {
    pub timestamp: NaiveDateTime,
    /// Wind speed (m/s), finite and non-negative.
    pub speed: f64,
}

/// A cleaned wind-speed time series, sorted by timestamp.
///
/// Keeps the timestamps of rows whose speed was missing or invalid so data
/// recovery can be reported per year.
#[derive(Debug, Clone, Default)]
pub struct WindSeries {
    records: Vec<WindRecord>,
    missing: Vec<NaiveDateTime>,
}

impl WindSeries {
    /// Builds a series, sorting by time and dropping duplicate timestamps
    /// (the first occurrence wins). A timestamp with a valid record is never
    /// also counted as missing.
    pub fn new(mut records: Vec<WindRecord>, mut missing: Vec<NaiveDateTime>) -> Self {
        records.sort_by_key(|r| r.timestamp);
        let before = records.len();
        records.dedup_by_key(|r| r.timestamp);
        if records.len() < before {
            warn!(duplicates = before - records.len(), "duplicate timestamps dropped");
        }
        missing.sort();
        missing.dedup();
        missing.retain(|t| {
            records
                .binary_search_by_key(t, |r| r.timestamp)
                .is_err()
        });
        Self { records, missing }
    }

    pub fn records(&self) -> &[WindRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of rows removed for missing or invalid speeds.
    pub fn missing_count(&self) -> usize {
        self.missing.len()
    }

    pub fn speeds(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.speed).collect()
    }

    /// Distinct calendar years with at least one valid record, ascending.
    pub fn years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self.records.iter().map(|r| r.timestamp.year()).collect();
        years.dedup();
        years
    }

    pub fn latest_year(&self) -> Option<i32> {
        self.records.last().map(|r| r.timestamp.year())
    }

    /// The records (and missing rows) that fall in calendar year `year`.
    pub fn for_year(&self, year: i32) -> WindSeries {
        WindSeries {
            records: self
                .records
                .iter()
                .filter(|r| r.timestamp.year() == year)
                .copied()
                .collect(),
            missing: self
                .missing
                .iter()
                .filter(|t| t.year() == year)
                .copied()
                .collect(),
        }
    }

    /// Median spacing between consecutive valid records.
    ///
    /// # Returns
    ///
    /// `None` with fewer than 2 records.
    pub fn sampling_interval(&self) -> Option<Duration> {
        let steps: Vec<f64> = self
            .records
            .windows(2)
            .map(|w| (w[1].timestamp - w[0].timestamp).num_seconds() as f64)
            .filter(|&s| s > 0.0)
            .collect();
        let median = stats::median(&steps)?;
        Some(Duration::seconds(median.round() as i64))
    }

    /// Valid records in `year` as a share of the records expected at the
    /// series' sampling interval, capped at 1.
    pub fn recovery_rate(&self, year: i32) -> Option<f64> {
        let interval = self.sampling_interval()?.num_seconds();
        if interval <= 0 {
            return None;
        }
        let start = NaiveDate::from_ymd_opt(year, 1, 1)?;
        let end = NaiveDate::from_ymd_opt(year + 1, 1, 1)?;
        let year_seconds = (end - start).num_seconds();
        let expected = year_seconds as f64 / interval as f64;
        let valid = self
            .records
            .iter()
            .filter(|r| r.timestamp.year() == year)
            .count();
        Some((valid as f64 / expected).min(1.0))
    }
}

/// Loads a mast CSV export from disk. See [`parse_wind_series`].
pub fn load_wind_series(
    path: &Path,
    columns: &MastColumns,
    sentinels: &[f64],
    max_speed: f64,
    timestamp_format: Option<&str>,
) -> Result<WindSeries> {
    info!(path = %path.display(), "reading mast data");
    let file = std::fs::File::open(path).map_err(|e| Error::io(path, e))?;
    let series = parse_wind_series(file, columns, sentinels, max_speed, timestamp_format)?;
    info!(
        records = series.len(),
        missing = series.missing_count(),
        years = ?series.years(),
        "mast data loaded"
    );
    Ok(series)
}

/// Parses a mast CSV with a header row.
///
/// Speeds that are empty, `NA`/`NaN`, equal to a sentinel, negative or above
/// `max_speed` count as missing. A timestamp that cannot be parsed is an
/// error naming the line.
pub fn parse_wind_series<R: Read>(
    reader: R,
    columns: &MastColumns,
    sentinels: &[f64],
    max_speed: f64,
    timestamp_format: Option<&str>,
) -> Result<WindSeries> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = rdr
        .headers()
        .map_err(|source| Error::Csv { input: INPUT, source })?
        .clone();
    let ts_idx = column_index(INPUT, &headers, &columns.timestamp)?;
    let speed_idx = column_index(INPUT, &headers, &columns.speed)?;

    let mut records = Vec::new();
    let mut missing = Vec::new();
    let mut negative = 0usize;
    let mut implausible = 0usize;
    for (index, record) in rdr.records().enumerate() {
        let record = record.map_err(|source| Error::Csv { input: INPUT, source })?;
        let line = line_of(&record, index);

        let raw_ts = record.get(ts_idx).unwrap_or("");
        let timestamp = parse_timestamp(raw_ts, timestamp_format).ok_or_else(|| Error::DataRow {
            input: INPUT,
            row_index: line,
            message: format!("invalid timestamp '{raw_ts}'"),
        })?;

        let speed = parse_optional_f64(
            INPUT,
            record.get(speed_idx).unwrap_or(""),
            line,
            &columns.speed,
            sentinels,
        )?;
        match speed {
            Some(speed) if speed < 0.0 => {
                negative += 1;
                missing.push(timestamp);
            }
            Some(speed) if speed > max_speed => {
                implausible += 1;
                missing.push(timestamp);
            }
            Some(speed) => records.push(WindRecord { timestamp, speed }),
            None => missing.push(timestamp),
        }
    }

    if negative > 0 {
        warn!(rows = negative, "negative wind speeds treated as missing");
    }
    if implausible > 0 {
        warn!(rows = implausible, max_speed, "implausible wind speeds treated as missing");
    }
    if records.is_empty() {
        return Err(Error::EmptyData { input: INPUT });
    }
    Ok(WindSeries::new(records, missing))
}
