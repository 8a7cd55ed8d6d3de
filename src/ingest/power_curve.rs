use std::io::Read;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::{column_index, line_of, parse_optional_f64};
use crate::config::PowerCurveColumns;
use crate::error::{Error, Result};

const INPUT: &str = "power curve";

/// One manufacturer power-curve point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PowerCurveSample {
    /// Hub-height wind speed (m/s).
    pub speed: f64,
    /// Electrical power (kW).
    pub power: f64,
}

/// A turbine power curve with the non-producing points removed.
#[derive(Debug, Clone, Serialize)]
pub struct PowerCurve {
    /// Samples sorted by wind speed, all with positive power.
    pub samples: Vec<PowerCurveSample>,
    /// Rows dropped because the power was zero or negative.
    pub dropped_non_producing: usize,
    /// Rows dropped because a cell was missing.
    pub dropped_missing: usize,
}

impl PowerCurve {
    pub fn speeds(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.speed).collect()
    }

    pub fn powers(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.power).collect()
    }

    /// Largest tabulated power, used as rated power when none is configured.
    pub fn max_power(&self) -> f64 {
        self.samples.iter().map(|s| s.power).fold(0.0, f64::max)
    }
}

/// Loads a power curve from a local CSV path or an `http(s)://` URL.
pub fn load_power_curve(source: &str, columns: &PowerCurveColumns) -> Result<PowerCurve> {
    let curve = if is_url(source) {
        info!(url = source, "fetching power curve");
        let body = fetch(source)?;
        parse_power_curve(body.as_bytes(), columns)?
    } else {
        let path = Path::new(source);
        info!(path = %path.display(), "reading power curve");
        let file = std::fs::File::open(path).map_err(|e| Error::io(path, e))?;
        parse_power_curve(file, columns)?
    };
    info!(
        points = curve.samples.len(),
        dropped_non_producing = curve.dropped_non_producing,
        "power curve loaded"
    );
    Ok(curve)
}

fn is_url(source: &str) -> bool {
    let lower = source.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn fetch(url: &str) -> Result<String> {
    let fetch_err = |source| Error::Fetch {
        url: url.to_string(),
        source,
    };
    let response = reqwest::blocking::get(url).map_err(fetch_err)?;
    debug!(status = %response.status(), "power curve response");
    response
        .error_for_status()
        .map_err(fetch_err)?
        .text()
        .map_err(fetch_err)
}

/// Parses a power-curve CSV with a header row.
///
/// Speed and power come from the named columns, or the first two columns
/// when no names are given. Rows with missing cells and rows with zero or
/// negative power are dropped and counted; unparsable numbers are errors.
pub fn parse_power_curve<R: Read>(reader: R, columns: &PowerCurveColumns) -> Result<PowerCurve> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = rdr
        .headers()
        .map_err(|source| Error::Csv { input: INPUT, source })?
        .clone();

    let speed_idx = match &columns.speed {
        Some(name) => column_index(INPUT, &headers, name)?,
        None => 0,
    };
    let power_idx = match &columns.power {
        Some(name) => column_index(INPUT, &headers, name)?,
        None => 1,
    };
    if headers.len() <= speed_idx.max(power_idx) {
        return Err(Error::InvalidHeader {
            input: INPUT,
            message: format!("expected at least 2 columns, found {}", headers.len()),
        });
    }
    let speed_name = headers.get(speed_idx).unwrap_or("speed").to_string();
    let power_name = headers.get(power_idx).unwrap_or("power").to_string();

    let mut samples = Vec::new();
    let mut dropped_non_producing = 0;
    let mut dropped_missing = 0;
    for (index, record) in rdr.records().enumerate() {
        let record = record.map_err(|source| Error::Csv { input: INPUT, source })?;
        let line = line_of(&record, index);
        let cell = |i: usize| record.get(i).unwrap_or("");

        let speed = parse_optional_f64(INPUT, cell(speed_idx), line, &speed_name, &[])?;
        let power = parse_optional_f64(INPUT, cell(power_idx), line, &power_name, &[])?;
        match (speed, power) {
            (Some(speed), Some(power)) if power > 0.0 => {
                samples.push(PowerCurveSample { speed, power });
            }
            (Some(_), Some(_)) => dropped_non_producing += 1,
            _ => dropped_missing += 1,
        }
    }

    if dropped_missing > 0 {
        warn!(rows = dropped_missing, "power curve rows with missing cells skipped");
    }
    if samples.is_empty() {
        return Err(Error::EmptyData { input: INPUT });
    }
    samples.sort_by(|a, b| a.speed.total_cmp(&b.speed));

    Ok(PowerCurve {
        samples,
        dropped_non_producing,
        dropped_missing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CURVE: &str = "\
wind_speed,power_kw
0,0
1,0
2,0
3,0
4,66.3
5,152
6,280
7,457
8,690
9,978
10,1296
11,1598
12,1818
13,1935
14,1980
15,1995
16,2000
";

    #[test]
    fn drops_zero_power_rows() {
        let curve = parse_power_curve(CURVE.as_bytes(), &PowerCurveColumns::default())
            .expect("valid curve");
        assert_eq!(curve.samples.len(), 13);
        assert_eq!(curve.dropped_non_producing, 4);
        assert!(curve.samples.iter().all(|s| s.power > 0.0));
        assert_eq!(curve.samples[0], PowerCurveSample { speed: 4.0, power: 66.3 });
        assert_eq!(curve.max_power(), 2000.0);
    }

    #[test]
    fn named_columns_and_sorting() {
        let text = "power,note,speed\n500,a,8\n100,b,5\nNA,c,6\n";
        let columns = PowerCurveColumns {
            speed: Some("SPEED".into()),
            power: Some("power".into()),
        };
        let curve = parse_power_curve(text.as_bytes(), &columns).expect("valid");
        assert_eq!(curve.speeds(), vec![5.0, 8.0]);
        assert_eq!(curve.powers(), vec![100.0, 500.0]);
        assert_eq!(curve.dropped_missing, 1);
    }

    #[test]
    fn bad_number_reports_line() {
        let text = "v,p\n4,66\n5,oops\n";
        let err = parse_power_curve(text.as_bytes(), &PowerCurveColumns::default()).unwrap_err();
        assert!(matches!(err, Error::DataRow { row_index: 3, .. }), "{err:?}");
    }

    #[test]
    fn all_zero_is_empty() {
        let text = "v,p\n1,0\n2,0\n";
        let err = parse_power_curve(text.as_bytes(), &PowerCurveColumns::default()).unwrap_err();
        assert!(matches!(err, Error::EmptyData { .. }));
    }

    #[test]
    fn single_column_header_rejected() {
        let err = parse_power_curve("v\n1\n".as_bytes(), &PowerCurveColumns::default())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidHeader { .. }));
    }

    #[test]
    fn url_detection() {
        assert!(is_url("https://example.org/curve.csv"));
        assert!(is_url("HTTP://example.org/curve.csv"));
        assert!(!is_url("data/curve.csv"));
        assert!(!is_url("/tmp/https.csv"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_power_curve("/nonexistent/curve.csv", &PowerCurveColumns::default())
            .unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
