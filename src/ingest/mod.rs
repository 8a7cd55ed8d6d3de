//! Input loading.
//!
//! - [`load_power_curve`]: turbine power curve from a local CSV or a URL
//! - [`load_wind_series`]: mast wind-speed time series from a CSV export
//! - `load_wind_series_netcdf`: the same from NetCDF (feature `netcdf`)
//!
//! Parsers take any [`std::io::Read`] so they can be exercised on in-memory
//! data; the `load_*` wrappers only add opening or fetching the source.

mod mast;
#[cfg(feature = "netcdf")]
mod netcdf;
mod power_curve;
pub mod time;

pub use mast::{load_wind_series, parse_wind_series, WindRecord, WindSeries};
#[cfg(feature = "netcdf")]
pub use netcdf::load_wind_series_netcdf;
pub use power_curve::{load_power_curve, parse_power_curve, PowerCurve, PowerCurveSample};

use crate::error::{Error, Result};

/// Cell text that always means "no value".
const MISSING_TOKENS: &[&str] = &["", "na", "nan", "null"];

/// Parses a numeric cell, mapping missing tokens and sentinels to `None`.
pub(crate) fn parse_optional_f64(
    input: &'static str,
    value: &str,
    row_index: usize,
    column: &str,
    sentinels: &[f64],
) -> Result<Option<f64>> {
    let trimmed = value.trim().trim_matches('"');
    if MISSING_TOKENS
        .iter()
        .any(|token| trimmed.eq_ignore_ascii_case(token))
    {
        return Ok(None);
    }

    let parsed = trimmed.parse::<f64>().map_err(|err| Error::DataRow {
        input,
        row_index,
        message: format!("failed to parse column '{column}' as float: {err}"),
    })?;
    if !parsed.is_finite() || sentinels.iter().any(|s| (parsed - s).abs() < 1e-9) {
        return Ok(None);
    }
    Ok(Some(parsed))
}

/// Locates a named column in a CSV header.
pub(crate) fn column_index(
    input: &'static str,
    headers: &csv::StringRecord,
    name: &str,
) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
        .ok_or_else(|| Error::InvalidHeader {
            input,
            message: format!(
                "column '{name}' not found (have: {})",
                headers.iter().collect::<Vec<_>>().join(", ")
            ),
        })
}

/// 1-based line of a record, falling back to its position after the header.
pub(crate) fn line_of(record: &csv::StringRecord, index: usize) -> usize {
    record
        .position()
        .map_or(index + 2, |p| p.line() as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_tokens_and_sentinels() {
        let s = [-999.0];
        for cell in ["", "  ", "NA", "nan", "NaN", "null", "\"\""] {
            assert_eq!(parse_optional_f64("t", cell, 2, "c", &s).expect("ok"), None, "{cell:?}");
        }
        assert_eq!(parse_optional_f64("t", "-999", 2, "c", &s).expect("ok"), None);
        assert_eq!(parse_optional_f64("t", "-999.0", 2, "c", &s).expect("ok"), None);
        assert_eq!(parse_optional_f64("t", " 7.25 ", 2, "c", &s).expect("ok"), Some(7.25));
        assert_eq!(parse_optional_f64("t", "-998", 2, "c", &s).expect("ok"), Some(-998.0));
    }

    #[test]
    fn garbage_reports_row() {
        let err = parse_optional_f64("mast", "abc", 17, "speed", &[]).unwrap_err();
        match err {
            Error::DataRow { input, row_index, message } => {
                assert_eq!(input, "mast");
                assert_eq!(row_index, 17);
                assert!(message.contains("speed"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn column_lookup_is_case_insensitive() {
        let headers = csv::StringRecord::from(vec!["Time", " WS_80m "]);
        assert_eq!(column_index("t", &headers, "ws_80m").expect("found"), 1);
        assert!(matches!(
            column_index("t", &headers, "dir"),
            Err(Error::InvalidHeader { .. })
        ));
    }
}
