use std::path::Path;

use netcdf::AttributeValue;
use tracing::info;

use super::mast::{WindRecord, WindSeries};
use super::time::decode_cf_time;
use crate::config::NetCdfVariables;
use crate::error::{Error, Result};

fn nc_err(path: &Path, message: impl Into<String>) -> Error {
    Error::NetCdf {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

fn as_f64(value: AttributeValue) -> Option<f64> {
    match value {
        AttributeValue::Double(v) => Some(v),
        AttributeValue::Float(v) => Some(v as f64),
        AttributeValue::Int(v) => Some(v as f64),
        AttributeValue::Short(v) => Some(v as f64),
        _ => None,
    }
}

/// A speed is kept when finite, within `[0, max_speed]` and not a fill value.
fn is_valid_speed(speed: f64, fills: &[f64], max_speed: f64) -> bool {
    let is_fill = fills.iter().any(|f| (speed - f).abs() < 1e-9 * f.abs().max(1.0));
    speed.is_finite() && (0.0..=max_speed).contains(&speed) && !is_fill
}

/// Loads a 1-D wind-speed variable on a CF time axis from a NetCDF file.
///
/// Values equal to the variable's `_FillValue` or `missing_value`
/// attribute, or to one of `sentinels`, are missing, as are NaN, negative
/// and above-`max_speed` speeds.
pub fn load_wind_series_netcdf(
    path: &Path,
    variables: &NetCdfVariables,
    sentinels: &[f64],
    max_speed: f64,
) -> Result<WindSeries> {
    info!(path = %path.display(), "reading mast data (NetCDF)");
    let file = netcdf::open(path).map_err(|e| nc_err(path, e.to_string()))?;

    let time_var = file
        .variable(&variables.time)
        .ok_or_else(|| nc_err(path, format!("variable '{}' not found", variables.time)))?;
    let units = match time_var.attribute("units").map(|a| a.value()) {
        Some(Ok(AttributeValue::Str(s))) => s,
        _ => return Err(nc_err(path, format!("'{}' has no text units", variables.time))),
    };
    let offsets: Vec<f64> = time_var
        .get_values::<f64, _>(..)
        .map_err(|e| nc_err(path, e.to_string()))?;
    let times = decode_cf_time(&units, &offsets)
        .ok_or_else(|| nc_err(path, format!("unsupported time units '{units}'")))?;

    let speed_var = file
        .variable(&variables.speed)
        .ok_or_else(|| nc_err(path, format!("variable '{}' not found", variables.speed)))?;
    let speeds: Vec<f64> = speed_var
        .get_values::<f64, _>(..)
        .map_err(|e| nc_err(path, e.to_string()))?;
    if speeds.len() != times.len() {
        return Err(nc_err(
            path,
            format!(
                "'{}' has {} values but '{}' has {}",
                variables.speed,
                speeds.len(),
                variables.time,
                times.len()
            ),
        ));
    }

    let mut fills: Vec<f64> = ["_FillValue", "missing_value"]
        .iter()
        .filter_map(|name| speed_var.attribute(name))
        .filter_map(|a| a.value().ok())
        .filter_map(as_f64)
        .collect();
    fills.extend_from_slice(sentinels);

    let mut records = Vec::with_capacity(speeds.len());
    let mut missing = Vec::new();
    for (timestamp, speed) in times.into_iter().zip(speeds) {
        if is_valid_speed(speed, &fills, max_speed) {
            records.push(WindRecord { timestamp, speed });
        } else {
            missing.push(timestamp);
        }
    }
    if records.is_empty() {
        return Err(Error::EmptyData { input: "mast" });
    }

    let series = WindSeries::new(records, missing);
    info!(
        records = series.len(),
        missing = series.missing_count(),
        "mast data loaded"
    );
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_validity() {
        let fills = [-9999.0, 9.96921e36];
        assert!(is_valid_speed(0.0, &fills, 75.0));
        assert!(is_valid_speed(12.5, &fills, 75.0));
        assert!(!is_valid_speed(-0.1, &fills, 75.0));
        assert!(!is_valid_speed(80.0, &fills, 75.0));
        assert!(!is_valid_speed(1e12, &fills, 75.0));
        assert!(!is_valid_speed(-9999.0, &fills, 75.0));
        assert!(!is_valid_speed(f64::NAN, &fills, 75.0));
    }
}
