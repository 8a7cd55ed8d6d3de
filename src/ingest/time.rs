//! Timestamp parsing for mast exports.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};

/// Formats tried, in order, when no explicit format is configured.
pub const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// Parses a timestamp as UTC-naive.
///
/// With `format` set only that strftime pattern is used. Otherwise RFC 3339
/// (offset converted to UTC) is tried first, then [`TIMESTAMP_FORMATS`], then
/// a bare `%Y-%m-%d` date at midnight.
///
/// # Examples
///
/// ```
/// use wind_aep::ingest::time::parse_timestamp;
///
/// let a = parse_timestamp("2018-03-01T12:10:00+01:00", None).unwrap();
/// let b = parse_timestamp("2018-03-01 11:10", None).unwrap();
/// assert_eq!(a, b);
/// ```
pub fn parse_timestamp(value: &str, format: Option<&str>) -> Option<NaiveDateTime> {
    let trimmed = value.trim().trim_matches('"');
    if let Some(fmt) = format {
        return NaiveDateTime::parse_from_str(trimmed, fmt).ok();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_utc());
    }
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Decodes a CF-convention time axis (`"<unit> since <epoch>"`).
///
/// Supported units are seconds, minutes, hours and days (singular, plural or
/// abbreviated). Offsets are rounded to the nearest second.
///
/// # Returns
///
/// `None` if the units string is not recognised or an offset is non-finite.
///
/// # Examples
///
/// ```
/// use wind_aep::ingest::time::decode_cf_time;
///
/// let t = decode_cf_time("hours since 2000-01-01 00:00:00", &[0.0, 1.5]).unwrap();
/// assert_eq!(t[1].to_string(), "2000-01-01 01:30:00");
/// ```
pub fn decode_cf_time(units: &str, offsets: &[f64]) -> Option<Vec<NaiveDateTime>> {
    let (unit, epoch) = units.split_once(" since ")?;
    let seconds_per_unit = match unit.trim().to_ascii_lowercase().as_str() {
        "s" | "sec" | "secs" | "second" | "seconds" => 1.0,
        "min" | "mins" | "minute" | "minutes" => 60.0,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3600.0,
        "d" | "day" | "days" => 86_400.0,
        _ => return None,
    };
    // CF epochs may carry a trailing "UTC" or "Z"
    let epoch = epoch.trim().trim_end_matches("UTC").trim_end_matches('Z').trim();
    let epoch = parse_timestamp(epoch, None)?;

    offsets
        .iter()
        .map(|&o| {
            let secs = o * seconds_per_unit;
            if !secs.is_finite() {
                return None;
            }
            epoch.checked_add_signed(Duration::seconds(secs.round() as i64))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").expect("valid literal")
    }

    #[test]
    fn accepts_common_layouts() {
        let expected = ts("2017-06-05 14:20:00");
        for raw in [
            "2017-06-05T14:20:00Z",
            "2017-06-05 14:20:00",
            "2017-06-05T14:20:00",
            "2017-06-05 14:20",
            "05/06/2017 14:20",
            "\"2017-06-05 14:20:00\"",
        ] {
            assert_eq!(parse_timestamp(raw, None), Some(expected), "{raw}");
        }
        let midnight = parse_timestamp("2017-06-05", None).expect("date only");
        assert_eq!((midnight.day(), midnight.hour()), (5, 0));
    }

    #[test]
    fn explicit_format_only() {
        let fmt = Some("%d.%m.%Y %H.%M");
        assert_eq!(parse_timestamp("05.06.2017 14.20", fmt), Some(ts("2017-06-05 14:20:00")));
        assert_eq!(parse_timestamp("2017-06-05 14:20", fmt), None);
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_timestamp("yesterday", None), None);
        assert_eq!(parse_timestamp("", None), None);
    }

    #[test]
    fn cf_time_units() {
        let t = decode_cf_time("days since 1970-01-01", &[0.0, 17532.5]).expect("valid");
        assert_eq!(t[0], ts("1970-01-01 00:00:00"));
        assert_eq!(t[1], ts("2018-01-01 12:00:00"));

        let t = decode_cf_time("minutes since 2015-01-01 00:00:00 UTC", &[10.0]).expect("valid");
        assert_eq!(t[0].minute(), 10);

        assert!(decode_cf_time("fortnights since 2000-01-01", &[1.0]).is_none());
        assert!(decode_cf_time("hours", &[1.0]).is_none());
        assert!(decode_cf_time("hours since 2000-01-01", &[f64::NAN]).is_none());
    }
}
