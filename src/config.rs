//! Run configuration.
//!
//! Every field has a default, so an empty TOML file (or no file at all) is a
//! valid configuration once the two input sources are set.
//!
//! ```toml
//! power_curve = "https://example.org/turbines/v90-2mw.csv"
//! mast = "data/mast_2015_2019.csv"
//! year = 2018
//! bin_width = 1.0
//!
//! [mast_columns]
//! timestamp = "time"
//! speed = "ws_80m"
//!
//! [loess]
//! span = 0.75
//! degree = 2
//!
//! [kde_bandwidth]
//! rule = "silverman"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::distribution::BandwidthMethod;
use crate::error::{Error, Result};
use crate::loess::LoessParams;
use crate::weibull::GofCriterion;

/// Column names in the mast CSV export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MastColumns {
    /// Timestamp column.
    pub timestamp: String,
    /// Wind speed column (m/s).
    pub speed: String,
}

impl Default for MastColumns {
    fn default() -> Self {
        Self {
            timestamp: "timestamp".to_string(),
            speed: "wind_speed".to_string(),
        }
    }
}

/// Column names in the power-curve CSV. `None` takes the first two columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerCurveColumns {
    /// Wind speed column (m/s).
    pub speed: Option<String>,
    /// Power column (kW).
    pub power: Option<String>,
}

/// Variable names inside a NetCDF mast file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetCdfVariables {
    /// CF time coordinate (`<unit> since <epoch>`).
    pub time: String,
    /// Wind speed variable.
    pub speed: String,
}

impl Default for NetCdfVariables {
    fn default() -> Self {
        Self {
            time: "time".to_string(),
            speed: "wind_speed".to_string(),
        }
    }
}

/// Everything one analysis run needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Power-curve CSV: a local path or an http(s) URL.
    pub power_curve: String,
    /// Column names in the power-curve CSV.
    pub power_curve_columns: PowerCurveColumns,
    /// Mast data file (CSV, or NetCDF when the extension is `.nc`).
    pub mast: PathBuf,
    /// Column names in the mast CSV.
    pub mast_columns: MastColumns,
    /// Variable names in a NetCDF mast file.
    pub netcdf: NetCdfVariables,
    /// strftime format for mast timestamps; auto-detected when unset.
    pub timestamp_format: Option<String>,
    /// Cell values treated as missing, besides empty, `NA` and `NaN`.
    pub missing_sentinels: Vec<f64>,
    /// Speeds above this (m/s) are implausible and treated as missing.
    pub max_speed: f64,
    /// Calendar year to analyse; the latest year in the data when unset.
    pub year: Option<i32>,
    /// Width of the wind-speed bins (m/s).
    pub bin_width: f64,
    /// Loess power-curve smoothing.
    pub loess: LoessParams,
    /// KDE bandwidth rule.
    pub kde_bandwidth: BandwidthMethod,
    /// Grid points used for the KDE curve and CDF table.
    pub kde_points: usize,
    /// Criterion minimised by the MGE Weibull fit.
    pub mge_criterion: GofCriterion,
    /// Hours in the energy year.
    pub hours_per_year: f64,
    /// Nameplate power (kW); the largest power-curve value when unset.
    pub rated_power: Option<f64>,
    /// Output image.
    pub output: PathBuf,
    /// Optional JSON summary.
    pub json: Option<PathBuf>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            power_curve: String::new(),
            power_curve_columns: PowerCurveColumns::default(),
            mast: PathBuf::new(),
            mast_columns: MastColumns::default(),
            netcdf: NetCdfVariables::default(),
            timestamp_format: None,
            missing_sentinels: vec![-999.0, -9999.0],
            max_speed: 75.0,
            year: None,
            bin_width: 1.0,
            loess: LoessParams::default(),
            kde_bandwidth: BandwidthMethod::Silverman,
            kde_points: 512,
            mge_criterion: GofCriterion::CramerVonMises,
            hours_per_year: 8760.0,
            rated_power: None,
            output: PathBuf::from("wind_distribution_comparison.svg"),
            json: None,
        }
    }
}

impl AnalysisConfig {
    /// Reads a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_toml(&text).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(text: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Checks the values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.power_curve.trim().is_empty() {
            return Err(Error::Config("power curve source is not set".into()));
        }
        if self.mast.as_os_str().is_empty() {
            return Err(Error::Config("mast data path is not set".into()));
        }
        if !self.max_speed.is_finite() || self.max_speed <= 0.0 {
            return Err(Error::Config(format!(
                "max_speed must be positive, got {}",
                self.max_speed
            )));
        }
        if !self.bin_width.is_finite() || self.bin_width <= 0.0 {
            return Err(Error::Config(format!(
                "bin_width must be positive, got {}",
                self.bin_width
            )));
        }
        if !(self.loess.span > 0.0 && self.loess.span <= 1.0) {
            return Err(Error::Config(format!(
                "loess.span must be in (0, 1], got {}",
                self.loess.span
            )));
        }
        if !(1..=2).contains(&self.loess.degree) {
            return Err(Error::Config(format!(
                "loess.degree must be 1 or 2, got {}",
                self.loess.degree
            )));
        }
        if let BandwidthMethod::Manual(h) = self.kde_bandwidth {
            if !h.is_finite() || h <= 0.0 {
                return Err(Error::Config(format!("manual KDE bandwidth must be positive, got {h}")));
            }
        }
        if self.kde_points < 2 {
            return Err(Error::Config("kde_points must be at least 2".into()));
        }
        if !self.hours_per_year.is_finite() || self.hours_per_year <= 0.0 {
            return Err(Error::Config(format!(
                "hours_per_year must be positive, got {}",
                self.hours_per_year
            )));
        }
        if let Some(p) = self.rated_power {
            if !p.is_finite() || p <= 0.0 {
                return Err(Error::Config(format!("rated_power must be positive, got {p}")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> AnalysisConfig {
        AnalysisConfig {
            power_curve: "curve.csv".into(),
            mast: "mast.csv".into(),
            ..AnalysisConfig::default()
        }
    }

    #[test]
    fn defaults_validate_once_sources_set() {
        assert!(AnalysisConfig::default().validate().is_err());
        minimal().validate().expect("defaults are valid");
    }

    #[test]
    fn parses_full_toml() {
        let text = r#"
            power_curve = "https://example.org/curve.csv"
            mast = "mast.csv"
            year = 2016
            bin_width = 0.5
            hours_per_year = 8784.0
            mge_criterion = "anderson-darling"
            max_speed = 40.0

            [mast_columns]
            timestamp = "time"
            speed = "ws80"

            [loess]
            span = 0.5
            degree = 1

            [kde_bandwidth]
            rule = "manual"
            value = 0.4
        "#;
        let cfg = AnalysisConfig::from_toml(text).expect("valid toml");
        assert_eq!(cfg.year, Some(2016));
        assert_eq!(cfg.bin_width, 0.5);
        assert_eq!(cfg.mast_columns.speed, "ws80");
        assert_eq!(cfg.loess.degree, 1);
        assert_eq!(cfg.loess.robust_iterations, 0);
        assert_eq!(cfg.kde_bandwidth, BandwidthMethod::Manual(0.4));
        assert_eq!(cfg.mge_criterion, GofCriterion::AndersonDarling);
        assert_eq!(cfg.missing_sentinels, vec![-999.0, -9999.0]);
        assert_eq!(cfg.max_speed, 40.0);
        cfg.validate().expect("valid");
    }

    #[test]
    fn empty_toml_is_default() {
        let cfg = AnalysisConfig::from_toml("").expect("valid toml");
        assert_eq!(cfg, AnalysisConfig::default());
    }

    #[test]
    fn rejects_bad_values() {
        let cases = [
            AnalysisConfig { bin_width: 0.0, ..minimal() },
            AnalysisConfig { hours_per_year: -1.0, ..minimal() },
            AnalysisConfig { kde_points: 1, ..minimal() },
            AnalysisConfig { max_speed: f64::INFINITY, ..minimal() },
            AnalysisConfig { rated_power: Some(0.0), ..minimal() },
            AnalysisConfig { kde_bandwidth: BandwidthMethod::Manual(0.0), ..minimal() },
            AnalysisConfig {
                loess: LoessParams { span: 0.0, ..LoessParams::default() },
                ..minimal()
            },
            AnalysisConfig {
                loess: LoessParams { degree: 0, ..LoessParams::default() },
                ..minimal()
            },
        ];
        for cfg in cases {
            assert!(cfg.validate().is_err(), "{cfg:?}");
        }
    }
}
