//! The end-to-end comparison run.
//!
//! Power curve → mast series → one calendar year → loess power model →
//! Weibull (MLE, MGE) and KDE → bin table → KS tests → AEP per model.
//!
//! [`run`] loads the inputs named in the configuration; [`analyse`] does the
//! rest on data already in memory.

use std::path::Path;

use chrono::Datelike;
use serde::Serialize;
use tracing::{debug, info, info_span, warn};

use crate::aep::{self, AepEstimate};
use crate::config::AnalysisConfig;
use crate::distribution::{
    empirical_table, kde, kde_bin_probabilities, kde_cdf_grid, EmpiricalTable, KdeResult,
    ModelBins,
};
use crate::error::{Error, Result};
use crate::ingest::{self, PowerCurve, PowerCurveSample, WindSeries};
use crate::loess::{Loess, PowerModel};
use crate::testing::{ks_test, ks_two_sample, KsTestResult};
use crate::weibull::{weibull_mge, weibull_mle, Weibull};

/// Grid resolution of the tabulated KDE CDF used by the KS test.
const KS_GRID_POINTS: usize = 4096;

/// Points on the smoothed power curve kept for plotting.
const CURVE_POINTS: usize = 200;

/// Label of the AEP computed record by record from the measured series.
pub const TIME_SERIES: &str = "Time series";

/// Fitted Weibull parameters.
#[derive(Debug, Clone, Serialize)]
pub struct WeibullFit {
    /// "Weibull MLE" or "Weibull MGE (CvM)" etc.
    pub method: String,
    pub shape: f64,
    pub scale: f64,
    /// Mean wind speed implied by the fit.
    pub mean_speed: f64,
    /// Log-likelihood on the fitted sample.
    pub log_likelihood: f64,
    /// Minimised goodness-of-fit statistic (MGE only).
    pub gof_statistic: Option<f64>,
    pub iterations: usize,
}

impl WeibullFit {
    /// The fitted distribution.
    pub fn distribution(&self) -> Option<Weibull> {
        Weibull::new(self.shape, self.scale)
    }
}

/// KS test of one model against the observed speeds.
#[derive(Debug, Clone, Serialize)]
pub struct ModelTest {
    pub model: String,
    #[serde(flatten)]
    pub result: KsTestResult,
}

/// Measured and smoothed power-curve points.
#[derive(Debug, Clone, Serialize)]
pub struct PowerCurveFit {
    /// Manufacturer points used for the fit.
    pub samples: Vec<PowerCurveSample>,
    /// Loess curve sampled evenly over the fitted range.
    pub smoothed: Vec<PowerCurveSample>,
    pub rated_power: f64,
    pub residual_se: f64,
}

/// Everything one run produces.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub year: i32,
    /// Valid records in the year.
    pub records: usize,
    /// Records in the year dropped as missing or invalid.
    pub missing_records: usize,
    /// Zero-speed records, excluded from the Weibull fits.
    pub calm_records: usize,
    pub sampling_interval_s: Option<f64>,
    pub recovery_rate: Option<f64>,
    pub mean_speed: f64,
    pub table: EmpiricalTable,
    pub weibull_mle: WeibullFit,
    pub weibull_mge: WeibullFit,
    pub kde: KdeResult,
    /// Per-bin probabilities of each model, aligned to `table`.
    pub model_bins: Vec<ModelBins>,
    pub ks_tests: Vec<ModelTest>,
    /// Two-sample KS of the year against the other years, when present.
    pub interannual_ks: Option<KsTestResult>,
    pub aep: Vec<AepEstimate>,
    pub power_curve: PowerCurveFit,
    pub hours_per_year: f64,
}

impl AnalysisReport {
    /// The KS result for `model`, if that model was tested.
    pub fn ks_for(&self, model: &str) -> Option<&KsTestResult> {
        self.ks_tests
            .iter()
            .find(|t| t.model == model)
            .map(|t| &t.result)
    }
}

/// Loads both inputs and runs the comparison.
pub fn run(config: &AnalysisConfig) -> Result<AnalysisReport> {
    config.validate()?;
    let curve = {
        let _span = info_span!("power_curve").entered();
        ingest::load_power_curve(&config.power_curve, &config.power_curve_columns)?
    };
    let series = {
        let _span = info_span!("mast").entered();
        load_mast(config)?
    };
    analyse(config, &curve, &series)
}

fn load_mast(config: &AnalysisConfig) -> Result<WindSeries> {
    let path = config.mast.as_path();
    if is_netcdf(path) {
        load_mast_netcdf(config, path)
    } else {
        ingest::load_wind_series(
            path,
            &config.mast_columns,
            &config.missing_sentinels,
            config.max_speed,
            config.timestamp_format.as_deref(),
        )
    }
}

#[cfg(feature = "netcdf")]
fn load_mast_netcdf(config: &AnalysisConfig, path: &Path) -> Result<WindSeries> {
    ingest::load_wind_series_netcdf(
        path,
        &config.netcdf,
        &config.missing_sentinels,
        config.max_speed,
    )
}

#[cfg(not(feature = "netcdf"))]
fn load_mast_netcdf(_config: &AnalysisConfig, path: &Path) -> Result<WindSeries> {
    Err(Error::Config(format!(
        "{} is NetCDF; rebuild with the `netcdf` feature",
        path.display()
    )))
}

fn is_netcdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("nc") || e.eq_ignore_ascii_case("nc4"))
}

/// Runs the comparison on loaded inputs.
pub fn analyse(
    config: &AnalysisConfig,
    curve: &PowerCurve,
    series: &WindSeries,
) -> Result<AnalysisReport> {
    config.validate()?;

    // Year selection
    let year = match config.year {
        Some(y) => y,
        None => series
            .latest_year()
            .ok_or(Error::EmptyData { input: "mast" })?,
    };
    let year_series = series.for_year(year);
    if year_series.is_empty() {
        return Err(Error::EmptyYear { year });
    }
    let speeds = year_series.speeds();
    let sampling_interval_s = year_series
        .sampling_interval()
        .map(|d| d.num_seconds() as f64);
    let recovery_rate = year_series.recovery_rate(year);
    let mean_speed = speeds.iter().sum::<f64>() / speeds.len() as f64;
    info!(
        year,
        records = speeds.len(),
        missing = year_series.missing_count(),
        mean_speed = format_args!("{mean_speed:.2}"),
        "year selected"
    );
    if let Some(rate) = recovery_rate {
        if rate < 0.9 {
            warn!(year, recovery = format_args!("{:.1}%", rate * 100.0), "low data recovery");
        }
    }

    // Power model
    let power_model = {
        let _span = info_span!("loess").entered();
        let fit = Loess::fit(&curve.speeds(), &curve.powers(), config.loess).ok_or_else(|| {
            Error::fit(
                "loess power curve",
                format!("{} points, span {}", curve.samples.len(), config.loess.span),
            )
        })?;
        let rated = config.rated_power.unwrap_or_else(|| curve.max_power());
        info!(
            points = curve.samples.len(),
            residual_se = format_args!("{:.2}", fit.residual_se()),
            rated_kw = rated,
            "power curve fitted"
        );
        PowerModel::new(fit, rated)
    };

    // Weibull fits on non-zero speeds
    let positive: Vec<f64> = speeds.iter().copied().filter(|&v| v > 0.0).collect();
    let calm_records = speeds.len() - positive.len();
    if calm_records > 0 {
        debug!(calm_records, "zero speeds excluded from Weibull fits");
    }
    let (weibull_mle, weibull_mge) = {
        let _span = info_span!("weibull").entered();
        fit_weibulls(config, &positive)?
    };

    // Empirical table and KDE
    let table = empirical_table(&speeds, config.bin_width).ok_or_else(|| {
        Error::fit(
            "empirical table",
            format!("cannot bin {} speeds at width {}", speeds.len(), config.bin_width),
        )
    })?;
    let kde_curve = {
        let _span = info_span!("kde").entered();
        let k = kde(&speeds, config.kde_bandwidth, config.kde_points)
            .ok_or_else(|| Error::fit("kernel density", "degenerate sample"))?;
        info!(bandwidth = format_args!("{:.4}", k.bandwidth), "kde computed");
        k
    };

    // Model bins aligned to the table
    let mle_dist = dist_of(&weibull_mle)?;
    let mge_dist = dist_of(&weibull_mge)?;
    let model_bins = vec![
        ModelBins::from_cdf(weibull_mle.method.clone(), &table, |v| mle_dist.cdf(v))
            .ok_or_else(|| Error::fit("model bins", "Weibull MLE has no mass in range"))?,
        ModelBins::from_cdf(weibull_mge.method.clone(), &table, |v| mge_dist.cdf(v))
            .ok_or_else(|| Error::fit("model bins", "Weibull MGE has no mass in range"))?,
        kde_bin_probabilities(&speeds, kde_curve.bandwidth, &table)
            .ok_or_else(|| Error::fit("model bins", "KDE has no mass in range"))?,
    ];
    for m in &model_bins {
        if m.captured_mass < 0.99 {
            warn!(
                model = %m.name,
                captured = format_args!("{:.4}", m.captured_mass),
                "model mass outside the binned range renormalised"
            );
        }
    }

    // Goodness of fit
    let (ks_tests, interannual_ks) = {
        let _span = info_span!("ks").entered();
        let grid = kde_cdf_grid(&speeds, kde_curve.bandwidth, KS_GRID_POINTS)
            .ok_or_else(|| Error::fit("KS test", "KDE CDF"))?;
        let tests = vec![
            model_test(&weibull_mle.method, ks_test(&positive, |v| mle_dist.cdf(v)))?,
            model_test(&weibull_mge.method, ks_test(&positive, |v| mge_dist.cdf(v)))?,
            model_test("KDE", ks_test(&speeds, |v| grid.eval(v)))?,
        ];
        for t in &tests {
            info!(
                model = %t.model,
                d = format_args!("{:.4}", t.result.statistic),
                p = format_args!("{:.3e}", t.result.p_value),
                "ks test"
            );
        }

        let others: Vec<f64> = series
            .records()
            .iter()
            .filter(|r| r.timestamp.year() != year)
            .map(|r| r.speed)
            .collect();
        let interannual = ks_two_sample(&speeds, &others);
        if let Some(r) = &interannual {
            info!(
                other_records = others.len(),
                d = format_args!("{:.4}", r.statistic),
                "year against remaining years"
            );
        }
        (tests, interannual)
    };

    // Energy
    let hours = config.hours_per_year;
    let mut aep = aep::compare(&table, &model_bins, &power_model, hours)
        .ok_or_else(|| Error::fit("AEP", "invalid bin probabilities"))?;
    let baseline = aep.first().map_or(0.0, |e| e.aep_mwh);
    let series_aep = aep::aep_from_series(&speeds, &power_model, hours)
        .ok_or_else(|| Error::fit("AEP", "empty series"))?;
    aep.push(AepEstimate::new(TIME_SERIES, series_aep, baseline, &power_model, hours));
    for e in &aep {
        info!(
            model = %e.model,
            aep_mwh = format_args!("{:.1}", e.aep_mwh),
            capacity_factor = format_args!("{:.3}", e.capacity_factor),
            "aep"
        );
    }

    Ok(AnalysisReport {
        year,
        records: speeds.len(),
        missing_records: year_series.missing_count(),
        calm_records,
        sampling_interval_s,
        recovery_rate,
        mean_speed,
        table,
        weibull_mle,
        weibull_mge,
        kde: kde_curve,
        model_bins,
        ks_tests,
        interannual_ks,
        aep,
        power_curve: power_curve_fit(curve, &power_model),
        hours_per_year: hours,
    })
}

fn fit_weibulls(config: &AnalysisConfig, positive: &[f64]) -> Result<(WeibullFit, WeibullFit)> {
    let mle = weibull_mle(positive).ok_or_else(|| {
        Error::fit("Weibull MLE", format!("{} positive speeds", positive.len()))
    })?;
    let mle_dist = mle.distribution();
    let mle_fit = WeibullFit {
        method: "Weibull MLE".to_string(),
        shape: mle.shape,
        scale: mle.scale,
        mean_speed: mle_dist.mean(),
        log_likelihood: mle.log_likelihood,
        gof_statistic: None,
        iterations: mle.iterations,
    };

    let mge = weibull_mge(positive, config.mge_criterion).ok_or_else(|| {
        Error::fit("Weibull MGE", format!("{} positive speeds", positive.len()))
    })?;
    let mge_dist = mge.distribution();
    let mge_fit = WeibullFit {
        method: format!("Weibull MGE ({})", mge.criterion.label()),
        shape: mge.shape,
        scale: mge.scale,
        mean_speed: mge_dist.mean(),
        log_likelihood: mge_dist.log_likelihood(positive).unwrap_or(f64::NEG_INFINITY),
        gof_statistic: Some(mge.statistic),
        iterations: mge.iterations,
    };

    for f in [&mle_fit, &mge_fit] {
        info!(
            method = %f.method,
            shape = format_args!("{:.4}", f.shape),
            scale = format_args!("{:.4}", f.scale),
            "weibull fitted"
        );
    }
    Ok((mle_fit, mge_fit))
}

fn dist_of(fit: &WeibullFit) -> Result<Weibull> {
    fit.distribution()
        .ok_or_else(|| Error::fit("Weibull", format!("{} gave invalid parameters", fit.method)))
}

fn model_test(model: &str, result: Option<KsTestResult>) -> Result<ModelTest> {
    let result = result.ok_or_else(|| Error::fit("KS test", format!("{model}: invalid sample")))?;
    Ok(ModelTest {
        model: model.to_string(),
        result,
    })
}

fn power_curve_fit(curve: &PowerCurve, model: &PowerModel) -> PowerCurveFit {
    let (lo, hi) = model.curve().range();
    let step = (hi - lo) / (CURVE_POINTS - 1) as f64;
    let smoothed = (0..CURVE_POINTS)
        .map(|i| {
            // Pin the last point to the range end against rounding
            let speed = if i + 1 == CURVE_POINTS { hi } else { lo + i as f64 * step };
            PowerCurveSample {
                speed,
                power: model.power(speed),
            }
        })
        .collect();
    PowerCurveFit {
        samples: curve.samples.clone(),
        smoothed,
        rated_power: model.rated_power(),
        residual_se: model.curve().residual_se(),
    }
}
