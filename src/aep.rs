//! Annual energy production.
//!
//! AEP combines a wind-speed distribution with a turbine power model:
//!
//! AEP = hours · Σᵢ pᵢ · P(vᵢ)
//!
//! where pᵢ is the probability of bin i and vᵢ its centre. Power is in kW,
//! so dividing by 1000 gives MWh.
//!
//! # Examples
//!
//! ```
//! use wind_aep::aep::aep_from_bins;
//! use wind_aep::loess::{Loess, LoessParams, PowerModel};
//!
//! let v: Vec<f64> = (0..=25).map(f64::from).collect();
//! let p = vec![1000.0; v.len()];
//! let model = PowerModel::new(Loess::fit(&v, &p, LoessParams::default()).unwrap(), 1000.0);
//!
//! // Half the time at 5 m/s, half at 10 m/s, flat 1 MW curve
//! let aep = aep_from_bins(&[0.5, 0.5], &[5.0, 10.0], &model, 8760.0).unwrap();
//! assert!((aep - 8760.0).abs() < 1e-6);
//! ```

use serde::Serialize;

use crate::distribution::{EmpiricalTable, ModelBins};
use crate::loess::PowerModel;

/// Label of the estimate built from the observed bin frequencies.
pub const EMPIRICAL: &str = "Empirical";

/// Energy yield under one wind-speed model.
#[derive(Debug, Clone, Serialize)]
pub struct AepEstimate {
    /// Model label.
    pub model: String,
    /// Annual energy production (MWh), never negative.
    pub aep_mwh: f64,
    /// AEP / (rated power · hours), in [0, 1] for a consistent power curve.
    pub capacity_factor: f64,
    /// (AEP - baseline) / baseline; `None` when the baseline is zero.
    pub relative_to_empirical: Option<f64>,
}

impl AepEstimate {
    /// Wraps an AEP value with its capacity factor and difference to
    /// `baseline_mwh`.
    pub fn new(
        model: impl Into<String>,
        aep_mwh: f64,
        baseline_mwh: f64,
        power: &PowerModel,
        hours: f64,
    ) -> Self {
        let capacity = power.rated_power() * hours / 1000.0;
        let capacity_factor = if capacity > 0.0 {
            aep_mwh / capacity
        } else {
            0.0
        };
        let relative_to_empirical =
            (baseline_mwh > 0.0).then(|| (aep_mwh - baseline_mwh) / baseline_mwh);
        Self {
            model: model.into(),
            aep_mwh,
            capacity_factor,
            relative_to_empirical,
        }
    }
}

/// AEP (MWh) from binned probabilities evaluated at the bin centres.
///
/// # Returns
///
/// `None` if the slices are empty or differ in length, a probability is
/// negative or non-finite, or `hours` is not positive and finite.
pub fn aep_from_bins(
    probabilities: &[f64],
    midpoints: &[f64],
    power: &PowerModel,
    hours: f64,
) -> Option<f64> {
    if probabilities.is_empty() || probabilities.len() != midpoints.len() {
        return None;
    }
    if !hours.is_finite() || hours <= 0.0 {
        return None;
    }
    if probabilities.iter().any(|p| !p.is_finite() || *p < 0.0) {
        return None;
    }
    let mean_kw: f64 = probabilities
        .iter()
        .zip(midpoints)
        .map(|(&p, &v)| p * power.power(v))
        .sum();
    Some(mean_kw * hours / 1000.0)
}

/// AEP (MWh) from the mean power over a measured speed series.
///
/// Avoids binning error: every observation is run through the power model.
///
/// # Returns
///
/// `None` if `speeds` is empty or `hours` is not positive and finite.
pub fn aep_from_series(speeds: &[f64], power: &PowerModel, hours: f64) -> Option<f64> {
    if speeds.is_empty() || !hours.is_finite() || hours <= 0.0 {
        return None;
    }
    let mean_kw = speeds.iter().map(|&v| power.power(v)).sum::<f64>() / speeds.len() as f64;
    Some(mean_kw * hours / 1000.0)
}

/// AEP under the empirical bin frequencies and under each model.
///
/// The first estimate is always [`EMPIRICAL`]; the others follow `models`
/// in order and report their difference to it.
///
/// # Returns
///
/// `None` if any model's bins do not match the table or under the
/// conditions of [`aep_from_bins`].
pub fn compare(
    table: &EmpiricalTable,
    models: &[ModelBins],
    power: &PowerModel,
    hours: f64,
) -> Option<Vec<AepEstimate>> {
    let midpoints = table.midpoints();
    let baseline = aep_from_bins(&table.probabilities(), &midpoints, power, hours)?;

    let mut estimates = Vec::with_capacity(models.len() + 1);
    estimates.push(AepEstimate::new(EMPIRICAL, baseline, baseline, power, hours));
    for m in models {
        let aep = aep_from_bins(&m.probabilities, &midpoints, power, hours)?;
        estimates.push(AepEstimate::new(m.name.clone(), aep, baseline, power, hours));
    }
    Some(estimates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::empirical_table;
    use crate::loess::{Loess, LoessParams};

    fn flat_model(kw: f64) -> PowerModel {
        let v: Vec<f64> = (0..=25).map(f64::from).collect();
        let p = vec![kw; v.len()];
        let fit = Loess::fit(&v, &p, LoessParams::default()).expect("valid fit");
        PowerModel::new(fit, kw)
    }

    /// Linear ramp from 3 to 13 m/s reaching 2000 kW.
    fn ramp_model() -> PowerModel {
        let v: Vec<f64> = (3..=13).map(f64::from).collect();
        let p: Vec<f64> = v.iter().map(|x| 200.0 * (x - 3.0) + 1.0).collect();
        let params = LoessParams {
            degree: 1,
            ..LoessParams::default()
        };
        PowerModel::new(Loess::fit(&v, &p, params).expect("valid fit"), 2001.0)
    }

    #[test]
    fn flat_curve_gives_full_year() {
        let model = flat_model(2000.0);
        let aep = aep_from_bins(&[0.2, 0.3, 0.5], &[2.5, 7.5, 12.5], &model, 8760.0)
            .expect("valid");
        assert!((aep - 17_520.0).abs() < 1e-6, "aep = {aep}");
    }

    #[test]
    fn out_of_range_bins_produce_nothing() {
        let model = ramp_model();
        // 1 m/s is below the first power-curve point, 30 m/s beyond the last
        let aep = aep_from_bins(&[0.5, 0.5], &[1.0, 30.0], &model, 8760.0).expect("valid");
        assert_eq!(aep, 0.0);
    }

    #[test]
    fn series_matches_bins_at_bin_centres() {
        let model = ramp_model();
        let speeds = [4.5, 4.5, 8.5, 12.5];
        let table = empirical_table(&speeds, 1.0).expect("valid");
        let from_bins =
            aep_from_bins(&table.probabilities(), &table.midpoints(), &model, 8760.0)
                .expect("valid");
        let from_series = aep_from_series(&speeds, &model, 8760.0).expect("valid");
        assert!((from_bins - from_series).abs() < 1e-6);
    }

    #[test]
    fn compare_reports_relative_difference() {
        let model = flat_model(1000.0);
        let table = empirical_table(&[1.5, 2.5, 3.5, 4.5], 1.0).expect("valid");
        let half = ModelBins::from_masses("Half", vec![0.0, 1.0, 1.0, 1.0, 1.0])
            .expect("valid");
        let estimates = compare(&table, &[half], &model, 8760.0).expect("valid");

        assert_eq!(estimates.len(), 2);
        assert_eq!(estimates[0].model, EMPIRICAL);
        assert_eq!(estimates[0].relative_to_empirical, Some(0.0));
        // Flat curve over the whole range: any distribution gives the same AEP
        assert!((estimates[0].aep_mwh - 8760.0).abs() < 1e-6);
        assert!((estimates[0].capacity_factor - 1.0).abs() < 1e-9);
        let rel = estimates[1].relative_to_empirical.expect("positive baseline");
        assert!(rel.abs() < 1e-9);
    }

    #[test]
    fn zero_baseline_has_no_relative_difference() {
        let model = ramp_model();
        let e = AepEstimate::new("X", 10.0, 0.0, &model, 8760.0);
        assert_eq!(e.relative_to_empirical, None);
    }

    #[test]
    fn rejects_invalid_input() {
        let model = flat_model(1.0);
        assert!(aep_from_bins(&[], &[], &model, 8760.0).is_none());
        assert!(aep_from_bins(&[1.0], &[1.0, 2.0], &model, 8760.0).is_none());
        assert!(aep_from_bins(&[-0.1, 1.1], &[1.0, 2.0], &model, 8760.0).is_none());
        assert!(aep_from_bins(&[1.0], &[1.0], &model, 0.0).is_none());
        assert!(aep_from_series(&[], &model, 8760.0).is_none());
        assert!(aep_from_series(&[5.0], &model, f64::NAN).is_none());
    }
}
