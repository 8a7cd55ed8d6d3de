//! Distribution analysis.
//!
//! Empirical distribution functions, the fixed-width wind-speed bin table,
//! kernel density estimation, and alignment of model CDFs to the bins.
//!
//! # Examples
//!
//! ```
//! use wind_aep::distribution::{ecdf, empirical_table};
//!
//! let data = [1.0, 2.0, 3.0, 4.0, 5.0];
//! let (values, probs) = ecdf(&data).unwrap();
//! assert_eq!(values.len(), 5);
//! assert!((probs[4] - 1.0).abs() < 1e-10);
//!
//! let table = empirical_table(&data, 1.0).unwrap();
//! assert_eq!(table.bins.len(), 5);
//! assert!((table.bins[4].cumulative - 1.0).abs() < 1e-12);
//! ```

use serde::Serialize;
use u_numflow::special;
use u_numflow::stats;

/// Computes the ECDF: F_n(x) = (number of observations ≤ x) / n.
///
/// # Returns
///
/// Tuple of (sorted unique values, cumulative probabilities). Returns
/// `None` if the data is empty or contains non-finite values.
///
/// # Examples
///
/// ```
/// use wind_aep::distribution::ecdf;
///
/// let data = [3.0, 1.0, 2.0, 1.0, 4.0];
/// let (vals, probs) = ecdf(&data).unwrap();
/// assert_eq!(vals, vec![1.0, 2.0, 3.0, 4.0]);
/// assert!((probs[0] - 0.4).abs() < 1e-10); // 2 values ≤ 1.0
/// assert!((probs[3] - 1.0).abs() < 1e-10);
/// ```
pub fn ecdf(data: &[f64]) -> Option<(Vec<f64>, Vec<f64>)> {
    if data.is_empty() || data.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let n = data.len() as f64;
    let mut sorted: Vec<f64> = data.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("finite values"));

    let mut values = Vec::new();
    let mut probs = Vec::new();

    let mut i = 0;
    while i < sorted.len() {
        let val = sorted[i];
        let mut j = i;
        while j < sorted.len() && sorted[j] == val {
            j += 1;
        }
        values.push(val);
        probs.push(j as f64 / n);
        i = j;
    }

    Some((values, probs))
}

/// Evaluates a step ECDF (as returned by [`ecdf`]) at `x`.
pub fn ecdf_at(values: &[f64], probs: &[f64], x: f64) -> f64 {
    let idx = values.partition_point(|&v| v <= x);
    if idx == 0 {
        0.0
    } else {
        probs[idx - 1]
    }
}

// ---------------------------------------------------------------------------
// Empirical bin table
// ---------------------------------------------------------------------------

/// One fixed-width wind-speed bin.
#[derive(Debug, Clone, Serialize)]
pub struct EmpiricalBin {
    /// Lower edge (exclusive, except 0 for the first bin).
    pub lower: f64,
    /// Upper edge (inclusive).
    pub upper: f64,
    /// Bin centre, used as the representative speed for energy yield.
    pub midpoint: f64,
    /// Number of observations in the bin.
    pub count: usize,
    /// count / n.
    pub probability: f64,
    /// Share of observations ≤ `upper`.
    pub cumulative: f64,
}

/// Wind speeds binned into fixed-width intervals starting at 0.
#[derive(Debug, Clone, Serialize)]
pub struct EmpiricalTable {
    /// Width of every bin.
    pub bin_width: f64,
    /// Bins in ascending order.
    pub bins: Vec<EmpiricalBin>,
    /// Number of observations.
    pub n: usize,
}

impl EmpiricalTable {
    /// Bin midpoints.
    pub fn midpoints(&self) -> Vec<f64> {
        self.bins.iter().map(|b| b.midpoint).collect()
    }

    /// Bin probabilities.
    pub fn probabilities(&self) -> Vec<f64> {
        self.bins.iter().map(|b| b.probability).collect()
    }

    /// Upper edge of the last bin.
    pub fn upper_edge(&self) -> f64 {
        self.bins.last().map_or(0.0, |b| b.upper)
    }
}

/// Largest bin count [`empirical_table`] will allocate.
pub const MAX_BINS: usize = 100_000;

/// Bins non-negative wind speeds into right-closed intervals of `bin_width`.
///
/// Bin i covers (i·w, (i+1)·w]; the first bin also holds exact zeros. The
/// cumulative probability of each bin therefore equals the ECDF at the
/// bin's upper edge. The table extends to the first edge at or above the
/// largest observation.
///
/// # Returns
///
/// `None` if data is empty, contains non-finite or negative values, the
/// width is not positive and finite, or the table would need more than
/// [`MAX_BINS`] bins.
///
/// # Examples
///
/// ```
/// use wind_aep::distribution::empirical_table;
///
/// let table = empirical_table(&[0.0, 0.4, 1.0, 1.2, 2.7], 1.0).unwrap();
/// let counts: Vec<usize> = table.bins.iter().map(|b| b.count).collect();
/// assert_eq!(counts, vec![3, 1, 1]);
/// assert!((table.bins[1].cumulative - 0.8).abs() < 1e-12);
/// ```
pub fn empirical_table(data: &[f64], bin_width: f64) -> Option<EmpiricalTable> {
    if data.is_empty() || !bin_width.is_finite() || bin_width <= 0.0 {
        return None;
    }
    if data.iter().any(|&v| !v.is_finite() || v < 0.0) {
        return None;
    }

    let max_val = data.iter().cloned().reduce(f64::max)?;
    let span = (max_val / bin_width).ceil();
    if !span.is_finite() || span >= MAX_BINS as f64 {
        return None;
    }
    let upper = |i: usize| (i + 1) as f64 * bin_width;
    let lower = |i: usize| i as f64 * bin_width;
    let mut n_bins = (span as usize).max(1);
    while upper(n_bins - 1) < max_val {
        n_bins += 1;
    }

    let mut counts = vec![0_usize; n_bins];
    for &x in data {
        let mut idx = ((x / bin_width).ceil() as usize).saturating_sub(1).min(n_bins - 1);
        // Settle rounding at the edges against the edges themselves
        while idx > 0 && x <= lower(idx) {
            idx -= 1;
        }
        while idx + 1 < n_bins && x > upper(idx) {
            idx += 1;
        }
        counts[idx] += 1;
    }

    let n = data.len();
    let nf = n as f64;
    let mut running = 0_usize;
    let bins = counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| {
            running += count;
            EmpiricalBin {
                lower: lower(i),
                upper: upper(i),
                midpoint: (i as f64 + 0.5) * bin_width,
                count,
                probability: count as f64 / nf,
                cumulative: running as f64 / nf,
            }
        })
        .collect();

    Some(EmpiricalTable {
        bin_width,
        bins,
        n,
    })
}

// ---------------------------------------------------------------------------
// Model bins
// ---------------------------------------------------------------------------

/// Per-bin probabilities of a fitted model, aligned to an [`EmpiricalTable`].
#[derive(Debug, Clone, Serialize)]
pub struct ModelBins {
    /// Model label (e.g. "Weibull MLE").
    pub name: String,
    /// Probability of each bin, normalised to sum to one.
    pub probabilities: Vec<f64>,
    /// Running sum of `probabilities`.
    pub cumulative: Vec<f64>,
    /// Model mass inside [0, last edge] before normalisation.
    pub captured_mass: f64,
}

impl ModelBins {
    /// Integrates a model CDF over each bin of `table`.
    ///
    /// The first bin starts at 0; mass the model places below 0 or above the
    /// last edge is dropped and the remainder renormalised. The unnormalised
    /// mass is kept in `captured_mass`.
    ///
    /// # Returns
    ///
    /// `None` if the CDF yields non-finite values or no mass in range.
    pub fn from_cdf(
        name: impl Into<String>,
        table: &EmpiricalTable,
        cdf: impl Fn(f64) -> f64,
    ) -> Option<Self> {
        let mut raw = Vec::with_capacity(table.bins.len());
        let mut prev = cdf(0.0);
        for bin in &table.bins {
            let next = cdf(bin.upper);
            if !next.is_finite() || !prev.is_finite() {
                return None;
            }
            raw.push((next - prev).max(0.0));
            prev = next;
        }
        Self::from_masses(name, raw)
    }

    /// Builds normalised model bins from raw per-bin masses.
    pub fn from_masses(name: impl Into<String>, raw: Vec<f64>) -> Option<Self> {
        let captured_mass: f64 = raw.iter().sum();
        if !captured_mass.is_finite() || captured_mass <= 0.0 {
            return None;
        }
        let probabilities: Vec<f64> = raw.iter().map(|p| p / captured_mass).collect();
        let mut acc = 0.0;
        let cumulative = probabilities
            .iter()
            .map(|p| {
                acc += p;
                acc
            })
            .collect();
        Some(Self {
            name: name.into(),
            probabilities,
            cumulative,
            captured_mass,
        })
    }
}

// ---------------------------------------------------------------------------
// Kernel Density Estimation
// ---------------------------------------------------------------------------

/// Bandwidth selection method for kernel density estimation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case", tag = "rule", content = "value")]
pub enum BandwidthMethod {
    /// Silverman's rule of thumb: h = 0.9 * min(σ, IQR/1.34) * n^(-1/5).
    /// Same as R's `bw.nrd0`.
    ///
    /// Reference: Silverman (1986), "Density Estimation for Statistics and
    /// Data Analysis"
    #[default]
    Silverman,
    /// Scott's rule: h = 1.06 * σ * n^(-1/5).
    ///
    /// Reference: Scott (1992), "Multivariate Density Estimation"
    Scott,
    /// Manual bandwidth specification.
    Manual(f64),
}

/// Result of kernel density estimation.
#[derive(Debug, Clone, Serialize)]
pub struct KdeResult {
    /// Evaluation points (x-axis).
    pub x: Vec<f64>,
    /// Density estimates at each evaluation point (y-axis).
    pub density: Vec<f64>,
    /// Bandwidth used.
    pub bandwidth: f64,
}

const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;

/// Gaussian kernel density estimation on an even grid.
///
/// # Algorithm
///
/// f̂(x) = (1/nh) Σᵢ K((x - xᵢ)/h)
///
/// where K(u) = (1/√(2π)) exp(-u²/2) is the Gaussian kernel and
/// h is the bandwidth.
///
/// The evaluation grid extends 3h beyond the data range to capture tail
/// contributions from boundary points.
///
/// # Returns
///
/// `None` if fewer than 2 data points, fewer than 2 grid points,
/// non-finite values, or zero variance (for automatic bandwidth methods).
///
/// # Examples
///
/// ```
/// use wind_aep::distribution::{kde, BandwidthMethod};
///
/// let data = [1.0, 1.1, 1.2, 2.0, 2.1, 2.2, 5.0];
/// let result = kde(&data, BandwidthMethod::Silverman, 512).unwrap();
/// assert_eq!(result.x.len(), 512);
/// let dx = result.x[1] - result.x[0];
/// let integral: f64 = result.density.iter().sum::<f64>() * dx;
/// assert!((integral - 1.0).abs() < 0.05);
/// ```
pub fn kde(data: &[f64], method: BandwidthMethod, n_points: usize) -> Option<KdeResult> {
    let n = data.len();
    if n < 2 || n_points < 2 || data.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let bandwidth = kde_bandwidth(data, method)?;

    let min_val = data.iter().cloned().reduce(f64::min)?;
    let max_val = data.iter().cloned().reduce(f64::max)?;
    let x_min = min_val - 3.0 * bandwidth;
    let x_max = max_val + 3.0 * bandwidth;
    let step = (x_max - x_min) / (n_points - 1) as f64;

    let x: Vec<f64> = (0..n_points).map(|i| x_min + i as f64 * step).collect();
    let density = x
        .iter()
        .map(|&xi| density_at(data, bandwidth, xi))
        .collect();

    Some(KdeResult {
        x,
        density,
        bandwidth,
    })
}

fn density_at(data: &[f64], bandwidth: f64, x: f64) -> f64 {
    let inv_h = 1.0 / bandwidth;
    let sum: f64 = data
        .iter()
        .map(|&xj| {
            let u = (x - xj) * inv_h;
            INV_SQRT_2PI * (-0.5 * u * u).exp()
        })
        .sum();
    sum * inv_h / data.len() as f64
}

/// Evaluates the kernel density estimate at a single point.
///
/// # Returns
///
/// `None` if data is empty, contains non-finite values, or bandwidth
/// is invalid.
pub fn kde_evaluate(data: &[f64], bandwidth: f64, x: f64) -> Option<f64> {
    if data.is_empty() || bandwidth <= 0.0 || !bandwidth.is_finite() || !x.is_finite() {
        return None;
    }
    if data.iter().any(|v| !v.is_finite()) {
        return None;
    }
    Some(density_at(data, bandwidth, x))
}

/// Cumulative distribution of the Gaussian KDE at `x`.
///
/// F̂(x) = (1/n) Σᵢ Φ((x - xᵢ)/h)
///
/// # Returns
///
/// `None` under the same conditions as [`kde_evaluate`].
pub fn kde_cdf(data: &[f64], bandwidth: f64, x: f64) -> Option<f64> {
    if data.is_empty() || bandwidth <= 0.0 || !bandwidth.is_finite() || !x.is_finite() {
        return None;
    }
    if data.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let inv_h = 1.0 / bandwidth;
    let sum: f64 = data
        .iter()
        .map(|&xj| special::standard_normal_cdf((x - xj) * inv_h))
        .sum();
    Some(sum / data.len() as f64)
}

/// A CDF tabulated on an even grid and evaluated by linear interpolation.
///
/// Used where the exact KDE CDF would cost O(n) per evaluation, such as a
/// KS test over a full year of records.
#[derive(Debug, Clone)]
pub struct GridCdf {
    x0: f64,
    step: f64,
    values: Vec<f64>,
}

impl GridCdf {
    /// Interpolated CDF at `x`, clamped to the tabulated end values.
    pub fn eval(&self, x: f64) -> f64 {
        let last = self.values.len() - 1;
        let pos = (x - self.x0) / self.step;
        if pos.is_nan() || pos <= 0.0 {
            return self.values[0];
        }
        if pos >= last as f64 {
            return self.values[last];
        }
        let i = pos.floor() as usize;
        let t = pos - i as f64;
        (self.values[i] + t * (self.values[i + 1] - self.values[i])).clamp(0.0, 1.0)
    }
}

/// Tabulates the KDE CDF on `n_points` spanning 4h beyond the data range.
///
/// Kernels more than 8 bandwidths away contribute exactly 0 or 1, so each
/// grid point only sums the samples within that window.
///
/// # Returns
///
/// `None` if fewer than 2 grid points or under the conditions of
/// [`kde_cdf`].
pub fn kde_cdf_grid(data: &[f64], bandwidth: f64, n_points: usize) -> Option<GridCdf> {
    if n_points < 2 {
        return None;
    }
    kde_cdf(data, bandwidth, 0.0)?;

    let mut sorted = data.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("finite values"));
    let lo = sorted[0] - 4.0 * bandwidth;
    let hi = sorted[sorted.len() - 1] + 4.0 * bandwidth;
    let step = (hi - lo) / (n_points - 1) as f64;
    let window = 8.0 * bandwidth;
    let inv_h = 1.0 / bandwidth;
    let nf = sorted.len() as f64;

    let values = (0..n_points)
        .map(|i| {
            let x = lo + i as f64 * step;
            let start = sorted.partition_point(|&v| v < x - window);
            let end = sorted.partition_point(|&v| v <= x + window);
            let partial: f64 = sorted[start..end]
                .iter()
                .map(|&v| special::standard_normal_cdf((x - v) * inv_h))
                .sum();
            ((start as f64 + partial) / nf).clamp(0.0, 1.0)
        })
        .collect();

    Some(GridCdf {
        x0: lo,
        step,
        values,
    })
}

/// Computes the bandwidth for KDE using the specified method.
///
/// # Returns
///
/// `None` if fewer than 2 data points, non-finite values, or zero
/// variance (for automatic methods).
pub fn kde_bandwidth(data: &[f64], method: BandwidthMethod) -> Option<f64> {
    let n = data.len();
    if n < 2 || data.iter().any(|v| !v.is_finite()) {
        return None;
    }

    match method {
        BandwidthMethod::Silverman => {
            let sd = stats::std_dev(data)?;
            if sd < 1e-300 {
                return None;
            }
            let q1 = stats::quantile(data, 0.25)?;
            let q3 = stats::quantile(data, 0.75)?;
            let iqr = q3 - q1;
            let spread = if iqr > 1e-300 {
                sd.min(iqr / 1.34)
            } else {
                sd
            };
            Some(0.9 * spread * (n as f64).powf(-0.2))
        }
        BandwidthMethod::Scott => {
            let sd = stats::std_dev(data)?;
            if sd < 1e-300 {
                return None;
            }
            Some(1.06 * sd * (n as f64).powf(-0.2))
        }
        BandwidthMethod::Manual(h) => {
            if h <= 0.0 || !h.is_finite() {
                None
            } else {
                Some(h)
            }
        }
    }
}

/// Probability the KDE assigns to each bin of `table`, normalised over the
/// binned support.
///
/// The KDE CDF is evaluated once per edge, so the cost is
/// O(n · (bins + 1)).
pub fn kde_bin_probabilities(
    data: &[f64],
    bandwidth: f64,
    table: &EmpiricalTable,
) -> Option<ModelBins> {
    let mut edges = Vec::with_capacity(table.bins.len() + 1);
    edges.push(kde_cdf(data, bandwidth, 0.0)?);
    for bin in &table.bins {
        edges.push(kde_cdf(data, bandwidth, bin.upper)?);
    }
    let raw = edges.windows(2).map(|w| (w[1] - w[0]).max(0.0)).collect();
    ModelBins::from_masses("KDE", raw)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn ecdf_last_is_one(
            data in proptest::collection::vec(-1e3_f64..1e3, 1..=50)
        ) {
            if let Some((_, probs)) = ecdf(&data) {
                let last = *probs.last().expect("non-empty");
                prop_assert!((last - 1.0).abs() < 1e-10, "last prob = {last}");
            }
        }

        #[test]
        fn table_cumulative_is_ecdf_at_edges(
            data in proptest::collection::vec(0.0_f64..30.0, 1..=200),
            width in prop_oneof![Just(0.25_f64), Just(0.5), Just(1.0), Just(2.0)],
        ) {
            let table = empirical_table(&data, width).expect("valid input");
            let (vals, probs) = ecdf(&data).expect("valid input");
            for bin in &table.bins {
                let expected = ecdf_at(&vals, &probs, bin.upper);
                prop_assert!(
                    (bin.cumulative - expected).abs() < 1e-12,
                    "edge {}: {} vs {}", bin.upper, bin.cumulative, expected
                );
            }
        }

        #[test]
        fn table_probabilities_sum_to_one(
            data in proptest::collection::vec(0.0_f64..40.0, 1..=200)
        ) {
            let table = empirical_table(&data, 1.0).expect("valid input");
            let total: f64 = table.probabilities().iter().sum();
            prop_assert!((total - 1.0).abs() < 1e-9, "total = {total}");
            let counted: usize = table.bins.iter().map(|b| b.count).sum();
            prop_assert_eq!(counted, data.len());
        }

        #[test]
        fn kde_density_non_negative(
            data in proptest::collection::vec(0.0_f64..25.0, 5..=50)
        ) {
            if let Some(r) = kde(&data, BandwidthMethod::Silverman, 128) {
                for &d in &r.density {
                    prop_assert!(d >= 0.0, "negative density: {d}");
                }
            }
        }

        #[test]
        fn kde_integral_approx_one(
            data in proptest::collection::vec(0.0_f64..25.0, 10..=80)
        ) {
            if let Some(r) = kde(&data, BandwidthMethod::Silverman, 512) {
                let dx = r.x[1] - r.x[0];
                let integral: f64 = r.density.iter().sum::<f64>() * dx;
                prop_assert!(
                    (integral - 1.0).abs() < 0.1,
                    "integral = {integral}, expected ≈ 1.0"
                );
            }
        }
    }
}
