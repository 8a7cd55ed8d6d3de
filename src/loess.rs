//! Local regression (loess) for turbine power curves.
//!
//! A manufacturer power curve is a handful of (wind speed, power) points;
//! loess turns it into a smooth function that can be evaluated at any bin
//! centre or measured speed without assuming a parametric shape.
//!
//! # Examples
//!
//! ```
//! use wind_aep::loess::{Loess, LoessParams};
//!
//! let x: Vec<f64> = (0..20).map(|i| i as f64).collect();
//! let y: Vec<f64> = x.iter().map(|v| 3.0 + 0.5 * v * v).collect();
//! let fit = Loess::fit(&x, &y, LoessParams::default()).unwrap();
//! assert!((fit.predict(7.5).unwrap() - (3.0 + 0.5 * 56.25)).abs() < 1e-8);
//! assert!(fit.predict(25.0).is_none()); // no extrapolation
//! ```
//!
//! # References
//!
//! - Cleveland, W.S. (1979). "Robust Locally Weighted Regression and
//!   Smoothing Scatterplots", *JASA* 74(368), pp. 829-836.
//! - Cleveland, W.S. & Devlin, S.J. (1988). "Locally Weighted Regression:
//!   An Approach to Regression Analysis by Local Fitting", *JASA* 83(403).

use serde::{Deserialize, Serialize};
use u_numflow::stats;

/// Smoothing parameters for [`Loess::fit`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoessParams {
    /// Fraction of points in each local neighbourhood, in (0, 1].
    pub span: f64,
    /// Degree of the local polynomial: 1 (linear) or 2 (quadratic).
    pub degree: usize,
    /// Bisquare robustness iterations; 0 gives the plain least-squares fit.
    pub robust_iterations: usize,
}

impl Default for LoessParams {
    fn default() -> Self {
        Self {
            span: 0.75,
            degree: 2,
            robust_iterations: 0,
        }
    }
}

/// A fitted loess curve.
#[derive(Debug, Clone)]
pub struct Loess {
    x: Vec<f64>,
    y: Vec<f64>,
    robustness: Vec<f64>,
    params: LoessParams,
    /// Number of neighbours in each local fit.
    q: usize,
    fitted: Vec<f64>,
    residual_se: f64,
}

impl Loess {
    /// Fits a loess curve to (x, y).
    ///
    /// Each local fit uses the `floor(span·n)` nearest points, weighted by
    /// the tricube kernel `(1 - (d/d_max)³)³`, where `d_max` is the distance
    /// to the farthest of them. With `robust_iterations > 0`, points are
    /// further down-weighted by the bisquare of their residual over 6·MAD
    /// and the fit repeated.
    ///
    /// # Returns
    ///
    /// `None` if lengths differ, inputs are non-finite, the span is outside
    /// (0, 1], the degree is not 1 or 2, or the neighbourhood holds fewer
    /// than degree + 1 points.
    pub fn fit(x: &[f64], y: &[f64], params: LoessParams) -> Option<Self> {
        let n = x.len();
        if n != y.len() || n < params.degree + 2 {
            return None;
        }
        if !(params.span > 0.0 && params.span <= 1.0) || !(1..=2).contains(&params.degree) {
            return None;
        }
        if x.iter().chain(y).any(|v| !v.is_finite()) {
            return None;
        }

        let q = ((n as f64 * params.span + 1e-5).floor() as usize).min(n);
        if q < params.degree + 1 {
            return None;
        }

        // Sort by x so the fitted range is [x[0], x[n-1]]
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| x[a].partial_cmp(&x[b]).expect("finite values"));
        let xs: Vec<f64> = order.iter().map(|&i| x[i]).collect();
        let ys: Vec<f64> = order.iter().map(|&i| y[i]).collect();

        let mut model = Self {
            x: xs,
            y: ys,
            robustness: vec![1.0; n],
            params,
            q,
            fitted: Vec::new(),
            residual_se: 0.0,
        };

        model.fitted = model.fit_all()?;
        for _ in 0..params.robust_iterations {
            let residuals: Vec<f64> = model
                .y
                .iter()
                .zip(&model.fitted)
                .map(|(y, f)| (y - f).abs())
                .collect();
            let mad = stats::median(&residuals)?;
            if mad < 1e-12 {
                break; // exact fit, nothing to down-weight
            }
            model.robustness = residuals
                .iter()
                .map(|&r| {
                    let u = r / (6.0 * mad);
                    if u < 1.0 {
                        let t = 1.0 - u * u;
                        t * t
                    } else {
                        0.0
                    }
                })
                .collect();
            model.fitted = model.fit_all()?;
        }

        let sse: f64 = model
            .y
            .iter()
            .zip(&model.fitted)
            .map(|(y, f)| (y - f) * (y - f))
            .sum();
        model.residual_se = (sse / n as f64).sqrt();
        Some(model)
    }

    /// Evaluates the curve at `x0`.
    ///
    /// Returns `None` outside the fitted x range or for non-finite input.
    pub fn predict(&self, x0: f64) -> Option<f64> {
        let (lo, hi) = self.range();
        if !x0.is_finite() || x0 < lo || x0 > hi {
            return None;
        }
        self.local_fit(x0)
    }

    /// Smallest and largest x in the fitted sample.
    pub fn range(&self) -> (f64, f64) {
        (self.x[0], self.x[self.x.len() - 1])
    }

    /// Fitted values at the (x-sorted) sample points.
    pub fn fitted(&self) -> &[f64] {
        &self.fitted
    }

    /// Sample points sorted by x.
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.x.iter().copied().zip(self.y.iter().copied())
    }

    /// Root mean squared residual of the final fit.
    pub fn residual_se(&self) -> f64 {
        self.residual_se
    }

    /// Parameters used for the fit.
    pub fn params(&self) -> LoessParams {
        self.params
    }

    fn fit_all(&self) -> Option<Vec<f64>> {
        self.x.iter().map(|&x0| self.local_fit(x0)).collect()
    }

    fn local_fit(&self, x0: f64) -> Option<f64> {
        let all: Vec<usize> = (0..self.x.len()).collect();
        let window = self.window_fit(x0, &all);
        if window.dropped == 0 || window.kept > self.params.degree {
            return window.value;
        }
        // Robustness weights left too few points for a local fit: take the
        // nearest points that still carry weight instead
        let weighted: Vec<usize> = all
            .into_iter()
            .filter(|&i| self.robustness[i] > 0.0)
            .collect();
        if weighted.is_empty() {
            return window.value;
        }
        self.window_fit(x0, &weighted).value.or(window.value)
    }

    /// Local fit at `x0` over the `q` nearest of `candidates`.
    fn window_fit(&self, x0: f64, candidates: &[usize]) -> Window {
        let q = self.q.min(candidates.len());
        let mut window = Window {
            value: None,
            kept: 0,
            dropped: 0,
        };
        if q == 0 {
            return window;
        }
        let mut dist: Vec<f64> = candidates.iter().map(|&i| (self.x[i] - x0).abs()).collect();
        dist.select_nth_unstable_by(q - 1, |a, b| a.partial_cmp(b).expect("finite values"));
        let d_max = dist[q - 1];

        let mut points: Vec<(f64, f64, f64)> = Vec::with_capacity(q);
        for &i in candidates {
            let offset = self.x[i] - x0;
            // Every neighbour at x0 reduces the fit to a weighted mean
            let (u, kernel) = if d_max > 0.0 {
                (offset / d_max, tricube(offset.abs() / d_max))
            } else if offset == 0.0 {
                (0.0, 1.0)
            } else {
                (0.0, 0.0)
            };
            if kernel <= 0.0 {
                continue;
            }
            let w = kernel * self.robustness[i];
            if w > 0.0 {
                points.push((u, self.y[i], w));
            } else {
                window.dropped += 1;
            }
        }
        window.kept = points.len();

        let mut degree = self.params.degree;
        window.value = loop {
            if let Some(beta0) = local_polynomial(points.iter().copied(), degree) {
                break Some(beta0);
            }
            if degree == 0 {
                break None;
            }
            // Too few distinct x in the window for this degree
            degree -= 1;
        };
        window
    }
}

/// Outcome of one local fit.
struct Window {
    value: Option<f64>,
    /// Points with positive combined weight.
    kept: usize,
    /// Points inside the kernel whose robustness weight is zero.
    dropped: usize,
}

fn tricube(u: f64) -> f64 {
    if u < 1.0 {
        let t = 1.0 - u * u * u;
        t * t * t
    } else {
        0.0
    }
}

/// Weighted least-squares polynomial in u, returning the value at u = 0.
fn local_polynomial(points: impl Iterator<Item = (f64, f64, f64)>, degree: usize) -> Option<f64> {
    let p = degree + 1;
    let mut a = [[0.0_f64; 3]; 3];
    let mut b = [0.0_f64; 3];
    for (u, y, w) in points {
        let phi = [1.0, u, u * u];
        for r in 0..p {
            b[r] += w * phi[r] * y;
            for c in 0..p {
                a[r][c] += w * phi[r] * phi[c];
            }
        }
    }
    if a[0][0] <= 0.0 {
        return None;
    }
    let coef = solve_small(&mut a, &mut b, p)?;
    coef[0].is_finite().then_some(coef[0])
}

/// Gaussian elimination with partial pivoting on the leading p×p block.
fn solve_small(a: &mut [[f64; 3]; 3], b: &mut [f64; 3], p: usize) -> Option<[f64; 3]> {
    let scale = (0..p).map(|i| a[i][i].abs()).fold(0.0_f64, f64::max);
    for col in 0..p {
        let pivot = (col..p).max_by(|&i, &j| {
            a[i][col]
                .abs()
                .partial_cmp(&a[j][col].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;
        if a[pivot][col].abs() <= 1e-10 * scale {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in (col + 1)..p {
            let factor = a[row][col] / a[col][col];
            for k in col..p {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = [0.0_f64; 3];
    for row in (0..p).rev() {
        let tail: f64 = ((row + 1)..p).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Some(x)
}

// ---------------------------------------------------------------------------
// Power model
// ---------------------------------------------------------------------------

/// Turbine power as a function of wind speed, backed by a loess fit.
///
/// Speeds outside the fitted power-curve range produce zero power (below
/// cut-in, above cut-out), and negative smoothed values near cut-in are
/// clamped to zero, so the model never returns negative power.
#[derive(Debug, Clone)]
pub struct PowerModel {
    curve: Loess,
    rated_power: f64,
}

impl PowerModel {
    /// Wraps a fitted curve. `rated_power` is only used for capacity factors.
    pub fn new(curve: Loess, rated_power: f64) -> Self {
        Self { curve, rated_power }
    }

    /// Power in the units of the curve (kW) at wind speed `v`.
    pub fn power(&self, v: f64) -> f64 {
        match self.curve.predict(v) {
            Some(p) if p.is_finite() => p.max(0.0),
            _ => 0.0,
        }
    }

    /// Nameplate power.
    pub fn rated_power(&self) -> f64 {
        self.rated_power
    }

    /// The underlying loess fit.
    pub fn curve(&self) -> &Loess {
        &self.curve
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(n: usize, step: f64) -> Vec<f64> {
        (0..n).map(|i| i as f64 * step).collect()
    }

    #[test]
    fn reproduces_quadratic_exactly() {
        let x = grid(25, 0.5);
        let y: Vec<f64> = x.iter().map(|v| 1.0 - 2.0 * v + 0.3 * v * v).collect();
        let fit = Loess::fit(&x, &y, LoessParams::default()).expect("should fit");
        for (f, yi) in fit.fitted().iter().zip(&y) {
            assert!((f - yi).abs() < 1e-8);
        }
        let p = fit.predict(3.3).expect("in range");
        assert!((p - (1.0 - 6.6 + 0.3 * 3.3 * 3.3)).abs() < 1e-8);
        assert!(fit.residual_se() < 1e-8);
    }

    #[test]
    fn linear_degree_reproduces_line() {
        let x = grid(15, 1.0);
        let y: Vec<f64> = x.iter().map(|v| 4.0 + 1.5 * v).collect();
        let params = LoessParams {
            span: 0.4,
            degree: 1,
            robust_iterations: 0,
        };
        let fit = Loess::fit(&x, &y, params).expect("should fit");
        assert!((fit.predict(6.25).expect("in range") - (4.0 + 1.5 * 6.25)).abs() < 1e-9);
    }

    #[test]
    fn no_extrapolation() {
        let x = grid(10, 1.0);
        let y = x.clone();
        let fit = Loess::fit(&x, &y, LoessParams::default()).expect("should fit");
        assert!(fit.predict(-0.1).is_none());
        assert!(fit.predict(9.1).is_none());
        assert!(fit.predict(f64::NAN).is_none());
        assert!(fit.predict(9.0).is_some());
        assert_eq!(fit.range(), (0.0, 9.0));
    }

    #[test]
    fn unsorted_input() {
        let x = [3.0, 1.0, 4.0, 0.0, 2.0, 5.0, 6.0];
        let y: Vec<f64> = x.iter().map(|v| v * v).collect();
        let fit = Loess::fit(&x, &y, LoessParams::default()).expect("should fit");
        assert!((fit.predict(2.5).expect("in range") - 6.25).abs() < 1e-8);
        let xs: Vec<f64> = fit.points().map(|(x, _)| x).collect();
        assert!(xs.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn robustness_downweights_outlier() {
        let x = grid(30, 1.0);
        let mut y: Vec<f64> = x.iter().map(|v| 2.0 * v + 0.5 * (1.7 * v).sin()).collect();
        y[15] = 200.0;
        let params = |robust_iterations| LoessParams {
            span: 0.3,
            degree: 1,
            robust_iterations,
        };
        let plain = Loess::fit(&x, &y, params(0)).expect("should fit");
        let robust = Loess::fit(&x, &y, params(4)).expect("should fit");
        let err_plain = (plain.predict(15.0).expect("in range") - 30.0).abs();
        let err_robust = (robust.predict(15.0).expect("in range") - 30.0).abs();
        assert!(err_robust < 0.1 * err_plain, "{err_robust} vs {err_plain}");
        // Windows whose points were all down-weighted still fit
        for (i, f) in robust.fitted().iter().enumerate() {
            assert!(f.is_finite(), "x = {i}");
            if i != 15 {
                assert!((f - 2.0 * i as f64).abs() < 5.0, "x = {i}: {f}");
            }
        }
    }

    #[test]
    fn robustness_on_power_curve_with_spike() {
        let speeds: Vec<f64> = (3..=25).map(f64::from).collect();
        let mut power: Vec<f64> = speeds
            .iter()
            .map(|&v| if v < 12.0 { 2000.0 * ((v - 3.0) / 9.0).powi(3) } else { 2000.0 })
            .collect();
        power[12] = 9000.0;
        let params = LoessParams {
            span: 0.3,
            degree: 1,
            robust_iterations: 3,
        };
        let fit = Loess::fit(&speeds, &power, params).expect("should fit");
        let at_spike = fit.predict(speeds[12]).expect("in range");
        assert!((at_spike - 2000.0).abs() < 200.0, "p = {at_spike}");
    }

    #[test]
    fn rejects_invalid_input() {
        let x = grid(10, 1.0);
        let y = x.clone();
        assert!(Loess::fit(&x, &y[..9], LoessParams::default()).is_none());
        assert!(Loess::fit(&x[..3], &y[..3], LoessParams::default()).is_none());
        let with = |span, degree| LoessParams {
            span,
            degree,
            robust_iterations: 0,
        };
        assert!(Loess::fit(&x, &y, with(1.5, 2)).is_none());
        assert!(Loess::fit(&x, &y, with(0.75, 3)).is_none());
        assert!(Loess::fit(&x, &y, with(0.1, 2)).is_none());
        let mut with_nan = y.clone();
        with_nan[2] = f64::NAN;
        assert!(Loess::fit(&x, &with_nan, LoessParams::default()).is_none());
    }

    #[test]
    fn repeated_x_values() {
        let x = [1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 3.0, 3.0, 3.0];
        let y = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        let fit = Loess::fit(&x, &y, LoessParams::default()).expect("should fit");
        let p = fit.predict(2.0).expect("in range");
        assert!(p.is_finite() && (p - 5.0).abs() < 1.0, "p = {p}");
    }

    #[test]
    fn power_model_never_negative() {
        let speeds = [3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0, 25.0];
        let power = [5.0, 60.0, 160.0, 310.0, 510.0, 770.0, 1080.0, 1400.0, 1700.0, 2000.0, 2000.0];
        let curve = Loess::fit(&speeds, &power, LoessParams::default()).expect("should fit");
        let model = PowerModel::new(curve, 2000.0);
        assert_eq!(model.power(1.0), 0.0);
        assert_eq!(model.power(30.0), 0.0);
        for i in 0..=300 {
            assert!(model.power(i as f64 * 0.1) >= 0.0);
        }
        assert!(model.power(10.0) > 1000.0);
        assert_eq!(model.rated_power(), 2000.0);
    }
}
