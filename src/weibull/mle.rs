//! Maximum Likelihood Estimation (MLE) for Weibull wind-speed parameters.
//!
//! Solves the profile likelihood equation for the shape k with
//! Newton-Raphson, then derives the scale c analytically.

use u_numflow::stats;

use super::dist::Weibull;

/// Result of Weibull MLE fitting.
#[derive(Debug, Clone)]
pub struct WeibullMleResult {
    /// Shape parameter (k).
    pub shape: f64,
    /// Scale parameter (c), in the units of the samples.
    pub scale: f64,
    /// Log-likelihood at the fitted parameters.
    pub log_likelihood: f64,
    /// Number of Newton-Raphson iterations used.
    pub iterations: usize,
}

impl WeibullMleResult {
    /// The fitted distribution.
    pub fn distribution(&self) -> Weibull {
        Weibull::from_fit(self.shape, self.scale)
    }
}

/// Maximum Newton-Raphson iterations.
const MAX_ITER: usize = 100;

/// Convergence tolerance for Newton-Raphson.
const TOL: f64 = 1e-10;

/// Fit a Weibull distribution to wind speeds using MLE.
///
/// The equation solved for the shape k is:
///
/// ```text
/// f(k) = n/k + sum(ln(v_i)) - n * sum(v_i^k * ln(v_i)) / sum(v_i^k) = 0
/// ```
///
/// and the scale follows as `c = (sum(v_i^k) / n)^(1/k)`.
///
/// The iteration starts from the empirical moment estimate
/// `k_0 = (sigma / mean)^(-1.086)`, which is already close to the MLE for
/// typical wind regimes (k between 1.5 and 3). Speeds are scaled by their
/// mean before iterating so that `v^k` stays well inside `f64` range for
/// long series.
///
/// # Arguments
/// * `samples` - Strictly positive wind speeds (at least 2 values). Calm
///   (zero) records must be removed by the caller.
///
/// # Returns
/// `None` if data is insufficient, any value is non-positive or non-finite,
/// or the iteration does not converge.
///
/// # Reference
/// Seguro, J.V. & Lambert, T.W. (2000), "Modern estimation of the parameters
/// of the Weibull wind speed distribution for wind energy analysis",
/// *J. Wind Eng. Ind. Aerodyn.* 85(1), pp. 75-84.
pub fn weibull_mle(samples: &[f64]) -> Option<WeibullMleResult> {
    let n = samples.len();
    if n < 2 {
        return None;
    }
    if !samples.iter().all(|&v| v.is_finite() && v > 0.0) {
        return None;
    }

    let mean = stats::mean(samples)?;
    let sd = stats::std_dev(samples)?;
    if sd < 1e-12 * mean {
        // All speeds identical: the likelihood has no finite maximum in k
        return None;
    }

    let scaled: Vec<f64> = samples.iter().map(|&v| v / mean).collect();
    let ln_v: Vec<f64> = scaled.iter().map(|v| v.ln()).collect();
    let sum_ln_v: f64 = ln_v.iter().sum();
    let n_f = n as f64;

    let mut k = (sd / mean).powf(-1.086).clamp(0.1, 20.0);
    let mut iterations = 0;
    let mut converged = false;

    for iter in 0..MAX_ITER {
        iterations = iter + 1;

        // S0 = sum(v^k), S1 = sum(v^k ln v), S2 = sum(v^k (ln v)^2)
        let (mut s0, mut s1, mut s2) = (0.0_f64, 0.0_f64, 0.0_f64);
        for (&v, &lv) in scaled.iter().zip(&ln_v) {
            let v_k = v.powf(k);
            s0 += v_k;
            s1 += v_k * lv;
            s2 += v_k * lv * lv;
        }
        if s0 == 0.0 || !s0.is_finite() {
            return None;
        }

        let f_val = n_f / k + sum_ln_v - n_f * s1 / s0;
        let f_prime = -n_f / (k * k) - n_f * (s2 * s0 - s1 * s1) / (s0 * s0);
        if f_prime.abs() < 1e-30 {
            return None;
        }

        let delta = f_val / f_prime;
        k -= delta;
        if k <= 0.0 {
            k = 0.01;
        }

        if delta.abs() < TOL {
            converged = true;
            break;
        }
    }
    if !converged {
        return None;
    }

    let s0: f64 = scaled.iter().map(|v| v.powf(k)).sum();
    let scale = mean * (s0 / n_f).powf(1.0 / k);
    if !scale.is_finite() || scale <= 0.0 {
        return None;
    }

    let log_likelihood = Weibull::new(k, scale)?.log_likelihood(samples)?;

    Some(WeibullMleResult {
        shape: k,
        scale,
        log_likelihood,
        iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Weibull quantiles at plotting positions (i - 0.5) / n.
    fn weibull_quantiles(k: f64, c: f64, n: usize) -> Vec<f64> {
        (1..=n)
            .map(|i| {
                let f = (i as f64 - 0.5) / n as f64;
                c * (-(1.0 - f).ln()).powf(1.0 / k)
            })
            .collect()
    }

    #[test]
    fn recovers_typical_wind_regime() {
        let data = weibull_quantiles(2.0, 8.0, 500);
        let result = weibull_mle(&data).expect("MLE should converge");
        assert!((result.shape - 2.0).abs() < 0.1, "shape = {}", result.shape);
        assert!((result.scale - 8.0).abs() < 0.2, "scale = {}", result.scale);
        assert!(result.log_likelihood.is_finite());
    }

    #[test]
    fn recovers_peaked_regime() {
        let data = weibull_quantiles(3.2, 11.0, 400);
        let result = weibull_mle(&data).expect("MLE should converge");
        assert!((result.shape - 3.2).abs() < 0.15, "shape = {}", result.shape);
        assert!((result.scale - 11.0).abs() < 0.3, "scale = {}", result.scale);
    }

    #[test]
    fn long_series_stays_finite() {
        // A year of 10-minute data
        let data = weibull_quantiles(2.1, 7.4, 52_560);
        let result = weibull_mle(&data).expect("MLE should converge");
        assert!(result.shape.is_finite() && result.scale.is_finite());
        assert!(result.iterations <= MAX_ITER);
    }

    #[test]
    fn insufficient_data() {
        assert!(weibull_mle(&[]).is_none());
        assert!(weibull_mle(&[4.0]).is_none());
    }

    #[test]
    fn invalid_data() {
        assert!(weibull_mle(&[0.0, 3.0, 5.0]).is_none());
        assert!(weibull_mle(&[-1.0, 3.0, 5.0]).is_none());
        assert!(weibull_mle(&[f64::NAN, 3.0, 5.0]).is_none());
        assert!(weibull_mle(&[f64::INFINITY, 3.0, 5.0]).is_none());
    }

    #[test]
    fn identical_values_rejected() {
        assert!(weibull_mle(&[6.0; 20]).is_none());
    }

    #[test]
    fn maximises_likelihood() {
        let data = weibull_quantiles(1.8, 6.5, 300);
        let fit = weibull_mle(&data).expect("MLE should converge");
        for (dk, dc) in [(0.05, 0.0), (-0.05, 0.0), (0.0, 0.1), (0.0, -0.1)] {
            let other = Weibull::new(fit.shape + dk, fit.scale + dc).expect("valid");
            let ll = other.log_likelihood(&data).expect("positive data");
            assert!(ll <= fit.log_likelihood + 1e-9, "({dk}, {dc}) gave {ll}");
        }
    }
}
