//! Goodness-of-fit testing.
//!
//! Kolmogorov-Smirnov tests of a wind-speed sample against a fitted model
//! CDF, or against a second sample.
//!
//! # Examples
//!
//! ```
//! use wind_aep::testing::ks_test;
//!
//! let data = [0.05, 0.2, 0.35, 0.5, 0.65, 0.8, 0.95];
//! let r = ks_test(&data, |x| x.clamp(0.0, 1.0)).unwrap();
//! assert!(r.statistic < 0.1);
//! assert!(r.p_value > 0.9); // uniform sample, uniform CDF
//! ```

use serde::Serialize;

/// Result of a Kolmogorov-Smirnov test.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct KsTestResult {
    /// D = sup |F_n(x) - F(x)|, in [0, 1].
    pub statistic: f64,
    /// Asymptotic p-value, in [0, 1].
    pub p_value: f64,
    /// Effective sample size used for the p-value.
    pub effective_n: f64,
}

/// One-sample Kolmogorov-Smirnov test against an arbitrary continuous CDF.
///
/// # Algorithm
///
/// D = max over distinct observations v of
/// max(|F_n(v) - F(v)|, |F_n(v⁻) - F(v)|), which handles tied
/// observations (wind speeds are usually recorded at 0.1 m/s resolution).
///
/// P-value: asymptotic Kolmogorov distribution evaluated at
/// λ = (√n + 0.12 + 0.11/√n)·D (Stephens, 1970).
///
/// # Returns
///
/// `None` if fewer than 2 observations, non-finite values, or the CDF
/// returns a value outside [0, 1].
pub fn ks_test(data: &[f64], cdf: impl Fn(f64) -> f64) -> Option<KsTestResult> {
    let n = data.len();
    if n < 2 || data.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let mut sorted = data.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("finite values"));

    let nf = n as f64;
    let mut d_stat = 0.0_f64;
    let mut i = 0;
    while i < n {
        let v = sorted[i];
        let mut j = i;
        while j < n && sorted[j] == v {
            j += 1;
        }
        let f = cdf(v);
        if !(0.0..=1.0).contains(&f) {
            return None;
        }
        let below = i as f64 / nf;
        let above = j as f64 / nf;
        d_stat = d_stat.max((above - f).abs()).max((below - f).abs());
        i = j;
    }

    let d_stat = d_stat.clamp(0.0, 1.0);
    Some(KsTestResult {
        statistic: d_stat,
        p_value: kolmogorov_p_value(nf, d_stat),
        effective_n: nf,
    })
}

/// Two-sample Kolmogorov-Smirnov test.
///
/// D = sup |F_a(x) - F_b(x)| over the merged sample, with effective size
/// n_a·n_b / (n_a + n_b) for the p-value.
///
/// # Returns
///
/// `None` if either sample has fewer than 2 observations or contains
/// non-finite values.
///
/// # Examples
///
/// ```
/// use wind_aep::testing::ks_two_sample;
///
/// let a = [1.0, 2.0, 3.0, 4.0, 5.0];
/// let b = [6.0, 7.0, 8.0, 9.0, 10.0];
/// let r = ks_two_sample(&a, &b).unwrap();
/// assert!((r.statistic - 1.0).abs() < 1e-12);
/// ```
pub fn ks_two_sample(a: &[f64], b: &[f64]) -> Option<KsTestResult> {
    if a.len() < 2 || b.len() < 2 {
        return None;
    }
    if a.iter().chain(b).any(|v| !v.is_finite()) {
        return None;
    }

    let mut sa = a.to_vec();
    let mut sb = b.to_vec();
    sa.sort_by(|x, y| x.partial_cmp(y).expect("finite values"));
    sb.sort_by(|x, y| x.partial_cmp(y).expect("finite values"));

    let na = sa.len() as f64;
    let nb = sb.len() as f64;
    let (mut i, mut j) = (0_usize, 0_usize);
    let mut d_stat = 0.0_f64;
    while i < sa.len() && j < sb.len() {
        let v = sa[i].min(sb[j]);
        while i < sa.len() && sa[i] == v {
            i += 1;
        }
        while j < sb.len() && sb[j] == v {
            j += 1;
        }
        d_stat = d_stat.max((i as f64 / na - j as f64 / nb).abs());
    }

    let effective_n = na * nb / (na + nb);
    let d_stat = d_stat.clamp(0.0, 1.0);
    Some(KsTestResult {
        statistic: d_stat,
        p_value: kolmogorov_p_value(effective_n, d_stat),
        effective_n,
    })
}

/// P(D > d) under the asymptotic Kolmogorov distribution.
///
/// Uses the alternating series Q(λ) = 2 Σ (-1)^(k-1) exp(-2k²λ²) for
/// λ ≥ 1.18 and the theta-function form
/// 1 - (√(2π)/λ) Σ exp(-(2k-1)²π²/(8λ²)) below, where the alternating
/// series converges poorly.
///
/// Reference: Marsaglia, Tsang & Wang (2003), "Evaluating Kolmogorov's
/// Distribution", *J. Stat. Softw.* 8(18).
pub fn kolmogorov_p_value(n: f64, d: f64) -> f64 {
    if n.is_nan() || n <= 0.0 || !d.is_finite() {
        return f64::NAN;
    }
    let sqrt_n = n.sqrt();
    let lambda = (sqrt_n + 0.12 + 0.11 / sqrt_n) * d;
    if lambda <= 0.0 {
        return 1.0;
    }

    let p = if lambda < 1.18 {
        let pi2 = std::f64::consts::PI * std::f64::consts::PI;
        let mut cdf = 0.0;
        for k in 1..=50 {
            let odd = (2 * k - 1) as f64;
            let term = (-odd * odd * pi2 / (8.0 * lambda * lambda)).exp();
            cdf += term;
            if term < 1e-16 {
                break;
            }
        }
        1.0 - (2.0 * std::f64::consts::PI).sqrt() / lambda * cdf
    } else {
        let mut q = 0.0;
        for k in 1..=100 {
            let kf = k as f64;
            let sign = if k % 2 == 1 { 1.0 } else { -1.0 };
            let term = sign * (-2.0 * kf * kf * lambda * lambda).exp();
            q += term;
            if term.abs() < 1e-16 {
                break;
            }
        }
        2.0 * q
    };
    p.clamp(0.0, 1.0)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn ks_statistic_in_unit_interval(
            data in proptest::collection::vec(0.0_f64..30.0, 2..=100),
            k in 1.2_f64..3.5,
            c in 4.0_f64..12.0,
        ) {
            let r = ks_test(&data, |x| if x <= 0.0 { 0.0 } else { 1.0 - (-(x / c).powf(k)).exp() })
                .expect("valid input");
            prop_assert!((0.0..=1.0).contains(&r.statistic), "D = {}", r.statistic);
            prop_assert!((0.0..=1.0).contains(&r.p_value), "p = {}", r.p_value);
        }

        #[test]
        fn two_sample_statistic_in_unit_interval(
            a in proptest::collection::vec(0.0_f64..30.0, 2..=60),
            b in proptest::collection::vec(0.0_f64..30.0, 2..=60),
        ) {
            let r = ks_two_sample(&a, &b).expect("valid input");
            prop_assert!((0.0..=1.0).contains(&r.statistic));
            prop_assert!((0.0..=1.0).contains(&r.p_value));
        }
    }
}
