//! Weibull wind-speed distributions and parameter estimation.
//!
//! Provides maximum likelihood estimation (MLE) and maximum goodness-of-fit
//! estimation (MGE) of the Weibull shape and scale for wind-speed samples.
//!
//! # Modules
//!
//! - [`Weibull`] — density, CDF, quantiles and bin masses
//! - [`weibull_mle`] — Newton-Raphson MLE for shape and scale
//! - [`weibull_mge`] — Cramér-von Mises / Anderson-Darling minimisation
//!
//! # References
//!
//! - Manwell, J.F., McGowan, J.G. & Rogers, A.L. (2009). *Wind Energy
//!   Explained*, 2nd ed., ch. 2.
//! - Delignette-Muller, M.L. & Dutang, C. (2015). "fitdistrplus: An R
//!   Package for Fitting Distributions", *J. Stat. Softw.* 64(4).

mod dist;
mod mge;
mod mle;

pub use dist::Weibull;
pub use mge::{weibull_mge, GofCriterion, WeibullMgeResult};
pub use mle::{weibull_mle, WeibullMleResult};
