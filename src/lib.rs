//! # wind-aep
//!
//! Parametric (Weibull) versus non-parametric (kernel density) models of
//! wind-speed distributions, and their effect on a turbine's annual energy
//! production (AEP).
//!
//! A run loads a turbine power curve and a mast wind-speed series, keeps one
//! calendar year, smooths the power curve with loess, fits Weibull
//! distributions by maximum likelihood and by maximum goodness-of-fit,
//! estimates a kernel density, bins everything on a common wind-speed grid,
//! tests each model with Kolmogorov-Smirnov and compares the resulting AEP.
//!
//! ## Modules
//!
//! - [`config`] — TOML run configuration
//! - [`ingest`] — Power-curve and mast data loading (CSV, URL, NetCDF)
//! - [`loess`] — Local regression and the derived power model
//! - [`weibull`] — Weibull distribution, MLE and MGE fits
//! - [`distribution`] — ECDF, empirical bin table, KDE, model bin alignment
//! - [`testing`] — One- and two-sample Kolmogorov-Smirnov tests
//! - [`aep`] — Annual energy production per model
//! - [`analysis`] — The end-to-end run
//! - [`report`] — Summary tables and JSON output
//! - [`plot`] — Four-panel SVG comparison figure
//!
//! ## Design Philosophy
//!
//! - **Option for numerics**: statistical routines return `None` on
//!   degenerate input; only I/O and the pipeline produce [`Error`]
//! - **Numerical stability**: Leverages `u-numflow` for stable statistics
//! - **Research-backed**: All algorithms reference academic literature

pub mod aep;
pub mod analysis;
pub mod config;
pub mod distribution;
pub mod error;
pub mod ingest;
pub mod loess;
pub mod plot;
pub mod report;
pub mod testing;
pub mod weibull;

pub use error::{Error, Result};
