//! Comparison figure.
//!
//! One SVG with four panels: binned density against the model densities,
//! empirical against model CDFs, the power curve and its loess fit, and AEP
//! per model.

use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;
use tracing::info;

use crate::analysis::AnalysisReport;
use crate::error::{Error, Result};

const SIZE: (u32, u32) = (1600, 1200);
const FONT: &str = "sans-serif";
const GRID: usize = 200;

const EMPIRICAL_COLOR: RGBColor = RGBColor(120, 120, 120);
const MODEL_COLORS: [RGBColor; 4] = [
    RGBColor(214, 39, 40),
    RGBColor(31, 119, 180),
    RGBColor(44, 160, 44),
    RGBColor(148, 103, 189),
];

fn plot_err<E: std::fmt::Display>(err: E) -> Error {
    Error::Plot(err.to_string())
}

fn model_color(index: usize) -> RGBColor {
    MODEL_COLORS[index % MODEL_COLORS.len()]
}

/// Renders the four-panel comparison to an SVG file at `path`.
pub fn render(report: &AnalysisReport, path: &Path) -> Result<()> {
    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    let root = root
        .titled(
            &format!("Wind speed distribution and energy yield, {}", report.year),
            (FONT, 30),
        )
        .map_err(plot_err)?;

    let panels = root.split_evenly((2, 2));
    draw_densities(&panels[0], report)?;
    draw_cdfs(&panels[1], report)?;
    draw_power_curve(&panels[2], report)?;
    draw_aep(&panels[3], report)?;

    root.present().map_err(plot_err)?;
    info!(path = %path.display(), "plot written");
    Ok(())
}

fn even_grid(hi: f64) -> impl Iterator<Item = f64> {
    (0..GRID).map(move |i| hi * i as f64 / (GRID - 1) as f64)
}

fn draw_densities<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    report: &AnalysisReport,
) -> Result<()> {
    let table = &report.table;
    let x_max = table.upper_edge();
    let bars: Vec<(f64, f64, f64)> = table
        .bins
        .iter()
        .map(|b| (b.lower, b.upper, b.probability / table.bin_width))
        .collect();

    let mut curves: Vec<(String, Vec<(f64, f64)>)> = Vec::new();
    for fit in [&report.weibull_mle, &report.weibull_mge] {
        if let Some(dist) = fit.distribution() {
            let pts = even_grid(x_max).map(|v| (v, dist.pdf(v))).collect();
            curves.push((fit.method.clone(), pts));
        }
    }
    let kde_pts = report
        .kde
        .x
        .iter()
        .zip(&report.kde.density)
        .filter(|(x, _)| (0.0..=x_max).contains(*x))
        .map(|(&x, &d)| (x, d))
        .collect();
    curves.push(("KDE".to_string(), kde_pts));

    let y_max = bars
        .iter()
        .map(|b| b.2)
        .chain(curves.iter().flat_map(|(_, pts)| pts.iter().map(|p| p.1)))
        .filter(|v| v.is_finite())
        .fold(0.0_f64, f64::max)
        .max(1e-6)
        * 1.1;

    let mut chart = ChartBuilder::on(area)
        .caption("Wind speed density", (FONT, 22))
        .margin(12)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..x_max, 0.0..y_max)
        .map_err(plot_err)?;
    chart
        .configure_mesh()
        .x_desc("Wind speed (m/s)")
        .y_desc("Density")
        .draw()
        .map_err(plot_err)?;

    let bar_style = EMPIRICAL_COLOR.mix(0.35).filled();
    chart
        .draw_series(
            bars.iter()
                .map(|&(a, b, h)| Rectangle::new([(a, 0.0), (b, h)], bar_style)),
        )
        .map_err(plot_err)?
        .label("Empirical")
        .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 15, y + 5)], bar_style));

    for (i, (name, pts)) in curves.into_iter().enumerate() {
        let color = model_color(i);
        chart
            .draw_series(LineSeries::new(pts, color.stroke_width(2)))
            .map_err(plot_err)?
            .label(name)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(plot_err)
}

fn draw_cdfs<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    report: &AnalysisReport,
) -> Result<()> {
    let table = &report.table;
    let x_max = table.upper_edge();

    let mut chart = ChartBuilder::on(area)
        .caption("Cumulative distribution at bin edges", (FONT, 22))
        .margin(12)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..x_max, 0.0..1.05)
        .map_err(plot_err)?;
    chart
        .configure_mesh()
        .x_desc("Wind speed (m/s)")
        .y_desc("P(V ≤ v)")
        .draw()
        .map_err(plot_err)?;

    let empirical: Vec<(f64, f64)> = std::iter::once((0.0, 0.0))
        .chain(table.bins.iter().map(|b| (b.upper, b.cumulative)))
        .collect();
    chart
        .draw_series(LineSeries::new(empirical, EMPIRICAL_COLOR.stroke_width(3)))
        .map_err(plot_err)?
        .label("Empirical")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], EMPIRICAL_COLOR.stroke_width(3)));

    for (i, model) in report.model_bins.iter().enumerate() {
        let color = model_color(i);
        let pts: Vec<(f64, f64)> = std::iter::once((0.0, 0.0))
            .chain(
                table
                    .bins
                    .iter()
                    .zip(&model.cumulative)
                    .map(|(b, &c)| (b.upper, c)),
            )
            .collect();
        chart
            .draw_series(LineSeries::new(pts, color.stroke_width(2)))
            .map_err(plot_err)?
            .label(model.name.clone())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(plot_err)
}

fn draw_power_curve<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    report: &AnalysisReport,
) -> Result<()> {
    let curve = &report.power_curve;
    let x_max = curve
        .samples
        .iter()
        .map(|s| s.speed)
        .fold(0.0_f64, f64::max)
        .max(1.0)
        * 1.05;
    let y_max = curve
        .samples
        .iter()
        .chain(&curve.smoothed)
        .map(|s| s.power)
        .fold(curve.rated_power, f64::max)
        .max(1.0)
        * 1.1;

    let mut chart = ChartBuilder::on(area)
        .caption("Power curve and loess fit", (FONT, 22))
        .margin(12)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(0.0..x_max, 0.0..y_max)
        .map_err(plot_err)?;
    chart
        .configure_mesh()
        .x_desc("Wind speed (m/s)")
        .y_desc("Power (kW)")
        .draw()
        .map_err(plot_err)?;

    let point_color = MODEL_COLORS[1];
    chart
        .draw_series(
            curve
                .samples
                .iter()
                .map(|s| Circle::new((s.speed, s.power), 4, point_color.filled())),
        )
        .map_err(plot_err)?
        .label("Manufacturer")
        .legend(move |(x, y)| Circle::new((x + 8, y), 4, point_color.filled()));

    let line_color = MODEL_COLORS[0];
    chart
        .draw_series(LineSeries::new(
            curve.smoothed.iter().map(|s| (s.speed, s.power)),
            line_color.stroke_width(2),
        ))
        .map_err(plot_err)?
        .label("Loess")
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], line_color.stroke_width(2)));

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(plot_err)
}

fn draw_aep<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    report: &AnalysisReport,
) -> Result<()> {
    let names: Vec<&str> = report.aep.iter().map(|e| e.model.as_str()).collect();
    let n = names.len().max(1);
    let y_max = report
        .aep
        .iter()
        .map(|e| e.aep_mwh)
        .fold(0.0_f64, f64::max)
        .max(1.0)
        * 1.15;

    let mut chart = ChartBuilder::on(area)
        .caption("Annual energy production", (FONT, 22))
        .margin(12)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(-0.5..(n as f64 - 0.5), 0.0..y_max)
        .map_err(plot_err)?;
    let label_at = |x: &f64| {
        let i = x.round();
        if (x - i).abs() < 1e-6 && i >= 0.0 {
            names.get(i as usize).map_or_else(String::new, |s| s.to_string())
        } else {
            String::new()
        }
    };
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n)
        .x_label_formatter(&label_at)
        .y_desc("AEP (MWh)")
        .draw()
        .map_err(plot_err)?;

    chart
        .draw_series(report.aep.iter().enumerate().map(|(i, e)| {
            let color = if i == 0 {
                EMPIRICAL_COLOR
            } else {
                model_color(i - 1)
            };
            let x = i as f64;
            Rectangle::new([(x - 0.35, 0.0), (x + 0.35, e.aep_mwh)], color.filled())
        }))
        .map_err(plot_err)?;

    chart
        .draw_series(report.aep.iter().enumerate().map(|(i, e)| {
            Text::new(
                format!("{:.0}", e.aep_mwh),
                (i as f64 - 0.25, e.aep_mwh + y_max * 0.06),
                (FONT, 16).into_font(),
            )
        }))
        .map_err(plot_err)?;
    Ok(())
}
