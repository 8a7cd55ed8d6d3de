//! Text and JSON summaries of an [`AnalysisReport`].

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use comfy_table::presets::UTF8_FULL;
use comfy_table::{CellAlignment, ContentArrangement, Table};

use crate::analysis::AnalysisReport;
use crate::error::{Error, Result};

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn opt(value: Option<f64>, fmt: impl Fn(f64) -> String) -> String {
    value.map_or_else(|| "-".to_string(), fmt)
}

/// Data summary for the selected year.
pub fn overview_table(report: &AnalysisReport) -> Table {
    let mut table = new_table(vec!["Quantity", "Value"]);
    let rows = [
        ("Year", report.year.to_string()),
        ("Valid records", report.records.to_string()),
        ("Missing records", report.missing_records.to_string()),
        ("Calm records (0 m/s)", report.calm_records.to_string()),
        (
            "Sampling interval",
            opt(report.sampling_interval_s, |s| format!("{:.0} s", s)),
        ),
        (
            "Data recovery",
            opt(report.recovery_rate, |r| format!("{:.1} %", r * 100.0)),
        ),
        ("Mean speed", format!("{:.2} m/s", report.mean_speed)),
        ("Bin width", format!("{} m/s", report.table.bin_width)),
        ("KDE bandwidth", format!("{:.4} m/s", report.kde.bandwidth)),
        (
            "Rated power",
            format!("{:.0} kW", report.power_curve.rated_power),
        ),
        (
            "KS vs other years (D)",
            opt(report.interannual_ks.map(|r| r.statistic), |d| format!("{d:.4}")),
        ),
    ];
    for (name, value) in rows {
        table.add_row(vec![name.to_string(), value]);
    }
    table
}

/// One row per model: parameters, KS result and energy yield.
pub fn summary_table(report: &AnalysisReport) -> Table {
    let mut table = new_table(vec![
        "Model",
        "Shape k",
        "Scale c",
        "KS D",
        "KS p",
        "AEP (MWh)",
        "Cap. factor",
        "vs empirical",
    ]);

    for estimate in &report.aep {
        let weibull = [&report.weibull_mle, &report.weibull_mge]
            .into_iter()
            .find(|w| w.method == estimate.model);
        let ks = report.ks_for(&estimate.model);
        table.add_row(vec![
            estimate.model.clone(),
            opt(weibull.map(|w| w.shape), |k| format!("{k:.4}")),
            opt(weibull.map(|w| w.scale), |c| format!("{c:.4}")),
            opt(ks.map(|r| r.statistic), |d| format!("{d:.4}")),
            opt(ks.map(|r| r.p_value), |p| format!("{p:.3e}")),
            format!("{:.1}", estimate.aep_mwh),
            format!("{:.3}", estimate.capacity_factor),
            opt(estimate.relative_to_empirical, |r| format!("{:+.2} %", r * 100.0)),
        ]);
    }
    for idx in 1..8 {
        if let Some(col) = table.column_mut(idx) {
            col.set_cell_alignment(CellAlignment::Right);
        }
    }
    table
}

/// Writes the full report as pretty-printed JSON.
pub fn write_json(report: &AnalysisReport, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, report)?;
    writer.flush().map_err(|e| Error::io(path, e))?;
    Ok(())
}
