use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use wind_aep::config::{AnalysisConfig, MastColumns};
use wind_aep::weibull::Weibull;
use wind_aep::{analysis, plot, report, Error};

const POWER_CURVE: &str = "\
Wind Speed (m/s),Power (kW),Cp
0,0,0
1,0,0
2,0,0
3,20,0.1
4,94,0.35
5,205,0.41
6,366,0.44
7,588,0.45
8,884,0.45
9,1219,0.44
10,1497,0.41
11,1659,0.35
12,1700,0.28
13,1700,0.22
14,1700,0.18
15,1700,0.14
16,1700,0.11
17,1700,0.09
18,1700,0.08
19,1700,0.07
20,1700,0.06
21,1700,0.05
22,1700,0.04
23,1700,0.03
24,1700,0.03
25,1700,0.02
";

/// Hourly mast export for 2019-2020 with Weibull(2.1, 7.5) speeds, some
/// missing cells, sentinel values and one corrupt reading.
fn mast_csv() -> String {
    let dist = Weibull::new(2.1, 7.5).expect("valid parameters");
    let start = NaiveDate::from_ymd_opt(2019, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .expect("valid date");
    let n: usize = 8760 + 8784;

    let mut out = String::from("time,ws_80m,wd_80m\n");
    for i in 0..n {
        let t = start + Duration::hours(i as i64);
        let p = (((i * 7919) % n) as f64 + 0.5) / n as f64;
        let cell = if i % 97 == 0 {
            "NA".to_string()
        } else if i % 211 == 0 {
            "-999".to_string()
        } else if i == 9001 {
            // Logger glitch far above any plausible speed
            "1e12".to_string()
        } else {
            format!("{:.1}", dist.quantile(p).expect("p in (0, 1)"))
        };
        writeln!(out, "{},{},{}", t.format("%Y-%m-%d %H:%M:%S"), cell, (i * 37) % 360)
            .expect("write to string");
    }
    out
}

fn write_inputs(dir: &Path) -> Result<AnalysisConfig> {
    let curve = dir.join("curve.csv");
    let mast = dir.join("mast.csv");
    std::fs::write(&curve, POWER_CURVE).context("writing curve")?;
    std::fs::write(&mast, mast_csv()).context("writing mast")?;
    Ok(AnalysisConfig {
        power_curve: curve.display().to_string(),
        mast,
        mast_columns: MastColumns {
            timestamp: "time".into(),
            speed: "ws_80m".into(),
        },
        output: dir.join("comparison.svg"),
        json: Some(dir.join("summary.json")),
        ..AnalysisConfig::default()
    })
}

#[test]
fn end_to_end_run() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = write_inputs(dir.path())?;

    let result = analysis::run(&config)?;

    // Latest year by default, with the missing cells counted against it
    assert_eq!(result.year, 2020);
    assert!(result.missing_records > 0);
    let recovery = result.recovery_rate.expect("hourly data");
    assert!(recovery > 0.95 && recovery < 1.0, "recovery = {recovery}");

    // The corrupt reading is dropped, not binned
    assert!(result.table.upper_edge() <= config.max_speed);

    let total: f64 = result.table.bins.iter().map(|b| b.probability).sum();
    assert!((total - 1.0).abs() < 1e-9);
    for m in &result.model_bins {
        let s: f64 = m.probabilities.iter().sum();
        assert!((s - 1.0).abs() < 1e-9, "{}: {s}", m.name);
    }
    for t in &result.ks_tests {
        assert!((0.0..=1.0).contains(&t.result.statistic), "{}", t.model);
    }
    for e in &result.aep {
        assert!(e.aep_mwh >= 0.0, "{}: {}", e.model, e.aep_mwh);
    }
    assert!((result.weibull_mle.shape - 2.1).abs() < 0.15);
    assert!((result.weibull_mle.scale - 7.5).abs() < 0.3);

    plot::render(&result, &config.output)?;
    let svg = std::fs::read_to_string(&config.output)?;
    assert!(svg.contains("<svg"));

    let json_path = config.json.as_deref().expect("configured");
    report::write_json(&result, json_path)?;
    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(json_path)?)?;
    assert_eq!(json["year"], 2020);
    assert_eq!(json["model_bins"].as_array().map(Vec::len), Some(3));

    let table = report::summary_table(&result).to_string();
    assert!(table.contains("Weibull MLE"));
    assert!(table.contains("KDE"));
    let overview = report::overview_table(&result).to_string();
    assert!(overview.contains("2020"));
    Ok(())
}

#[test]
fn earlier_year_from_config_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let base = write_inputs(dir.path())?;
    let config_path = dir.path().join("run.toml");
    let toml_text = format!(
        r#"
power_curve = {curve:?}
mast = {mast:?}
year = 2019
bin_width = 0.5
mge_criterion = "anderson-darling"

[mast_columns]
timestamp = "time"
speed = "ws_80m"

[loess]
span = 0.5
degree = 1
"#,
        curve = base.power_curve,
        mast = base.mast.display().to_string(),
    );
    std::fs::write(&config_path, toml_text)?;

    let config = AnalysisConfig::load(&config_path)?;
    let result = analysis::run(&config)?;
    assert_eq!(result.year, 2019);
    assert_eq!(result.table.bin_width, 0.5);
    assert_eq!(result.weibull_mge.method, "Weibull MGE (AD)");
    assert!(result.interannual_ks.is_some());
    Ok(())
}

#[test]
fn missing_inputs_are_reported() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = AnalysisConfig {
        power_curve: dir.path().join("absent.csv").display().to_string(),
        mast: dir.path().join("absent_mast.csv"),
        ..AnalysisConfig::default()
    };
    let err = analysis::run(&config).unwrap_err();
    assert!(matches!(err, Error::Io { .. }), "{err}");

    let err = analysis::run(&AnalysisConfig::default()).unwrap_err();
    assert!(matches!(err, Error::Config(_)), "{err}");
}
