use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use wind_aep::config::AnalysisConfig;
use wind_aep::{analysis, plot, report};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Compare Weibull and kernel density wind-speed models and their annual energy production",
    long_about = None
)]
struct Cli {
    /// TOML configuration file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Power-curve CSV: local path or http(s) URL
    #[arg(long)]
    power_curve: Option<String>,

    /// Mast data (CSV, or NetCDF with the `netcdf` feature)
    #[arg(long)]
    mast: Option<PathBuf>,

    /// Calendar year to analyse (default: latest year in the data)
    #[arg(long)]
    year: Option<i32>,

    /// Wind-speed bin width in m/s
    #[arg(long)]
    bin_width: Option<f64>,

    /// Output SVG figure
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also write the full report as JSON
    #[arg(long)]
    json: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::load(path)
                .with_context(|| format!("loading configuration {}", path.display()))?,
            None => AnalysisConfig::default(),
        };
        if let Some(src) = self.power_curve {
            config.power_curve = src;
        }
        if let Some(mast) = self.mast {
            config.mast = mast;
        }
        if let Some(year) = self.year {
            config.year = Some(year);
        }
        if let Some(width) = self.bin_width {
            config.bin_width = width;
        }
        if let Some(output) = self.output {
            config.output = output;
        }
        if let Some(json) = self.json {
            config.json = Some(json);
        }
        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Cli::parse().into_config()?;
    let report = analysis::run(&config).context("analysis failed")?;

    plot::render(&report, &config.output)
        .with_context(|| format!("writing {}", config.output.display()))?;
    if let Some(path) = &config.json {
        report::write_json(&report, path)
            .with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "json summary written");
    }

    println!("{}", report::overview_table(&report));
    println!("{}", report::summary_table(&report));
    Ok(())
}
