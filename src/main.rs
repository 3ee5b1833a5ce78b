mod analysis;
mod app;
mod color;
mod config;
mod data;
mod state;
mod stats;
mod ui;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use eframe::egui;

use analysis::GridBuilder;
use app::HeatmapApp;
use config::AnalysisConfig;
use state::HeatmapState;
use stats::chi2::{Chi2Significance, FileCovarianceSource};
use stats::efficiency::{precompute_efficiencies, CsvSelectionCounter};

const TITLE: &str = "Significance v. Energy Distortion";

#[derive(Debug, Parser)]
#[command(author, version, about = "Signal significance across a track/shower energy distortion grid")]
struct Cli {
    /// Prefix of the per-point background directories (`<prefix>cov_bkg_<i>`)
    background_dir: String,

    /// Prefix of the per-point signal directories (`<prefix>cov_sig_makross_<i>`)
    signal_dir: String,

    /// JSON configuration overriding grid, exposure and dataset settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Root directory of the selection datasets used for efficiencies
    #[arg(long)]
    scratch_dir: Option<PathBuf>,

    /// Skip the efficiency pass and use the fixed baseline efficiencies
    #[arg(long)]
    no_efficiency: bool,

    /// Print the matrix and exit without opening a window
    #[arg(long)]
    no_plot: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut cfg = match &cli.config {
        Some(path) => AnalysisConfig::load(path)?,
        None => AnalysisConfig::default(),
    };
    if let Some(dir) = cli.scratch_dir {
        cfg.efficiency.scratch_dir = dir;
    }
    cfg.validate()?;
    let grid = cfg.grid();

    let effs = if cli.no_efficiency {
        None
    } else {
        log::info!(
            "Computing truth efficiencies from {}",
            cfg.efficiency.scratch_dir.display()
        );
        Some(precompute_efficiencies(
            &cfg.efficiency,
            &CsvSelectionCounter,
            &grid,
        )?)
    };

    let builder = GridBuilder::new(&cfg, &FileCovarianceSource, &Chi2Significance);
    let matrix = builder.build(&cli.background_dir, &cli.signal_dir, &grid, effs.as_deref())?;

    println!("{matrix}");

    if cli.no_plot {
        return Ok(());
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([900.0, 800.0])
            .with_min_inner_size([500.0, 400.0]),
        ..Default::default()
    };
    let state = HeatmapState::new(TITLE, matrix, &grid);

    eframe::run_native(
        TITLE,
        options,
        Box::new(|_cc| Ok(Box::new(HeatmapApp::new(state)))),
    )
    .map_err(|e| anyhow::anyhow!("plot window failed: {e}"))
}
