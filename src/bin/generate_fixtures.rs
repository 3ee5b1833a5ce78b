use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Builder, ListBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use clap::Parser;
use parquet::arrow::ArrowWriter;
use serde::Serialize;

const TRACK: [f64; 6] = [0.0, 0.01, 0.02, 0.03, 0.04, 0.05];
const SHOWER: [f64; 6] = [0.0, 0.1, 0.2, 0.3, 0.4, 0.5];
const N_BINS: usize = 10;

/// (dataset id, subdirectory) of the three selection datasets.
const DATASETS: [(u32, &str); 3] = [
    (47, "smeared_signal_makross_weighted_5trial"),
    (44, "smeared_nue_5trial"),
    (1016, "smeared_inclusive_slim_try2"),
];

#[derive(Debug, Parser)]
#[command(about = "Write a synthetic input tree for edist-significance")]
struct Cli {
    /// Output directory
    #[arg(default_value = "fixtures")]
    out: PathBuf,
}

#[derive(Debug, Serialize)]
struct CountsRow {
    dataset_id: u32,
    shower_distortion: f64,
    track_distortion: f64,
    nue_total: f64,
    nue_selected_np: f64,
    nue_selected_zp: f64,
    numu_total: f64,
    numu_selected_np: f64,
    numu_selected_zp: f64,
}

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

fn spectrum(mu: f64, sigma: f64, amplitude: f64) -> Vec<f64> {
    (0..N_BINS)
        .map(|k| gaussian(0.2 + 0.2 * k as f64, mu, sigma, amplitude))
        .collect()
}

/// Constant-correlation covariance with fractional error `frac`.
fn covariance(spectrum: &[f64], frac: f64) -> Vec<f64> {
    let n = spectrum.len();
    let mut out = Vec::with_capacity(n * n);
    for i in 0..n {
        for j in 0..n {
            let corr = if i == j { 1.0 } else { 0.5 };
            out.push(frac * frac * corr * spectrum[i] * spectrum[j]);
        }
    }
    out
}

fn write_lists(path: &Path, columns: &[(&str, Vec<f64>)]) -> Result<()> {
    let item = Arc::new(Field::new("item", DataType::Float64, true));
    let schema = Arc::new(Schema::new(
        columns
            .iter()
            .map(|(name, _)| Field::new(*name, DataType::List(item.clone()), false))
            .collect::<Vec<_>>(),
    ));
    let arrays: Vec<ArrayRef> = columns
        .iter()
        .map(|(_, values)| {
            let mut builder = ListBuilder::new(Float64Builder::new());
            builder.values().append_slice(values);
            builder.append(true);
            Arc::new(builder.finish()) as ArrayRef
        })
        .collect();

    let batch = RecordBatch::try_new(schema.clone(), arrays).context("building record batch")?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn write_bundles(out: &Path) -> Result<()> {
    for (t, &track) in TRACK.iter().enumerate() {
        for (s, &shower) in SHOWER.iter().enumerate() {
            let index = t * SHOWER.len() + s;

            let muon_true = spectrum(1.0, 0.4 + track, 400.0);
            let muon_reco = spectrum(1.0, 0.5 + track, 400.0);
            let electron_true = spectrum(0.8, 0.3 + shower, 60.0);
            let electron_reco = spectrum(0.8, 0.4 + shower, 60.0);
            let signal = spectrum(0.5, 0.15 + shower, 25.0);
            let signal_sq: Vec<f64> = signal.iter().map(|v| 0.05 * v).collect();

            let combined: Vec<f64> = muon_true.iter().chain(&electron_true).copied().collect();
            let frac = 0.15 + 2.0 * track + 0.4 * shower;

            write_lists(
                &out.join(format!("bkg/cov_bkg_{index}/cov_all.parquet")),
                &[
                    ("muon_reco", muon_reco),
                    ("muon_true", muon_true),
                    ("electron_reco", electron_reco),
                    ("electron_true", electron_true),
                    ("covariance", covariance(&combined, frac)),
                ],
            )?;
            write_lists(
                &out.join(format!("sig/cov_sig_makross_{index}/cov_all.parquet")),
                &[("signal", signal), ("signal_sq", signal_sq)],
            )?;
        }
    }
    Ok(())
}

fn write_counts(scratch: &Path) -> Result<()> {
    for (dataset_id, subdir) in DATASETS {
        let dir = scratch.join(subdir);
        fs::create_dir_all(&dir)?;
        let mut writer = csv::Writer::from_path(dir.join("selection_counts.csv"))?;
        for &track in &TRACK {
            for &shower in &SHOWER {
                // selection degrades with worse energy resolution
                let keep = 1.0 - 2.0 * track - 0.3 * shower;
                writer.serialize(CountsRow {
                    dataset_id,
                    shower_distortion: shower,
                    track_distortion: track,
                    nue_total: 10_000.0,
                    nue_selected_np: (2_400.0 * keep).round(),
                    nue_selected_zp: (900.0 * keep).round(),
                    numu_total: 50_000.0,
                    numu_selected_np: (9_000.0 * keep).round(),
                    numu_selected_zp: (4_000.0 * keep).round(),
                })?;
            }
        }
        writer.flush()?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let scratch = cli.out.join("smeared");

    write_bundles(&cli.out)?;
    write_counts(&scratch)?;

    let config = serde_json::json!({
        "efficiency": { "scratch_dir": scratch }
    });
    let config_path = cli.out.join("config.json");
    fs::write(&config_path, serde_json::to_string_pretty(&config)?)?;

    println!(
        "Wrote {} grid points to {}",
        TRACK.len() * SHOWER.len(),
        cli.out.display()
    );
    println!(
        "Run: edist-significance {0}/bkg/ {0}/sig/ --config {1}",
        cli.out.display(),
        config_path.display()
    );
    Ok(())
}
