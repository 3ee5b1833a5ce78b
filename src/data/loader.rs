use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, ensure, Context, Result};
use arrow::array::{Array, Float32Array, Float64Array, LargeListArray, ListArray};
use arrow::datatypes::DataType;
use nalgebra::DMatrix;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::Deserialize;

use super::model::{CovarianceBundle, Distortion, SelectionCounts};

/// Distortions closer than this are treated as the same grid value.
const DISTORTION_TOLERANCE: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load and combine the background and signal halves of a covariance bundle.
/// Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – one row of list<f64> columns (covariance flattened row-major)
/// * `.json`    – one object with the same keys, covariance as nested rows
pub fn load_bundle(background: &Path, signal: &Path) -> Result<CovarianceBundle> {
    let bkg = load_background(background)
        .with_context(|| format!("loading background {}", background.display()))?;
    let sig = load_signal(signal)
        .with_context(|| format!("loading signal {}", signal.display()))?;

    ensure!(
        sig.signal.len() == bkg.electron_true.len(),
        "signal spectrum has {} bins but electron spectrum has {}",
        sig.signal.len(),
        bkg.electron_true.len()
    );
    ensure!(
        sig.signal_sq.len() == sig.signal.len(),
        "signal_sq has {} bins but signal has {}",
        sig.signal_sq.len(),
        sig.signal.len()
    );

    Ok(CovarianceBundle {
        muon_reco: bkg.muon_reco,
        muon_true: bkg.muon_true,
        electron_reco: bkg.electron_reco,
        electron_true: bkg.electron_true,
        signal: sig.signal,
        signal_sq: sig.signal_sq,
        covariance: bkg.covariance,
    })
}

/// Look up the counts of `dataset_id` at `distortion` in a
/// `selection_counts.csv` table.
pub fn load_selection_counts(
    path: &Path,
    dataset_id: u32,
    distortion: Distortion,
) -> Result<Option<SelectionCounts>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;

    for (row_no, result) in reader.deserialize::<CountsRow>().enumerate() {
        let row = result.with_context(|| format!("{} row {row_no}", path.display()))?;
        if row.dataset_id == dataset_id
            && (row.track_distortion - distortion.track).abs() < DISTORTION_TOLERANCE
            && (row.shower_distortion - distortion.shower).abs() < DISTORTION_TOLERANCE
        {
            return Ok(Some(row.counts()));
        }
    }
    Ok(None)
}

// ---------------------------------------------------------------------------
// Bundle halves
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct BackgroundPart {
    muon_reco: Vec<f64>,
    muon_true: Vec<f64>,
    electron_reco: Vec<f64>,
    electron_true: Vec<f64>,
    covariance: DMatrix<f64>,
}

#[derive(Debug, Deserialize)]
struct SignalPart {
    signal: Vec<f64>,
    signal_sq: Vec<f64>,
}

/// JSON layout of the background file:
///
/// ```json
/// {
///   "muon_reco": [...], "muon_true": [...],
///   "electron_reco": [...], "electron_true": [...],
///   "covariance": [[...], [...], ...]
/// }
/// ```
#[derive(Debug, Deserialize)]
struct BackgroundJson {
    muon_reco: Vec<f64>,
    muon_true: Vec<f64>,
    electron_reco: Vec<f64>,
    electron_true: Vec<f64>,
    covariance: Vec<Vec<f64>>,
}

fn load_background(path: &Path) -> Result<BackgroundPart> {
    match extension(path).as_str() {
        "parquet" | "pq" => {
            let mut cols = read_parquet_row(path)?;
            let muon_true = take_column(&mut cols, "muon_true")?;
            let electron_true = take_column(&mut cols, "electron_true")?;
            let side = muon_true.len() + electron_true.len();
            let flat = take_column(&mut cols, "covariance")?;
            ensure!(
                flat.len() == side * side,
                "covariance has {} entries, expected {side}x{side}",
                flat.len()
            );
            Ok(BackgroundPart {
                muon_reco: take_column(&mut cols, "muon_reco")?,
                muon_true,
                electron_reco: take_column(&mut cols, "electron_reco")?,
                electron_true,
                covariance: DMatrix::from_row_slice(side, side, &flat),
            })
        }
        "json" => {
            let text = std::fs::read_to_string(path).context("reading JSON file")?;
            let raw: BackgroundJson = serde_json::from_str(&text).context("parsing JSON")?;
            let side = raw.muon_true.len() + raw.electron_true.len();
            ensure!(
                raw.covariance.len() == side && raw.covariance.iter().all(|r| r.len() == side),
                "covariance must be {side}x{side}"
            );
            let covariance = DMatrix::from_fn(side, side, |i, j| raw.covariance[i][j]);
            Ok(BackgroundPart {
                muon_reco: raw.muon_reco,
                muon_true: raw.muon_true,
                electron_reco: raw.electron_reco,
                electron_true: raw.electron_true,
                covariance,
            })
        }
        other => unsupported(other),
    }
}

fn load_signal(path: &Path) -> Result<SignalPart> {
    match extension(path).as_str() {
        "parquet" | "pq" => {
            let mut cols = read_parquet_row(path)?;
            Ok(SignalPart {
                signal: take_column(&mut cols, "signal")?,
                signal_sq: take_column(&mut cols, "signal_sq")?,
            })
        }
        "json" => {
            let text = std::fs::read_to_string(path).context("reading JSON file")?;
            serde_json::from_str(&text).context("parsing JSON")
        }
        other => unsupported(other),
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

fn unsupported<T>(ext: &str) -> Result<T> {
    if ext == "root" {
        bail!("ROOT files are not read directly; export the bundle to .parquet or .json");
    }
    bail!("Unsupported file extension: .{ext}")
}

fn take_column(cols: &mut BTreeMap<String, Vec<f64>>, name: &str) -> Result<Vec<f64>> {
    cols.remove(name)
        .with_context(|| format!("missing '{name}' column"))
}

// ---------------------------------------------------------------------------
// Parquet helpers
// ---------------------------------------------------------------------------

/// Read the first row of a Parquet file whose columns are all float lists.
fn read_parquet_row(path: &Path) -> Result<BTreeMap<String, Vec<f64>>> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let mut reader = builder.build().context("building parquet reader")?;

    let batch = reader
        .next()
        .context("parquet file has no record batches")?
        .context("reading parquet record batch")?;
    ensure!(batch.num_rows() > 0, "parquet file has no rows");

    let schema = batch.schema();
    let mut out = BTreeMap::new();
    for (idx, field) in schema.fields().iter().enumerate() {
        let values = extract_f64_list(batch.column(idx), 0)
            .with_context(|| format!("column '{}'", field.name()))?;
        out.insert(field.name().clone(), values);
    }
    Ok(out)
}

/// Extract a `Vec<f64>` from a List or LargeList column at the given row.
fn extract_f64_list(col: &Arc<dyn Array>, row: usize) -> Result<Vec<f64>> {
    if col.is_null(row) {
        bail!("null value in list column");
    }

    let values_array = match col.data_type() {
        DataType::List(_) => col
            .as_any()
            .downcast_ref::<ListArray>()
            .context("expected ListArray")?
            .value(row),
        DataType::LargeList(_) => col
            .as_any()
            .downcast_ref::<LargeListArray>()
            .context("expected LargeListArray")?
            .value(row),
        other => bail!("Expected List or LargeList column, got {other:?}"),
    };

    if let Some(f64_arr) = values_array.as_any().downcast_ref::<Float64Array>() {
        Ok(f64_arr.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    } else if let Some(f32_arr) = values_array.as_any().downcast_ref::<Float32Array>() {
        Ok(f32_arr.iter().map(|v| v.unwrap_or(f32::NAN) as f64).collect())
    } else {
        bail!(
            "List inner type is {:?}, expected Float64 or Float32",
            values_array.data_type()
        )
    }
}

// ---------------------------------------------------------------------------
// Selection counts
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
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

impl CountsRow {
    fn counts(&self) -> SelectionCounts {
        SelectionCounts {
            nue_total: self.nue_total,
            nue_selected_np: self.nue_selected_np,
            nue_selected_zp: self.nue_selected_zp,
            numu_total: self.numu_total,
            numu_selected_np: self.numu_selected_np,
            numu_selected_zp: self.numu_selected_zp,
        }
    }
}
