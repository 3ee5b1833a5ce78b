//! Statistics collaborators behind narrow traits, so the grid, matrix and
//! plot logic can run against fakes.

use std::path::Path;

use anyhow::Result;
use nalgebra::DMatrix;
use thiserror::Error;

use crate::data::model::{CovarianceBundle, Distortion, EfficiencyTriple, SelectionCounts};

pub mod chi2;
pub mod efficiency;

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),
    #[error("covariance matrix is singular")]
    Singular,
    #[error("significance is not finite (chi2 = {0})")]
    NonFinite(f64),
    #[error("no selection counts for dataset {dataset_id} at track {track}, shower {shower}")]
    MissingCounts {
        dataset_id: u32,
        track: f64,
        shower: f64,
    },
    #[error("zero denominator computing {0} efficiency")]
    ZeroDenominator(&'static str),
}

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// Loads the covariance bundle of one grid point.
pub trait CovarianceSource {
    fn load(&self, background: &Path, signal: &Path) -> Result<CovarianceBundle>;
}

/// Turns spectra and a fractional covariance into one significance value.
pub trait SignificanceModel {
    fn significance(&self, input: &SignificanceInput<'_>, options: &SignificanceOptions)
        -> Result<f64>;
}

/// Reads raw selection counts of a dataset at a distortion.
pub trait SelectionCounter {
    fn counts(
        &self,
        dataset_id: u32,
        dataset_dir: &Path,
        distortion: Distortion,
    ) -> Result<SelectionCounts>;
}

// ---------------------------------------------------------------------------
// Model inputs
// ---------------------------------------------------------------------------

pub struct SignificanceInput<'a> {
    pub muon: &'a [f64],
    pub electron: &'a [f64],
    pub signal: &'a [f64],
    pub signal_sq: &'a [f64],
    pub fractional_covariance: &'a DMatrix<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignificanceOptions {
    pub pot: f64,
    pub reference_pot: f64,
    pub syst: bool,
    pub mc: bool,
    pub eff_m: f64,
    pub eff_e: f64,
    /// Point-specific truth efficiencies; `None` means all equal to one.
    pub truth: Option<EfficiencyTriple>,
}

impl SignificanceOptions {
    pub fn with_truth(&self, truth: Option<EfficiencyTriple>) -> Self {
        Self {
            truth,
            ..self.clone()
        }
    }
}

/// Divide `cov` elementwise by the outer product of `spectrum`, turning an
/// absolute covariance into a fractional one. Cells with a zero denominator
/// are set to zero.
pub fn fractional_covariance(
    cov: &DMatrix<f64>,
    spectrum: &[f64],
) -> Result<DMatrix<f64>, StatsError> {
    let n = spectrum.len();
    if cov.nrows() != n || cov.ncols() != n {
        return Err(StatsError::DimensionMismatch(format!(
            "covariance is {}x{}, spectrum has {n} bins",
            cov.nrows(),
            cov.ncols()
        )));
    }
    Ok(DMatrix::from_fn(n, n, |i, j| {
        let denom = spectrum[i] * spectrum[j];
        if denom == 0.0 {
            0.0
        } else {
            cov[(i, j)] / denom
        }
    }))
}
