use std::path::Path;

use anyhow::Result;
use nalgebra::{DMatrix, DVector};

use super::{CovarianceSource, SignificanceInput, SignificanceModel, SignificanceOptions, StatsError};
use crate::data::loader;
use crate::data::model::{CovarianceBundle, EfficiencyTriple};

// ---------------------------------------------------------------------------
// File-backed covariance source
// ---------------------------------------------------------------------------

/// Reads bundles with [`loader::load_bundle`].
#[derive(Debug, Default, Clone, Copy)]
pub struct FileCovarianceSource;

impl CovarianceSource for FileCovarianceSource {
    fn load(&self, background: &Path, signal: &Path) -> Result<CovarianceBundle> {
        log::debug!(
            "Loading covariance bundle {} + {}",
            background.display(),
            signal.display()
        );
        loader::load_bundle(background, signal)
    }
}

// ---------------------------------------------------------------------------
// Covariance chi-square
// ---------------------------------------------------------------------------

/// `sqrt(Sᵀ V⁻¹ S)` with background-only Asimov data: `S` is the expected
/// signal, `V` the statistical plus (optionally) systematic and MC covariance
/// of the expected background.
#[derive(Debug, Default, Clone, Copy)]
pub struct Chi2Significance;

impl SignificanceModel for Chi2Significance {
    fn significance(
        &self,
        input: &SignificanceInput<'_>,
        options: &SignificanceOptions,
    ) -> Result<f64> {
        Ok(covariance_significance(input, options)?)
    }
}

pub fn covariance_significance(
    input: &SignificanceInput<'_>,
    options: &SignificanceOptions,
) -> Result<f64, StatsError> {
    let n_mu = input.muon.len();
    let n_e = input.electron.len();
    let n = n_mu + n_e;

    if input.signal.len() != n_e {
        return Err(StatsError::DimensionMismatch(format!(
            "signal has {} bins, electron spectrum has {n_e}",
            input.signal.len()
        )));
    }
    if options.mc && input.signal_sq.len() != n_e {
        return Err(StatsError::DimensionMismatch(format!(
            "signal_sq has {} bins, electron spectrum has {n_e}",
            input.signal_sq.len()
        )));
    }
    let fcov = input.fractional_covariance;
    if fcov.nrows() != n || fcov.ncols() != n {
        return Err(StatsError::DimensionMismatch(format!(
            "fractional covariance is {}x{}, spectra have {n} bins",
            fcov.nrows(),
            fcov.ncols()
        )));
    }

    let truth = options.truth.unwrap_or(EfficiencyTriple {
        electron: 1.0,
        shower: 1.0,
        muon: 1.0,
    });
    let scale = options.pot / options.reference_pot;
    let w_mu = options.eff_m * truth.muon * scale;
    let w_e = options.eff_e * truth.electron * scale;
    let w_s = options.eff_e * truth.shower * scale;

    let background = DVector::from_iterator(
        n,
        input
            .muon
            .iter()
            .map(|v| v * w_mu)
            .chain(input.electron.iter().map(|v| v * w_e)),
    );
    let signal = DVector::from_iterator(
        n,
        std::iter::repeat(0.0)
            .take(n_mu)
            .chain(input.signal.iter().map(|v| v * w_s)),
    );

    let mut cov = DMatrix::from_diagonal(&background);
    if options.syst {
        cov += fcov.component_mul(&(&background * background.transpose()));
    }
    if options.mc {
        for (k, sq) in input.signal_sq.iter().enumerate() {
            cov[(n_mu + k, n_mu + k)] += sq * w_s * w_s;
        }
    }

    // empty bins carry no information and would make V singular
    let keep: Vec<usize> = (0..n)
        .filter(|&i| background[i] != 0.0 || signal[i] != 0.0)
        .collect();
    if keep.is_empty() {
        return Ok(0.0);
    }
    let cov = cov.select_rows(&keep).select_columns(&keep);
    let signal = signal.select_rows(&keep);

    let solved = solve(cov, &signal).ok_or(StatsError::Singular)?;
    let chi2 = signal.dot(&solved);
    if !chi2.is_finite() || chi2 < 0.0 {
        return Err(StatsError::NonFinite(chi2));
    }
    Ok(chi2.sqrt())
}

fn solve(cov: DMatrix<f64>, rhs: &DVector<f64>) -> Option<DVector<f64>> {
    if let Some(chol) = cov.clone().cholesky() {
        return Some(chol.solve(rhs));
    }
    cov.lu().solve(rhs)
}
