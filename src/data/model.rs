use std::fmt;

use nalgebra::DMatrix;

// ---------------------------------------------------------------------------
// Distortion grid
// ---------------------------------------------------------------------------

/// A (track, shower) energy distortion pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Distortion {
    pub track: f64,
    pub shower: f64,
}

/// One cell of the distortion grid, carrying its own 2D position so the
/// result matrix never has to recover it from the flat index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridPoint {
    /// Flat index; selects the `cov_bkg_<i>` / `cov_sig_makross_<i>` inputs.
    pub index: usize,
    pub track_index: usize,
    pub shower_index: usize,
    pub distortion: Distortion,
}

/// Ordered track and shower distortion magnitudes.
#[derive(Debug, Clone, PartialEq)]
pub struct DistortionGrid {
    pub track: Vec<f64>,
    pub shower: Vec<f64>,
}

impl DistortionGrid {
    pub fn new(track: Vec<f64>, shower: Vec<f64>) -> Self {
        Self { track, shower }
    }

    /// Number of grid points (track × shower).
    pub fn len(&self) -> usize {
        self.track.len() * self.shower.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The distortion at track index 0 and shower index 0.
    pub fn origin(&self) -> Option<Distortion> {
        Some(Distortion {
            track: *self.track.first()?,
            shower: *self.shower.first()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Covariance bundle
// ---------------------------------------------------------------------------

/// Energy spectra and absolute covariance for one grid point, combined from
/// the background and signal files.
#[derive(Debug, Clone, PartialEq)]
pub struct CovarianceBundle {
    pub muon_reco: Vec<f64>,
    pub muon_true: Vec<f64>,
    pub electron_reco: Vec<f64>,
    pub electron_true: Vec<f64>,
    pub signal: Vec<f64>,
    pub signal_sq: Vec<f64>,
    /// Square, side `muon_true.len() + electron_true.len()`.
    pub covariance: DMatrix<f64>,
}

impl CovarianceBundle {
    /// Concatenated (muon, electron) true-energy spectrum.
    pub fn combined_true(&self) -> Vec<f64> {
        self.muon_true
            .iter()
            .chain(self.electron_true.iter())
            .copied()
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Efficiencies
// ---------------------------------------------------------------------------

/// Per-point truth efficiencies overriding the fixed baseline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EfficiencyTriple {
    pub electron: f64,
    pub shower: f64,
    pub muon: f64,
}

/// Raw event counts of one dataset at one distortion, as written by the
/// selection runner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionCounts {
    pub nue_total: f64,
    pub nue_selected_np: f64,
    pub nue_selected_zp: f64,
    pub numu_total: f64,
    pub numu_selected_np: f64,
    pub numu_selected_zp: f64,
}

impl SelectionCounts {
    pub fn nue_selected(&self) -> f64 {
        self.nue_selected_np + self.nue_selected_zp
    }

    pub fn numu_selected(&self) -> f64 {
        self.numu_selected_np + self.numu_selected_zp
    }
}

// ---------------------------------------------------------------------------
// SignificanceMatrix – the assembled result
// ---------------------------------------------------------------------------

/// Significance values indexed `[shower_index][track_index]`.
#[derive(Debug, Clone, PartialEq)]
pub struct SignificanceMatrix {
    pub values: DMatrix<f64>,
}

impl SignificanceMatrix {
    pub fn zeros(n_shower: usize, n_track: usize) -> Self {
        Self {
            values: DMatrix::zeros(n_shower, n_track),
        }
    }

    pub fn n_shower(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_track(&self) -> usize {
        self.values.ncols()
    }

    pub fn get(&self, shower_index: usize, track_index: usize) -> f64 {
        self.values[(shower_index, track_index)]
    }

    /// Finite (min, max) over all cells, `None` if no cell is finite.
    pub fn finite_range(&self) -> Option<(f64, f64)> {
        self.values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    pub fn rows(&self) -> Vec<Vec<f64>> {
        (0..self.n_shower())
            .map(|s| (0..self.n_track()).map(|t| self.get(s, t)).collect())
            .collect()
    }
}

impl fmt::Display for SignificanceMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows = self.rows();
        write!(f, "[")?;
        for (i, row) in rows.iter().enumerate() {
            if i > 0 {
                write!(f, "\n ")?;
            }
            write!(f, "[")?;
            for (j, v) in row.iter().enumerate() {
                if j > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{v:.6}")?;
            }
            write!(f, "]")?;
        }
        write!(f, "]")
    }
}
