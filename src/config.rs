use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::model::DistortionGrid;

/// Full run configuration. Every field has a default matching the
/// production 6×6 scan, so a config file only lists what it changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub track_distortions: Vec<f64>,
    pub shower_distortions: Vec<f64>,
    /// Prefix of the per-point background directory, followed by the index.
    pub background_subdir: String,
    /// Prefix of the per-point signal directory, followed by the index.
    pub signal_subdir: String,
    /// Bundle file name inside each per-point directory.
    pub covariance_file: String,
    pub significance: SignificanceConfig,
    pub efficiency: EfficiencyConfig,
}

/// Fixed parameters handed to the significance model for every point.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignificanceConfig {
    /// Exposure the significance is quoted at [POT].
    pub pot: f64,
    /// Exposure the stored spectra are normalised to [POT].
    pub reference_pot: f64,
    pub syst: bool,
    pub mc: bool,
    pub eff_m: f64,
    pub eff_e: f64,
}

/// One selection dataset read by the efficiency pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSpec {
    pub dataset_id: u32,
    /// Directory under `scratch_dir` holding `selection_counts.csv`.
    pub subdir: String,
}

/// Which distortion the efficiency pass evaluates each grid point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EfficiencyDistortion {
    /// Track and shower index 0 for every point.
    First,
    /// The point's own distortion.
    PerPoint,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EfficiencyConfig {
    pub scratch_dir: PathBuf,
    pub signal: DatasetSpec,
    pub nue: DatasetSpec,
    pub inclusive: DatasetSpec,
    /// Weight of inclusive-sample counts relative to the nue sample.
    pub inc_to_nue_factor: f64,
    pub distortion: EfficiencyDistortion,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            track_distortions: vec![0.0, 0.01, 0.02, 0.03, 0.04, 0.05],
            shower_distortions: vec![0.0, 0.1, 0.2, 0.3, 0.4, 0.5],
            background_subdir: "cov_bkg_".to_string(),
            signal_subdir: "cov_sig_makross_".to_string(),
            covariance_file: "cov_all.parquet".to_string(),
            significance: SignificanceConfig::default(),
            efficiency: EfficiencyConfig::default(),
        }
    }
}

impl Default for SignificanceConfig {
    fn default() -> Self {
        Self {
            pot: 66e19,
            reference_pot: 66e19,
            syst: true,
            mc: false,
            eff_m: 0.3,
            eff_e: 0.3,
        }
    }
}

impl Default for EfficiencyConfig {
    fn default() -> Self {
        Self {
            scratch_dir: PathBuf::from("smeared"),
            signal: DatasetSpec {
                dataset_id: 47,
                subdir: "smeared_signal_makross_weighted_5trial".to_string(),
            },
            nue: DatasetSpec {
                dataset_id: 44,
                subdir: "smeared_nue_5trial".to_string(),
            },
            inclusive: DatasetSpec {
                dataset_id: 1016,
                subdir: "smeared_inclusive_slim_try2".to_string(),
            },
            inc_to_nue_factor: 7.86397e21 / 5.093665e20,
            distortion: EfficiencyDistortion::First,
        }
    }
}

impl AnalysisConfig {
    /// Read a JSON config; missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.track_distortions.is_empty(),
            "track_distortions must not be empty"
        );
        ensure!(
            !self.shower_distortions.is_empty(),
            "shower_distortions must not be empty"
        );
        ensure!(self.significance.pot > 0.0, "pot must be > 0");
        ensure!(
            self.significance.reference_pot > 0.0,
            "reference_pot must be > 0"
        );
        ensure!(
            self.efficiency.inc_to_nue_factor > 0.0,
            "inc_to_nue_factor must be > 0"
        );
        Ok(())
    }

    pub fn grid(&self) -> DistortionGrid {
        DistortionGrid::new(
            self.track_distortions.clone(),
            self.shower_distortions.clone(),
        )
    }
}
