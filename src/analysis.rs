use std::path::PathBuf;

use anyhow::{ensure, Context, Result};

use crate::config::AnalysisConfig;
use crate::data::grid;
use crate::data::model::{DistortionGrid, EfficiencyTriple, GridPoint, SignificanceMatrix};
use crate::stats::{
    fractional_covariance, CovarianceSource, SignificanceInput, SignificanceModel,
    SignificanceOptions,
};

// ---------------------------------------------------------------------------
// Significance Grid Builder
// ---------------------------------------------------------------------------

/// Walks the distortion grid, evaluating one significance per point.
pub struct GridBuilder<'a, S, M> {
    source: &'a S,
    model: &'a M,
    options: SignificanceOptions,
    background_subdir: String,
    signal_subdir: String,
    covariance_file: String,
}

impl<'a, S: CovarianceSource, M: SignificanceModel> GridBuilder<'a, S, M> {
    pub fn new(config: &AnalysisConfig, source: &'a S, model: &'a M) -> Self {
        let sig = &config.significance;
        Self {
            source,
            model,
            options: SignificanceOptions {
                pot: sig.pot,
                reference_pot: sig.reference_pot,
                syst: sig.syst,
                mc: sig.mc,
                eff_m: sig.eff_m,
                eff_e: sig.eff_e,
                truth: None,
            },
            background_subdir: config.background_subdir.clone(),
            signal_subdir: config.signal_subdir.clone(),
            covariance_file: config.covariance_file.clone(),
        }
    }

    /// Bundle paths of point `index`. The directory arguments are prefixes:
    /// the subdirectory name is appended without a separator.
    pub fn covariance_paths(
        &self,
        background_dir: &str,
        signal_dir: &str,
        index: usize,
    ) -> (PathBuf, PathBuf) {
        let background = PathBuf::from(format!("{background_dir}{}{index}", self.background_subdir));
        let signal = PathBuf::from(format!("{signal_dir}{}{index}", self.signal_subdir));
        (
            background.join(&self.covariance_file),
            signal.join(&self.covariance_file),
        )
    }

    /// Significance of a single grid point.
    pub fn point_significance(
        &self,
        background_dir: &str,
        signal_dir: &str,
        point: &GridPoint,
        truth: Option<EfficiencyTriple>,
    ) -> Result<f64> {
        let (bkg_path, sig_path) = self.covariance_paths(background_dir, signal_dir, point.index);
        let bundle = self.source.load(&bkg_path, &sig_path)?;
        log::debug!(
            "Point {}: {} muon / {} electron bins, reco totals {:.1} / {:.1}",
            point.index,
            bundle.muon_true.len(),
            bundle.electron_true.len(),
            bundle.muon_reco.iter().sum::<f64>(),
            bundle.electron_reco.iter().sum::<f64>()
        );
        let fcov = fractional_covariance(&bundle.covariance, &bundle.combined_true())?;

        let input = SignificanceInput {
            muon: &bundle.muon_true,
            electron: &bundle.electron_true,
            signal: &bundle.signal,
            signal_sq: &bundle.signal_sq,
            fractional_covariance: &fcov,
        };
        self.model
            .significance(&input, &self.options.with_truth(truth))
    }

    /// Evaluate every grid point and assemble the (shower, track) matrix.
    pub fn build(
        &self,
        background_dir: &str,
        signal_dir: &str,
        grid: &DistortionGrid,
        effs: Option<&[EfficiencyTriple]>,
    ) -> Result<SignificanceMatrix> {
        ensure!(!grid.is_empty(), "distortion grid is empty");
        if let Some(effs) = effs {
            ensure!(
                effs.len() == grid.len(),
                "got {} efficiency triples for {} grid points",
                effs.len(),
                grid.len()
            );
        }

        let points = grid::enumerate(grid);
        let mut entries = Vec::with_capacity(points.len());
        for point in points {
            let truth = effs.map(|e| e[point.index]);
            let value = self
                .point_significance(background_dir, signal_dir, &point, truth)
                .with_context(|| {
                    format!(
                        "grid point {} (track {}, shower {})",
                        point.index, point.distortion.track, point.distortion.shower
                    )
                })?;
            log::info!(
                "Point {:>2} track={} shower={} significance={value:.4}",
                point.index,
                point.distortion.track,
                point.distortion.shower
            );
            entries.push((point, value));
        }

        Ok(grid::assemble(grid, entries))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::path::Path;

    use nalgebra::DMatrix;

    use super::*;
    use crate::data::model::CovarianceBundle;

    /// Returns the same bundle for every point, recording requested paths.
    struct FakeSource {
        requests: RefCell<Vec<(PathBuf, PathBuf)>>,
    }

    impl FakeSource {
        fn new() -> Self {
            Self {
                requests: RefCell::new(Vec::new()),
            }
        }
    }

    impl CovarianceSource for FakeSource {
        fn load(&self, background: &Path, signal: &Path) -> Result<CovarianceBundle> {
            self.requests
                .borrow_mut()
                .push((background.to_path_buf(), signal.to_path_buf()));
            Ok(CovarianceBundle {
                muon_reco: vec![1.0],
                muon_true: vec![2.0],
                electron_reco: vec![3.0],
                electron_true: vec![4.0],
                signal: vec![1.0],
                signal_sq: vec![1.0],
                covariance: DMatrix::from_row_slice(2, 2, &[2.0, 4.0, 4.0, 8.0]),
            })
        }
    }

    /// Returns the number of calls made so far and captures the options.
    struct RecordingModel {
        seen: RefCell<Vec<(SignificanceOptions, DMatrix<f64>)>>,
    }

    impl RecordingModel {
        fn new() -> Self {
            Self {
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl SignificanceModel for RecordingModel {
        fn significance(
            &self,
            input: &SignificanceInput<'_>,
            options: &SignificanceOptions,
        ) -> Result<f64> {
            let mut seen = self.seen.borrow_mut();
            seen.push((options.clone(), input.fractional_covariance.clone()));
            Ok(seen.len() as f64)
        }
    }

    struct FailingSource;

    impl CovarianceSource for FailingSource {
        fn load(&self, background: &Path, _signal: &Path) -> Result<CovarianceBundle> {
            anyhow::bail!("cannot open {}", background.display())
        }
    }

    fn small_config() -> AnalysisConfig {
        AnalysisConfig {
            track_distortions: vec![0.0, 1.0],
            shower_distortions: vec![0.0, 1.0],
            ..AnalysisConfig::default()
        }
    }

    #[test]
    fn paths_concatenate_prefixes() {
        let cfg = AnalysisConfig::default();
        let source = FakeSource::new();
        let model = RecordingModel::new();
        let builder = GridBuilder::new(&cfg, &source, &model);
        let (bkg, sig) = builder.covariance_paths("/data/bkg/", "/data/sig_", 7);
        assert_eq!(bkg, PathBuf::from("/data/bkg/cov_bkg_7/cov_all.parquet"));
        assert_eq!(
            sig,
            PathBuf::from("/data/sig_cov_sig_makross_7/cov_all.parquet")
        );
    }

    #[test]
    fn build_fills_matrix_in_grid_order() {
        let cfg = small_config();
        let source = FakeSource::new();
        let model = RecordingModel::new();
        let builder = GridBuilder::new(&cfg, &source, &model);

        let m = builder.build("b/", "s/", &cfg.grid(), None).unwrap();
        assert_eq!(m.rows(), vec![vec![1.0, 3.0], vec![2.0, 4.0]]);

        let requests = source.requests.borrow();
        assert_eq!(requests.len(), 4);
        assert_eq!(requests[3].0, PathBuf::from("b/cov_bkg_3/cov_all.parquet"));
    }

    #[test]
    fn covariance_is_made_fractional() {
        let cfg = small_config();
        let source = FakeSource::new();
        let model = RecordingModel::new();
        let builder = GridBuilder::new(&cfg, &source, &model);
        builder.build("b/", "s/", &cfg.grid(), None).unwrap();

        let seen = model.seen.borrow();
        assert_eq!(seen[0].1, DMatrix::from_element(2, 2, 0.5));
    }

    #[test]
    fn defaults_used_without_efficiencies() {
        let cfg = small_config();
        let source = FakeSource::new();
        let model = RecordingModel::new();
        let builder = GridBuilder::new(&cfg, &source, &model);
        builder.build("b/", "s/", &cfg.grid(), None).unwrap();

        for (opts, _) in model.seen.borrow().iter() {
            assert_eq!(opts.truth, None);
            assert_eq!(opts.eff_m, 0.3);
            assert_eq!(opts.eff_e, 0.3);
            assert_eq!(opts.pot, 66e19);
            assert!(opts.syst);
            assert!(!opts.mc);
        }
    }

    #[test]
    fn efficiency_override_reaches_the_model() {
        let cfg = small_config();
        let source = FakeSource::new();
        let model = RecordingModel::new();
        let builder = GridBuilder::new(&cfg, &source, &model);
        let effs: Vec<EfficiencyTriple> = (0..4)
            .map(|i| EfficiencyTriple {
                electron: 0.1 * i as f64,
                shower: 0.5,
                muon: 0.9,
            })
            .collect();

        builder
            .build("b/", "s/", &cfg.grid(), Some(&effs))
            .unwrap();

        let seen = model.seen.borrow();
        for (i, (opts, _)) in seen.iter().enumerate() {
            assert_eq!(opts.truth, Some(effs[i]));
        }
    }

    #[test]
    fn wrong_efficiency_count_is_rejected() {
        let cfg = small_config();
        let source = FakeSource::new();
        let model = RecordingModel::new();
        let builder = GridBuilder::new(&cfg, &source, &model);
        let effs = vec![
            EfficiencyTriple {
                electron: 1.0,
                shower: 1.0,
                muon: 1.0,
            };
            3
        ];
        assert!(builder
            .build("b/", "s/", &cfg.grid(), Some(&effs))
            .is_err());
        assert!(source.requests.borrow().is_empty());
    }

    #[test]
    fn load_failure_aborts_with_point_context() {
        let cfg = small_config();
        let model = RecordingModel::new();
        let builder = GridBuilder::new(&cfg, &FailingSource, &model);
        let err = builder.build("b/", "s/", &cfg.grid(), None).unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("grid point 0"));
        assert!(msg.contains("cov_bkg_0"));
        assert!(model.seen.borrow().is_empty());
    }
}
