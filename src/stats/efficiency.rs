use std::path::Path;

use anyhow::{Context, Result};

use super::{SelectionCounter, StatsError};
use crate::config::{EfficiencyConfig, EfficiencyDistortion};
use crate::data::grid;
use crate::data::loader;
use crate::data::model::{Distortion, DistortionGrid, EfficiencyTriple, SelectionCounts};

pub const COUNTS_FILE: &str = "selection_counts.csv";

/// Reads `selection_counts.csv` from each dataset directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvSelectionCounter;

impl SelectionCounter for CsvSelectionCounter {
    fn counts(
        &self,
        dataset_id: u32,
        dataset_dir: &Path,
        distortion: Distortion,
    ) -> Result<SelectionCounts> {
        let path = dataset_dir.join(COUNTS_FILE);
        log::debug!("Reading dataset {dataset_id} counts from {}", path.display());
        let counts = loader::load_selection_counts(&path, dataset_id, distortion)?;
        counts.ok_or_else(|| {
            StatsError::MissingCounts {
                dataset_id,
                track: distortion.track,
                shower: distortion.shower,
            }
            .into()
        })
    }
}

/// Combine the three datasets into (electron, shower, muon) efficiencies.
pub fn efficiency_triple(
    signal: &SelectionCounts,
    nue: &SelectionCounts,
    inclusive: &SelectionCounts,
    inc_to_nue_factor: f64,
) -> Result<EfficiencyTriple, StatsError> {
    let shower = ratio(signal.nue_selected(), signal.nue_total, "shower")?;
    let muon = ratio(inclusive.numu_selected(), inclusive.numu_total, "muon")?;
    let electron = ratio(
        nue.nue_selected() + inclusive.nue_selected() * inc_to_nue_factor,
        nue.nue_total + inclusive.nue_total * inc_to_nue_factor,
        "electron",
    )?;
    Ok(EfficiencyTriple {
        electron,
        shower,
        muon,
    })
}

fn ratio(num: f64, denom: f64, what: &'static str) -> Result<f64, StatsError> {
    if denom == 0.0 {
        return Err(StatsError::ZeroDenominator(what));
    }
    Ok(num / denom)
}

/// One efficiency triple per grid point, in grid order.
///
/// With [`EfficiencyDistortion::First`] every point is evaluated at the
/// index-0 track and shower distortion.
pub fn precompute_efficiencies<C: SelectionCounter>(
    config: &EfficiencyConfig,
    counter: &C,
    grid: &DistortionGrid,
) -> Result<Vec<EfficiencyTriple>> {
    let origin = grid
        .origin()
        .context("cannot compute efficiencies for an empty grid")?;
    let signal_dir = config.scratch_dir.join(&config.signal.subdir);
    let nue_dir = config.scratch_dir.join(&config.nue.subdir);
    let inclusive_dir = config.scratch_dir.join(&config.inclusive.subdir);

    grid::enumerate(grid)
        .into_iter()
        .map(|point| -> Result<EfficiencyTriple> {
            let distortion = match config.distortion {
                EfficiencyDistortion::First => origin,
                EfficiencyDistortion::PerPoint => point.distortion,
            };
            let signal = counter.counts(config.signal.dataset_id, &signal_dir, distortion)?;
            let nue = counter.counts(config.nue.dataset_id, &nue_dir, distortion)?;
            let inclusive =
                counter.counts(config.inclusive.dataset_id, &inclusive_dir, distortion)?;

            let triple = efficiency_triple(&signal, &nue, &inclusive, config.inc_to_nue_factor)
                .with_context(|| format!("grid point {}", point.index))?;
            log::debug!(
                "Point {}: eff_e={:.4} eff_s={:.4} eff_m={:.4}",
                point.index,
                triple.electron,
                triple.shower,
                triple.muon
            );
            Ok(triple)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::path::PathBuf;

    use super::*;
    use crate::config::DatasetSpec;

    fn counts(nue: [f64; 3], numu: [f64; 3]) -> SelectionCounts {
        SelectionCounts {
            nue_total: nue[0],
            nue_selected_np: nue[1],
            nue_selected_zp: nue[2],
            numu_total: numu[0],
            numu_selected_np: numu[1],
            numu_selected_zp: numu[2],
        }
    }

    /// Returns fixed counts per dataset id and records every request.
    struct RecordingCounter {
        calls: RefCell<Vec<(u32, PathBuf, Distortion)>>,
    }

    impl SelectionCounter for RecordingCounter {
        fn counts(
            &self,
            dataset_id: u32,
            dataset_dir: &Path,
            distortion: Distortion,
        ) -> Result<SelectionCounts> {
            self.calls
                .borrow_mut()
                .push((dataset_id, dataset_dir.to_path_buf(), distortion));
            Ok(match dataset_id {
                47 => counts([100.0, 30.0, 10.0], [0.0, 0.0, 0.0]),
                44 => counts([200.0, 50.0, 10.0], [0.0, 0.0, 0.0]),
                _ => counts([10.0, 2.0, 1.0], [1000.0, 200.0, 100.0]),
            })
        }
    }

    fn config(distortion: EfficiencyDistortion) -> EfficiencyConfig {
        EfficiencyConfig {
            scratch_dir: PathBuf::from("/scratch"),
            signal: DatasetSpec {
                dataset_id: 47,
                subdir: "sig".to_string(),
            },
            nue: DatasetSpec {
                dataset_id: 44,
                subdir: "nue".to_string(),
            },
            inclusive: DatasetSpec {
                dataset_id: 1016,
                subdir: "inc".to_string(),
            },
            inc_to_nue_factor: 2.0,
            distortion,
        }
    }

    #[test]
    fn triple_combines_datasets() {
        let t = efficiency_triple(
            &counts([100.0, 30.0, 10.0], [0.0, 0.0, 0.0]),
            &counts([200.0, 50.0, 10.0], [0.0, 0.0, 0.0]),
            &counts([10.0, 2.0, 1.0], [1000.0, 200.0, 100.0]),
            2.0,
        )
        .unwrap();
        assert_eq!(t.shower, 0.4);
        assert_eq!(t.muon, 0.3);
        // (60 + 3*2) / (200 + 10*2)
        assert_eq!(t.electron, 66.0 / 220.0);
    }

    #[test]
    fn zero_total_is_an_error() {
        let empty = counts([0.0; 3], [0.0; 3]);
        assert!(matches!(
            efficiency_triple(&empty, &empty, &empty, 1.0),
            Err(StatsError::ZeroDenominator("shower"))
        ));
    }

    #[test]
    fn first_mode_always_uses_origin_distortion() {
        let counter = RecordingCounter {
            calls: RefCell::new(Vec::new()),
        };
        let grid = DistortionGrid::new(vec![0.0, 0.01], vec![0.0, 0.1, 0.2]);
        let effs =
            precompute_efficiencies(&config(EfficiencyDistortion::First), &counter, &grid).unwrap();

        assert_eq!(effs.len(), 6);
        assert!(effs.iter().all(|e| *e == effs[0]));

        let calls = counter.calls.borrow();
        assert_eq!(calls.len(), 18);
        let origin = Distortion { track: 0.0, shower: 0.0 };
        assert!(calls.iter().all(|(_, _, d)| *d == origin));
        assert_eq!(calls[0].0, 47);
        assert_eq!(calls[0].1, PathBuf::from("/scratch/sig"));
        assert_eq!(calls[1].1, PathBuf::from("/scratch/nue"));
        assert_eq!(calls[2].1, PathBuf::from("/scratch/inc"));
    }

    #[test]
    fn per_point_mode_follows_grid() {
        let counter = RecordingCounter {
            calls: RefCell::new(Vec::new()),
        };
        let grid = DistortionGrid::new(vec![0.0, 0.01], vec![0.0, 0.1]);
        precompute_efficiencies(&config(EfficiencyDistortion::PerPoint), &counter, &grid)
            .unwrap();

        let calls = counter.calls.borrow();
        let last = calls.last().unwrap().2;
        assert_eq!(last, Distortion { track: 0.01, shower: 0.1 });
    }

    #[test]
    fn csv_counter_reports_missing_rows() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(COUNTS_FILE),
            "dataset_id,shower_distortion,track_distortion,nue_total,nue_selected_np,nue_selected_zp,numu_total,numu_selected_np,numu_selected_zp\n\
             44,0,0,100,10,5,0,0,0\n",
        )
        .unwrap();

        let origin = Distortion { track: 0.0, shower: 0.0 };
        let found = CsvSelectionCounter.counts(44, dir.path(), origin).unwrap();
        assert_eq!(found.nue_selected(), 15.0);

        let err = CsvSelectionCounter.counts(47, dir.path(), origin).unwrap_err();
        assert!(err.downcast_ref::<StatsError>().is_some());
    }
}
