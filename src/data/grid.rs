use anyhow::{ensure, Result};

use super::model::{Distortion, DistortionGrid, GridPoint, SignificanceMatrix};

// ---------------------------------------------------------------------------
// Grid enumeration
// ---------------------------------------------------------------------------

/// Enumerate the full cross product, track outer and shower inner:
/// point `k` is `(track[k / S], shower[k % S])` with `S = shower.len()`.
///
/// An empty track or shower list yields no points.
pub fn enumerate(grid: &DistortionGrid) -> Vec<GridPoint> {
    grid.track
        .iter()
        .enumerate()
        .flat_map(|(t, &track)| {
            let n_shower = grid.shower.len();
            grid.shower
                .iter()
                .enumerate()
                .map(move |(s, &shower)| GridPoint {
                    index: t * n_shower + s,
                    track_index: t,
                    shower_index: s,
                    distortion: Distortion { track, shower },
                })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Matrix assembly
// ---------------------------------------------------------------------------

/// Place each value at the (shower, track) cell of the point it was
/// computed for.
pub fn assemble<I>(grid: &DistortionGrid, entries: I) -> SignificanceMatrix
where
    I: IntoIterator<Item = (GridPoint, f64)>,
{
    let mut matrix = SignificanceMatrix::zeros(grid.shower.len(), grid.track.len());
    for (point, value) in entries {
        matrix.values[(point.shower_index, point.track_index)] = value;
    }
    matrix
}

/// Assemble a flat sequence ordered like [`enumerate`].
pub fn assemble_flat(grid: &DistortionGrid, values: &[f64]) -> Result<SignificanceMatrix> {
    ensure!(
        values.len() == grid.len(),
        "expected {} significance values for a {}x{} grid, got {}",
        grid.len(),
        grid.track.len(),
        grid.shower.len(),
        values.len()
    );
    Ok(assemble(
        grid,
        enumerate(grid).into_iter().zip(values.iter().copied()),
    ))
}

/// Tick positions (cell centres) and labels for every second entry of a
/// distortion list.
pub fn tick_labels(values: &[f64]) -> Vec<(f64, String)> {
    values
        .iter()
        .enumerate()
        .step_by(2)
        .map(|(i, v)| (i as f64 + 0.5, format!("{v}")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn production_grid() -> DistortionGrid {
        DistortionGrid::new(
            vec![0.0, 0.01, 0.02, 0.03, 0.04, 0.05],
            vec![0.0, 0.1, 0.2, 0.3, 0.4, 0.5],
        )
    }

    #[test]
    fn enumerate_track_outer_shower_inner() {
        let grid = DistortionGrid::new(vec![1.0, 2.0, 3.0], vec![10.0, 20.0]);
        let points = enumerate(&grid);
        assert_eq!(points.len(), 6);
        let s = grid.shower.len();
        for (k, p) in points.iter().enumerate() {
            assert_eq!(p.index, k);
            assert_eq!(p.distortion.track, grid.track[k / s]);
            assert_eq!(p.distortion.shower, grid.shower[k % s]);
            assert_eq!(p.track_index, k / s);
            assert_eq!(p.shower_index, k % s);
        }
    }

    #[test]
    fn enumerate_two_by_two() {
        let grid = DistortionGrid::new(vec![0.0, 1.0], vec![0.0, 1.0]);
        let pairs: Vec<(f64, f64)> = enumerate(&grid)
            .iter()
            .map(|p| (p.distortion.track, p.distortion.shower))
            .collect();
        assert_eq!(pairs, vec![(0.0, 0.0), (0.0, 1.0), (1.0, 0.0), (1.0, 1.0)]);
    }

    #[test]
    fn enumerate_empty_list_yields_nothing() {
        let grid = DistortionGrid::new(vec![], vec![0.0, 1.0]);
        assert!(enumerate(&grid).is_empty());
        assert!(grid.is_empty());
    }

    #[test]
    fn assemble_two_by_two() {
        let grid = DistortionGrid::new(vec![0.0, 1.0], vec![0.0, 1.0]);
        let m = assemble_flat(&grid, &[10.0, 20.0, 30.0, 40.0]).unwrap();
        assert_eq!(m.rows(), vec![vec![10.0, 30.0], vec![20.0, 40.0]]);
    }

    #[test]
    fn assemble_production_grid_is_bijective() {
        let grid = production_grid();
        let values: Vec<f64> = (0..grid.len()).map(|i| i as f64).collect();
        let m = assemble_flat(&grid, &values).unwrap();

        let mut seen: Vec<f64> = m.values.iter().copied().collect();
        seen.sort_by(f64::total_cmp);
        assert_eq!(seen, values);
        // value i sits at [i % S][i / S]
        for i in 0..grid.len() {
            assert_eq!(m.get(i % 6, i / 6), i as f64);
        }
    }

    #[test]
    fn assemble_non_square_grid_keeps_every_value() {
        let grid = DistortionGrid::new(vec![0.0, 1.0, 2.0], vec![0.0, 1.0]);
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let m = assemble_flat(&grid, &values).unwrap();
        assert_eq!(m.n_shower(), 2);
        assert_eq!(m.n_track(), 3);
        assert_eq!(m.rows(), vec![vec![1.0, 3.0, 5.0], vec![2.0, 4.0, 6.0]]);
    }

    #[test]
    fn assemble_flat_rejects_wrong_length() {
        let grid = production_grid();
        assert!(assemble_flat(&grid, &[1.0, 2.0]).is_err());
    }

    #[test]
    fn tick_labels_every_second_cell() {
        let ticks = tick_labels(&production_grid().track);
        assert_eq!(
            ticks,
            vec![
                (0.5, "0".to_string()),
                (2.5, "0.02".to_string()),
                (4.5, "0.04".to_string()),
            ]
        );
    }
}
