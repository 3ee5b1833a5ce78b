use crate::color::ColorScale;
use crate::data::grid;
use crate::data::model::{DistortionGrid, SignificanceMatrix};

// ---------------------------------------------------------------------------
// Viewer state
// ---------------------------------------------------------------------------

/// Everything the heatmap window shows, independent of rendering.
pub struct HeatmapState {
    pub title: String,
    pub matrix: SignificanceMatrix,
    pub track_values: Vec<f64>,
    pub shower_values: Vec<f64>,
    /// Tick position and label on the track (x) axis.
    pub track_ticks: Vec<(f64, String)>,
    /// Tick position and label on the shower (y) axis.
    pub shower_ticks: Vec<(f64, String)>,
    pub color_scale: ColorScale,
    /// Whether the raw value table is shown under the plot.
    pub show_table: bool,
}

impl HeatmapState {
    pub fn new(title: &str, matrix: SignificanceMatrix, grid: &DistortionGrid) -> Self {
        let (min, max) = matrix.finite_range().unwrap_or((0.0, 1.0));
        Self {
            title: title.to_string(),
            track_ticks: grid::tick_labels(&grid.track),
            shower_ticks: grid::tick_labels(&grid.shower),
            track_values: grid.track.clone(),
            shower_values: grid.shower.clone(),
            color_scale: ColorScale::new(min, max),
            matrix,
            show_table: true,
        }
    }

    /// Cell under plot coordinates `(x, y)`, as (shower_index, track_index).
    pub fn cell_at(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        if x < 0.0 || y < 0.0 {
            return None;
        }
        let (t, s) = (x.floor() as usize, y.floor() as usize);
        (t < self.matrix.n_track() && s < self.matrix.n_shower()).then_some((s, t))
    }

    /// Hover text for plot coordinates.
    pub fn describe(&self, x: f64, y: f64) -> String {
        match self.cell_at(x, y) {
            Some((s, t)) => format!(
                "track {}\nshower {}\nsignificance {:.4}",
                self.track_values[t],
                self.shower_values[s],
                self.matrix.get(s, t)
            ),
            None => String::new(),
        }
    }
}
