use eframe::egui::{Stroke, Ui};
use egui_plot::{GridInput, GridMark, Plot, PlotPoints, Polygon};

use crate::state::HeatmapState;

// ---------------------------------------------------------------------------
// Significance heatmap (central panel)
// ---------------------------------------------------------------------------

/// Render the matrix as unit cells: track index on x, shower index on y.
pub fn significance_heatmap(ui: &mut Ui, state: &HeatmapState) {
    let matrix = &state.matrix;
    let n_track = matrix.n_track() as f64;
    let n_shower = matrix.n_shower() as f64;

    let x_ticks = state.track_ticks.clone();
    let x_labels = state.track_ticks.clone();
    let y_ticks = state.shower_ticks.clone();
    let y_labels = state.shower_ticks.clone();

    Plot::new("significance_heatmap")
        .x_axis_label("track energy distortion")
        .y_axis_label("shower energy distortion")
        .x_grid_spacer(move |input| fixed_marks(&x_ticks, input))
        .y_grid_spacer(move |input| fixed_marks(&y_ticks, input))
        .x_axis_formatter(move |mark, _range| tick_label(&x_labels, mark.value))
        .y_axis_formatter(move |mark, _range| tick_label(&y_labels, mark.value))
        .label_formatter(|_name, point| state.describe(point.x, point.y))
        .include_x(0.0)
        .include_x(n_track)
        .include_y(0.0)
        .include_y(n_shower)
        .show_grid(false)
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true)
        .show(ui, |plot_ui| {
            for s in 0..matrix.n_shower() {
                for t in 0..matrix.n_track() {
                    let (x, y) = (t as f64, s as f64);
                    let corners: PlotPoints = vec![
                        [x, y],
                        [x + 1.0, y],
                        [x + 1.0, y + 1.0],
                        [x, y + 1.0],
                    ]
                    .into_iter()
                    .collect();

                    let cell = Polygon::new(corners)
                        .fill_color(state.color_scale.color_for(matrix.get(s, t)))
                        .stroke(Stroke::NONE);
                    plot_ui.polygon(cell);
                }
            }
        });
}

/// Grid marks only at the configured tick positions inside the view.
fn fixed_marks(ticks: &[(f64, String)], input: GridInput) -> Vec<GridMark> {
    let (min, max) = input.bounds;
    ticks
        .iter()
        .filter(|(value, _)| (min..=max).contains(value))
        .map(|&(value, _)| GridMark {
            value,
            step_size: 1.0,
        })
        .collect()
}

fn tick_label(ticks: &[(f64, String)], value: f64) -> String {
    ticks
        .iter()
        .find(|(pos, _)| (pos - value).abs() < 1e-6)
        .map(|(_, label)| label.clone())
        .unwrap_or_default()
}
