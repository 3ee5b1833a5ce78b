use eframe::egui::{self, Align2, FontId, Rect, RichText, Sense, Ui};
use egui_extras::{Column, TableBuilder};

use crate::state::HeatmapState;

/// Number of slices the colour bar gradient is drawn with.
const COLORBAR_STEPS: usize = 64;

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Figure title and view toggles.
pub fn top_bar(ui: &mut Ui, state: &mut HeatmapState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.heading(&state.title);
        ui.separator();
        ui.label(format!(
            "{} track × {} shower points",
            state.matrix.n_track(),
            state.matrix.n_shower()
        ));
        ui.separator();
        if ui.selectable_label(state.show_table, "Values").clicked() {
            state.show_table = !state.show_table;
        }
    });
}

// ---------------------------------------------------------------------------
// Colour bar (right side panel)
// ---------------------------------------------------------------------------

pub fn colorbar(ui: &mut Ui, state: &HeatmapState) {
    ui.strong("significance");
    ui.add_space(6.0);

    let height = (ui.available_height() - 24.0).max(80.0);
    let (rect, _) = ui.allocate_exact_size(egui::vec2(70.0, height), Sense::hover());
    let bar_width = 18.0;
    let painter = ui.painter();
    let step = rect.height() / COLORBAR_STEPS as f32;

    for i in 0..COLORBAR_STEPS {
        // top of the bar is the maximum
        let t = 1.0 - (i as f32 + 0.5) / COLORBAR_STEPS as f32;
        let top = rect.top() + i as f32 * step;
        let slice = Rect::from_min_max(
            egui::pos2(rect.left(), top),
            egui::pos2(rect.left() + bar_width, top + step + 0.5),
        );
        painter.rect_filled(slice, 0.0, state.color_scale.color_at(t));
    }

    let scale = &state.color_scale;
    let text_color = ui.visuals().text_color();
    for k in 0..=4 {
        let frac = k as f32 / 4.0;
        let value = scale.min + (scale.max - scale.min) * frac as f64;
        let y = rect.bottom() - frac * rect.height();
        painter.text(
            egui::pos2(rect.left() + bar_width + 4.0, y),
            Align2::LEFT_CENTER,
            format!("{value:.3}"),
            FontId::proportional(11.0),
            text_color,
        );
    }
}

// ---------------------------------------------------------------------------
// Raw value table (bottom panel)
// ---------------------------------------------------------------------------

/// Matrix values, one row per shower distortion, one column per track
/// distortion.
pub fn value_table(ui: &mut Ui, state: &HeatmapState) {
    let n_track = state.matrix.n_track();

    TableBuilder::new(ui)
        .striped(true)
        .column(Column::auto().at_least(90.0))
        .columns(Column::remainder().at_least(60.0), n_track)
        .header(20.0, |mut header| {
            header.col(|ui| {
                ui.strong("shower \\ track");
            });
            for track in &state.track_values {
                header.col(|ui| {
                    ui.strong(format!("{track}"));
                });
            }
        })
        .body(|mut body| {
            // highest shower distortion first, matching the plot
            for s in (0..state.matrix.n_shower()).rev() {
                body.row(18.0, |mut row| {
                    row.col(|ui| {
                        ui.label(RichText::new(format!("{}", state.shower_values[s])).strong());
                    });
                    for t in 0..n_track {
                        row.col(|ui| {
                            ui.monospace(format!("{:.4}", state.matrix.get(s, t)));
                        });
                    }
                });
            }
        });
}
