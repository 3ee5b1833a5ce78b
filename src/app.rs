use eframe::egui;

use crate::state::HeatmapState;
use crate::ui::{heatmap, panels};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct HeatmapApp {
    pub state: HeatmapState,
}

impl HeatmapApp {
    pub fn new(state: HeatmapState) -> Self {
        Self { state }
    }
}

impl eframe::App for HeatmapApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: title ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Right side panel: colour bar ----
        egui::SidePanel::right("colorbar")
            .default_width(110.0)
            .resizable(false)
            .show(ctx, |ui| {
                panels::colorbar(ui, &self.state);
            });

        // ---- Bottom panel: raw values ----
        if self.state.show_table {
            egui::TopBottomPanel::bottom("value_table")
                .resizable(true)
                .default_height(170.0)
                .show(ctx, |ui| {
                    panels::value_table(ui, &self.state);
                });
        }

        // ---- Central panel: heatmap ----
        egui::CentralPanel::default().show(ctx, |ui| {
            heatmap::significance_heatmap(ui, &self.state);
        });
    }
}
