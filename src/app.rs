use eframe::egui;

use crate::config::RunConfig;
use crate::state::{AppState, View};
use crate::ui::{panels, plot};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct PaleoReconApp {
    pub state: AppState,
}

impl PaleoReconApp {
    pub fn new(config: RunConfig) -> Self {
        Self {
            state: AppState::new(config),
        }
    }
}

impl eframe::App for PaleoReconApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: filters ----
        egui::SidePanel::left("filter_panel")
            .default_width(220.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Central panel: active view ----
        egui::CentralPanel::default().show(ctx, |ui| match self.state.view {
            View::Series => plot::series_plot(ui, &self.state),
            View::Map => plot::site_map(ui, &self.state),
            View::Reconstruction => plot::reconstruction_plot(ui, &self.state),
        });
    }
}
