use std::collections::BTreeSet;

use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};

use super::color32;
use crate::data::model::MetadataValue;
use crate::state::{AppState, View};

// ---------------------------------------------------------------------------
// Left side panel – filter widgets
// ---------------------------------------------------------------------------

/// Render the left filter panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Filters");
    ui.separator();

    let Some(network) = &state.network else {
        ui.label("No proxy network loaded.");
        return;
    };
    if let Some(path) = &state.network_path {
        ui.small(path.display().to_string());
    }

    // Owned copies: the widgets below mutate `state`.
    let columns = network.column_names.clone();
    let unique = network.unique_values.clone();

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            color_by_selector(ui, state, &columns);
            ui.separator();
            for col in &columns {
                if let Some(values) = unique.get(col) {
                    column_filter(ui, state, col, values);
                }
            }
        });
}

fn color_by_selector(ui: &mut Ui, state: &mut AppState, columns: &[String]) {
    ui.strong("Color by");
    let current = state.color_column.clone().unwrap_or_default();
    egui::ComboBox::from_id_salt("color_by")
        .selected_text(&current)
        .show_ui(ui, |ui: &mut Ui| {
            for col in columns {
                if ui.selectable_label(current == *col, col).clicked() {
                    state.set_color_column(col.clone());
                }
            }
        });
}

/// Collapsible checkbox list for one metadata column.
fn column_filter(
    ui: &mut Ui,
    state: &mut AppState,
    col: &str,
    values: &BTreeSet<MetadataValue>,
) {
    let n_selected = state.filters.get(col).map_or(0, |s| s.len());
    let header = format!("{col}  ({n_selected}/{})", values.len());

    egui::CollapsingHeader::new(RichText::new(header).strong())
        .id_salt(col)
        .default_open(col == "type")
        .show(ui, |ui: &mut Ui| {
            ui.horizontal(|ui: &mut Ui| {
                if ui.small_button("All").clicked() {
                    state.select_all(col);
                }
                if ui.small_button("None").clicked() {
                    state.select_none(col);
                }
            });

            let swatches = state
                .color_map
                .as_ref()
                .filter(|cm| cm.column == col);
            let mut toggled = None;
            for val in values {
                let mut text = RichText::new(val.to_string());
                if let Some(cm) = swatches {
                    text = text.color(color32(cm.color_for(val)));
                }
                let mut checked = state.filters.get(col).is_some_and(|s| s.contains(val));
                if ui.checkbox(&mut checked, text).changed() {
                    toggled = Some(val);
                }
            }
            if let Some(val) = toggled {
                state.toggle_filter_value(col, val);
            }
        });
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open network…").clicked() {
                open_network_dialog(state);
                ui.close_menu();
            }
            if ui.button("Open target…").clicked() {
                open_target_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();
        ui.selectable_value(&mut state.view, View::Series, "Series");
        ui.selectable_value(&mut state.view, View::Map, "Map");
        ui.selectable_value(&mut state.view, View::Reconstruction, "Reconstruction");
        ui.separator();

        if let Some(net) = &state.network {
            ui.label(format!(
                "{} records loaded, {} visible",
                net.len(),
                state.visible_indices.len()
            ));
        }

        let ready = state.network.is_some() && state.target.is_some();
        let label = format!("Reconstruct ({})", state.config.reconstruction.method);
        if ui.add_enabled(ready, egui::Button::new(label)).clicked() {
            state.run_reconstruction();
        }

        if let Some(msg) = &state.status_message {
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_network_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open proxy network")
        .add_filter("Supported files", &["parquet", "pq", "json", "csv", "nc"])
        .add_filter("Parquet", &["parquet", "pq"])
        .add_filter("JSON", &["json"])
        .add_filter("CSV", &["csv"])
        .add_filter("NetCDF", &["nc"])
        .pick_file();

    if let Some(path) = file {
        state.open_network(&path);
    }
}

pub fn open_target_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open instrumental target")
        .add_filter("CSV", &["csv"])
        .pick_file();

    if let Some(path) = file {
        state.open_target(&path);
    }
}
