use eframe::egui::{Color32, Ui};
use egui_plot::{Legend, Line, MarkerShape, Plot, PlotPoints, Points};

use super::color32;
use crate::color::family_color;
use crate::data::model::ProxyRecord;
use crate::recon::stats;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Proxy series (central panel)
// ---------------------------------------------------------------------------

/// Colour of a record under the active colour-by column.
fn record_color(state: &AppState, rec: &ProxyRecord) -> Color32 {
    state
        .color_column
        .as_deref()
        .and_then(|col| {
            let val = rec.metadata.get(col)?;
            let cm = state.color_map.as_ref()?;
            Some(color32(cm.color_for(val)))
        })
        .unwrap_or(Color32::LIGHT_BLUE)
}

/// Runs of consecutive finite values as plot points.
fn segments(years: &[i32], values: &[f64]) -> Vec<Vec<[f64; 2]>> {
    let mut out: Vec<Vec<[f64; 2]>> = Vec::new();
    let mut current = Vec::new();
    for (&y, &v) in years.iter().zip(values) {
        if v.is_finite() {
            current.push([f64::from(y), v]);
        } else if !current.is_empty() {
            out.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

pub fn series_plot(ui: &mut Ui, state: &AppState) {
    let Some(network) = &state.network else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Open a proxy network to view it  (File → Open network…)");
        });
        return;
    };
    let color_col = state.color_column.as_deref();

    Plot::new("series_plot")
        .legend(Legend::default())
        .x_axis_label("Year")
        .y_axis_label("Proxy value")
        .allow_boxed_zoom(true)
        .show(ui, |plot_ui| {
            for &idx in &state.visible_indices {
                let rec = &network.records[idx];
                let color = record_color(state, rec);

                // Legend groups records by their colour-by value.
                let name = color_col
                    .and_then(|col| rec.metadata.get(col))
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| rec.name.clone());

                for seg in segments(&network.years, &rec.values) {
                    let line = Line::new(PlotPoints::from(seg)).name(&name).color(color);
                    plot_ui.line(line.width(1.0));
                }
            }
        });
}

// ---------------------------------------------------------------------------
// Site map
// ---------------------------------------------------------------------------

/// Marker approximating a regular polygon with `family` sides.
fn family_marker(family: u8) -> MarkerShape {
    match family {
        3 => MarkerShape::Up,
        4 => MarkerShape::Square,
        5 => MarkerShape::Diamond,
        6 => MarkerShape::Asterisk,
        7 => MarkerShape::Plus,
        8 => MarkerShape::Cross,
        9 => MarkerShape::Down,
        _ => MarkerShape::Circle,
    }
}

pub fn site_map(ui: &mut Ui, state: &AppState) {
    let Some(network) = &state.network else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Open a proxy network to map its sites");
        });
        return;
    };

    Plot::new("site_map")
        .legend(Legend::default())
        .data_aspect(1.0)
        .include_x(-180.0)
        .include_x(180.0)
        .include_y(-90.0)
        .include_y(90.0)
        .x_axis_label("Longitude")
        .y_axis_label("Latitude")
        .show(ui, |plot_ui| {
            for lat in [-60.0, -30.0, 0.0, 30.0, 60.0] {
                let line = Line::new(PlotPoints::from(vec![[-180.0, lat], [180.0, lat]]));
                plot_ui.line(line.color(Color32::from_gray(200)).width(0.5));
            }
            for &idx in &state.visible_indices {
                let rec = &network.records[idx];
                if !(rec.lat.is_finite() && rec.lon.is_finite()) {
                    continue;
                }
                let color = if state.color_column.as_deref() == Some("type") {
                    color32(family_color(rec.family()))
                } else {
                    record_color(state, rec)
                };
                let point = Points::new(vec![[rec.lon, rec.lat]])
                    .shape(family_marker(rec.family()))
                    .filled(true)
                    .radius(5.0)
                    .color(color)
                    .name(rec.proxy_type().name());
                plot_ui.points(point);
            }
        });
}

// ---------------------------------------------------------------------------
// Reconstruction
// ---------------------------------------------------------------------------

pub fn reconstruction_plot(ui: &mut Ui, state: &AppState) {
    let Some(recon) = &state.reconstruction else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Load a network and a target, then press Reconstruct");
        });
        return;
    };

    ui.horizontal(|ui: &mut Ui| {
        for nest in &recon.nests {
            let re = nest
                .validation_re
                .map_or_else(|| "–".to_string(), |re| format!("{re:.2}"));
            ui.label(format!(
                "{}: {} proxies, r² {:.2}, RE {re}",
                nest.start, nest.n_proxies, nest.calibration_r2
            ));
            ui.separator();
        }
    });

    let smoothed = stats::moving_average(&recon.values, state.config.output.smoothing);
    let band = Color32::from_rgb(160, 175, 210);

    Plot::new("reconstruction_plot")
        .legend(Legend::default())
        .x_axis_label("Year")
        .y_axis_label("Temperature anomaly")
        .show(ui, |plot_ui| {
            for (name, values) in [("lower", &recon.lower), ("upper", &recon.upper)] {
                for seg in segments(&recon.years, values) {
                    plot_ui.line(Line::new(PlotPoints::from(seg)).name(name).color(band));
                }
            }
            for seg in segments(&recon.years, &recon.values) {
                let line = Line::new(PlotPoints::from(seg)).name(recon.method.to_string());
                plot_ui.line(line.color(Color32::from_rgb(120, 140, 190)).width(1.0));
            }
            for seg in segments(&recon.years, &smoothed) {
                let line = Line::new(PlotPoints::from(seg)).name("smoothed");
                plot_ui.line(line.color(Color32::from_rgb(20, 40, 140)).width(2.5));
            }
            if let Some(target) = &state.target {
                for seg in segments(&target.years, &target.values) {
                    let line = Line::new(PlotPoints::from(seg)).name("instrumental");
                    plot_ui.line(line.color(Color32::from_rgb(200, 30, 30)).width(1.5));
                }
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gaps_split_segments() {
        let years = [1, 2, 3, 4, 5, 6];
        let values = [f64::NAN, 1.0, 2.0, f64::NAN, 3.0, 4.0];
        let segs = segments(&years, &values);
        assert_eq!(segs, vec![
            vec![[2.0, 1.0], [3.0, 2.0]],
            vec![[5.0, 3.0], [6.0, 4.0]]
        ]);
    }
}
