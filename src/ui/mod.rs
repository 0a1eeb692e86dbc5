pub mod panels;
pub mod plot;

use eframe::egui::Color32;

use crate::color::Rgb8;

pub fn color32(c: Rgb8) -> Color32 {
    Color32::from_rgb(c.red, c.green, c.blue)
}
