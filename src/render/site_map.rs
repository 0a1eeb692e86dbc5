use std::f64::consts::TAU;

use image::RgbImage;
use imageproc::drawing::{
    draw_filled_circle_mut, draw_hollow_circle_mut, draw_hollow_polygon_mut, draw_polygon_mut,
};
use imageproc::point::Point;

use super::FigureSize;
use super::axes::{self, Axes, BLACK, pixel};
use crate::color::family_color;
use crate::data::model::ProxyNetwork;

/// Equirectangular site map. Each site is a regular polygon with one side
/// per proxy family unit (family 2 is drawn as a disc), filled with the
/// family colour.
pub fn site_map_figure(network: &ProxyNetwork, size: FigureSize) -> RgbImage {
    let mut image = axes::blank(size.width, size.height);
    let axes = Axes::new(&image, 20, (-180.0, 180.0), (-90.0, 90.0));

    for lon in (-150..=150).step_by(30) {
        let lon = f64::from(lon);
        axes.draw_series(&mut image, [(lon, -90.0), (lon, 90.0)], axes::GRID, 1);
    }
    for lat in (-60..=60).step_by(30) {
        axes.draw_hline(&mut image, f64::from(lat), axes::GRID);
    }
    axes.draw_hline(&mut image, 0.0, pixel(crate::color::GRAY));
    axes.draw_border(&mut image);

    let radius = (size.width.min(size.height * 2) / 100).max(5) as f64;
    for record in &network.records {
        if !(record.lat.is_finite() && record.lon.is_finite()) {
            continue;
        }
        let (x, y) = axes.to_px(record.lon, record.lat);
        let fill = pixel(family_color(record.family()));
        let sides = usize::from(record.family());
        if sides < 3 {
            let centre = (x.round() as i32, y.round() as i32);
            draw_filled_circle_mut(&mut image, centre, radius as i32, fill);
            draw_hollow_circle_mut(&mut image, centre, radius as i32, BLACK);
            continue;
        }
        let vertices = polygon(f64::from(x), f64::from(y), radius, sides);
        let filled: Vec<Point<i32>> = vertices
            .iter()
            .map(|p| Point::new(p.x.round() as i32, p.y.round() as i32))
            .collect();
        draw_polygon_mut(&mut image, &filled, fill);
        draw_hollow_polygon_mut(&mut image, &vertices, BLACK);
    }
    log::debug!("Site map: {} sites", network.len());
    image
}

/// Vertices of a regular `sides`-gon around `(cx, cy)`, first vertex up.
fn polygon(cx: f64, cy: f64, radius: f64, sides: usize) -> Vec<Point<f32>> {
    (0..sides)
        .map(|k| {
            let angle = TAU * k as f64 / sides as f64;
            Point::new(
                (cx + radius * angle.sin()) as f32,
                (cy - radius * angle.cos()) as f32,
            )
        })
        .collect()
}
