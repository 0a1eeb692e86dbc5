use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

use crate::color::Rgb8;

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
pub const GRID: Rgb<u8> = Rgb([225, 225, 225]);

pub fn pixel(c: Rgb8) -> Rgb<u8> {
    Rgb([c.red, c.green, c.blue])
}

/// Plot area inside an image, mapping data coordinates to pixels.
#[derive(Debug, Clone, Copy)]
pub struct Axes {
    left: f32,
    top: f32,
    width: f32,
    height: f32,
    x: (f64, f64),
    y: (f64, f64),
}

impl Axes {
    /// Axes filling `image` minus `margin` pixels on every side.
    pub fn new(image: &RgbImage, margin: u32, x: (f64, f64), y: (f64, f64)) -> Self {
        let margin = margin.min(image.width() / 4).min(image.height() / 4);
        Axes {
            left: margin as f32,
            top: margin as f32,
            width: image.width().saturating_sub(2 * margin).max(1) as f32,
            height: image.height().saturating_sub(2 * margin).max(1) as f32,
            x: widen(x),
            y: widen(y),
        }
    }

    pub fn to_px(&self, x: f64, y: f64) -> (f32, f32) {
        let fx = ((x - self.x.0) / (self.x.1 - self.x.0)) as f32;
        let fy = ((y - self.y.0) / (self.y.1 - self.y.0)) as f32;
        (self.left + fx * self.width, self.top + (1.0 - fy) * self.height)
    }

    /// Frame, grid lines at round values, and tick marks.
    pub fn draw_frame(&self, image: &mut RgbImage) {
        for x in nice_ticks(self.x.0, self.x.1, 8) {
            let (px, _) = self.to_px(x, self.y.0);
            let bottom = self.top + self.height;
            draw_line_segment_mut(image, (px, self.top), (px, bottom), GRID);
            draw_line_segment_mut(image, (px, bottom), (px, bottom + 5.0), BLACK);
        }
        for y in nice_ticks(self.y.0, self.y.1, 6) {
            let (_, py) = self.to_px(self.x.0, y);
            let right = self.left + self.width;
            draw_line_segment_mut(image, (self.left, py), (right, py), GRID);
            draw_line_segment_mut(image, (self.left - 5.0, py), (self.left, py), BLACK);
        }
        self.draw_border(image);
    }

    pub fn draw_border(&self, image: &mut RgbImage) {
        let frame = Rect::at(self.left as i32, self.top as i32)
            .of_size(self.width as u32, self.height as u32);
        draw_hollow_rect_mut(image, frame, BLACK);
    }

    /// Horizontal line at `y` when it lies inside the range.
    pub fn draw_hline(&self, image: &mut RgbImage, y: f64, color: Rgb<u8>) {
        if y < self.y.0 || y > self.y.1 {
            return;
        }
        let (x0, py) = self.to_px(self.x.0, y);
        let (x1, _) = self.to_px(self.x.1, y);
        draw_line_segment_mut(image, (x0, py), (x1, py), color);
    }

    /// Polyline through `(x, y)` points, broken at non-finite values.
    pub fn draw_series(
        &self,
        image: &mut RgbImage,
        points: impl IntoIterator<Item = (f64, f64)>,
        color: Rgb<u8>,
        thickness: u32,
    ) {
        let mut last: Option<(f32, f32)> = None;
        for (x, y) in points {
            if !(x.is_finite() && y.is_finite()) {
                last = None;
                continue;
            }
            let p = self.to_px(x, y);
            if let Some(q) = last {
                for d in 0..thickness {
                    let off = d as f32 - (thickness - 1) as f32 / 2.0;
                    draw_line_segment_mut(image, (q.0, q.1 + off), (p.0, p.1 + off), color);
                }
            }
            last = Some(p);
        }
    }

    /// Vertical bars from `lo` to `hi` at each `x`, each one `step` wide.
    pub fn draw_band(
        &self,
        image: &mut RgbImage,
        band: impl IntoIterator<Item = (f64, f64, f64)>,
        step: f64,
        color: Rgb<u8>,
    ) {
        for (x, lo, hi) in band {
            if !(lo.is_finite() && hi.is_finite()) {
                continue;
            }
            let (x0, top) = self.to_px(x - step / 2.0, hi.max(lo));
            let (x1, bottom) = self.to_px(x + step / 2.0, hi.min(lo));
            let w = (x1 - x0).ceil().max(1.0) as u32;
            let h = (bottom - top).ceil().max(1.0) as u32;
            draw_filled_rect_mut(image, Rect::at(x0 as i32, top as i32).of_size(w, h), color);
        }
    }
}

pub fn blank(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width.max(16), height.max(16), WHITE)
}

/// Non-empty range, swapped into order.
fn widen((a, b): (f64, f64)) -> (f64, f64) {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    if !(lo.is_finite() && hi.is_finite()) {
        return (0.0, 1.0);
    }
    if hi - lo < f64::EPSILON {
        return (lo - 0.5, hi + 0.5);
    }
    (lo, hi)
}

/// Round tick positions (1, 2 or 5 × 10ⁿ apart) inside `lo..=hi`.
pub fn nice_ticks(lo: f64, hi: f64, target: usize) -> Vec<f64> {
    let span = hi - lo;
    if !(span.is_finite() && span > 0.0) || target == 0 {
        return Vec::new();
    }
    let raw = span / target as f64;
    let magnitude = 10f64.powi(raw.log10().floor() as i32);
    let step = [1.0, 2.0, 5.0, 10.0]
        .iter()
        .map(|m| m * magnitude)
        .find(|s| *s >= raw)
        .unwrap_or(10.0 * magnitude);
    let first = (lo / step).ceil() as i64;
    let last = (hi / step).floor() as i64;
    (first..=last).map(|i| i as f64 * step).collect()
}
