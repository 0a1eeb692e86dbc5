//! Headless PNG figures.
//!
//! Figures carry no rasterised text: axis labels, legend entries and the
//! numeric values behind each curve are reported in the log and in the
//! CSV/JSON outputs written next to the images.

mod axes;
mod site_map;

use std::path::Path;

use anyhow::{Context, Result};
use image::{Rgb, RgbImage};

use crate::data::model::{Reconstruction, TemperatureSeries};
use crate::recon::stats;
use axes::{Axes, BLACK};

pub use site_map::site_map_figure;

const MARGIN: u32 = 40;

const BAND: Rgb<u8> = Rgb([200, 210, 230]);
const RAW: Rgb<u8> = Rgb([120, 140, 190]);
const SMOOTHED: Rgb<u8> = Rgb([20, 40, 140]);
const TARGET: Rgb<u8> = Rgb([200, 30, 30]);
const REFERENCE: Rgb<u8> = Rgb([30, 140, 60]);

/// Pixel size of a figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FigureSize {
    pub width: u32,
    pub height: u32,
}

impl Default for FigureSize {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 600,
        }
    }
}

/// Reconstruction with its uncertainty band, a `smoothing`-year running
/// mean, and optional instrumental and published overlays.
pub fn reconstruction_figure(
    recon: &Reconstruction,
    smoothing: usize,
    target: Option<&TemperatureSeries>,
    reference: Option<&TemperatureSeries>,
    size: FigureSize,
) -> RgbImage {
    let mut image = axes::blank(size.width, size.height);

    let first = recon.years.first().copied().unwrap_or(0);
    let last = recon.years.last().copied().unwrap_or(first);
    let x_range = (f64::from(first), f64::from(last));

    let in_range = |s: &TemperatureSeries| s.window(first, last);
    let target_pts = target.map(in_range).unwrap_or_default();
    let reference_pts = reference.map(in_range).unwrap_or_default();

    let y_values = recon
        .lower
        .iter()
        .chain(&recon.upper)
        .chain(&recon.values)
        .copied()
        .chain(target_pts.iter().map(|&(_, v)| v))
        .chain(reference_pts.iter().map(|&(_, v)| v))
        .filter(|v| v.is_finite());
    let (lo, hi) = y_values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    let pad = (hi - lo).abs() * 0.05;
    let axes = Axes::new(&image, MARGIN, x_range, (lo - pad, hi + pad));

    axes.draw_frame(&mut image);
    let band = recon
        .years
        .iter()
        .zip(recon.lower.iter().zip(&recon.upper))
        .map(|(&y, (&l, &u))| (f64::from(y), l, u));
    axes.draw_band(&mut image, band, 1.0, BAND);
    axes.draw_hline(&mut image, 0.0, BLACK);

    let years: Vec<f64> = recon.years.iter().map(|&y| f64::from(y)).collect();
    axes.draw_series(&mut image, years.iter().copied().zip(recon.values.iter().copied()), RAW, 1);
    let smoothed = stats::moving_average(&recon.values, smoothing);
    axes.draw_series(&mut image, years.iter().copied().zip(smoothed), SMOOTHED, 3);

    let as_xy = |pts: &[(i32, f64)]| -> Vec<(f64, f64)> {
        pts.iter().map(|&(y, v)| (f64::from(y), v)).collect()
    };
    axes.draw_series(&mut image, as_xy(&reference_pts), REFERENCE, 2);
    axes.draw_series(&mut image, as_xy(&target_pts), TARGET, 2);

    image
}

pub fn save_png(image: &RgbImage, path: &Path) -> Result<()> {
    image
        .save(path)
        .with_context(|| format!("Failed to write figure '{}'", path.display()))?;
    log::info!("Wrote {}x{} figure to {}", image.width(), image.height(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::ReconMethod;

    fn small_recon() -> Reconstruction {
        let years: Vec<i32> = (1900..1950).collect();
        let values: Vec<f64> = (0..50).map(|i| (i as f64 * 0.2).sin() * 0.3).collect();
        Reconstruction {
            method: ReconMethod::Pcr,
            lower: values.iter().map(|v| v - 0.2).collect(),
            upper: values.iter().map(|v| v + 0.2).collect(),
            nest_of: vec![1900; years.len()],
            nests: Vec::new(),
            years,
            values,
        }
    }

    #[test]
    fn figure_has_requested_size_and_ink() {
        let recon = small_recon();
        let size = FigureSize {
            width: 320,
            height: 200,
        };
        let target = TemperatureSeries::new((1930..1950).map(|y| (y, 0.1)));
        let image = reconstruction_figure(&recon, 5, Some(&target), None, size);
        assert_eq!(image.dimensions(), (320, 200));
        assert!(image.pixels().any(|p| *p == SMOOTHED));
        assert!(image.pixels().any(|p| *p == TARGET));
        assert!(image.pixels().any(|p| *p == BAND));
    }

    #[test]
    fn figure_is_written_as_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recon.png");
        let image = reconstruction_figure(&small_recon(), 1, None, None, FigureSize::default());
        save_png(&image, &path).unwrap();
        let back = image::open(&path).unwrap();
        assert_eq!((back.width(), back.height()), (1200, 600));
    }
}
