//! Correlation screening of proxies against the instrumental target.

use super::stats;
use crate::data::model::{ProxyNetwork, TemperatureSeries};

/// Correlation of record `idx` with `target` over the years of `start..=end`
/// where both are present. `None` with fewer than three shared years.
pub fn calibration_correlation(
    network: &ProxyNetwork,
    idx: usize,
    target: &TemperatureSeries,
    (start, end): (i32, i32),
) -> Option<f64> {
    let record = network.records.get(idx)?;
    let (xs, ys): (Vec<f64>, Vec<f64>) = target
        .window(start, end)
        .into_iter()
        .filter_map(|(year, t)| {
            let v = *record.values.get(network.year_index(year)?)?;
            v.is_finite().then_some((v, t))
        })
        .unzip();
    if xs.len() < 3 {
        return None;
    }
    let r = stats::pearson(&xs, &ys);
    r.is_finite().then_some(r)
}

/// Indices of records whose calibration correlation reaches `|r| >= threshold`.
pub fn screen(
    network: &ProxyNetwork,
    target: &TemperatureSeries,
    window: (i32, i32),
    threshold: f64,
) -> Vec<usize> {
    let kept: Vec<usize> = (0..network.len())
        .filter(|&i| {
            calibration_correlation(network, i, target, window)
                .is_some_and(|r| r.abs() >= threshold)
        })
        .collect();
    log::info!(
        "Screening at |r| >= {threshold}: kept {} of {} records",
        kept.len(),
        network.len()
    );
    kept
}
