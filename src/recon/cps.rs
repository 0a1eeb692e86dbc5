//! Composite plus scale.
//!
//! Proxies are standardised over the calibration window, averaged with
//! weights equal to their calibration correlation with the target, and the
//! composite is rescaled to the target's calibration mean and variance.

use nalgebra::DMatrix;

use super::{NestFit, calibration_column, check_shapes, standardize_columns, stats};
use crate::error::{ReconError, ReconResult};

/// Calibrate on `cal_rows` of `proxies` (years × proxies) against `target`
/// and predict every row.
pub fn fit(proxies: &DMatrix<f64>, cal_rows: &[usize], target: &[f64]) -> ReconResult<NestFit> {
    check_shapes(proxies, cal_rows, target)?;
    let z = standardize_columns(proxies, cal_rows)?;

    let weights: Vec<f64> = (0..z.ncols())
        .map(|j| {
            let r = stats::pearson(&calibration_column(&z, j, cal_rows), target);
            if r.is_finite() { r } else { 0.0 }
        })
        .collect();
    let norm: f64 = weights.iter().map(|w| w.abs()).sum();
    if norm == 0.0 {
        return Err(ReconError::DegenerateSeries("proxy composite".into()));
    }

    let composite: Vec<f64> = z
        .row_iter()
        .map(|row| row.iter().zip(&weights).map(|(v, w)| v * w).sum::<f64>() / norm)
        .collect();

    let comp_cal: Vec<f64> = cal_rows.iter().map(|&r| composite[r]).collect();
    let comp_sd = stats::std_dev(&comp_cal);
    if comp_sd.is_nan() || comp_sd <= 0.0 {
        return Err(ReconError::DegenerateSeries("proxy composite".into()));
    }
    let comp_mean = stats::mean(&comp_cal);
    let target_mean = stats::mean(target);
    let target_sd = stats::std_dev(target);

    let predictions = composite
        .iter()
        .map(|c| target_mean + (c - comp_mean) * target_sd / comp_sd)
        .collect();

    Ok(NestFit {
        predictions,
        n_components: 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn perfect_proxies_reproduce_target() {
        let target = [0.1, -0.2, 0.3, 0.0, 0.5];
        // Three rows before calibration, then five calibration rows.
        let truth = [0.4, -0.1, 0.2, 0.1, -0.2, 0.3, 0.0, 0.5];
        let proxies = DMatrix::from_fn(8, 2, |i, j| {
            if j == 0 { 3.0 * truth[i] + 1.0 } else { -2.0 * truth[i] }
        });
        let cal_rows = [3, 4, 5, 6, 7];
        let fit = fit(&proxies, &cal_rows, &target).unwrap();
        for (p, t) in fit.predictions.iter().zip(&truth) {
            assert_abs_diff_eq!(p, t, epsilon = 1e-12);
        }
        assert_eq!(fit.n_components, 1);
    }

    #[test]
    fn scaled_composite_matches_target_moments() {
        let target = [0.0, 1.0, 0.5, 2.0, 1.5, 0.2];
        let proxies = DMatrix::from_row_slice(6, 2, &[
            0.1, 1.0, //
            0.9, 0.2, //
            0.4, 0.8, //
            2.2, 0.1, //
            1.1, 0.5, //
            0.5, 0.9,
        ]);
        let cal_rows: Vec<usize> = (0..6).collect();
        let fit = fit(&proxies, &cal_rows, &target).unwrap();
        assert_abs_diff_eq!(stats::mean(&fit.predictions), stats::mean(&target), epsilon = 1e-12);
        assert_abs_diff_eq!(
            stats::std_dev(&fit.predictions),
            stats::std_dev(&target),
            epsilon = 1e-12
        );
    }

    #[test]
    fn constant_proxy_is_rejected() {
        let proxies = DMatrix::from_element(4, 1, 2.0);
        let err = fit(&proxies, &[0, 1, 2, 3], &[0.0, 1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(err, ReconError::DegenerateSeries(_)));
    }

    #[test]
    fn short_calibration_is_rejected() {
        let proxies = DMatrix::from_row_slice(2, 1, &[1.0, 2.0]);
        let err = fit(&proxies, &[0, 1], &[0.0, 1.0]).unwrap_err();
        assert_eq!(err, ReconError::InsufficientCalibration { needed: 3, got: 2 });
    }
}
