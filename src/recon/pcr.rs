//! Principal-component regression.
//!
//! Proxies are standardised over the calibration window and decomposed into
//! principal components on the calibration rows. The target is regressed on
//! the retained component scores; since those scores are centred and mutually
//! orthogonal over the calibration rows, ordinary least squares reduces to a
//! projection onto each score plus the target mean as intercept.

use nalgebra::DMatrix;

use super::pca::{ComponentSelection, Pca};
use super::{NestFit, check_shapes, standardize_columns, stats};
use crate::error::ReconResult;

pub fn fit(
    proxies: &DMatrix<f64>,
    cal_rows: &[usize],
    target: &[f64],
    selection: ComponentSelection,
) -> ReconResult<NestFit> {
    check_shapes(proxies, cal_rows, target)?;
    let z = standardize_columns(proxies, cal_rows)?;
    let z_cal = z.select_rows(cal_rows);

    let pca = Pca::fit(&z_cal, selection)?;
    let cal_scores = pca.scores(&z_cal);
    let scores = pca.scores(&z);

    let target_mean = stats::mean(target);
    let betas: Vec<f64> = cal_scores
        .column_iter()
        .map(|s| {
            let ss = s.norm_squared();
            if ss <= f64::EPSILON {
                return 0.0;
            }
            s.iter()
                .zip(target)
                .map(|(si, yi)| si * (yi - target_mean))
                .sum::<f64>()
                / ss
        })
        .collect();
    log::debug!("PCR coefficients: {betas:?}");

    let predictions = scores
        .row_iter()
        .map(|row| target_mean + row.iter().zip(&betas).map(|(s, b)| s * b).sum::<f64>())
        .collect();

    Ok(NestFit {
        predictions,
        n_components: pca.n_components(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn proxies_from(truth: &[f64], noise: &[f64]) -> DMatrix<f64> {
        DMatrix::from_fn(truth.len(), 3, |i, j| match j {
            0 => 2.0 * truth[i] + 5.0,
            1 => -truth[i] + 0.3 * noise[i],
            _ => 0.5 * truth[i] + 0.2 * noise[i],
        })
    }

    #[test]
    fn all_components_recover_linear_target() {
        let truth = [0.3, -0.1, 0.4, 0.0, 0.2, -0.3, 0.1, 0.5];
        let noise = [0.2, -0.4, 0.1, 0.3, -0.2, 0.0, 0.4, -0.1];
        let proxies = proxies_from(&truth, &noise);
        let cal_rows = [2, 3, 4, 5, 6, 7];
        let target: Vec<f64> = cal_rows.iter().map(|&r| truth[r]).collect();

        let fit = fit(&proxies, &cal_rows, &target, ComponentSelection::Fixed(3)).unwrap();
        assert_eq!(fit.n_components, 3);
        for (p, t) in fit.predictions.iter().zip(&truth) {
            assert_abs_diff_eq!(p, t, epsilon = 1e-9);
        }
    }

    #[test]
    fn truncated_regression_preserves_target_mean() {
        let truth = [0.3, -0.1, 0.4, 0.0, 0.2, -0.3, 0.1, 0.5];
        let noise = [0.2, -0.4, 0.1, 0.3, -0.2, 0.0, 0.4, -0.1];
        let proxies = proxies_from(&truth, &noise);
        let cal_rows: Vec<usize> = (0..truth.len()).collect();

        let fit = fit(&proxies, &cal_rows, &truth, ComponentSelection::Fixed(1)).unwrap();
        assert_eq!(fit.n_components, 1);
        assert_abs_diff_eq!(stats::mean(&fit.predictions), stats::mean(&truth), epsilon = 1e-12);
        // one component still explains most of the target
        assert!(stats::pearson(&fit.predictions, &truth) > 0.8);
    }
}
