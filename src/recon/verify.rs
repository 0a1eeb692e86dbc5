//! Verification statistics and comparison against published series.

use serde::Serialize;

use super::stats;
use crate::data::model::TemperatureSeries;

/// Squared Pearson correlation between prediction and observation.
pub fn calibration_r2(predicted: &[f64], observed: &[f64]) -> f64 {
    stats::pearson(predicted, observed).powi(2)
}

/// Reduction of error: skill relative to predicting the calibration mean.
pub fn reduction_of_error(predicted: &[f64], observed: &[f64], calibration_mean: f64) -> f64 {
    let Some(sse) = stats::sum_sq_diff(predicted, observed) else {
        return f64::NAN;
    };
    let reference: f64 = observed.iter().map(|o| (o - calibration_mean).powi(2)).sum();
    1.0 - sse / reference
}

/// Coefficient of efficiency: skill relative to predicting the
/// verification-period mean itself.
pub fn coefficient_of_efficiency(predicted: &[f64], observed: &[f64]) -> f64 {
    reduction_of_error(predicted, observed, stats::mean(observed))
}

/// Agreement between a reconstruction and a published reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceCheck {
    /// Years present in both series.
    pub overlap: usize,
    pub rmse: f64,
    pub max_abs_diff: f64,
    pub correlation: f64,
    pub tolerance: f64,
    pub within_tolerance: bool,
}

/// Compare `ours` against `reference` on their common years.
pub fn compare_to_reference(
    ours: &TemperatureSeries,
    reference: &TemperatureSeries,
    tolerance: f64,
) -> ReferenceCheck {
    let (a, b): (Vec<f64>, Vec<f64>) = ours
        .years
        .iter()
        .zip(&ours.values)
        .filter_map(|(&y, &v)| reference.value_at(y).map(|r| (v, r)))
        .filter(|(v, r)| v.is_finite() && r.is_finite())
        .unzip();

    let max_abs_diff = a
        .iter()
        .zip(&b)
        .map(|(x, y)| (x - y).abs())
        .fold(f64::NAN, f64::max);

    ReferenceCheck {
        overlap: a.len(),
        rmse: stats::rmse(&a, &b),
        max_abs_diff,
        correlation: stats::pearson(&a, &b),
        tolerance,
        within_tolerance: !a.is_empty() && max_abs_diff <= tolerance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn perfect_prediction_scores_one() {
        let obs = [0.1, 0.4, -0.2, 0.3];
        assert_abs_diff_eq!(calibration_r2(&obs, &obs), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(reduction_of_error(&obs, &obs, 5.0), 1.0);
        assert_abs_diff_eq!(coefficient_of_efficiency(&obs, &obs), 1.0);
    }

    #[test]
    fn climatology_scores_zero_ce() {
        let obs = [1.0, 2.0, 3.0];
        let climatology = [2.0, 2.0, 2.0];
        assert_abs_diff_eq!(coefficient_of_efficiency(&climatology, &obs), 0.0);
        // RE rewards getting the shift away from the calibration mean right
        assert!(reduction_of_error(&climatology, &obs, 0.0) > 0.0);
    }

    #[test]
    fn reference_comparison_uses_common_years() {
        let ours = TemperatureSeries::new([(1000, 0.1), (1001, 0.2), (1002, 0.35)]);
        let reference = TemperatureSeries::new([(1001, 0.2), (1002, 0.3), (1003, 9.0)]);
        let check = compare_to_reference(&ours, &reference, 0.1);
        assert_eq!(check.overlap, 2);
        assert_abs_diff_eq!(check.max_abs_diff, 0.05, epsilon = 1e-12);
        assert!(check.within_tolerance);

        let strict = compare_to_reference(&ours, &reference, 0.01);
        assert!(!strict.within_tolerance);
    }

    #[test]
    fn disjoint_series_never_pass() {
        let ours = TemperatureSeries::new([(1000, 0.1)]);
        let reference = TemperatureSeries::new([(2000, 0.1)]);
        let check = compare_to_reference(&ours, &reference, 1.0);
        assert_eq!(check.overlap, 0);
        assert!(!check.within_tolerance);
    }
}
