//! Small descriptive statistics over `f64` slices.

pub fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return f64::NAN;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Mean of the finite values, `NaN` when there are none.
pub fn nan_mean(xs: &[f64]) -> f64 {
    let (sum, n) = xs
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        f64::NAN
    } else {
        sum / n as f64
    }
}

/// Sample standard deviation (n − 1 denominator).
pub fn std_dev(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return f64::NAN;
    }
    let m = mean(xs);
    let ss: f64 = xs.iter().map(|x| (x - m).powi(2)).sum();
    (ss / (xs.len() - 1) as f64).sqrt()
}

pub fn standardize(xs: &[f64], mean: f64, std: f64) -> Vec<f64> {
    xs.iter().map(|x| (x - mean) / std).collect()
}

/// Pearson correlation coefficient; `NaN` for mismatched or constant input.
pub fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    if xs.len() != ys.len() || xs.len() < 2 {
        return f64::NAN;
    }
    let (mx, my) = (mean(xs), mean(ys));
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let (dx, dy) = (x - mx, y - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return f64::NAN;
    }
    sxy / (sxx * syy).sqrt()
}

pub fn rmse(predicted: &[f64], observed: &[f64]) -> f64 {
    sum_sq_diff(predicted, observed)
        .map(|ss| (ss / observed.len() as f64).sqrt())
        .unwrap_or(f64::NAN)
}

pub(crate) fn sum_sq_diff(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    Some(a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum())
}

/// Centered moving average over `window` points, ignoring `NaN`s.
/// Windows shrink at the edges; even windows are widened by one.
pub fn moving_average(xs: &[f64], window: usize) -> Vec<f64> {
    if window <= 1 {
        return xs.to_vec();
    }
    let half = window / 2;
    (0..xs.len())
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(xs.len());
            nan_mean(&xs[lo..hi])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn mean_and_sample_std() {
        let xs = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_abs_diff_eq!(mean(&xs), 5.0);
        assert_abs_diff_eq!(std_dev(&xs), 2.138089935299395, epsilon = 1e-12);
        assert!(std_dev(&[1.0]).is_nan());
        assert!(mean(&[]).is_nan());
    }

    #[test]
    fn pearson_detects_sign_and_degeneracy() {
        let x = [1.0, 2.0, 3.0, 4.0];
        assert_abs_diff_eq!(pearson(&x, &[2.0, 4.0, 6.0, 8.0]), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(pearson(&x, &[4.0, 3.0, 2.0, 1.0]), -1.0, epsilon = 1e-12);
        assert!(pearson(&x, &[1.0, 1.0, 1.0, 1.0]).is_nan());
        assert!(pearson(&x, &[1.0]).is_nan());
    }

    #[test]
    fn rmse_of_constant_offset() {
        assert_abs_diff_eq!(rmse(&[1.0, 2.0, 3.0], &[1.5, 2.5, 3.5]), 0.5);
        assert!(rmse(&[1.0], &[]).is_nan());
    }

    #[test]
    fn moving_average_shrinks_at_edges_and_skips_nan() {
        let xs = [1.0, 2.0, f64::NAN, 4.0, 5.0];
        let smooth = moving_average(&xs, 3);
        assert_abs_diff_eq!(smooth[0], 1.5);
        assert_abs_diff_eq!(smooth[1], 1.5);
        assert_abs_diff_eq!(smooth[2], 3.0);
        assert_abs_diff_eq!(smooth[4], 4.5);
        assert_eq!(moving_average(&xs[..2], 1), vec![1.0, 2.0]);
    }

    #[test]
    fn nan_mean_of_all_missing_is_nan() {
        assert!(nan_mean(&[f64::NAN, f64::NAN]).is_nan());
        assert_abs_diff_eq!(nan_mean(&[f64::NAN, 3.0]), 3.0);
    }
}
