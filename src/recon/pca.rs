//! Principal component analysis via singular value decomposition.

use nalgebra::DMatrix;

use crate::error::{ReconError, ReconResult};

/// How many leading components to retain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ComponentSelection {
    Fixed(usize),
    /// Smallest count whose cumulative explained variance reaches the fraction.
    VarianceFraction(f64),
}

#[derive(Debug, Clone)]
pub struct Pca {
    /// Column means removed before the decomposition.
    pub means: Vec<f64>,
    /// `variables × retained` matrix of component loadings.
    pub loadings: DMatrix<f64>,
    /// All singular values, descending.
    pub singular_values: Vec<f64>,
    /// Explained variance fraction of every component, descending.
    pub explained: Vec<f64>,
}

impl Pca {
    /// Fit on an `observations × variables` matrix.
    ///
    /// At most `min(observations − 1, variables)` components are retained,
    /// since centring removes one degree of freedom.
    pub fn fit(data: &DMatrix<f64>, selection: ComponentSelection) -> ReconResult<Self> {
        let (n, m) = data.shape();
        if m == 0 {
            return Err(ReconError::EmptyNetwork);
        }
        if n < 2 {
            return Err(ReconError::InsufficientCalibration { needed: 2, got: n });
        }

        let means: Vec<f64> = (0..m).map(|j| data.column(j).mean()).collect();
        let centered = DMatrix::from_fn(n, m, |i, j| data[(i, j)] - means[j]);

        let svd = centered.svd(false, true);
        let Some(v_t) = svd.v_t else {
            return Err(ReconError::DegenerateSeries("proxy matrix".into()));
        };

        let mut order: Vec<usize> = (0..svd.singular_values.len()).collect();
        order.sort_by(|&a, &b| svd.singular_values[b].total_cmp(&svd.singular_values[a]));
        let singular_values: Vec<f64> = order.iter().map(|&i| svd.singular_values[i]).collect();

        let total: f64 = singular_values.iter().map(|s| s * s).sum();
        if total <= f64::EPSILON {
            return Err(ReconError::DegenerateSeries("proxy matrix".into()));
        }
        let explained: Vec<f64> = singular_values.iter().map(|s| s * s / total).collect();

        let max_k = (n - 1).min(m).min(order.len()).max(1);
        let k = match selection {
            ComponentSelection::Fixed(k) => k.clamp(1, max_k),
            ComponentSelection::VarianceFraction(target) => {
                let mut cumulative = 0.0;
                let reached = explained.iter().position(|e| {
                    cumulative += e;
                    cumulative >= target - 1e-12
                });
                reached.map_or(max_k, |i| i + 1).clamp(1, max_k)
            }
        };

        let loadings = DMatrix::from_fn(m, k, |row, col| v_t[(order[col], row)]);
        log::debug!(
            "PCA on {n}×{m}: retained {k} components explaining {:.1}%",
            100.0 * explained[..k].iter().sum::<f64>()
        );

        Ok(Pca {
            means,
            loadings,
            singular_values,
            explained,
        })
    }

    pub fn n_components(&self) -> usize {
        self.loadings.ncols()
    }

    /// Project `observations × variables` rows onto the retained components.
    pub fn scores(&self, data: &DMatrix<f64>) -> DMatrix<f64> {
        let (n, m) = data.shape();
        let centered = DMatrix::from_fn(n, m, |i, j| data[(i, j)] - self.means[j]);
        centered * &self.loadings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// Two perfectly correlated columns plus one column orthogonal to both.
    fn sample() -> DMatrix<f64> {
        DMatrix::from_row_slice(
            5,
            3,
            &[
                1.0, 2.0, 0.5, //
                2.0, 4.0, -0.5, //
                3.0, 6.0, 0.0, //
                4.0, 8.0, -0.5, //
                5.0, 10.0, 0.5,
            ],
        )
    }

    #[test]
    fn components_are_sorted_and_sum_to_one() {
        let pca = Pca::fit(&sample(), ComponentSelection::Fixed(3)).unwrap();
        assert_abs_diff_eq!(pca.explained.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        for w in pca.singular_values.windows(2) {
            assert!(w[0] >= w[1]);
        }
        assert_eq!(pca.n_components(), 3);
    }

    #[test]
    fn leading_component_follows_correlated_pair() {
        let pca = Pca::fit(&sample(), ComponentSelection::Fixed(1)).unwrap();
        let l = pca.loadings.column(0);
        // loading on column 1 is twice that on column 0, independent column ~0
        assert_abs_diff_eq!(l[1] / l[0], 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(l[2], 0.0, epsilon = 1e-9);
    }

    #[test]
    fn variance_fraction_picks_minimal_count() {
        let pca = Pca::fit(&sample(), ComponentSelection::VarianceFraction(0.9)).unwrap();
        assert_eq!(pca.n_components(), 1);
        let pca = Pca::fit(&sample(), ComponentSelection::VarianceFraction(1.0)).unwrap();
        assert_eq!(pca.n_components(), 2);
    }

    #[test]
    fn fixed_count_is_clamped_by_observations() {
        let data = DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 2.0, 1.0, 0.0]);
        let pca = Pca::fit(&data, ComponentSelection::Fixed(5)).unwrap();
        assert_eq!(pca.n_components(), 1);
    }

    #[test]
    fn training_scores_are_centered_and_orthogonal() {
        let data = sample();
        let pca = Pca::fit(&data, ComponentSelection::Fixed(2)).unwrap();
        let scores = pca.scores(&data);
        assert_abs_diff_eq!(scores.column(0).sum(), 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(scores.column(0).dot(&scores.column(1)), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn degenerate_inputs_are_errors() {
        let one_row = DMatrix::from_row_slice(1, 2, &[1.0, 2.0]);
        assert!(matches!(
            Pca::fit(&one_row, ComponentSelection::Fixed(1)),
            Err(ReconError::InsufficientCalibration { .. })
        ));
        let constant = DMatrix::from_element(4, 2, 3.0);
        assert!(matches!(
            Pca::fit(&constant, ComponentSelection::Fixed(1)),
            Err(ReconError::DegenerateSeries(_))
        ));
    }
}
