/// Statistical reconstruction of temperature from proxy networks.
///
/// ```text
///   ProxyNetwork + TemperatureSeries (instrumental target)
///        │
///        ▼
///   ┌───────────┐
///   │ screening │  optional |r| threshold over the calibration window
///   └───────────┘
///        │
///        ▼
///   ┌──────┐   per nest: proxies complete back to the nest start
///   │ nest │──────────► cps | pcr  (calibrate, predict)
///   └──────┘
///        │
///        ▼
///   Reconstruction (spliced nests, uncertainty band) ──► verify
/// ```
use nalgebra::DMatrix;

use crate::error::{ReconError, ReconResult};

pub mod cps;
pub mod nest;
pub mod pca;
pub mod pcr;
pub mod screening;
pub mod stats;
pub mod verify;

pub use nest::{ReconSettings, reconstruct};

/// Output of a single-nest calibration.
#[derive(Debug, Clone)]
pub struct NestFit {
    /// One prediction per row of the proxy matrix.
    pub predictions: Vec<f64>,
    pub n_components: usize,
}

/// Calibration-period values of one column.
fn calibration_column(proxies: &DMatrix<f64>, j: usize, cal_rows: &[usize]) -> Vec<f64> {
    cal_rows.iter().map(|&r| proxies[(r, j)]).collect()
}

/// Standardise every column by its calibration-period mean and deviation.
fn standardize_columns(proxies: &DMatrix<f64>, cal_rows: &[usize]) -> ReconResult<DMatrix<f64>> {
    let (n, m) = proxies.shape();
    let mut moments = Vec::with_capacity(m);
    for j in 0..m {
        let cal = calibration_column(proxies, j, cal_rows);
        let sd = stats::std_dev(&cal);
        if sd.is_nan() || sd <= 0.0 {
            return Err(ReconError::DegenerateSeries(format!("proxy column {j}")));
        }
        moments.push((stats::mean(&cal), sd));
    }
    Ok(DMatrix::from_fn(n, m, |i, j| {
        let (mu, sd) = moments[j];
        (proxies[(i, j)] - mu) / sd
    }))
}

fn check_shapes(proxies: &DMatrix<f64>, cal_rows: &[usize], target: &[f64]) -> ReconResult<()> {
    if proxies.ncols() == 0 {
        return Err(ReconError::EmptyNetwork);
    }
    if cal_rows.len() != target.len() {
        return Err(ReconError::ShapeMismatch {
            expected: cal_rows.len(),
            got: target.len(),
        });
    }
    if cal_rows.len() < 3 {
        return Err(ReconError::InsufficientCalibration {
            needed: 3,
            got: cal_rows.len(),
        });
    }
    if let Some(&bad) = cal_rows.iter().find(|&&r| r >= proxies.nrows()) {
        return Err(ReconError::ShapeMismatch {
            expected: proxies.nrows(),
            got: bad + 1,
        });
    }
    Ok(())
}
