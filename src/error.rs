use thiserror::Error;

/// Failures of the numeric reconstruction core.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReconError {
    #[error("proxy network contains no records")]
    EmptyNetwork,
    #[error("window {start}..={end} lies outside the {what} span {span_start}..={span_end}")]
    WindowOutOfRange {
        what: &'static str,
        start: i32,
        end: i32,
        span_start: i32,
        span_end: i32,
    },
    #[error("need at least {needed} calibration years, got {got}")]
    InsufficientCalibration { needed: usize, got: usize },
    #[error("series '{0}' has zero variance over the calibration window")]
    DegenerateSeries(String),
    #[error("shape mismatch: expected {expected} values, got {got}")]
    ShapeMismatch { expected: usize, got: usize },
    #[error("no nest has proxies covering the calibration window")]
    NoUsableNest,
}

/// Convenience type for `Result<T, ReconError>`.
pub type ReconResult<T> = Result<T, ReconError>;
