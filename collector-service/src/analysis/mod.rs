//! Batch analyses over collected energy files.

pub mod charts;
pub mod correlation;
pub mod logit;
pub mod trend;

use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum AnalysisError {
    #[error(transparent)]
    Store(#[from] energy_client::Error),
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("no data: {0}")]
    NoData(String),
    #[error("design matrix is singular")]
    Singular,
    #[error("logistic regression did not converge after {0} iterations")]
    NotConverged(usize),
}

/// Round half away from zero to `places` decimals.
pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Arithmetic mean; `None` for an empty slice.
pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
