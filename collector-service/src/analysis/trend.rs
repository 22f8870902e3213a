//! Year-over-year trend of each reading column, per calendar month.
//!
//! For a given calendar month (say, every January on record) the readings of
//! one column are regressed against the year. A complex with data for
//! 2019..2024 therefore yields up to 12 × 10 trend rows.

use std::{collections::BTreeMap, path::Path};

use energy_client::{
    domain::{energy_display_name, Trend, TrendRow, ENERGY_COLUMNS},
    store::{
        self,
        analysis_queries,
        energy_queries::{self, EnergyRow},
    },
};
use tokio_util::sync::CancellationToken;

use super::{mean, round_to, AnalysisError};

/// Linear fit of reading against year.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendStats {
    /// Pearson correlation; `None` when either series is constant.
    pub correlation: Option<f64>,
    pub slope: f64,
    pub intercept: f64,
    /// Fitted value at the earliest year.
    pub initial_value: f64,
    /// Slope as a percentage of `initial_value`; 0 when that is 0.
    pub annual_growth_rate: f64,
    pub trend: Trend,
    pub data_points: usize,
}

/// Least-squares trend over `(year, value)` points.
///
/// Needs at least two points spanning more than one year.
pub fn linear_trend(points: &[(f64, f64)], slope_threshold: f64) -> Option<TrendStats> {
    if points.len() < 2 {
        return None;
    }

    let mut points = points.to_vec();
    points.sort_by(|a, b| a.0.total_cmp(&b.0));

    let xs: Vec<f64> = points.iter().map(|p| p.0).collect();
    let ys: Vec<f64> = points.iter().map(|p| p.1).collect();
    let x_mean = mean(&xs)?;
    let y_mean = mean(&ys)?;

    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for (x, y) in &points {
        let dx = x - x_mean;
        let dy = y - y_mean;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }
    if sxx == 0.0 {
        return None;
    }

    let slope = sxy / sxx;
    let intercept = y_mean - slope * x_mean;
    let correlation = (syy > 0.0).then(|| sxy / (sxx * syy).sqrt());
    let initial_value = intercept + slope * xs[0];
    let annual_growth_rate = if initial_value != 0.0 {
        slope / initial_value * 100.0
    } else {
        0.0
    };

    let trend = if slope.abs() < slope_threshold {
        Trend::Steady
    } else if slope > 0.0 {
        Trend::Increasing
    } else {
        Trend::Decreasing
    };

    Some(TrendStats {
        correlation,
        slope,
        intercept,
        initial_value,
        annual_growth_rate,
        trend,
        data_points: points.len(),
    })
}

/// Trend rows of one complex, ordered by month then by reading column.
///
/// Rows whose readings are all zero are ignored, as are zero readings of the
/// column being fitted. Stops between months once `cancel` fires.
pub fn analyze_complex(rows: &[EnergyRow], slope_threshold: f64, cancel: &CancellationToken) -> Vec<TrendRow> {
    let mut by_month: BTreeMap<u8, Vec<&EnergyRow>> = BTreeMap::new();
    for row in rows.iter().filter(|r| !r.is_all_zero()) {
        by_month.entry(row.month.month()).or_default().push(row);
    }

    let mut results = Vec::new();
    for (month, month_rows) in by_month {
        if cancel.is_cancelled() {
            break;
        }

        for column in ENERGY_COLUMNS {
            let points: Vec<(f64, f64)> = month_rows
                .iter()
                .filter_map(|r| {
                    let value = r.reading(column)?;
                    (value != 0.0).then(|| (f64::from(r.month.year()), value))
                })
                .collect();

            let Some(stats) = linear_trend(&points, slope_threshold) else {
                tracing::debug!(month, column, points = points.len(), "not enough data for trend");
                continue;
            };

            results.push(TrendRow {
                month,
                energy_type: column.to_string(),
                energy_name: energy_display_name(column).to_string(),
                correlation: stats.correlation.map(|c| round_to(c, 4)),
                slope: round_to(stats.slope, 4),
                initial_value: round_to(stats.initial_value, 2),
                annual_growth_rate: round_to(stats.annual_growth_rate, 2),
                trend: stats.trend,
                data_points: stats.data_points,
            });
        }
        tracing::debug!(month, "month analysed");
    }
    results
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrendBatchSummary {
    pub files_seen: usize,
    pub files_written: usize,
    pub files_failed: usize,
    pub cancelled: bool,
}

/// Analyse every energy file in `energy_dir` and write one analysis file per
/// complex into `analysis_dir`.
///
/// A file that cannot be read or named is logged and skipped.
pub fn run_trend_analysis(
    energy_dir: &Path,
    analysis_dir: &Path,
    slope_threshold: f64,
    cancel: &CancellationToken,
) -> Result<TrendBatchSummary, AnalysisError> {
    let files = store::list_csv_files(energy_dir)?;
    let mut summary = TrendBatchSummary::default();

    for (idx, file) in files.iter().enumerate() {
        if cancel.is_cancelled() {
            summary.cancelled = true;
            break;
        }
        summary.files_seen += 1;

        let file_name = file.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let Some((code, name)) = energy_queries::decode_file_name(&file_name) else {
            tracing::warn!(file = %file.display(), "file name is not CODE_NAME.csv; skipping");
            summary.files_failed += 1;
            continue;
        };

        tracing::info!(
            progress = %format!("{}/{}", idx + 1, files.len()),
            kapt_code = %code,
            name = %name,
            "analysing complex"
        );

        let rows = match energy_queries::load_energy_rows(file) {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!(file = %file.display(), error = %e, "failed to load energy file; skipping");
                summary.files_failed += 1;
                continue;
            }
        };

        let results = analyze_complex(&rows, slope_threshold, cancel);
        if results.is_empty() {
            tracing::info!(kapt_code = %code, "no column had enough data for a trend");
            continue;
        }

        let out = analysis_dir.join(analysis_queries::analysis_file_name(&code, &name));
        analysis_queries::write_trend_rows(&out, &results)?;
        summary.files_written += 1;
        tracing::info!(kapt_code = %code, rows = results.len(), path = %out.display(), "analysis saved");
    }

    if cancel.is_cancelled() {
        summary.cancelled = true;
    }
    Ok(summary)
}
