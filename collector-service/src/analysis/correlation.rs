//! Merge per-complex analysis files and summarise their correlations.

use std::{collections::BTreeMap, path::Path};

use energy_client::{
    domain::MergedTrendRow,
    store::{self, analysis_queries, energy_queries},
};

use super::{
    charts::{Bar, BoxStats, Chart, ChartRenderer},
    mean, AnalysisError,
};

/// Correlations grouped by energy type, then by calendar month.
pub type CorrelationGroups = BTreeMap<String, BTreeMap<u8, Vec<f64>>>;

const HEATMAP_CHART: &str = "energy_month_correlation_heatmap";
const BAR_CHART: &str = "energy_type_avg_correlation";

/// Rows of every analysis file in `analysis_dir` fitted on at least
/// `min_points` points, tagged with the complex they came from.
pub fn merge_filtered(analysis_dir: &Path, min_points: usize) -> Result<Vec<MergedTrendRow>, AnalysisError> {
    let mut merged = Vec::new();

    for file in store::list_csv_files(analysis_dir)? {
        let file_name = file.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let Some((code, name)) = energy_queries::decode_file_name(&file_name) else {
            tracing::warn!(file = %file.display(), "not an analysis file name; skipping");
            continue;
        };

        let rows = match analysis_queries::read_trend_rows(&file) {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!(file = %file.display(), error = %e, "failed to read analysis file; skipping");
                continue;
            }
        };

        let before = merged.len();
        merged.extend(
            rows.into_iter()
                .filter(|r| r.data_points >= min_points)
                .map(|r| MergedTrendRow::from_row(r, &code, &name)),
        );
        tracing::debug!(kapt_code = %code, kept = merged.len() - before, "analysis file merged");
    }

    Ok(merged)
}

pub fn group_correlations(rows: &[MergedTrendRow]) -> CorrelationGroups {
    let mut groups = CorrelationGroups::new();
    for row in rows {
        let Some(correlation) = row.correlation else {
            continue;
        };
        groups
            .entry(row.energy_type.clone())
            .or_default()
            .entry(row.month)
            .or_default()
            .push(correlation);
    }
    groups
}

/// Quantile of already sorted values with linear interpolation between ranks.
fn quantile(sorted: &[f64], p: f64) -> f64 {
    let pos = p * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

pub fn box_stats(month: u8, values: &[f64]) -> Option<BoxStats> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    Some(BoxStats {
        month,
        min: sorted[0],
        q1: quantile(&sorted, 0.25),
        median: quantile(&sorted, 0.5),
        q3: quantile(&sorted, 0.75),
        max: sorted[sorted.len() - 1],
        count: sorted.len(),
    })
}

/// Every chart of the correlation report, paired with its output name.
pub fn build_charts(groups: &CorrelationGroups) -> Vec<(String, Chart)> {
    let mut charts = Vec::new();

    for (energy_type, by_month) in groups {
        let boxes = by_month
            .iter()
            .filter_map(|(&month, values)| box_stats(month, values))
            .collect();
        charts.push((
            format!("{energy_type}_correlation_boxplot"),
            Chart::BoxPlot {
                title: format!("{energy_type} correlation by month"),
                boxes,
            },
        ));
    }

    let mut months: Vec<u8> = groups.values().flat_map(|m| m.keys().copied()).collect();
    months.sort_unstable();
    months.dedup();

    let rows = groups
        .iter()
        .map(|(energy_type, by_month)| {
            let cells = months
                .iter()
                .map(|m| by_month.get(m).and_then(|v| box_stats(*m, v)).map(|s| s.median))
                .collect();
            (energy_type.clone(), cells)
        })
        .collect();
    charts.push((
        HEATMAP_CHART.to_string(),
        Chart::Heatmap {
            title: "median correlation by energy type and month".to_string(),
            months,
            rows,
        },
    ));

    let bars = groups
        .iter()
        .filter_map(|(energy_type, by_month)| {
            let all: Vec<f64> = by_month.values().flatten().copied().collect();
            mean(&all).map(|value| Bar {
                label: energy_type.clone(),
                value,
            })
        })
        .collect();
    charts.push((
        BAR_CHART.to_string(),
        Chart::Bars {
            title: "mean correlation by energy type".to_string(),
            bars,
        },
    ));

    charts
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisualizationSummary {
    pub rows_merged: usize,
    pub charts_rendered: usize,
}

/// Merge, persist the merged table and render the correlation charts.
pub fn run_visualization<R: ChartRenderer>(
    analysis_dir: &Path,
    processed_dir: &Path,
    min_points: usize,
    renderer: &mut R,
) -> Result<VisualizationSummary, AnalysisError> {
    let merged = merge_filtered(analysis_dir, min_points)?;
    if merged.is_empty() {
        return Err(AnalysisError::NoData(format!(
            "no trend with at least {min_points} data points in {}",
            analysis_dir.display()
        )));
    }

    let merged_path = processed_dir.join(analysis_queries::MERGED_ANALYSIS_FILE);
    analysis_queries::write_merged_rows(&merged_path, &merged)?;
    tracing::info!(rows = merged.len(), path = %merged_path.display(), "merged analysis saved");

    let groups = group_correlations(&merged);
    let mut summary = VisualizationSummary {
        rows_merged: merged.len(),
        charts_rendered: 0,
    };
    for (name, chart) in build_charts(&groups) {
        renderer.render(&name, &chart)?;
        summary.charts_rendered += 1;
    }
    Ok(summary)
}
