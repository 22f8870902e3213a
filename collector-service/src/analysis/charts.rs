use std::path::{Path, PathBuf};

use energy_client::store;
use serde::Serialize;

use super::AnalysisError;

/// Five-number summary of the correlations of one month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxStats {
    pub month: u8,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Chart {
    /// Distribution per month for one energy type.
    BoxPlot { title: String, boxes: Vec<BoxStats> },
    /// Rows are energy types, columns are months; absent cells are blank.
    Heatmap {
        title: String,
        months: Vec<u8>,
        rows: Vec<(String, Vec<Option<f64>>)>,
    },
    Bars { title: String, bars: Vec<Bar> },
}

impl Chart {
    pub fn title(&self) -> &str {
        match self {
            Chart::BoxPlot { title, .. } | Chart::Heatmap { title, .. } | Chart::Bars { title, .. } => title,
        }
    }
}

/// Capability that turns a chart description into an artefact on disk.
pub trait ChartRenderer {
    /// Render `chart` under the base name `name`; returns the written path.
    fn render(&mut self, name: &str, chart: &Chart) -> Result<PathBuf, AnalysisError>;
}

/// Writes each chart's data table as `{name}.csv`, ready for any plotting tool.
pub struct CsvTableRenderer {
    dir: PathBuf,
}

impl CsvTableRenderer {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ChartRenderer for CsvTableRenderer {
    fn render(&mut self, name: &str, chart: &Chart) -> Result<PathBuf, AnalysisError> {
        let path = self.dir.join(format!("{name}.csv"));
        let mut wtr = store::create_with_bom(&path)?;

        match chart {
            Chart::BoxPlot { boxes, .. } => {
                for stats in boxes {
                    wtr.serialize(stats)?;
                }
            }
            Chart::Heatmap { months, rows, .. } => {
                let mut header = vec!["energy_type".to_string()];
                header.extend(months.iter().map(u8::to_string));
                wtr.write_record(&header)?;
                for (label, cells) in rows {
                    let mut record = vec![label.clone()];
                    record.extend(
                        cells
                            .iter()
                            .map(|c| c.map(|v| format!("{v:.3}")).unwrap_or_default()),
                    );
                    wtr.write_record(&record)?;
                }
            }
            Chart::Bars { bars, .. } => {
                for bar in bars {
                    wtr.serialize(bar)?;
                }
            }
        }

        wtr.flush().map_err(|source| AnalysisError::Io {
            path: path.clone(),
            source,
        })?;
        tracing::info!(chart = chart.title(), path = %path.display(), "chart data saved");
        Ok(path)
    }
}
