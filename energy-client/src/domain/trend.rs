use serde::{Deserialize, Serialize};

/// Direction of a year-over-year linear trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    #[serde(rename = "증가")]
    Increasing,
    #[serde(rename = "감소")]
    Decreasing,
    #[serde(rename = "유지")]
    Steady,
}

/// One row of a per-complex analysis file: the trend of one reading column
/// across years for one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendRow {
    pub month: u8,
    pub energy_type: String,
    pub energy_name: String,
    /// Pearson correlation between year and reading; absent when a series is constant.
    pub correlation: Option<f64>,
    pub slope: f64,
    pub initial_value: f64,
    pub annual_growth_rate: f64,
    pub trend: Trend,
    pub data_points: usize,
}

/// A `TrendRow` tagged with the complex it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedTrendRow {
    pub month: u8,
    pub energy_type: String,
    pub energy_name: String,
    pub correlation: Option<f64>,
    pub slope: f64,
    pub initial_value: f64,
    pub annual_growth_rate: f64,
    pub trend: Trend,
    pub data_points: usize,
    pub kapt_code: String,
    pub complex_name: String,
}

impl MergedTrendRow {
    pub fn from_row(row: TrendRow, kapt_code: &str, complex_name: &str) -> Self {
        Self {
            month: row.month,
            energy_type: row.energy_type,
            energy_name: row.energy_name,
            correlation: row.correlation,
            slope: row.slope,
            initial_value: row.initial_value,
            annual_growth_rate: row.annual_growth_rate,
            trend: row.trend,
            data_points: row.data_points,
            kapt_code: kapt_code.to_string(),
            complex_name: complex_name.to_string(),
        }
    }
}
