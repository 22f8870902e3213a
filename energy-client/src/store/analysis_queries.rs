use std::path::Path;

use super::{energy_queries::sanitize, read_rows, write_rows};
use crate::{
    domain::{MergedTrendRow, TrendRow},
    Result,
};

/// File name of the merged, filtered analysis table.
pub const MERGED_ANALYSIS_FILE: &str = "merged_filtered_energy_data.csv";

/// File name of a complex's trend analysis file.
pub fn analysis_file_name(code: &str, name: &str) -> String {
    format!("{}_{}_analysis.csv", code, sanitize(name))
}

pub fn write_trend_rows(path: &Path, rows: &[TrendRow]) -> Result<()> {
    write_rows(path, rows)
}

pub fn read_trend_rows(path: &Path) -> Result<Vec<TrendRow>> {
    read_rows(path)
}

pub fn write_merged_rows(path: &Path, rows: &[MergedTrendRow]) -> Result<()> {
    write_rows(path, rows)
}

pub fn read_merged_rows(path: &Path) -> Result<Vec<MergedTrendRow>> {
    read_rows(path)
}
