use std::{
    collections::{BTreeMap, BTreeSet},
    path::Path,
};

use super::{clean_headers, column_index, open_reader};
use crate::{
    domain::{RequestMonth, ENERGY_COLUMNS, REQUEST_MONTH_COLUMN},
    Error, Result,
};

/// File name of a complex's energy file.
///
/// Path separators in the display name are replaced so the file always lands
/// directly in the energy directory.
pub fn energy_file_name(code: &str, name: &str) -> String {
    format!("{}_{}.csv", code, sanitize(name))
}

pub(crate) fn sanitize(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '-' } else { c })
        .collect()
}

/// Recover `(code, name)` from an energy or analysis file name.
pub fn decode_file_name(file_name: &str) -> Option<(String, String)> {
    let stem = file_name.strip_suffix(".csv")?;
    let stem = stem.strip_suffix("_analysis").unwrap_or(stem);
    let (code, name) = stem.split_once('_')?;
    if code.is_empty() {
        return None;
    }
    Some((code.to_string(), name.to_string()))
}

/// Months already present in a complex's energy file.
///
/// A missing file has collected nothing yet.
pub fn collected_months(path: &Path) -> Result<BTreeSet<RequestMonth>> {
    if !path.exists() {
        return Ok(BTreeSet::new());
    }

    let mut rdr = open_reader(path)?;
    let headers = clean_headers(rdr.headers()?);
    let month_idx = column_index(&headers, REQUEST_MONTH_COLUMN, path)?;

    let mut months = BTreeSet::new();
    for record in rdr.records() {
        let record = record?;
        let raw = record.get(month_idx).unwrap_or("");
        months.insert(RequestMonth::parse_lenient(raw)?);
    }
    Ok(months)
}

/// One month of numeric readings loaded for analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyRow {
    pub month: RequestMonth,
    /// Known reading columns with a parseable value; blanks are left out.
    pub readings: BTreeMap<String, f64>,
}

impl EnergyRow {
    pub fn reading(&self, column: &str) -> Option<f64> {
        self.readings.get(column).copied()
    }

    /// True when no known reading column carries a non-zero value.
    pub fn is_all_zero(&self) -> bool {
        self.readings.values().all(|v| *v == 0.0)
    }
}

/// Load the known reading columns of an energy file.
pub fn load_energy_rows(path: &Path) -> Result<Vec<EnergyRow>> {
    let mut rdr = open_reader(path)?;
    let headers = clean_headers(rdr.headers()?);
    let month_idx = column_index(&headers, REQUEST_MONTH_COLUMN, path)?;
    let reading_cols: Vec<(usize, &str)> = ENERGY_COLUMNS
        .iter()
        .filter_map(|col| headers.iter().position(|h| h == *col).map(|idx| (idx, *col)))
        .collect();

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let raw_month = record.get(month_idx).unwrap_or("");
        let month = RequestMonth::parse_lenient(raw_month)
            .map_err(|_| Error::InvalidMonth(format!("{raw_month} in {}", path.display())))?;

        let readings = reading_cols
            .iter()
            .filter_map(|(idx, col)| {
                let value = record.get(*idx)?.trim().parse::<f64>().ok()?;
                value.is_finite().then(|| (col.to_string(), value))
            })
            .collect();

        rows.push(EnergyRow { month, readings });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::analysis_queries::analysis_file_name;
    use std::fs;

    #[test]
    fn file_names_round_trip_through_decoding() {
        assert_eq!(energy_file_name("A1", "Sample Heights"), "A1_Sample Heights.csv");
        assert_eq!(
            decode_file_name("A1_Sample_Heights.csv"),
            Some(("A1".to_string(), "Sample_Heights".to_string()))
        );
        assert_eq!(
            decode_file_name(&analysis_file_name("A1", "Hill/Park")),
            Some(("A1".to_string(), "Hill-Park".to_string()))
        );
        assert_eq!(decode_file_name("nocode.csv"), None);
        assert_eq!(decode_file_name("A1_name.txt"), None);
    }

    #[test]
    fn collected_months_of_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(collected_months(&dir.path().join("A1_x.csv")).unwrap().is_empty());
    }

    #[test]
    fn collected_months_normalises_numeric_forms() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("A1_x.csv");
        fs::write(&path, "\u{feff}requestMonth,heat\n202001,1\n202002.0,2\n 202003 ,3\n").unwrap();

        let months: Vec<String> = collected_months(&path)
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(months, vec!["202001", "202002", "202003"]);
    }

    #[test]
    fn collected_months_requires_request_month_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("A1_x.csv");
        fs::write(&path, "month,heat\n202001,1\n").unwrap();

        assert!(matches!(collected_months(&path), Err(Error::MissingColumn { .. })));
    }

    #[test]
    fn energy_rows_keep_only_known_parseable_readings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("A1_x.csv");
        fs::write(
            &path,
            "requestMonth,kaptCode,heat,hheat,elect\n202001,A1,10.5,,0\n202101,A1,0,0,0\n",
        )
        .unwrap();

        let rows = load_energy_rows(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].reading("heat"), Some(10.5));
        assert_eq!(rows[0].reading("hheat"), None);
        assert_eq!(rows[0].reading("kaptCode"), None);
        assert!(!rows[0].is_all_zero());
        assert!(rows[1].is_all_zero());
    }
}
