use std::path::Path;

use serde::Deserialize;

use super::{clean_headers, column_index, create_with_bom, open_headerless_reader, open_reader};
use crate::{
    domain::{Complex, ComplexProfile},
    Error, Result,
};

/// Names of the roster columns the collector reads.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RosterColumns {
    pub code: String,
    pub name: String,
    pub approval_date: String,
}

impl Default for RosterColumns {
    fn default() -> Self {
        Self {
            code: "단지코드".to_string(),
            name: "단지명".to_string(),
            approval_date: "사용승인일".to_string(),
        }
    }
}

/// Regions kept by default when narrowing a nationwide roster.
pub const METROPOLITAN_REGIONS: [&str; 3] = ["서울특별시", "경기도", "인천광역시"];

/// Load every complex of the roster, in file order.
pub fn load_roster(path: &Path, columns: &RosterColumns) -> Result<Vec<Complex>> {
    let mut rdr = open_reader(path)?;
    let headers = clean_headers(rdr.headers()?);
    let code_idx = column_index(&headers, &columns.code, path)?;
    let name_idx = column_index(&headers, &columns.name, path)?;
    let approval_idx = column_index(&headers, &columns.approval_date, path)?;

    let mut complexes = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let field = |idx: usize| record.get(idx).unwrap_or("").trim().to_string();
        complexes.push(Complex {
            code: field(code_idx),
            name: field(name_idx),
            approval_date: field(approval_idx),
        });
    }
    Ok(complexes)
}

/// Load complex profiles, dropping rows with any blank attribute.
pub fn load_profiles(path: &Path) -> Result<Vec<ComplexProfile>> {
    let mut rdr = open_reader(path)?;
    let headers = clean_headers(rdr.headers()?);
    let idx = |column: &str| column_index(&headers, column, path);
    let code_idx = idx("단지코드")?;
    let name_idx = idx("단지명")?;
    let class_idx = idx("단지분류")?;
    let approval_idx = idx("사용승인일")?;
    let heating_idx = idx("난방방식")?;
    let structure_idx = idx("건물구조")?;
    let water_idx = idx("급수방식")?;

    let mut profiles = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let field = |i: usize| record.get(i).map(str::trim).filter(|v| !v.is_empty()).map(str::to_string);
        let (
            Some(code),
            Some(name),
            Some(classification),
            Some(approval_date),
            Some(heating_method),
            Some(building_structure),
            Some(water_supply),
        ) = (
            field(code_idx),
            field(name_idx),
            field(class_idx),
            field(approval_idx),
            field(heating_idx),
            field(structure_idx),
            field(water_idx),
        )
        else {
            continue;
        };
        profiles.push(ComplexProfile {
            code,
            name,
            classification,
            approval_date,
            heating_method,
            building_structure,
            water_supply,
        });
    }
    Ok(profiles)
}

/// Copy the roster rows whose first column names one of `regions` to
/// `output`. Returns the number of rows written.
///
/// Spreadsheet exports often carry title lines above the header; the first
/// `title_rows` lines are ignored.
pub fn filter_by_region(input: &Path, output: &Path, regions: &[&str], title_rows: usize) -> Result<usize> {
    let mut rdr = open_headerless_reader(input)?;
    let mut records = rdr.records().skip(title_rows);
    let headers = match records.next() {
        Some(header) => clean_headers(&header?),
        None => Vec::new(),
    };
    if headers.iter().all(String::is_empty) {
        return Err(Error::MissingColumn {
            column: "region".to_string(),
            path: input.to_path_buf(),
        });
    }

    let mut wtr = create_with_bom(output)?;
    wtr.write_record(&headers)?;

    let mut written = 0;
    for record in records {
        let record = record?;
        let region = record.get(0).unwrap_or("").trim();
        if regions.contains(&region) {
            wtr.write_record(&record)?;
            written += 1;
        }
    }
    wtr.flush().map_err(|e| Error::io(output, e))?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn loads_roster_with_bom_and_numeric_dates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.csv");
        fs::write(
            &path,
            "\u{feff}시도,단지코드,단지명,사용승인일\n서울특별시,A1,First,20200115\n경기도,A2,Second,20180301.0\n",
        )
        .unwrap();

        let roster = load_roster(&path, &RosterColumns::default()).unwrap();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster[0], Complex::new("A1", "First", "20200115"));
        assert_eq!(roster[1].approval_date, "20180301.0");
    }

    #[test]
    fn missing_roster_column_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.csv");
        fs::write(&path, "단지코드,단지명\nA1,First\n").unwrap();

        let err = load_roster(&path, &RosterColumns::default()).unwrap_err();
        assert!(matches!(err, Error::MissingColumn { ref column, .. } if column == "사용승인일"));
    }

    #[test]
    fn incomplete_profiles_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.csv");
        fs::write(
            &path,
            "단지코드,단지명,단지분류,사용승인일,난방방식,건물구조,급수방식\n\
             A1,First,아파트,20200115,개별난방,철근콘크리트구조,부스타방식\n\
             A2,Second,아파트,20190101,,철근콘크리트구조,부스타방식\n",
        )
        .unwrap();

        let profiles = load_profiles(&path).unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].code, "A1");
        assert_eq!(profiles[0].heating_method, "개별난방");
    }

    #[test]
    fn region_filter_keeps_matching_rows() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("all.csv");
        let output = dir.path().join("processed").join("all_수도권.csv");
        fs::write(
            &input,
            "시도,단지코드\n서울특별시,A1\n부산광역시,B1\n경기도,A2\n",
        )
        .unwrap();

        let written = filter_by_region(&input, &output, &METROPOLITAN_REGIONS, 0).unwrap();
        assert_eq!(written, 2);

        let content = fs::read_to_string(&output).unwrap();
        assert!(content.starts_with('\u{feff}'));
        assert!(content.contains("A1"));
        assert!(content.contains("A2"));
        assert!(!content.contains("B1"));
    }

    #[test]
    fn region_filter_skips_title_rows_above_the_header() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("sheet.csv");
        let output = dir.path().join("sheet_수도권.csv");
        fs::write(
            &input,
            "\u{feff}공동주택 단지 기본정보\n시도,단지코드\n서울특별시,A1\n부산광역시,B1\n",
        )
        .unwrap();

        let written = filter_by_region(&input, &output, &METROPOLITAN_REGIONS, 1).unwrap();
        assert_eq!(written, 1);

        let content = fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = content.trim_start_matches('\u{feff}').lines().collect();
        assert_eq!(lines, vec!["시도,단지코드", "서울특별시,A1"]);
    }
}
