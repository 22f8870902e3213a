use std::{
    collections::BTreeSet,
    fs::{File, OpenOptions},
    io::{self, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use energy_client::{
    domain::{Complex, EnergyRecord, RequestMonth},
    store::{self, energy_queries},
};

#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error("refusing to append an empty record batch to {0}")]
    EmptyBatch(PathBuf),
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("csv error on {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error(transparent)]
    Store(#[from] energy_client::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppendOutcome {
    pub rows_written: usize,
    /// The file did not exist and was created with a header row.
    pub created: bool,
    /// Records skipped because their month is already in the file.
    pub skipped_months: Vec<String>,
    /// Fields of new records that the existing header has no column for.
    pub dropped_columns: Vec<String>,
}

/// Appends monthly records to per-complex CSV files under one directory.
pub struct CsvAppender {
    dir: PathBuf,
}

impl CsvAppender {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, complex: &Complex) -> PathBuf {
        self.dir
            .join(energy_queries::energy_file_name(&complex.code, &complex.name))
    }

    /// Append `records` to `path`.
    ///
    /// Preconditions are checked explicitly: an empty batch is rejected, and
    /// whether a header row is written is decided by whether `path` already
    /// exists. An existing file keeps its header; new rows are laid out in its
    /// column order. Months already present in the file are never written
    /// again.
    pub fn append(&self, path: &Path, records: &[EnergyRecord]) -> Result<AppendOutcome, SinkError> {
        if records.is_empty() {
            return Err(SinkError::EmptyBatch(path.to_path_buf()));
        }

        match store::read_header(path)? {
            Some(header) => self.append_existing(path, header, records),
            None => self.create_new(path, records),
        }
    }

    fn create_new(&self, path: &Path, records: &[EnergyRecord]) -> Result<AppendOutcome, SinkError> {
        let mut header: Vec<String> = Vec::new();
        for column in records.iter().flat_map(|r| r.columns()) {
            if !header.iter().any(|c| c == column) {
                header.push(column.to_string());
            }
        }

        let (fresh, skipped_months) = split_fresh(records, &mut BTreeSet::new());

        let mut wtr = store::create_with_bom(path)?;
        let csv_err = |source| SinkError::Csv {
            path: path.to_path_buf(),
            source,
        };
        wtr.write_record(&header).map_err(csv_err)?;
        for record in &fresh {
            wtr.write_record(header.iter().map(|c| record.cell(c)))
                .map_err(csv_err)?;
        }
        wtr.flush().map_err(|source| SinkError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        metrics::counter!("energy_records_persisted_total").increment(fresh.len() as u64);
        Ok(AppendOutcome {
            rows_written: fresh.len(),
            created: true,
            skipped_months,
            dropped_columns: Vec::new(),
        })
    }

    fn append_existing(
        &self,
        path: &Path,
        header: Vec<String>,
        records: &[EnergyRecord],
    ) -> Result<AppendOutcome, SinkError> {
        let mut present = energy_queries::collected_months(path)?;
        let (fresh, skipped_months) = split_fresh(records, &mut present);

        let mut dropped_columns: Vec<String> = Vec::new();
        for column in fresh.iter().flat_map(|r| r.columns()) {
            if !header.iter().any(|c| c == column) && !dropped_columns.iter().any(|c| c == column) {
                dropped_columns.push(column.to_string());
            }
        }
        if !dropped_columns.is_empty() {
            tracing::warn!(
                path = %path.display(),
                columns = ?dropped_columns,
                "existing file has no column for some fields; values dropped"
            );
        }

        if !fresh.is_empty() {
            let io_err = |source| SinkError::Io {
                path: path.to_path_buf(),
                source,
            };
            let mut file = OpenOptions::new()
                .read(true)
                .append(true)
                .open(path)
                .map_err(io_err)?;
            if !ends_with_newline(&mut file).map_err(io_err)? {
                tracing::warn!(path = %path.display(), "last row has no line terminator; terminating it before appending");
                file.write_all(b"\n").map_err(io_err)?;
            }
            let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(file);
            for record in &fresh {
                wtr.write_record(header.iter().map(|c| record.cell(c)))
                    .map_err(|source| SinkError::Csv {
                        path: path.to_path_buf(),
                        source,
                    })?;
            }
            wtr.flush().map_err(|source| SinkError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            metrics::counter!("energy_records_persisted_total").increment(fresh.len() as u64);
        }

        Ok(AppendOutcome {
            rows_written: fresh.len(),
            created: false,
            skipped_months,
            dropped_columns,
        })
    }
}

/// Whether the file is empty or its last byte ends a line.
fn ends_with_newline(file: &mut File) -> io::Result<bool> {
    if file.seek(SeekFrom::End(0))? == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(matches!(last[0], b'\n' | b'\r'))
}

/// Records whose month is not yet in `present`, plus the months skipped.
/// `present` is extended with every month kept.
fn split_fresh<'a>(
    records: &'a [EnergyRecord],
    present: &mut BTreeSet<RequestMonth>,
) -> (Vec<&'a EnergyRecord>, Vec<String>) {
    let mut fresh = Vec::with_capacity(records.len());
    let mut skipped = Vec::new();
    for record in records {
        if present.insert(record.request_month) {
            fresh.push(record);
        } else {
            skipped.push(record.request_month.to_string());
        }
    }
    (fresh, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;

    fn record(month: &str, item: serde_json::Value) -> EnergyRecord {
        EnergyRecord::new(
            "A1",
            month.parse().unwrap(),
            item.as_object().cloned().unwrap(),
        )
    }

    #[test]
    fn empty_batch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let appender = CsvAppender::new(dir.path());
        let path = dir.path().join("A1_x.csv");

        assert!(matches!(appender.append(&path, &[]), Err(SinkError::EmptyBatch(_))));
        assert!(!path.exists());
    }

    #[test]
    fn new_file_gets_bom_and_single_header() {
        let dir = tempfile::tempdir().unwrap();
        let appender = CsvAppender::new(dir.path().join("energy"));
        let complex = Complex::new("A1", "First", "20200115");
        let path = appender.path_for(&complex);

        let first = appender
            .append(&path, &[record("202001", json!({"heat": 1, "gas": 2}))])
            .unwrap();
        assert!(first.created);
        assert_eq!(first.rows_written, 1);

        let second = appender
            .append(&path, &[record("202002", json!({"heat": 3, "gas": 4}))])
            .unwrap();
        assert!(!second.created);

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with('\u{feff}'));
        let lines: Vec<&str> = content.trim_start_matches('\u{feff}').lines().collect();
        assert_eq!(lines, vec!["requestMonth,heat,gas", "202001,1,2", "202002,3,4"]);
    }

    #[test]
    fn appended_rows_follow_existing_column_order() {
        let dir = tempfile::tempdir().unwrap();
        let appender = CsvAppender::new(dir.path());
        let path = dir.path().join("A1_x.csv");
        fs::write(&path, "\u{feff}requestMonth,gas,heat\n202001,2,1\n").unwrap();

        let outcome = appender
            .append(&path, &[record("202002", json!({"heat": 3, "gas": 4, "extra": 9}))])
            .unwrap();
        assert_eq!(outcome.dropped_columns, vec!["extra".to_string()]);

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.ends_with("202002,4,3\n"));
    }

    #[test]
    fn unterminated_last_row_is_not_merged_with_the_next() {
        let dir = tempfile::tempdir().unwrap();
        let appender = CsvAppender::new(dir.path());
        let path = dir.path().join("A1_x.csv");
        fs::write(&path, "\u{feff}requestMonth,heat\n202001,1").unwrap();

        appender.append(&path, &[record("202002", json!({"heat": 2}))]).unwrap();

        let months: Vec<String> = energy_queries::collected_months(&path)
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(months, vec!["202001", "202002"]);

        let rows = energy_queries::load_energy_rows(&path).unwrap();
        assert_eq!(rows[0].reading("heat"), Some(1.0));
        assert_eq!(rows[1].reading("heat"), Some(2.0));
    }

    #[test]
    fn months_already_on_disk_are_not_duplicated() {
        let dir = tempfile::tempdir().unwrap();
        let appender = CsvAppender::new(dir.path());
        let path = dir.path().join("A1_x.csv");

        appender
            .append(&path, &[record("202001", json!({"heat": 1}))])
            .unwrap();
        let outcome = appender
            .append(
                &path,
                &[
                    record("202001", json!({"heat": 1})),
                    record("202002", json!({"heat": 2})),
                ],
            )
            .unwrap();

        assert_eq!(outcome.rows_written, 1);
        assert_eq!(outcome.skipped_months, vec!["202001".to_string()]);
        let months = energy_queries::collected_months(&path).unwrap();
        assert_eq!(months.len(), 2);
    }
}
