//! Flat-file queries over the roster, energy and analysis CSVs.
//!
//! Every CSV written here starts with a UTF-8 byte-order mark so spreadsheet
//! tools pick the right encoding for the Korean column names; readers accept
//! files with or without it.

pub mod analysis_queries;
pub mod energy_queries;
pub mod roster_queries;

use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Serialize};

use crate::{Error, Result};

pub(crate) const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub(crate) fn open_reader(path: &Path) -> Result<csv::Reader<File>> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    Ok(csv::ReaderBuilder::new().flexible(true).from_reader(file))
}

/// Reader that yields the header row as an ordinary record.
pub(crate) fn open_headerless_reader(path: &Path) -> Result<csv::Reader<File>> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    Ok(csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(false)
        .from_reader(file))
}

/// Header names with any leading byte-order mark removed.
pub(crate) fn clean_headers(headers: &csv::StringRecord) -> Vec<String> {
    headers
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect()
}

pub(crate) fn column_index(headers: &[String], column: &str, path: &Path) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| Error::MissingColumn {
            column: column.to_string(),
            path: path.to_path_buf(),
        })
}

/// Create (or truncate) `path`, write the byte-order mark and hand back a CSV
/// writer positioned after it. Parent directories are created as needed.
pub fn create_with_bom(path: &Path) -> Result<csv::Writer<File>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    let mut file = File::create(path).map_err(|e| Error::io(path, e))?;
    file.write_all(UTF8_BOM).map_err(|e| Error::io(path, e))?;
    Ok(csv::Writer::from_writer(file))
}

/// Header row of an existing CSV file, or `None` when the file does not exist.
pub fn read_header(path: &Path) -> Result<Option<Vec<String>>> {
    if !path.exists() {
        return Ok(None);
    }
    let mut rdr = open_reader(path)?;
    let headers = rdr.headers()?;
    Ok(Some(clean_headers(headers)))
}

/// All `*.csv` files directly inside `dir`, sorted by file name.
pub fn list_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "csv") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub(crate) fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr = create_with_bom(path)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush().map_err(|e| Error::io(path, e))?;
    Ok(())
}

pub(crate) fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut rdr = open_reader(path)?;
    let headers = csv::StringRecord::from(clean_headers(rdr.headers()?));
    rdr.set_headers(headers);

    let mut rows = Vec::new();
    for row in rdr.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}
