//! Dataset loading.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::debug;

use mlprep_model::{PrepError, Result};

/// Read a single CSV file with a header row.
pub fn read_csv_file(path: &Path) -> Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    Ok(df)
}

/// Read a single parquet file.
pub fn read_parquet_file(path: &Path) -> Result<DataFrame> {
    let file = File::open(path)?;
    Ok(ParquetReader::new(file).finish()?)
}

/// Read every `*.parquet` file in a directory and stack them vertically.
///
/// Files are read in lexicographic order so repeated loads of the same
/// dataset produce the same row order.
pub fn read_parquet_dir(dir: &Path) -> Result<DataFrame> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "parquet"))
        .collect();
    paths.sort();

    debug!(dir = %dir.display(), files = paths.len(), "reading parquet dataset");

    let mut stacked: Option<DataFrame> = None;
    for path in &paths {
        let frame = read_parquet_file(path)?;
        stacked = Some(match stacked {
            Some(df) => df.vstack(&frame)?,
            None => frame,
        });
    }
    stacked.ok_or_else(|| {
        PrepError::Schema(format!("no parquet files found in {}", dir.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_csv_file_parses_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skus.csv");
        fs::write(&path, "sku_key,price\n1,10.5\n2,20.0\n").unwrap();

        let df = read_csv_file(&path).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.column("price").unwrap().f64().unwrap().get(0), Some(10.5));
    }

    #[test]
    fn read_parquet_dir_rejects_empty_directories() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_parquet_dir(dir.path()).unwrap_err();
        assert!(err.to_string().contains("no parquet files"));
    }
}
