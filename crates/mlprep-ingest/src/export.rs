//! Feature-matrix export.

use std::fs::File;
use std::path::Path;

use polars::prelude::*;

use mlprep_model::Result;

/// Write an aligned feature table as header-less CSV.
///
/// No header row is emitted: downstream trainers learn the column order
/// from the serialized cleaner document.
pub fn write_feature_csv(df: &DataFrame, path: &Path) -> Result<()> {
    let mut file = File::create(path)?;
    let mut df = df.clone();
    CsvWriter::new(&mut file).include_header(false).finish(&mut df)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_rows_without_a_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.csv");

        let df = DataFrame::new(vec![
            Series::new("price".into(), &[1.5, 2.0]).into(),
            Series::new("color_red".into(), &[true, false]).into(),
        ])
        .unwrap();
        write_feature_csv(&df, &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(!contents.contains("price"));
        assert_eq!(contents.lines().count(), 2);
    }
}
