//! CSV score-table reader with full input validation.

use std::path::{Path, PathBuf};

use quakefit_search::TableSurface;
use tracing::{debug, info, instrument};

use crate::IoError;

/// Reads a score table written by
/// [`ResultWriter::write_table`](crate::ResultWriter::write_table).
///
/// Expected CSV format:
/// - Header row required: parameter column names, then the value column
/// - `strike,dip,rake,magnitude,depth_in_m,misfit`
/// - One row per grid point, all rows with the same number of columns
/// - Parameter cells must be finite; value cells may be `NaN`
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::CsvParse`] | Malformed CSV record |
/// | [`IoError::InvalidTableHeader`] | Header has fewer than two columns |
/// | [`IoError::EmptyTable`] | Zero data rows after header |
/// | [`IoError::InconsistentRowLength`] | Row has different column count than header |
/// | [`IoError::BadValue`] | Unparseable cell, or non-finite parameter |
pub struct TableReader {
    path: PathBuf,
}

impl TableReader {
    /// Create a new reader for the given CSV file path.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Read and validate the CSV file, returning a [`TableSurface`].
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<TableSurface, IoError> {
        let file = std::fs::File::open(&self.path).map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;

        // flexible(true) lets the row-length check below report the row.
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);

        let header = rdr.headers().map_err(|e| self.csv_error(e))?.clone();
        if header.len() < 2 {
            return Err(IoError::InvalidTableHeader {
                path: self.path.clone(),
                reason: "table needs at least one parameter column and a value column"
                    .to_string(),
            });
        }
        let expected = header.len();
        let columns: Vec<String> = header.iter().take(expected - 1).map(String::from).collect();
        debug!(?columns, "read CSV header");

        let mut rows = Vec::new();
        let mut values = Vec::new();
        for (row_index, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| self.csv_error(e))?;
            if record.len() != expected {
                return Err(IoError::InconsistentRowLength {
                    path: self.path.clone(),
                    row_index,
                    expected,
                    got: record.len(),
                });
            }

            let mut row = Vec::with_capacity(expected - 1);
            for (col_index, raw) in record.iter().enumerate() {
                let bad = || IoError::BadValue {
                    path: self.path.clone(),
                    row_index,
                    col_index,
                    raw: raw.to_string(),
                };
                let value: f64 = raw.trim().parse().map_err(|_| bad())?;
                if col_index + 1 == expected {
                    values.push(value);
                } else if value.is_finite() {
                    row.push(value);
                } else {
                    return Err(bad());
                }
            }
            rows.push(row);
        }

        if rows.is_empty() {
            return Err(IoError::EmptyTable {
                path: self.path.clone(),
            });
        }

        info!(n_rows = rows.len(), n_columns = columns.len(), "table loaded");
        Ok(TableSurface::new(columns, rows, values)?)
    }

    fn csv_error(&self, e: csv::Error) -> IoError {
        IoError::CsvParse {
            path: self.path.clone(),
            offset: e.position().map_or(0, |p| p.byte()),
            source: e,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use quakefit_search::SurfaceReduction;
    use tempfile::NamedTempFile;

    use super::*;

    fn write_csv(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn read_valid_table() {
        let f = write_csv("mrr,depth_in_m,misfit\n1.0,1000,0.5\n-1.0,1000,0.25\n1.0,2000,NaN\n");
        let t = TableReader::new(f.path()).read().unwrap();
        assert_eq!(t.columns(), ["mrr", "depth_in_m"]);
        assert_eq!(t.rows().len(), 3);
        assert_eq!(t.rows()[1], vec![-1.0, 1000.0]);
        assert!(t.values()[2].is_nan());

        let p = t.reduce_min("depth_in_m").unwrap();
        assert_eq!(p.values[0], 0.25);
        assert!(p.values[1].is_nan());
    }

    #[test]
    fn value_round_trip() {
        let f = write_csv("x,misfit\n0.1,1.23456789012345\n");
        let t = TableReader::new(f.path()).read().unwrap();
        assert_eq!(t.values()[0], 1.23456789012345);
    }

    #[test]
    fn empty_table() {
        let f = write_csv("x,misfit\n");
        let err = TableReader::new(f.path()).read().unwrap_err();
        assert!(matches!(err, IoError::EmptyTable { .. }));
    }

    #[test]
    fn inconsistent_row_length() {
        let f = write_csv("x,y,misfit\n1,2,3\n1,2\n");
        let err = TableReader::new(f.path()).read().unwrap_err();
        assert!(matches!(
            err,
            IoError::InconsistentRowLength { row_index: 1, expected: 3, got: 2, .. }
        ));
    }

    #[test]
    fn non_finite_parameter_rejected() {
        let f = write_csv("x,misfit\ninf,1.0\n");
        let err = TableReader::new(f.path()).read().unwrap_err();
        assert!(matches!(err, IoError::BadValue { col_index: 0, .. }));

        let f = write_csv("x,misfit\n1.0,abc\n");
        let err = TableReader::new(f.path()).read().unwrap_err();
        assert!(matches!(err, IoError::BadValue { col_index: 1, .. }));
    }

    #[test]
    fn single_column_rejected() {
        let f = write_csv("misfit\n1.0\n");
        let err = TableReader::new(f.path()).read().unwrap_err();
        assert!(matches!(err, IoError::InvalidTableHeader { .. }));
    }

    #[test]
    fn missing_file() {
        let err = TableReader::new(Path::new("/nonexistent/table_abc123.csv"))
            .read()
            .unwrap_err();
        assert!(matches!(err, IoError::FileNotFound { .. }));
    }
}
