//! CSV table loading
//!
//! Reads comma-delimited files with a header row into a column-named table of
//! optional floats. Empty cells (and the usual NA spellings) load as missing
//! values so that the pipeline can impute them.

use serde::Serialize;
use std::io::Read;
use std::path::Path;

use crate::errors::{Result, YieldError};

const MISSING_TOKENS: [&str; 5] = ["", "NA", "NaN", "nan", "null"];

/// Row/column table of numeric cells
#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Option<f64>>>,
}

/// Min / mean / max of one column, ignoring missing cells
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    pub count: usize,
    pub min: f64,
    pub mean: f64,
    pub max: f64,
}

impl Table {
    /// Create a table, checking that every row matches the header width
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<f64>>>) -> Result<Self> {
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(YieldError::DataAccess(format!(
                    "row {}: expected {} columns, got {}",
                    idx + 1,
                    columns.len(),
                    row.len()
                )));
            }
        }
        Ok(Self { columns, rows })
    }

    /// Load a table from a CSV file with a header row
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .map_err(|e| YieldError::DataAccess(format!("{}: {e}", path.display())))?;
        Self::from_reader(file)
    }

    /// Load a table from any CSV source with a header row
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let columns: Vec<String> = reader
            .headers()
            .map_err(|e| YieldError::DataAccess(e.to_string()))?
            .iter()
            .map(str::to_string)
            .collect();

        if columns.is_empty() || columns.iter().all(String::is_empty) {
            return Err(YieldError::DataAccess("missing header row".into()));
        }

        let mut rows = Vec::new();
        for (line_idx, record) in reader.records().enumerate() {
            let record = record.map_err(|e| YieldError::DataAccess(e.to_string()))?;
            let mut row = Vec::with_capacity(columns.len());
            for (col_idx, cell) in record.iter().enumerate() {
                row.push(parse_cell(cell).ok_or_else(|| {
                    YieldError::DataAccess(format!(
                        "line {}, column '{}': invalid number '{}'",
                        line_idx + 2,
                        columns.get(col_idx).map(String::as_str).unwrap_or("?"),
                        cell
                    ))
                })?);
            }
            rows.push(row);
        }

        Self::new(columns, rows)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Option<f64>>] {
        &self.rows
    }

    /// Number of data rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// All cells of one column, in row order
    pub fn column(&self, name: &str) -> Option<Vec<Option<f64>>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| row[idx]).collect())
    }

    /// Present values of one column, in row order
    pub fn column_values(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().filter_map(|row| row[idx]).collect())
    }

    /// Per-column mean over present cells; `None` for columns with no values
    pub fn column_means(&self) -> Vec<Option<f64>> {
        (0..self.columns.len())
            .map(|idx| {
                let (sum, count) = self
                    .rows
                    .iter()
                    .filter_map(|row| row[idx])
                    .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
                (count > 0).then(|| sum / count as f64)
            })
            .collect()
    }

    /// Copy of this table with missing cells replaced by their column mean.
    ///
    /// Means are computed over this table only. Columns without any value
    /// stay missing.
    pub fn fill_missing_with_means(&self) -> Table {
        let means = self.column_means();
        let rows = self
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .zip(means.iter())
                    .map(|(cell, mean)| cell.or(*mean))
                    .collect()
            })
            .collect();
        Table {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Last `n` rows in file order
    pub fn tail(&self, n: usize) -> &[Vec<Option<f64>>] {
        let start = self.rows.len().saturating_sub(n);
        &self.rows[start..]
    }

    /// Summary statistics for every column that has at least one value
    pub fn summary(&self) -> Vec<ColumnSummary> {
        self.columns
            .iter()
            .enumerate()
            .filter_map(|(idx, name)| {
                let values: Vec<f64> = self.rows.iter().filter_map(|row| row[idx]).collect();
                if values.is_empty() {
                    return None;
                }
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let mean = values.iter().sum::<f64>() / values.len() as f64;
                Some(ColumnSummary {
                    name: name.clone(),
                    count: values.len(),
                    min,
                    mean,
                    max,
                })
            })
            .collect()
    }
}

fn parse_cell(cell: &str) -> Option<Option<f64>> {
    if MISSING_TOKENS.contains(&cell) {
        return Some(None);
    }
    cell.parse::<f64>().ok().map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv() -> std::io::Result<NamedTempFile> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "a,b,c")?;
        writeln!(file, "1.0,2.0,3.0")?;
        writeln!(file, "3.0,,5.0")?;
        writeln!(file, "5.0,6.0,NaN")?;
        file.flush()?;
        Ok(file)
    }

    #[test]
    fn test_load_csv() {
        let file = create_test_csv().unwrap();
        let table = Table::from_csv(file.path()).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.columns(), &["a", "b", "c"]);
        assert_eq!(table.rows()[0], vec![Some(1.0), Some(2.0), Some(3.0)]);
        assert_eq!(table.rows()[1][1], None);
        assert_eq!(table.rows()[2][2], None);
    }

    #[test]
    fn test_missing_file_is_data_access_error() {
        let err = Table::from_csv("/definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, YieldError::DataAccess(_)));
    }

    #[test]
    fn test_non_numeric_cell_rejected() {
        let input = "a,b\n1.0,wet\n";
        let err = Table::from_reader(input.as_bytes()).unwrap_err();
        match err {
            YieldError::DataAccess(msg) => assert!(msg.contains("column 'b'")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_ragged_row_rejected() {
        let input = "a,b\n1.0,2.0\n3.0\n";
        assert!(Table::from_reader(input.as_bytes()).is_err());
    }

    #[test]
    fn test_fill_missing_with_means() {
        let file = create_test_csv().unwrap();
        let table = Table::from_csv(file.path()).unwrap().fill_missing_with_means();

        assert_eq!(table.rows()[1][1], Some(4.0));
        assert_eq!(table.rows()[2][2], Some(4.0));
    }

    #[test]
    fn test_tail_keeps_file_order() {
        let file = create_test_csv().unwrap();
        let table = Table::from_csv(file.path()).unwrap();

        let tail = table.tail(2);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0][0], Some(3.0));
        assert_eq!(tail[1][0], Some(5.0));
        assert_eq!(table.tail(10).len(), 3);
    }

    #[test]
    fn test_summary() {
        let file = create_test_csv().unwrap();
        let table = Table::from_csv(file.path()).unwrap();
        let summary = table.summary();

        assert_eq!(summary.len(), 3);
        assert_eq!(summary[0].min, 1.0);
        assert_eq!(summary[0].max, 5.0);
        assert_eq!(summary[1].count, 2);
    }
}
