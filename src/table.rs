//! Column-oriented tables.
//!
//! A [`Table`] is the dataset half of an individual: an ordered list of
//! typed [`Column`]s that all share one row count.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;

/// Value type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Int,
    Float,
}

impl DType {
    fn tag(self) -> u8 {
        match self {
            DType::Int => 0,
            DType::Float => 1,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DType::Int => write!(f, "int"),
            DType::Float => write!(f, "float"),
        }
    }
}

/// A single typed column of values.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Int(Vec<i64>),
    Float(Vec<f64>),
}

impl Column {
    /// Creates an empty column of the given type.
    pub fn empty(dtype: DType) -> Self {
        match dtype {
            DType::Int => Column::Int(Vec::new()),
            DType::Float => Column::Float(Vec::new()),
        }
    }

    pub fn dtype(&self) -> DType {
        match self {
            Column::Int(_) => DType::Int,
            Column::Float(_) => DType::Float,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Int(v) => v.len(),
            Column::Float(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the integer values, or `None` for a float column.
    pub fn as_int(&self) -> Option<&[i64]> {
        match self {
            Column::Int(v) => Some(v),
            Column::Float(_) => None,
        }
    }

    /// Returns the float values, or `None` for an integer column.
    pub fn as_float(&self) -> Option<&[f64]> {
        match self {
            Column::Float(v) => Some(v),
            Column::Int(_) => None,
        }
    }

    /// Returns every value widened to `f64`.
    pub fn to_f64(&self) -> Vec<f64> {
        match self {
            Column::Int(v) => v.iter().map(|&x| x as f64).collect(),
            Column::Float(v) => v.clone(),
        }
    }

    /// Appends the values of `other` to this column.
    ///
    /// Values of a different type are converted to this column's type.
    pub(crate) fn append(&mut self, other: Column) {
        match (self, other) {
            (Column::Int(a), Column::Int(b)) => a.extend(b),
            (Column::Float(a), Column::Float(b)) => a.extend(b),
            (Column::Int(a), Column::Float(b)) => a.extend(b.into_iter().map(|x| x.round() as i64)),
            (Column::Float(a), Column::Int(b)) => a.extend(b.into_iter().map(|x| x as f64)),
        }
    }

    /// Removes the value at `row`.
    pub(crate) fn remove(&mut self, row: usize) {
        match self {
            Column::Int(v) => {
                v.remove(row);
            }
            Column::Float(v) => {
                v.remove(row);
            }
        }
    }

    /// Overwrites the value at `row` with the first value of `source`.
    pub(crate) fn set_from(&mut self, row: usize, source: &Column) {
        match (self, source) {
            (Column::Int(a), Column::Int(b)) => a[row] = b[0],
            (Column::Float(a), Column::Float(b)) => a[row] = b[0],
            (Column::Int(a), Column::Float(b)) => a[row] = b[0].round() as i64,
            (Column::Float(a), Column::Int(b)) => a[row] = b[0] as f64,
        }
    }

    /// Keeps only the rows whose index is not flagged in `dropped`.
    pub(crate) fn drop_rows(&mut self, dropped: &[bool]) {
        fn keep<T: Copy>(values: &mut Vec<T>, dropped: &[bool]) {
            let mut i = 0;
            values.retain(|_| {
                let keep = !dropped.get(i).copied().unwrap_or(false);
                i += 1;
                keep
            });
        }
        match self {
            Column::Int(v) => keep(v, dropped),
            Column::Float(v) => keep(v, dropped),
        }
    }

    fn cell(&self, row: usize) -> String {
        match self {
            Column::Int(v) => v[row].to_string(),
            Column::Float(v) => v[row].to_string(),
        }
    }

    fn hash_into(&self, hasher: &mut Sha256) {
        hasher.update([self.dtype().tag()]);
        hasher.update((self.len() as u64).to_le_bytes());
        match self {
            Column::Int(v) => v.iter().for_each(|x| hasher.update(x.to_le_bytes())),
            Column::Float(v) => v.iter().for_each(|x| hasher.update(x.to_bits().to_le_bytes())),
        }
    }
}

/// An ordered collection of equal-length columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    nrows: usize,
    columns: Vec<Column>,
}

impl Table {
    /// Creates a table with no columns.
    pub fn new(nrows: usize) -> Self {
        Self {
            nrows,
            columns: Vec::new(),
        }
    }

    /// Assembles a table from columns that each hold `nrows` values.
    ///
    /// # Panics
    /// Panics if any column length differs from `nrows`.
    pub fn from_columns(nrows: usize, columns: Vec<Column>) -> Self {
        for (j, col) in columns.iter().enumerate() {
            assert_eq!(
                col.len(),
                nrows,
                "column {j} has {} rows, table has {nrows}",
                col.len()
            );
        }
        Self { nrows, columns }
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    /// `(rows, columns)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.columns.len())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, j: usize) -> Option<&Column> {
        self.columns.get(j)
    }

    pub fn dtypes(&self) -> Vec<DType> {
        self.columns.iter().map(Column::dtype).collect()
    }

    pub(crate) fn into_columns(self) -> (usize, Vec<Column>) {
        (self.nrows, self.columns)
    }

    /// Canonical, order-sensitive SHA-256 digest of the table contents.
    ///
    /// Two tables hash equal exactly when they have the same shape, the same
    /// column types in the same order and bit-identical values.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update((self.nrows as u64).to_le_bytes());
        hasher.update((self.columns.len() as u64).to_le_bytes());
        for col in &self.columns {
            col.hash_into(&mut hasher);
        }
        hex::encode(hasher.finalize())
    }

    /// Writes the table as CSV with a header row of column indices.
    ///
    /// A table with no columns writes an empty file, so its row count must
    /// be stored elsewhere.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        if self.columns.is_empty() {
            writer.flush()?;
            return Ok(());
        }
        let header: Vec<String> = (0..self.columns.len()).map(|j| j.to_string()).collect();
        writer.write_record(&header)?;
        for row in 0..self.nrows {
            writer.write_record(self.columns.iter().map(|c| c.cell(row)))?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Reads a table written by [`write_csv`](Self::write_csv), parsing each
    /// column with the matching entry of `dtypes`.
    pub fn read_csv(path: &Path, dtypes: &[DType]) -> Result<Self> {
        if dtypes.is_empty() {
            return Ok(Self::new(0));
        }

        let mut reader = csv::Reader::from_path(path)?;
        let mut columns: Vec<Column> = dtypes.iter().map(|&d| Column::empty(d)).collect();
        let mut nrows = 0;

        for record in reader.records() {
            let record = record?;
            if record.len() != dtypes.len() {
                return Err(Error::Corrupt {
                    path: path.to_path_buf(),
                    reason: format!(
                        "row {nrows} has {} fields, expected {}",
                        record.len(),
                        dtypes.len()
                    ),
                });
            }
            for (col, field) in columns.iter_mut().zip(record.iter()) {
                let parsed = match col {
                    Column::Int(v) => field.parse::<i64>().map(|x| v.push(x)).is_ok(),
                    Column::Float(v) => field.parse::<f64>().map(|x| v.push(x)).is_ok(),
                };
                if !parsed {
                    return Err(Error::Corrupt {
                        path: path.to_path_buf(),
                        reason: format!("cannot parse '{field}' as {}", col.dtype()),
                    });
                }
            }
            nrows += 1;
        }

        Ok(Self { nrows, columns })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> Table {
        Table::from_columns(
            3,
            vec![
                Column::Int(vec![1, -2, 3]),
                Column::Float(vec![0.1, 2.5e-7, -1234.5]),
            ],
        )
    }

    #[test]
    fn test_shape_and_dtypes() {
        let t = sample_table();
        assert_eq!(t.shape(), (3, 2));
        assert_eq!(t.dtypes(), vec![DType::Int, DType::Float]);
    }

    #[test]
    #[should_panic(expected = "column 0 has 2 rows")]
    fn test_ragged_columns_panic() {
        Table::from_columns(3, vec![Column::Int(vec![1, 2])]);
    }

    #[test]
    fn test_hash_is_order_sensitive() {
        let a = sample_table();
        let (n, mut cols) = a.clone().into_columns();
        cols.reverse();
        let b = Table::from_columns(n, cols);
        assert_ne!(a.content_hash(), b.content_hash());
        assert_eq!(a.content_hash(), sample_table().content_hash());
    }

    #[test]
    fn test_hash_distinguishes_dtype() {
        let a = Table::from_columns(1, vec![Column::Int(vec![0])]);
        let b = Table::from_columns(1, vec![Column::Float(vec![0.0])]);
        assert_ne!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn test_csv_roundtrip_is_exact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.csv");
        let t = sample_table();
        t.write_csv(&path).unwrap();
        let back = Table::read_csv(&path, &t.dtypes()).unwrap();
        assert_eq!(back, t);
        assert_eq!(back.content_hash(), t.content_hash());
    }

    #[test]
    fn test_csv_rejects_bad_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.csv");
        std::fs::write(&path, "0\nabc\n").unwrap();
        let err = Table::read_csv(&path, &[DType::Int]).unwrap_err();
        assert!(matches!(err, Error::Corrupt { .. }));
    }

    #[test]
    fn test_drop_rows() {
        let mut c = Column::Float(vec![1.0, 2.0, 3.0, 4.0]);
        c.drop_rows(&[false, true, false, true]);
        assert_eq!(c, Column::Float(vec![1.0, 3.0]));
    }

    #[test]
    fn test_append_and_set_from() {
        let mut c = Column::Int(vec![1]);
        c.append(Column::Int(vec![2, 3]));
        c.set_from(0, &Column::Int(vec![9]));
        assert_eq!(c, Column::Int(vec![9, 2, 3]));
    }
}
