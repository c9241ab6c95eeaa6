//! Row-major numeric results produced by expression evaluation.

/// Two-dimensional numeric result: one row per spot (or repetition), one
/// column per value or derived statistic.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct Matrix {
    rows: Vec<Vec<f64>>,
}

impl Matrix {
    /// 1×1 matrix.
    pub fn scalar(value: f64) -> Self {
        Self {
            rows: vec![vec![value]],
        }
    }

    /// Single-row matrix.
    pub fn row(values: Vec<f64>) -> Self {
        Self { rows: vec![values] }
    }

    /// Matrix from explicit rows.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Self {
        Self { rows }
    }

    /// Matrix with no rows.
    pub fn empty() -> Self {
        Self { rows: Vec::new() }
    }

    /// Number of rows.
    pub fn nrows(&self) -> usize {
        self.rows.len()
    }

    /// Width of the widest row.
    pub fn ncols(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Whether the matrix has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Entry at `(row, col)`.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.rows.get(row).and_then(|values| values.get(col)).copied()
    }

    /// Primary value (column 0) of a row.
    pub fn value(&self, row: usize) -> Option<f64> {
        self.get(row, 0)
    }

    /// All rows.
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Consumes the matrix, returning its rows.
    pub fn into_rows(self) -> Vec<Vec<f64>> {
        self.rows
    }

    /// Column values, one per row; rows too short for the column are skipped.
    pub fn column(&self, col: usize) -> Vec<f64> {
        self.rows
            .iter()
            .filter_map(|values| values.get(col).copied())
            .collect()
    }

    /// Appends the rows of another matrix.
    pub fn extend(&mut self, other: Matrix) {
        self.rows.extend(other.rows);
    }
}
