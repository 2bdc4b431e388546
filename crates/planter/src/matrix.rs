//! The row-major `f32` sample matrix stored in `Data`.

use std::fmt;
use std::ops::Range;

use crate::error::{PlanterError, Result};

/// Axis of the sample matrix. Rows are channels, columns are samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Channels = 0,
    Samples = 1,
}

impl Axis {
    /// The axis whose length must match when growing along `self`.
    pub fn other(self) -> Axis {
        match self {
            Axis::Channels => Axis::Samples,
            Axis::Samples => Axis::Channels,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<usize> for Axis {
    type Error = PlanterError;

    fn try_from(dim: usize) -> Result<Axis> {
        match dim {
            0 => Ok(Axis::Channels),
            1 => Ok(Axis::Samples),
            _ => Err(PlanterError::InvalidField {
                field: dim.to_string(),
                allowed: &["0", "1"],
            }),
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Axis::Channels => "channel",
            Axis::Samples => "sample",
        })
    }
}

/// Dense 2-D matrix of `f32`, rows = channels, columns = samples.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    values: Vec<f32>,
}

impl Matrix {
    /// Wrap row-major `values`, which must hold exactly `rows * cols` cells.
    pub fn new(rows: usize, cols: usize, values: Vec<f32>) -> Result<Matrix> {
        if values.len() != rows * cols {
            return Err(PlanterError::LabelCount {
                what: "matrix cells",
                expected: rows * cols,
                actual: values.len(),
            });
        }
        Ok(Matrix { rows, cols, values })
    }

    /// A `rows` x `cols` matrix with every cell set to `value`.
    pub fn filled(rows: usize, cols: usize, value: f32) -> Matrix {
        Matrix {
            rows,
            cols,
            values: vec![value; rows * cols],
        }
    }

    pub fn zeros(rows: usize, cols: usize) -> Matrix {
        Self::filled(rows, cols, 0.0)
    }

    /// Build from equal-length rows.
    pub fn from_rows<R: AsRef<[f32]>>(rows: &[R]) -> Result<Matrix> {
        let cols = rows.first().map_or(0, |r| r.as_ref().len());
        let mut values = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            let row = row.as_ref();
            if row.len() != cols {
                return Err(PlanterError::ShapeMismatch {
                    axis: Axis::Samples,
                    expected: cols,
                    actual: row.len(),
                });
            }
            values.extend_from_slice(row);
        }
        Ok(Matrix {
            rows: rows.len(),
            cols,
            values,
        })
    }

    /// Number of channels.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of samples per channel.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`, the order `Data` is stored in.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Length along `axis`.
    pub fn len_along(&self, axis: Axis) -> usize {
        match axis {
            Axis::Channels => self.rows,
            Axis::Samples => self.cols,
        }
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if row < self.rows && col < self.cols {
            Some(self.values[row * self.cols + col])
        } else {
            None
        }
    }

    pub fn row(&self, row: usize) -> Option<&[f32]> {
        (row < self.rows).then(|| &self.values[row * self.cols..(row + 1) * self.cols])
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.values
    }

    /// Grow along `axis` by `block`, whose length on the other axis must
    /// match ours.
    pub fn append(&mut self, block: &Matrix, axis: Axis) -> Result<()> {
        let fixed = axis.other();
        if self.len_along(fixed) != block.len_along(fixed) {
            return Err(PlanterError::ShapeMismatch {
                axis: fixed,
                expected: self.len_along(fixed),
                actual: block.len_along(fixed),
            });
        }
        match axis {
            Axis::Channels => {
                self.values.extend_from_slice(&block.values);
                self.rows += block.rows;
            }
            Axis::Samples => {
                let cols = self.cols + block.cols;
                let mut values = Vec::with_capacity(self.rows * cols);
                for r in 0..self.rows {
                    values.extend_from_slice(&self.values[r * self.cols..(r + 1) * self.cols]);
                    values.extend_from_slice(&block.values[r * block.cols..(r + 1) * block.cols]);
                }
                self.values = values;
                self.cols = cols;
            }
        }
        Ok(())
    }

    /// Drop the sample columns in `range`, clamped to the matrix. Returns
    /// how many columns were removed.
    pub fn remove_columns(&mut self, range: Range<usize>) -> usize {
        let end = range.end.min(self.cols);
        let start = range.start.min(end);
        let removed = end - start;
        if removed == 0 {
            return 0;
        }
        let cols = self.cols - removed;
        let mut values = Vec::with_capacity(self.rows * cols);
        for r in 0..self.rows {
            let row = &self.values[r * self.cols..(r + 1) * self.cols];
            values.extend_from_slice(&row[..start]);
            values.extend_from_slice(&row[end..]);
        }
        self.values = values;
        self.cols = cols;
        removed
    }

    /// Drop the channel rows listed in `rows` (any order, out-of-range
    /// indexes ignored).
    pub fn remove_rows(&mut self, rows: &[usize]) {
        let cols = self.cols;
        let mut kept = 0;
        let mut values = Vec::with_capacity(self.values.len());
        for r in (0..self.rows).filter(|r| !rows.contains(r)) {
            values.extend_from_slice(&self.values[r * cols..(r + 1) * cols]);
            kept += 1;
        }
        self.values = values;
        self.rows = kept;
    }
}
