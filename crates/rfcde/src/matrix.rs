//! Column-major matrix storage and bounds-checked views.

use crate::error::RfcdeError;

/// Borrowed, column-major view over a flat `f64` buffer.
///
/// Column `j` occupies `data[j * stride .. j * stride + n_rows]`. The stride
/// is at least `n_rows`; padded layouts use a larger stride.
#[derive(Debug, Clone, Copy)]
pub struct ColumnMajorView<'a> {
    data: &'a [f64],
    n_rows: usize,
    n_cols: usize,
    stride: usize,
}

impl<'a> ColumnMajorView<'a> {
    /// Create a densely packed view (`stride == n_rows`).
    ///
    /// # Errors
    ///
    /// Returns [`RfcdeError::ShapeMismatch`] when `data.len() != n_rows * n_cols`.
    pub fn new(data: &'a [f64], n_rows: usize, n_cols: usize) -> Result<Self, RfcdeError> {
        let expected = n_rows.checked_mul(n_cols);
        if expected != Some(data.len()) {
            return Err(RfcdeError::ShapeMismatch {
                len: data.len(),
                n_rows,
                n_cols,
                stride: n_rows,
            });
        }
        Ok(Self {
            data,
            n_rows,
            n_cols,
            stride: n_rows,
        })
    }

    /// Create a view whose columns start `stride` elements apart.
    ///
    /// # Errors
    ///
    /// Returns [`RfcdeError::ShapeMismatch`] when `stride < n_rows` or the
    /// buffer is too short to hold the last column.
    pub fn with_stride(
        data: &'a [f64],
        n_rows: usize,
        n_cols: usize,
        stride: usize,
    ) -> Result<Self, RfcdeError> {
        let shape_err = || RfcdeError::ShapeMismatch {
            len: data.len(),
            n_rows,
            n_cols,
            stride,
        };
        if stride < n_rows {
            return Err(shape_err());
        }
        let required = match n_cols {
            0 => Some(0),
            n => stride
                .checked_mul(n - 1)
                .and_then(|offset| offset.checked_add(n_rows)),
        };
        match required {
            Some(required) if required <= data.len() => Ok(Self {
                data,
                n_rows,
                n_cols,
                stride,
            }),
            _ => Err(shape_err()),
        }
    }

    /// Return the number of rows (observations).
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Return the number of columns.
    #[must_use]
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// Return the column stride.
    #[must_use]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Borrow column `col` as a contiguous slice of length `n_rows`.
    ///
    /// # Panics
    ///
    /// Panics if `col >= n_cols`.
    #[must_use]
    pub fn column(&self, col: usize) -> &'a [f64] {
        assert!(
            col < self.n_cols,
            "column index {col} out of bounds for matrix with {} columns",
            self.n_cols
        );
        let start = col * self.stride;
        &self.data[start..start + self.n_rows]
    }

    /// Return the value at (`row`, `col`).
    ///
    /// # Panics
    ///
    /// Panics if either index is out of bounds.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        assert!(
            row < self.n_rows,
            "row index {row} out of bounds for matrix with {} rows",
            self.n_rows
        );
        self.column(col)[row]
    }

    /// Return the first non-finite entry as `(row, column)`, if any.
    pub(crate) fn find_non_finite(&self) -> Option<(usize, usize)> {
        (0..self.n_cols).find_map(|col| {
            self.column(col)
                .iter()
                .position(|v| !v.is_finite())
                .map(|row| (row, col))
        })
    }
}

/// Owned, densely packed column-major matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMajorMatrix {
    data: Vec<f64>,
    n_rows: usize,
    n_cols: usize,
}

impl ColumnMajorMatrix {
    /// Create a matrix from a column-major buffer.
    ///
    /// # Errors
    ///
    /// Returns [`RfcdeError::ShapeMismatch`] when `data.len() != n_rows * n_cols`.
    pub fn new(data: Vec<f64>, n_rows: usize, n_cols: usize) -> Result<Self, RfcdeError> {
        ColumnMajorView::new(&data, n_rows, n_cols)?;
        Ok(Self {
            data,
            n_rows,
            n_cols,
        })
    }

    /// Build a matrix column by column. `fill` must push exactly `n_rows`
    /// values for each column it is called with.
    pub(crate) fn from_columns(
        n_rows: usize,
        n_cols: usize,
        mut fill: impl FnMut(usize, &mut Vec<f64>),
    ) -> Self {
        let mut data = Vec::with_capacity(n_rows * n_cols);
        for col in 0..n_cols {
            fill(col, &mut data);
            debug_assert_eq!(data.len(), (col + 1) * n_rows);
        }
        Self {
            data,
            n_rows,
            n_cols,
        }
    }

    /// Borrow as a [`ColumnMajorView`].
    #[must_use]
    pub fn as_view(&self) -> ColumnMajorView<'_> {
        ColumnMajorView {
            data: &self.data,
            n_rows: self.n_rows,
            n_cols: self.n_cols,
            stride: self.n_rows,
        }
    }

    /// Return the number of rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Return the number of columns.
    #[must_use]
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// Borrow the flat column-major buffer.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Consume and return the flat column-major buffer.
    #[must_use]
    pub fn into_inner(self) -> Vec<f64> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_view_columns() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let view = ColumnMajorView::new(&data, 3, 2).unwrap();
        assert_eq!(view.column(0), &[1.0, 2.0, 3.0]);
        assert_eq!(view.column(1), &[4.0, 5.0, 6.0]);
        assert_eq!(view.get(2, 1), 6.0);
    }

    #[test]
    fn dense_view_rejects_wrong_length() {
        let data = [1.0, 2.0, 3.0];
        let err = ColumnMajorView::new(&data, 2, 2).unwrap_err();
        assert!(matches!(err, RfcdeError::ShapeMismatch { len: 3, .. }));
    }

    #[test]
    fn strided_view_skips_padding() {
        // Two columns of two rows, each padded to stride 3.
        let data = [1.0, 2.0, -1.0, 3.0, 4.0];
        let view = ColumnMajorView::with_stride(&data, 2, 2, 3).unwrap();
        assert_eq!(view.column(0), &[1.0, 2.0]);
        assert_eq!(view.column(1), &[3.0, 4.0]);
    }

    #[test]
    fn strided_view_rejects_short_stride() {
        let data = [0.0; 6];
        assert!(ColumnMajorView::with_stride(&data, 3, 2, 2).is_err());
    }

    #[test]
    fn strided_view_rejects_short_buffer() {
        let data = [0.0; 5];
        assert!(ColumnMajorView::with_stride(&data, 2, 2, 4).is_err());
    }

    #[test]
    #[should_panic(expected = "column index 2 out of bounds")]
    fn column_out_of_bounds_panics() {
        let data = [0.0; 4];
        let view = ColumnMajorView::new(&data, 2, 2).unwrap();
        let _ = view.column(2);
    }

    #[test]
    fn finds_non_finite_entry() {
        let data = [1.0, 2.0, 3.0, f64::NAN];
        let view = ColumnMajorView::new(&data, 2, 2).unwrap();
        assert_eq!(view.find_non_finite(), Some((1, 1)));
    }

    #[test]
    fn owned_matrix_from_columns() {
        let m = ColumnMajorMatrix::from_columns(2, 3, |col, out| {
            out.extend([col as f64, col as f64 * 10.0]);
        });
        assert_eq!(m.as_slice(), &[0.0, 0.0, 1.0, 10.0, 2.0, 20.0]);
        assert_eq!(m.as_view().get(1, 2), 20.0);
    }
}
