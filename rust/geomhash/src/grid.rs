use crate::errors::GeomHashError;
use serde::Serialize;
use std::ops::{
    Index,
    IndexMut,
};

/// Largest number of cells any feature grid or translation histogram may
/// hold.
pub const MAX_GRID_CELLS: usize = 1 << 28;

/// Converts per-axis bucket counts into a `(rows, cols)` grid shape.
///
/// The grid actually allocated has `padding` extra cells on each axis. Fails
/// with [`GeomHashError::InvalidParameter`] on `key` when a count is not a
/// finite non-negative number or the padded grid would exceed
/// [`MAX_GRID_CELLS`].
pub(crate) fn checked_grid_shape(
    key: &str,
    counts: (f64, f64),
    padding: usize,
) -> Result<(usize, usize), GeomHashError> {
    let to_count =
        |v: f64| (v.is_finite() && v >= 0.0 && v <= MAX_GRID_CELLS as f64).then_some(v as usize);
    to_count(counts.0)
        .zip(to_count(counts.1))
        .filter(|&(rows, cols)| {
            rows.checked_add(padding)
                .zip(cols.checked_add(padding))
                .and_then(|(r, c)| r.checked_mul(c))
                .is_some_and(|cells| cells <= MAX_GRID_CELLS)
        })
        .ok_or_else(|| {
            GeomHashError::invalid(
                key,
                format!(
                    "bucket sizes and windows need a {} x {} grid, more than {} cells",
                    counts.0, counts.1, MAX_GRID_CELLS
                ),
            )
        })
}

/// Dense row-major 2D array.
///
/// Cells are addressed by `(row, col)`; the flat index of a cell is
/// `row * cols + col`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Matrix<T> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

impl<T: Clone> Matrix<T> {
    /// Creates a `rows x cols` matrix with every cell set to `value`.
    pub fn from_elem(rows: usize, cols: usize, value: T) -> Self {
        Self {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }

    /// Overwrites every cell with `value`, keeping the allocation.
    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }
}

impl<T: Clone + Default> Matrix<T> {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_elem(rows, cols, T::default())
    }
}

impl<T> Matrix<T> {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn size_pair(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn flat_index(&self, row: usize, col: usize) -> usize {
        debug_assert!(row < self.rows && col < self.cols);
        row * self.cols + col
    }

    /// Inverse of [`Matrix::flat_index`].
    pub fn index_pair(&self, flat: usize) -> (usize, usize) {
        (flat / self.cols, flat % self.cols)
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }

    /// Iterates cells in row-major order together with their `(row, col)`.
    pub fn indexed_iter(&self) -> impl Iterator<Item = ((usize, usize), &T)> + '_ {
        let cols = self.cols;
        self.data
            .iter()
            .enumerate()
            .map(move |(i, v)| ((i / cols, i % cols), v))
    }
}

impl Matrix<f64> {
    /// Flat index of the first maximum in row-major scan order.
    ///
    /// NaN cells never win. Returns `None` for an empty matrix or one
    /// holding only NaNs.
    pub fn argmax(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, &v) in self.data.iter().enumerate() {
            if v.is_nan() {
                continue;
            }
            match best {
                Some((_, bv)) if v <= bv => {}
                _ => best = Some((i, v)),
            }
        }
        best.map(|(i, _)| i)
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }
}

impl<T> Index<(usize, usize)> for Matrix<T> {
    type Output = T;

    fn index(&self, (row, col): (usize, usize)) -> &T {
        assert!(
            row < self.rows && col < self.cols,
            "Index ({}, {}) out of bounds for {}x{} matrix",
            row,
            col,
            self.rows,
            self.cols
        );
        &self.data[row * self.cols + col]
    }
}

impl<T> IndexMut<(usize, usize)> for Matrix<T> {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut T {
        assert!(
            row < self.rows && col < self.cols,
            "Index ({}, {}) out of bounds for {}x{} matrix",
            row,
            col,
            self.rows,
            self.cols
        );
        &mut self.data[row * self.cols + col]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_round_trip() {
        let m: Matrix<u8> = Matrix::new(3, 4);
        for r in 0..3 {
            for c in 0..4 {
                let flat = m.flat_index(r, c);
                assert_eq!(m.index_pair(flat), (r, c));
            }
        }
        assert_eq!(m.flat_index(2, 1), 9);
        assert_eq!(m.size_pair(), (3, 4));
    }

    #[test]
    fn test_argmax_first_maximum_wins() {
        let mut m = Matrix::from_elem(2, 3, 0.0);
        m[(0, 2)] = 5.0;
        m[(1, 1)] = 5.0;
        m[(1, 0)] = f64::NAN;
        assert_eq!(m.argmax(), Some(2));
        assert_eq!(m.index_pair(2), (0, 2));
    }

    #[test]
    fn test_argmax_all_zero_is_first_cell() {
        let m = Matrix::from_elem(2, 2, 0.0);
        assert_eq!(m.argmax(), Some(0));
        let empty: Matrix<f64> = Matrix::new(0, 0);
        assert_eq!(empty.argmax(), None);
    }

    #[test]
    fn test_fill_keeps_shape() {
        let mut m = Matrix::from_elem(2, 2, 3.0);
        m.fill(0.0);
        assert_eq!(m.sum(), 0.0);
        assert_eq!(m.size_pair(), (2, 2));
        assert!(m.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_checked_grid_shape() {
        assert_eq!(checked_grid_shape("k", (3.0, 4.0), 1).unwrap(), (3, 4));
        assert_eq!(checked_grid_shape("k", (0.0, 0.0), 0).unwrap(), (0, 0));
        for counts in [
            (f64::NAN, 1.0),
            (1.0, f64::INFINITY),
            (-1.0, 1.0),
            (1e30, 1.0),
            (65536.0, 65536.0),
        ] {
            assert!(
                matches!(
                    checked_grid_shape("k", counts, 1),
                    Err(GeomHashError::InvalidParameter { .. })
                ),
                "{:?} should not fit",
                counts
            );
        }
        let side = MAX_GRID_CELLS as f64;
        assert!(checked_grid_shape("k", (side, 0.0), 1).is_err());
        assert!(checked_grid_shape("k", (side - 1.0, 0.0), 1).is_ok());
    }

    #[test]
    fn test_indexed_iter_is_row_major() {
        let mut m = Matrix::new(2, 2);
        m[(1, 0)] = 7;
        let cells: Vec<_> = m.indexed_iter().filter(|(_, v)| **v != 0).collect();
        assert_eq!(cells, vec![((1, 0), &7)]);
    }
}
