//! Dense two-dimensional storage indexed by (time bin, column).
//!
//! Values are stored column-major: appending a column or swapping two columns
//! touches only the affected column slices, which is the common mutation while
//! observations stream in with previously unseen entity names.

use std::ops::{Index, IndexMut};

#[derive(Debug, Clone, PartialEq)]
pub struct Grid<T> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

impl<T: Copy> Grid<T> {
    pub fn filled(rows: usize, cols: usize, fill: T) -> Self {
        Self {
            rows,
            cols,
            data: vec![fill; rows * cols],
        }
    }

    /// Build from row-major values, the order used on disk.
    ///
    /// Returns `None` if `values` does not hold exactly `rows * cols` items.
    pub fn from_row_major(rows: usize, cols: usize, values: &[T]) -> Option<Self> {
        if values.len() != rows * cols {
            return None;
        }
        let mut data = Vec::with_capacity(values.len());
        for c in 0..cols {
            data.extend((0..rows).map(|r| values[r * cols + c]));
        }
        Some(Self { rows, cols, data })
    }

    pub fn to_row_major(&self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.data.len());
        for r in 0..self.rows {
            out.extend((0..self.cols).map(|c| self.data[c * self.rows + r]));
        }
        out
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> [usize; 2] {
        [self.rows, self.cols]
    }

    pub fn get(&self, row: usize, col: usize) -> Option<T> {
        if row < self.rows && col < self.cols {
            Some(self.data[col * self.rows + row])
        } else {
            None
        }
    }

    pub fn column(&self, col: usize) -> &[T] {
        &self.data[col * self.rows..(col + 1) * self.rows]
    }

    pub fn column_mut(&mut self, col: usize) -> &mut [T] {
        &mut self.data[col * self.rows..(col + 1) * self.rows]
    }

    pub fn push_column(&mut self, fill: T) {
        self.data.extend(std::iter::repeat(fill).take(self.rows));
        self.cols += 1;
    }

    pub fn swap_columns(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        let (head, tail) = self.data.split_at_mut(hi * self.rows);
        head[lo * self.rows..(lo + 1) * self.rows].swap_with_slice(&mut tail[..self.rows]);
    }

    /// Keep only the first `rows` rows.
    pub fn truncate_rows(&mut self, rows: usize) {
        if rows >= self.rows {
            return;
        }
        let mut data = Vec::with_capacity(rows * self.cols);
        for c in 0..self.cols {
            data.extend_from_slice(&self.column(c)[..rows]);
        }
        self.data = data;
        self.rows = rows;
    }

    pub fn map<U: Copy>(&self, f: impl Fn(T) -> U) -> Grid<U> {
        Grid {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|v| f(*v)).collect(),
        }
    }

    /// Iterate over every cell in column-major order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.data.iter()
    }
}

impl<T> Index<(usize, usize)> for Grid<T> {
    type Output = T;

    fn index(&self, (row, col): (usize, usize)) -> &T {
        assert!(row < self.rows && col < self.cols, "grid index out of bounds");
        &self.data[col * self.rows + row]
    }
}

impl<T> IndexMut<(usize, usize)> for Grid<T> {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut T {
        assert!(row < self.rows && col < self.cols, "grid index out of bounds");
        &mut self.data[col * self.rows + row]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_major_round_trip() {
        let values = [1, 2, 3, 4, 5, 6];
        let grid = Grid::from_row_major(2, 3, &values).expect("grid");
        assert_eq!(grid[(0, 2)], 3);
        assert_eq!(grid[(1, 0)], 4);
        assert_eq!(grid.column(1), &[2, 5]);
        assert_eq!(grid.to_row_major(), values);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(Grid::from_row_major(2, 2, &[1, 2, 3]).is_none());
    }

    #[test]
    fn push_and_swap_columns() {
        let mut grid = Grid::filled(3, 1, 0);
        grid.push_column(7);
        grid[(1, 0)] = 9;
        grid.swap_columns(1, 0);
        assert_eq!(grid.column(0), &[7, 7, 7]);
        assert_eq!(grid.column(1), &[0, 9, 0]);
    }

    #[test]
    fn truncate_keeps_leading_rows() {
        let mut grid = Grid::from_row_major(3, 2, &[1, 2, 3, 4, 5, 6]).expect("grid");
        grid.truncate_rows(2);
        assert_eq!(grid.shape(), [2, 2]);
        assert_eq!(grid.to_row_major(), vec![1, 2, 3, 4]);
    }
}
