//! Row-major path tensors and matrices.
//!
//! # Memory Layout
//!
//! All buffers use row-major contiguous layout for cache efficiency:
//! - [`PathTensor`]: n_paths × n_times × n_features (signature features per path and time)
//! - [`Matrix`]: rows × cols (payoffs and increments with rows = paths, cols = time)
//!
//! Both types validate their shape at construction; accessors index without
//! further checks and panic on out-of-range indices like slice indexing.

use std::ops::Range;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::error::TensorError;

/// Dense row-major matrix of `f64` values.
///
/// Used for payoff tensors (paths × time), increment tensors (paths × steps)
/// and as the batch type flowing through the function approximators.
///
/// # Examples
///
/// ```rust
/// use stopping_core::types::Matrix;
///
/// let m = Matrix::from_rows(&[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap();
/// assert_eq!(m.shape(), (2, 3));
/// assert_eq!(m.get(1, 2), 6.0);
/// assert_eq!(m.column(1), vec![2.0, 5.0]);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Creates a matrix from a flat row-major buffer.
    ///
    /// # Errors
    ///
    /// Returns [`TensorError::LengthMismatch`] if `data.len() != rows * cols`.
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self, TensorError> {
        let expected = rows * cols;
        if data.len() != expected {
            return Err(TensorError::LengthMismatch {
                expected,
                got: data.len(),
            });
        }
        Ok(Self { rows, cols, data })
    }

    /// Creates a zero-filled matrix.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::filled(rows, cols, 0.0)
    }

    /// Creates a matrix with every entry set to `value`.
    pub fn filled(rows: usize, cols: usize, value: f64) -> Self {
        Self {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }

    /// Creates a single-column matrix from a vector.
    pub fn column_vector(values: Vec<f64>) -> Self {
        Self {
            rows: values.len(),
            cols: 1,
            data: values,
        }
    }

    /// Creates a matrix from nested rows.
    ///
    /// # Errors
    ///
    /// Returns [`TensorError::Ragged`] if rows differ in length.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, TensorError> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (position, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(TensorError::Ragged {
                    axis: "column",
                    expected: cols,
                    got: row.len(),
                    position,
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }

    /// Returns the number of rows.
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Returns the number of columns.
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Returns `(rows, cols)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Returns `true` if the matrix holds no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the flat row-major buffer.
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Returns the flat row-major buffer mutably.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Consumes the matrix and returns its buffer.
    #[inline]
    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    /// Returns the entry at `(row, col)`.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    /// Sets the entry at `(row, col)`.
    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.cols + col] = value;
    }

    /// Returns one row as a slice.
    #[inline]
    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// Returns one row as a mutable slice.
    #[inline]
    pub fn row_mut(&mut self, row: usize) -> &mut [f64] {
        &mut self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// Copies one column into a new vector.
    pub fn column(&self, col: usize) -> Vec<f64> {
        (0..self.rows).map(|r| self.get(r, col)).collect()
    }

    /// Returns nested rows.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        (0..self.rows).map(|r| self.row(r).to_vec()).collect()
    }

    /// Keeps the first `n` columns (all columns if `n >= cols`).
    pub fn truncate_cols(&self, n: usize) -> Self {
        let cols = n.min(self.cols);
        let mut data = Vec::with_capacity(self.rows * cols);
        for r in 0..self.rows {
            data.extend_from_slice(&self.row(r)[..cols]);
        }
        Self {
            rows: self.rows,
            cols,
            data,
        }
    }

    /// Gathers the given columns, in order, into a new matrix.
    ///
    /// # Errors
    ///
    /// Returns [`TensorError::IndexOutOfRange`] for an index `>= cols`.
    pub fn select_columns(&self, indices: &[usize]) -> Result<Self, TensorError> {
        if let Some(&index) = indices.iter().find(|&&i| i >= self.cols) {
            return Err(TensorError::IndexOutOfRange {
                axis: "column",
                index,
                len: self.cols,
            });
        }
        let mut data = Vec::with_capacity(self.rows * indices.len());
        for r in 0..self.rows {
            let row = self.row(r);
            data.extend(indices.iter().map(|&c| row[c]));
        }
        Ok(Self {
            rows: self.rows,
            cols: indices.len(),
            data,
        })
    }

    /// Copies a contiguous range of rows. The range is clipped to the matrix.
    pub fn select_rows(&self, range: Range<usize>) -> Self {
        let end = range.end.min(self.rows);
        let start = range.start.min(end);
        Self {
            rows: end - start,
            cols: self.cols,
            data: self.data[start * self.cols..end * self.cols].to_vec(),
        }
    }

    /// Gathers the given rows, in order, into a new matrix.
    ///
    /// # Errors
    ///
    /// Returns [`TensorError::IndexOutOfRange`] for an index `>= rows`.
    pub fn gather_rows(&self, indices: &[usize]) -> Result<Self, TensorError> {
        let mut data = Vec::with_capacity(indices.len() * self.cols);
        for &index in indices {
            if index >= self.rows {
                return Err(TensorError::IndexOutOfRange {
                    axis: "row",
                    index,
                    len: self.rows,
                });
            }
            data.extend_from_slice(self.row(index));
        }
        Ok(Self {
            rows: indices.len(),
            cols: self.cols,
            data,
        })
    }

    /// Returns a copy with a constant column inserted in front.
    pub fn prepend_column(&self, value: f64) -> Self {
        let cols = self.cols + 1;
        let mut data = Vec::with_capacity(self.rows * cols);
        for r in 0..self.rows {
            data.push(value);
            data.extend_from_slice(self.row(r));
        }
        Self {
            rows: self.rows,
            cols,
            data,
        }
    }
}

/// Three-dimensional path tensor (path × time × feature).
///
/// Holds the feature representation (typically log-signatures) of each
/// simulated path at each time point. The time axis has length
/// `n_steps + 1`.
///
/// # Examples
///
/// ```rust
/// use stopping_core::types::PathTensor;
///
/// let nested = vec![
///     vec![vec![1.0, 0.0], vec![1.0, 0.5], vec![1.0, 0.7]],
///     vec![vec![1.0, 0.0], vec![1.0, -0.5], vec![1.0, -0.2]],
/// ];
/// let features = PathTensor::from_nested(&nested).unwrap();
/// assert_eq!((features.n_paths(), features.n_times(), features.n_features()), (2, 3, 2));
///
/// let at_t1 = features.time_slice(1).unwrap();
/// assert_eq!(at_t1.column(1), vec![0.5, -0.5]);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PathTensor {
    paths: usize,
    times: usize,
    features: usize,
    data: Vec<f64>,
}

impl PathTensor {
    /// Creates a tensor from a flat row-major buffer.
    ///
    /// # Errors
    ///
    /// Returns [`TensorError::LengthMismatch`] if the buffer length is not
    /// `paths * times * features`.
    pub fn new(
        paths: usize,
        times: usize,
        features: usize,
        data: Vec<f64>,
    ) -> Result<Self, TensorError> {
        let expected = paths * times * features;
        if data.len() != expected {
            return Err(TensorError::LengthMismatch {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            paths,
            times,
            features,
            data,
        })
    }

    /// Creates a zero-filled tensor.
    pub fn zeros(paths: usize, times: usize, features: usize) -> Self {
        Self {
            paths,
            times,
            features,
            data: vec![0.0; paths * times * features],
        }
    }

    /// Creates a tensor from nested `[path][time][feature]` vectors.
    ///
    /// # Errors
    ///
    /// Returns [`TensorError::Ragged`] if the time or feature axis is ragged.
    pub fn from_nested(nested: &[Vec<Vec<f64>>]) -> Result<Self, TensorError> {
        let times = nested.first().map_or(0, Vec::len);
        let features = nested
            .first()
            .and_then(|path| path.first())
            .map_or(0, Vec::len);
        let mut data = Vec::with_capacity(nested.len() * times * features);
        for (position, path) in nested.iter().enumerate() {
            if path.len() != times {
                return Err(TensorError::Ragged {
                    axis: "time",
                    expected: times,
                    got: path.len(),
                    position,
                });
            }
            for (t, point) in path.iter().enumerate() {
                if point.len() != features {
                    return Err(TensorError::Ragged {
                        axis: "feature",
                        expected: features,
                        got: point.len(),
                        position: position * times + t,
                    });
                }
                data.extend_from_slice(point);
            }
        }
        Ok(Self {
            paths: nested.len(),
            times,
            features,
            data,
        })
    }

    /// Returns the number of paths.
    #[inline]
    pub fn n_paths(&self) -> usize {
        self.paths
    }

    /// Returns the number of time points (`n_steps + 1`).
    #[inline]
    pub fn n_times(&self) -> usize {
        self.times
    }

    /// Returns the number of simulation steps (`n_times - 1`).
    #[inline]
    pub fn n_steps(&self) -> usize {
        self.times.saturating_sub(1)
    }

    /// Returns the feature dimension.
    #[inline]
    pub fn n_features(&self) -> usize {
        self.features
    }

    /// Returns the flat row-major buffer.
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Returns the value at `(path, time, feature)`.
    #[inline]
    pub fn get(&self, path: usize, time: usize, feature: usize) -> f64 {
        self.data[(path * self.times + time) * self.features + feature]
    }

    /// Returns the contiguous `times × features` block of one path.
    #[inline]
    pub fn path_sequence(&self, path: usize) -> &[f64] {
        let block = self.times * self.features;
        &self.data[path * block..(path + 1) * block]
    }

    /// Extracts the `paths × features` matrix at one time point.
    ///
    /// # Errors
    ///
    /// Returns [`TensorError::IndexOutOfRange`] if `time >= n_times`.
    pub fn time_slice(&self, time: usize) -> Result<Matrix, TensorError> {
        let all: Vec<usize> = (0..self.paths).collect();
        self.gather(&all, time)
    }

    /// Extracts the features of the given paths at one time point.
    ///
    /// # Errors
    ///
    /// Returns [`TensorError::IndexOutOfRange`] if `time` or a path index is
    /// out of range.
    pub fn gather(&self, paths: &[usize], time: usize) -> Result<Matrix, TensorError> {
        if time >= self.times {
            return Err(TensorError::IndexOutOfRange {
                axis: "time",
                index: time,
                len: self.times,
            });
        }
        let mut data = Vec::with_capacity(paths.len() * self.features);
        for &path in paths {
            if path >= self.paths {
                return Err(TensorError::IndexOutOfRange {
                    axis: "path",
                    index: path,
                    len: self.paths,
                });
            }
            let start = (path * self.times + time) * self.features;
            data.extend_from_slice(&self.data[start..start + self.features]);
        }
        Matrix::new(paths.len(), self.features, data)
    }

    /// Gathers the given time points, in order, into a new tensor.
    ///
    /// # Errors
    ///
    /// Returns [`TensorError::IndexOutOfRange`] for an index `>= n_times`.
    pub fn select_times(&self, times: &[usize]) -> Result<Self, TensorError> {
        if let Some(&index) = times.iter().find(|&&t| t >= self.times) {
            return Err(TensorError::IndexOutOfRange {
                axis: "time",
                index,
                len: self.times,
            });
        }
        let mut data = Vec::with_capacity(self.paths * times.len() * self.features);
        for path in 0..self.paths {
            for &t in times {
                let start = (path * self.times + t) * self.features;
                data.extend_from_slice(&self.data[start..start + self.features]);
            }
        }
        Ok(Self {
            paths: self.paths,
            times: times.len(),
            features: self.features,
            data,
        })
    }

    /// Copies a contiguous range of paths. The range is clipped to the tensor.
    pub fn select_paths(&self, range: Range<usize>) -> Self {
        let end = range.end.min(self.paths);
        let start = range.start.min(end);
        let block = self.times * self.features;
        Self {
            paths: end - start,
            times: self.times,
            features: self.features,
            data: self.data[start * block..end * block].to_vec(),
        }
    }

    /// Gathers the given paths, in order, into a new tensor.
    ///
    /// # Errors
    ///
    /// Returns [`TensorError::IndexOutOfRange`] for an index `>= n_paths`.
    pub fn gather_paths(&self, paths: &[usize]) -> Result<Self, TensorError> {
        let block = self.times * self.features;
        let mut data = Vec::with_capacity(paths.len() * block);
        for &path in paths {
            if path >= self.paths {
                return Err(TensorError::IndexOutOfRange {
                    axis: "path",
                    index: path,
                    len: self.paths,
                });
            }
            data.extend_from_slice(self.path_sequence(path));
        }
        Ok(Self {
            paths: paths.len(),
            times: self.times,
            features: self.features,
            data,
        })
    }

    /// Views the tensor as a `(paths * times) × features` matrix.
    ///
    /// Rows are ordered path-major, so rows `p * n_times .. (p + 1) * n_times`
    /// hold the sequence of path `p`.
    pub fn to_row_matrix(&self) -> Matrix {
        Matrix {
            rows: self.paths * self.times,
            cols: self.features,
            data: self.data.clone(),
        }
    }
}
