//! Exercise grids on the simulation time axis.
//!
//! An [`ExerciseGrid`] places `N1` exercise dates on a discretisation of `N`
//! simulation steps by even subdivision: index `j` sits at `floor(j * N / N1)`
//! for `j = 0..=N1`. Index 0 is time zero and is not an exercise date.
//!
//! Two lenient helpers are provided for the dual scheme, which tolerates a
//! mismatch between configured and data-derived step counts:
//! - [`clipped_grid_indices`]: same formula, never fails, clipped to `N`
//! - [`rule_indices`]: evenly spaced indices into the rule tensor, padded by
//!   repeating the last index when more dates are requested than points exist

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::error::GridError;

/// Strictly increasing exercise-date indices into the simulation time axis.
///
/// # Examples
///
/// ```rust
/// use stopping_core::types::ExerciseGrid;
///
/// let grid = ExerciseGrid::new(10, 4).unwrap();
/// assert_eq!(grid.indices(), &[0, 2, 5, 7, 10]);
/// assert_eq!(grid.n_exercise(), 4);
/// assert_eq!(grid.exercise_indices(), &[2, 5, 7, 10]);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExerciseGrid {
    n_steps: usize,
    indices: Vec<usize>,
}

impl ExerciseGrid {
    /// Creates a grid of `n_exercise` dates on `n_steps` simulation steps.
    ///
    /// # Errors
    ///
    /// Returns `GridError` if:
    /// - `n_steps` is 0
    /// - `n_exercise` is 0
    /// - `n_exercise > n_steps` (indices would repeat)
    pub fn new(n_steps: usize, n_exercise: usize) -> Result<Self, GridError> {
        if n_steps == 0 {
            return Err(GridError::NoSteps);
        }
        if n_exercise == 0 {
            return Err(GridError::NoExerciseDates);
        }
        if n_exercise > n_steps {
            return Err(GridError::TooManyExerciseDates {
                n_exercise,
                n_steps,
            });
        }
        let indices = (0..=n_exercise)
            .map(|j| j * n_steps / n_exercise)
            .collect();
        Ok(Self { n_steps, indices })
    }

    /// Returns all `N1 + 1` indices, starting at time zero.
    #[inline]
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Returns the `N1` exercise-date indices (time zero excluded).
    #[inline]
    pub fn exercise_indices(&self) -> &[usize] {
        &self.indices[1..]
    }

    /// Returns the number of exercise dates `N1`.
    #[inline]
    pub fn n_exercise(&self) -> usize {
        self.indices.len() - 1
    }

    /// Returns the number of simulation steps `N`.
    #[inline]
    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    /// Returns the calendar times of the grid: `linspace(0, horizon, N1 + 1)`.
    pub fn time_points(&self, horizon: f64) -> Vec<f64> {
        let n = self.n_exercise() as f64;
        (0..=self.n_exercise())
            .map(|j| horizon * j as f64 / n)
            .collect()
    }
}

/// Grid indices `floor(j * n_steps / n_exercise)` for `j = 0..=n_exercise`,
/// clipped to `n_steps`.
///
/// Unlike [`ExerciseGrid::new`] this never fails; repeated indices are kept
/// when `n_exercise > n_steps`, and `n_exercise == 0` yields `[0]`.
///
/// # Examples
///
/// ```rust
/// use stopping_core::types::clipped_grid_indices;
///
/// assert_eq!(clipped_grid_indices(4, 2), vec![0, 2, 4]);
/// assert_eq!(clipped_grid_indices(2, 4), vec![0, 0, 1, 1, 2]);
/// ```
pub fn clipped_grid_indices(n_steps: usize, n_exercise: usize) -> Vec<usize> {
    if n_exercise == 0 {
        return vec![0];
    }
    (0..=n_exercise)
        .map(|j| (j * n_steps / n_exercise).min(n_steps))
        .collect()
}

/// Selects `needed` indices into a rule tensor with `available` time points.
///
/// If `needed <= available` the indices are evenly spaced,
/// `floor(i * available / needed)` for `i in 0..needed`. Otherwise every
/// available index is used once and the last one, `available - 1`, is
/// repeated until `needed` indices exist. This over-resolved case is
/// degenerate but defined: duplicated indices do not change a maximum.
///
/// Returns an empty vector when `available == 0`.
///
/// # Examples
///
/// ```rust
/// use stopping_core::types::rule_indices;
///
/// assert_eq!(rule_indices(2, 4), vec![0, 2]);
/// assert_eq!(rule_indices(5, 3), vec![0, 1, 2, 2, 2]);
/// ```
pub fn rule_indices(needed: usize, available: usize) -> Vec<usize> {
    if available == 0 {
        return Vec::new();
    }
    if needed <= available {
        return (0..needed).map(|i| i * available / needed).collect();
    }
    let mut indices: Vec<usize> = (0..available).collect();
    indices.resize(needed, available - 1);
    indices
}
