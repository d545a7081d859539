//! Discounting between exercise dates.
//!
//! Backward induction discounts continuation values by a constant factor
//! `exp(-r * T / (N1 + 1))` per exercise date, and realised test payoffs are
//! discounted by the same factor raised to the exercise-date offset.

/// Per-date discount factor `exp(-rate * horizon / (n_exercise + 1))`.
///
/// # Examples
///
/// ```rust
/// use stopping_core::math::discount_factor_per_date;
///
/// let d = discount_factor_per_date(0.05, 1.0, 9);
/// assert!((d - (-0.005_f64).exp()).abs() < 1e-15);
/// ```
#[inline]
pub fn discount_factor_per_date(rate: f64, horizon: f64, n_exercise: usize) -> f64 {
    (-rate * horizon / (n_exercise as f64 + 1.0)).exp()
}

/// Powers `factor^0, factor^1, .., factor^(n-1)`.
///
/// # Examples
///
/// ```rust
/// use stopping_core::math::discount_powers;
///
/// assert_eq!(discount_powers(0.5, 3), vec![1.0, 0.5, 0.25]);
/// ```
pub fn discount_powers(factor: f64, n: usize) -> Vec<f64> {
    let mut powers = Vec::with_capacity(n);
    let mut current = 1.0;
    for _ in 0..n {
        powers.push(current);
        current *= factor;
    }
    powers
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_zero_rate_is_undiscounted() {
        assert_eq!(discount_factor_per_date(0.0, 3.0, 5), 1.0);
    }

    #[test]
    fn test_powers_match_powi() {
        let d = discount_factor_per_date(0.1, 2.0, 4);
        let powers = discount_powers(d, 5);
        for (k, p) in powers.iter().enumerate() {
            assert_relative_eq!(*p, d.powi(k as i32), epsilon = 1e-15);
        }
    }
}
