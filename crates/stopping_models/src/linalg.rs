//! Dense row-major kernels shared by the layers.
//!
//! Kernels are stored `fan_in × fan_out`, so a forward pass is `x · W`.

use stopping_core::types::Matrix;

/// Computes `x · w` for `x: rows × k` and `w: k × n`.
pub fn matmul(x: &Matrix, w: &[f64], n: usize) -> Matrix {
    let (rows, k) = x.shape();
    debug_assert_eq!(w.len(), k * n);
    let mut out = Matrix::zeros(rows, n);
    for r in 0..rows {
        let x_row = x.row(r);
        let out_row = out.row_mut(r);
        for (i, &xi) in x_row.iter().enumerate() {
            if xi == 0.0 {
                continue;
            }
            let w_row = &w[i * n..(i + 1) * n];
            for (o, &wij) in out_row.iter_mut().zip(w_row) {
                *o += xi * wij;
            }
        }
    }
    out
}

/// Computes `dy · wᵀ` for `dy: rows × n` and `w: k × n`.
pub fn matmul_transposed(dy: &Matrix, w: &[f64], k: usize) -> Matrix {
    let (rows, n) = dy.shape();
    debug_assert_eq!(w.len(), k * n);
    let mut out = Matrix::zeros(rows, k);
    for r in 0..rows {
        let dy_row = dy.row(r);
        let out_row = out.row_mut(r);
        for (i, o) in out_row.iter_mut().enumerate() {
            let w_row = &w[i * n..(i + 1) * n];
            *o = dy_row.iter().zip(w_row).map(|(a, b)| a * b).sum();
        }
    }
    out
}

/// Accumulates `xᵀ · dy` into `grad` (`k × n`).
pub fn accumulate_outer(x: &Matrix, dy: &Matrix, grad: &mut [f64]) {
    let k = x.cols();
    let n = dy.cols();
    debug_assert_eq!(grad.len(), k * n);
    for r in 0..x.rows() {
        let x_row = x.row(r);
        let dy_row = dy.row(r);
        for (i, &xi) in x_row.iter().enumerate() {
            if xi == 0.0 {
                continue;
            }
            let g_row = &mut grad[i * n..(i + 1) * n];
            for (g, &d) in g_row.iter_mut().zip(dy_row) {
                *g += xi * d;
            }
        }
    }
}

/// Adds `bias` to every row of `y`.
pub fn add_bias(y: &mut Matrix, bias: &[f64]) {
    for r in 0..y.rows() {
        for (v, b) in y.row_mut(r).iter_mut().zip(bias) {
            *v += b;
        }
    }
}

/// Accumulates the column sums of `dy` into `grad`.
pub fn accumulate_column_sums(dy: &Matrix, grad: &mut [f64]) {
    for r in 0..dy.rows() {
        for (g, d) in grad.iter_mut().zip(dy.row(r)) {
            *g += d;
        }
    }
}

/// Numerically stable softmax over `values`, in place.
pub fn softmax_in_place(values: &mut [f64]) {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return;
    }
    let mut total = 0.0;
    for v in values.iter_mut() {
        *v = (*v - max).exp();
        total += *v;
    }
    for v in values.iter_mut() {
        *v /= total;
    }
}
