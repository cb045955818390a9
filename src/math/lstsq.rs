//! Weighted least squares via Householder QR.
//!
//! All three inversions reduce to `argmin_x ||W(Gx - d)||₂` with a diagonal
//! `W`. Callers weight the rows themselves (see [`weight_rows`]) and hand the
//! weighted system to [`solve_qr`]. When the upper-triangular factor is
//! requested it can be turned into per-parameter standard deviations with
//! [`parameter_uncertainty`], which only materializes the diagonal of
//! `(RᵀR)⁻¹ = R⁻¹R⁻ᵀ`.

use nalgebra::{DMatrix, DVector};

use crate::error::{InversionError, InversionResult};

/// Memory order of a flat input matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixLayout {
    RowMajor,
    ColumnMajor,
}

/// Solution of a (possibly multi right-hand side) least-squares problem.
#[derive(Debug, Clone)]
pub struct LeastSquares {
    /// `n x nrhs` solution.
    pub x: DMatrix<f64>,
    /// `n x n` upper-triangular factor, present only when requested.
    pub r: Option<DMatrix<f64>>,
}

/// Build a dense matrix from a flat slice in either layout.
///
/// Both layouts end up in nalgebra's column-major storage, so the solver only
/// ever sees one convention.
pub fn dense_from_slice(
    layout: MatrixLayout,
    rows: usize,
    cols: usize,
    data: &[f64],
) -> InversionResult<DMatrix<f64>> {
    if data.len() != rows * cols {
        return Err(InversionError::InvalidInput(format!(
            "matrix data has {} entries, expected {rows} x {cols}",
            data.len()
        )));
    }
    Ok(match layout {
        MatrixLayout::RowMajor => DMatrix::from_row_slice(rows, cols, data),
        MatrixLayout::ColumnMajor => DMatrix::from_column_slice(rows, cols, data),
    })
}

/// Solve `min ||A X - B||` column by column with a QR factorization of `A`.
///
/// Requires `m >= n >= 1` and at least one right-hand side. A zero (or
/// numerically zero) diagonal entry of `R` is reported as a solver failure
/// rather than producing a minimum-norm answer.
pub fn solve_qr(a: &DMatrix<f64>, b: &DMatrix<f64>, want_r: bool) -> InversionResult<LeastSquares> {
    let (m, n) = a.shape();
    let nrhs = b.ncols();
    if m < 1 || n < 1 || nrhs < 1 {
        return Err(InversionError::InvalidInput(format!(
            "least squares needs m, n, nrhs >= 1 (got {m}, {n}, {nrhs})"
        )));
    }
    if b.nrows() != m {
        return Err(InversionError::InvalidInput(format!(
            "right-hand side has {} rows, matrix has {m}",
            b.nrows()
        )));
    }
    if m < n {
        return Err(InversionError::InvalidInput(format!(
            "least squares system is underdetermined ({m} rows < {n} columns)"
        )));
    }
    if a.iter().chain(b.iter()).any(|v| !v.is_finite()) {
        return Err(InversionError::Solver("non-finite entry in system".to_string()));
    }

    let qr = a.clone().qr();
    let r = qr.r();
    check_rank(&r)?;

    let mut qtb = b.clone();
    qr.q_tr_mul(&mut qtb);
    let top = qtb.rows(0, n).into_owned();
    let x = r
        .solve_upper_triangular(&top)
        .ok_or_else(|| InversionError::Solver("triangular solve failed".to_string()))?;
    if x.iter().any(|v| !v.is_finite()) {
        return Err(InversionError::Solver("non-finite solution".to_string()));
    }

    Ok(LeastSquares {
        x,
        r: want_r.then_some(r),
    })
}

/// Single right-hand side convenience wrapper around [`solve_qr`].
pub fn solve_qr_vector(
    a: &DMatrix<f64>,
    b: &DVector<f64>,
    want_r: bool,
) -> InversionResult<(DVector<f64>, Option<DMatrix<f64>>)> {
    let rhs = DMatrix::from_column_slice(b.len(), 1, b.as_slice());
    let LeastSquares { x, r } = solve_qr(a, &rhs, want_r)?;
    Ok((x.column(0).into_owned(), r))
}

fn check_rank(r: &DMatrix<f64>) -> InversionResult<()> {
    let n = r.ncols();
    let max_diag = (0..n).map(|i| r[(i, i)].abs()).fold(0.0_f64, f64::max);
    let tol = f64::EPSILON * max_diag * r.nrows().max(n) as f64;
    for i in 0..n {
        let rii = r[(i, i)].abs();
        if rii == 0.0 || rii <= tol {
            return Err(InversionError::Solver(format!(
                "matrix is rank deficient (R[{i},{i}] = {rii:e})"
            )));
        }
    }
    Ok(())
}

/// Per-parameter standard deviations `sqrt(diag(R⁻¹R⁻ᵀ))`.
///
/// Entry `i` is the norm of row `i` of `R⁻¹`.
pub fn parameter_uncertainty(r: &DMatrix<f64>) -> InversionResult<Vec<f64>> {
    let n = r.ncols();
    if r.nrows() != n || n == 0 {
        return Err(InversionError::InvalidInput(format!(
            "triangular factor must be square and non-empty (got {} x {n})",
            r.nrows()
        )));
    }
    let rinv = r
        .solve_upper_triangular(&DMatrix::identity(n, n))
        .ok_or_else(|| InversionError::Solver("triangular factor is singular".to_string()))?;
    Ok((0..n).map(|i| rinv.row(i).norm_squared().sqrt()).collect())
}

/// Multiply row `i` of `g` by `w[i]`.
pub fn weight_rows(g: &DMatrix<f64>, w: &[f64]) -> DMatrix<f64> {
    let mut out = g.clone();
    for (i, wi) in w.iter().enumerate().take(out.nrows()) {
        out.row_mut(i).scale_mut(*wi);
    }
    out
}

/// Element-wise `w ∘ d`.
pub fn weight_vector(d: &[f64], w: &[f64]) -> DVector<f64> {
    DVector::from_iterator(d.len(), d.iter().zip(w).map(|(di, wi)| di * wi))
}
