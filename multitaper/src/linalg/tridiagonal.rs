//! Symmetric tridiagonal eigensolver.
//!
//! Extracts the largest eigenpairs of a symmetric tridiagonal matrix by
//! Sturm-sequence bisection followed by inverse iteration, the combination
//! that stays accurate for the tightly clustered spectra produced by Slepian
//! taper generation. Only the top `k` pairs are computed; the rest of the
//! spectrum is never touched.

use crate::kernel::{ConfigError, EstimateError};
use tracing::trace;

const BISECT_MAX_ITER: usize = 256;
const INVIT_MAX_ITER: usize = 16;

/// Top eigenpairs of a symmetric tridiagonal matrix.
///
/// `values` are in descending order and `vectors[j]` is the unit-norm
/// eigenvector paired with `values[j]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TopEigen {
    /// Eigenvalues, descending.
    pub values: Vec<f64>,
    /// Unit-norm eigenvectors, one row per eigenvalue.
    pub vectors: Vec<Vec<f64>>,
}

/// Compute the `k` largest eigenpairs of the symmetric tridiagonal matrix
/// with diagonal `diag` and off-diagonal `off`.
pub fn top_eigenpairs(diag: &[f64], off: &[f64], k: usize) -> Result<TopEigen, EstimateError> {
    let n = diag.len();
    if n == 0 {
        return Err(ConfigError::EmptyInput { arg: "diag" }.into());
    }
    if off.len() + 1 != n {
        return Err(EstimateError::LengthMismatch {
            arg: "off",
            expected: n - 1,
            got: off.len(),
        });
    }
    if k == 0 || k > n {
        return Err(ConfigError::InvalidParameter {
            arg: "k",
            reason: "must satisfy 1 <= k <= n",
        }
        .into());
    }

    // Gershgorin bracket for the whole spectrum.
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for i in 0..n {
        let mut r = 0.0;
        if i > 0 {
            r += off[i - 1].abs();
        }
        if i < n - 1 {
            r += off[i].abs();
        }
        lo = lo.min(diag[i] - r);
        hi = hi.max(diag[i] + r);
    }
    let anorm = lo.abs().max(hi.abs()).max(1.0);
    let pivmin = (anorm * f64::EPSILON * f64::EPSILON).max(f64::MIN_POSITIVE);
    let margin = 2.0 * anorm * f64::EPSILON + pivmin;
    lo -= margin;
    hi += margin;

    let mut values = Vec::with_capacity(k);
    let mut vectors: Vec<Vec<f64>> = Vec::with_capacity(k);
    for j in 0..k {
        // Ascending index of the (j+1)-th largest eigenvalue.
        let idx = n - 1 - j;
        let lambda = bisect_eigenvalue(diag, off, idx, lo, hi, pivmin)?;
        let vector = inverse_iteration(diag, off, lambda, j, &vectors, pivmin, anorm)?;
        values.push(lambda);
        vectors.push(vector);
    }
    Ok(TopEigen { values, vectors })
}

/// Number of eigenvalues strictly below `x`, from the signs of the Sturm
/// sequence of leading-minor pivots.
fn sturm_count(diag: &[f64], off: &[f64], x: f64, pivmin: f64) -> usize {
    let mut q = diag[0] - x;
    let mut count = usize::from(q < 0.0);
    for i in 1..diag.len() {
        q = diag[i] - x - off[i - 1] * off[i - 1] / guard(q, pivmin);
        if q < 0.0 {
            count += 1;
        }
    }
    count
}

/// Bisect for the eigenvalue with ascending index `idx`.
fn bisect_eigenvalue(
    diag: &[f64],
    off: &[f64],
    idx: usize,
    mut lo: f64,
    mut hi: f64,
    pivmin: f64,
) -> Result<f64, EstimateError> {
    for it in 0..BISECT_MAX_ITER {
        let mid = 0.5 * (lo + hi);
        if hi - lo <= f64::EPSILON * lo.abs().max(hi.abs()).max(1.0) {
            trace!("tridiagonal bisection for index {idx} settled after {it} iterations");
            return Ok(mid);
        }
        if sturm_count(diag, off, mid, pivmin) > idx {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    Err(EstimateError::Convergence {
        stage: "tridiagonal bisection",
        iterations: BISECT_MAX_ITER,
    })
}

/// Inverse iteration for the eigenvector of `lambda`, reorthogonalized
/// against previously accepted vectors so that clustered eigenvalues still
/// yield an orthonormal set.
fn inverse_iteration(
    diag: &[f64],
    off: &[f64],
    lambda: f64,
    order: usize,
    prior: &[Vec<f64>],
    pivmin: f64,
    anorm: f64,
) -> Result<Vec<f64>, EstimateError> {
    let n = diag.len();
    let mut v = sinusoid_seed(n, order);
    orthogonalize(&mut v, prior);
    if normalize(&mut v).is_none() {
        // Seed degenerated against the prior subspace; fall back to a
        // detuned seed before giving up.
        v = sinusoid_seed(n, order + prior.len() + 1);
        orthogonalize(&mut v, prior);
        normalize(&mut v).ok_or(EstimateError::NumericalDegeneracy {
            stage: "inverse iteration seeding",
        })?;
    }

    for _ in 0..INVIT_MAX_ITER {
        let mut w = v.clone();
        solve_shifted(diag, off, lambda, pivmin, &mut w);
        orthogonalize(&mut w, prior);
        let norm = normalize(&mut w);
        if norm.is_none() {
            return Err(EstimateError::NumericalDegeneracy {
                stage: "inverse iteration",
            });
        }
        let overlap: f64 = w.iter().zip(v.iter()).map(|(a, b)| a * b).sum();
        v = w;
        if (1.0 - overlap.abs()) < 1e-13 {
            break;
        }
    }

    // Accept only if the pair actually satisfies the eigen equation.
    let mut resid: f64 = 0.0;
    for i in 0..n {
        let mut t = (diag[i] - lambda) * v[i];
        if i > 0 {
            t += off[i - 1] * v[i - 1];
        }
        if i < n - 1 {
            t += off[i] * v[i + 1];
        }
        resid = resid.max(t.abs());
    }
    if resid > 1e-9 * anorm {
        return Err(EstimateError::Convergence {
            stage: "tridiagonal inverse iteration",
            iterations: INVIT_MAX_ITER,
        });
    }
    Ok(v)
}

/// Solve `(T - shift I) x = rhs` in place with partial pivoting. Fill-in is
/// confined to a second superdiagonal.
fn solve_shifted(diag: &[f64], off: &[f64], shift: f64, pivmin: f64, rhs: &mut [f64]) {
    let n = diag.len();
    let mut a: Vec<f64> = diag.iter().map(|v| v - shift).collect();
    if n == 1 {
        rhs[0] /= guard(a[0], pivmin);
        return;
    }
    let mut b = vec![0.0; n];
    b[..n - 1].copy_from_slice(off);
    let mut c = vec![0.0; n];

    for i in 0..n - 1 {
        let sub = off[i];
        if sub.abs() > a[i].abs() {
            let (pa, pb, pc) = (a[i], b[i], c[i]);
            a[i] = sub;
            b[i] = a[i + 1];
            c[i] = b[i + 1];
            a[i + 1] = pb;
            b[i + 1] = pc;
            rhs.swap(i, i + 1);
            let m = pa / guard(a[i], pivmin);
            a[i + 1] -= m * b[i];
            b[i + 1] -= m * c[i];
            rhs[i + 1] -= m * rhs[i];
        } else {
            let m = sub / guard(a[i], pivmin);
            a[i + 1] -= m * b[i];
            b[i + 1] -= m * c[i];
            rhs[i + 1] -= m * rhs[i];
        }
    }

    rhs[n - 1] /= guard(a[n - 1], pivmin);
    rhs[n - 2] = (rhs[n - 2] - b[n - 2] * rhs[n - 1]) / guard(a[n - 2], pivmin);
    for i in (0..n - 2).rev() {
        rhs[i] = (rhs[i] - b[i] * rhs[i + 1] - c[i] * rhs[i + 2]) / guard(a[i], pivmin);
    }
}

fn guard(x: f64, pivmin: f64) -> f64 {
    if x.abs() < pivmin {
        if x < 0.0 {
            -pivmin
        } else {
            pivmin
        }
    } else {
        x
    }
}

fn sinusoid_seed(n: usize, order: usize) -> Vec<f64> {
    let step = core::f64::consts::PI * (order + 1) as f64 / (n + 1) as f64;
    (0..n).map(|i| (step * (i + 1) as f64).sin()).collect()
}

fn orthogonalize(v: &mut [f64], prior: &[Vec<f64>]) {
    for p in prior {
        let dot: f64 = v.iter().zip(p.iter()).map(|(a, b)| a * b).sum();
        for (vi, pi) in v.iter_mut().zip(p.iter()) {
            *vi -= dot * pi;
        }
    }
}

fn normalize(v: &mut [f64]) -> Option<f64> {
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if !norm.is_finite() || norm < 1e-12 {
        return None;
    }
    for x in v.iter_mut() {
        *x /= norm;
    }
    Some(norm)
}
