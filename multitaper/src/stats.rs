//! Scalar reductions and distribution quantiles shared by the estimators.

use crate::kernel::EstimateError;
use num_traits::Float;
use statrs::distribution::{ContinuousCDF, FisherSnedecor, StudentsT};

/// Arithmetic mean. Returns zero for an empty slice.
pub fn mean<F: Float>(xs: &[F]) -> F {
    let (sum, count) = xs
        .iter()
        .fold((F::zero(), F::zero()), |(s, c), &v| (s + v, c + F::one()));
    if count > F::zero() {
        sum / count
    } else {
        F::zero()
    }
}

/// Biased (population) variance, the broadband noise proxy used by the
/// adaptive weighting iteration.
pub fn variance<F: Float>(xs: &[F]) -> F {
    if xs.is_empty() {
        return F::zero();
    }
    let m = mean(xs);
    let (sum, count) = xs.iter().fold((F::zero(), F::zero()), |(s, c), &v| {
        let d = v - m;
        (s + d * d, c + F::one())
    });
    sum / count
}

/// Copy of `xs` with its arithmetic mean removed.
pub fn demean(xs: &[f64]) -> Vec<f64> {
    let m = mean(xs);
    xs.iter().map(|&v| v - m).collect()
}

/// Quantile of the standard Student-t distribution with `dof` degrees of
/// freedom.
pub fn student_t_quantile(dof: f64, p: f64) -> Result<f64, EstimateError> {
    let dist = StudentsT::new(0.0, 1.0, dof).map_err(|_| EstimateError::NumericalDegeneracy {
        stage: "Student-t quantile",
    })?;
    Ok(dist.inverse_cdf(p))
}

/// Quantile of the F-distribution with `(d1, d2)` degrees of freedom.
pub fn fisher_f_quantile(d1: f64, d2: f64, p: f64) -> Result<f64, EstimateError> {
    let dist = FisherSnedecor::new(d1, d2).map_err(|_| EstimateError::NumericalDegeneracy {
        stage: "F quantile",
    })?;
    Ok(dist.inverse_cdf(p))
}
