//! Delete-one-taper jackknife confidence intervals.
//!
//! Leave-one-out variants of the adaptively weighted spectrum give a
//! per-frequency variance of `ln S(f)`; the log transform stabilizes the
//! variance and keeps both bounds positive.

use crate::kernel::EstimateError;
use crate::stats::student_t_quantile;

/// Multiplicative confidence bounds around a PSD estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct JackknifeBounds {
    /// Lower confidence bound per bin.
    pub lower: Vec<f64>,
    /// Upper confidence bound per bin.
    pub upper: Vec<f64>,
}

/// Jackknife bounds at coverage `probability`, centered on `spectrum`.
///
/// `power` and `weight_sq` are the per-taper one-sided powers and the settled
/// squared adaptive weights; `spectrum` is the estimate the bounds bracket
/// (already on the caller's output scale). With `K` tapers the half-width
/// uses the Student-t quantile at `K - 1` degrees of freedom.
pub fn jackknife_bounds(
    power: &[Vec<f64>],
    weight_sq: &[Vec<f64>],
    spectrum: &[f64],
    probability: f64,
) -> Result<JackknifeBounds, EstimateError> {
    let k = power.len();
    if k < 2 {
        return Err(EstimateError::InsufficientTapers {
            required: 2,
            got: k,
        });
    }
    if weight_sq.len() != k {
        return Err(EstimateError::LengthMismatch {
            arg: "weight_sq",
            expected: k,
            got: weight_sq.len(),
        });
    }

    let quantile = student_t_quantile((k - 1) as f64, 0.5 * (1.0 + probability))?;
    let nf = spectrum.len();
    let mut lower = vec![0.0; nf];
    let mut upper = vec![0.0; nf];
    let mut logs = vec![0.0; k];

    for j in 0..nf {
        for (del, log_slot) in logs.iter_mut().enumerate() {
            let mut num = 0.0;
            let mut den = 0.0;
            for ki in 0..k {
                if ki == del {
                    continue;
                }
                num += weight_sq[ki][j] * power[ki][j];
                den += weight_sq[ki][j];
            }
            let deleted = if den > 0.0 { num / den } else { 0.0 };
            *log_slot = deleted.max(f64::MIN_POSITIVE).ln();
        }
        let mean = logs.iter().sum::<f64>() / k as f64;
        let var = logs.iter().map(|l| (l - mean) * (l - mean)).sum::<f64>() * (k - 1) as f64
            / k as f64;
        let half_width = quantile * var.sqrt();
        if !half_width.is_finite() {
            return Err(EstimateError::NumericalDegeneracy {
                stage: "jackknife variance",
            });
        }
        lower[j] = spectrum[j] * (-half_width).exp();
        upper[j] = spectrum[j] * half_width.exp();
    }

    Ok(JackknifeBounds { lower, upper })
}
