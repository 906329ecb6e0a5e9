//! Thomson adaptive combination of eigenspectra.
//!
//! Fixed-point iteration over the per-frequency, per-taper weights
//! `d_k(f) = sqrt(lambda_k) S(f) / (lambda_k S(f) + (1 - lambda_k) sigma^2)`.
//! Non-convergence within the iteration budget is not an error; the last
//! iterate is returned with `converged = false`.

use crate::kernel::EstimateError;
use tracing::debug;

/// Adaptively weighted spectrum over the one-sided bins, in the raw
/// (two-sided, unscaled) units of the eigenspectrum powers.
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveSpectrum {
    /// Combined spectrum per bin.
    pub spectrum: Vec<f64>,
    /// Squared adaptive weights `d_k(f)^2`, one row per taper.
    pub weight_sq: Vec<Vec<f64>>,
    /// Effective degrees of freedom per bin.
    pub dof: Vec<f64>,
    /// False when the iteration budget ran out before the tolerance was met.
    pub converged: bool,
    /// Iterations actually performed.
    pub iterations: usize,
}

/// Combine per-taper one-sided powers into an adaptively weighted estimate.
///
/// `variance` is the broadband variance of the input series, the white-noise
/// level the weights shrink towards at low-power bins.
pub fn adaptive_spectrum(
    power: &[Vec<f64>],
    eigenvalues: &[f64],
    variance: f64,
    tolerance: f64,
    max_iterations: usize,
) -> Result<AdaptiveSpectrum, EstimateError> {
    let k = power.len();
    if k != eigenvalues.len() {
        return Err(EstimateError::LengthMismatch {
            arg: "eigenvalues",
            expected: k,
            got: eigenvalues.len(),
        });
    }
    let nf = power.first().map_or(0, Vec::len);
    if !variance.is_finite()
        || power
            .iter()
            .any(|row| row.iter().any(|v| !v.is_finite()))
    {
        return Err(EstimateError::NumericalDegeneracy {
            stage: "adaptive weighting input",
        });
    }

    // Single-taper degenerates to the plain eigenspectrum.
    if k == 1 {
        return Ok(AdaptiveSpectrum {
            spectrum: power[0].clone(),
            weight_sq: vec![vec![1.0; nf]],
            dof: vec![2.0; nf],
            converged: true,
            iterations: 0,
        });
    }

    // Initial estimate: equal-weight average of the two best-concentrated
    // eigenspectra.
    let mut spectrum: Vec<f64> = (0..nf)
        .map(|j| 0.5 * (power[0][j] + power[1][j]))
        .collect();

    let mut converged = false;
    let mut iterations = 0;
    for it in 1..=max_iterations {
        let mut max_rel: f64 = 0.0;
        let next: Vec<f64> = (0..nf)
            .map(|j| {
                let (num, den) = weighted_sums(power, eigenvalues, variance, spectrum[j], j);
                let updated = if den > 0.0 { num / den } else { spectrum[j] };
                let rel = (updated - spectrum[j]).abs() / updated.abs().max(f64::MIN_POSITIVE);
                max_rel = max_rel.max(rel);
                updated
            })
            .collect();
        spectrum = next;
        iterations = it;
        if !max_rel.is_finite() {
            return Err(EstimateError::NumericalDegeneracy {
                stage: "adaptive weighting iteration",
            });
        }
        if max_rel < tolerance {
            converged = true;
            break;
        }
    }
    if !converged {
        debug!("adaptive weighting stopped at the {max_iterations}-iteration budget");
    }

    // Final weights and effective degrees of freedom from the settled
    // spectrum.
    let mut weight_sq = vec![vec![0.0; nf]; k];
    let mut dof = vec![0.0; nf];
    for j in 0..nf {
        let mut sum_d2 = 0.0;
        let mut sum_d4 = 0.0;
        for (ki, &lambda) in eigenvalues.iter().enumerate() {
            let d = weight(lambda, variance, spectrum[j]);
            let d2 = d * d;
            weight_sq[ki][j] = d2;
            sum_d2 += d2;
            sum_d4 += d2 * d2;
        }
        dof[j] = if sum_d4 > 0.0 {
            2.0 * sum_d2 * sum_d2 / sum_d4
        } else {
            2.0
        };
    }

    Ok(AdaptiveSpectrum {
        spectrum,
        weight_sq,
        dof,
        converged,
        iterations,
    })
}

fn weight(lambda: f64, variance: f64, s: f64) -> f64 {
    let den = (lambda * s + (1.0 - lambda) * variance).max(f64::MIN_POSITIVE);
    lambda.sqrt() * s / den
}

fn weighted_sums(
    power: &[Vec<f64>],
    eigenvalues: &[f64],
    variance: f64,
    s: f64,
    j: usize,
) -> (f64, f64) {
    let mut num = 0.0;
    let mut den = 0.0;
    for (row, &lambda) in power.iter().zip(eigenvalues.iter()) {
        let d = weight(lambda, variance, s);
        let d2 = d * d;
        num += d2 * row[j];
        den += d2;
    }
    (num, den)
}
