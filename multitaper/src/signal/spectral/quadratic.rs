//! Derivative-corrected (quadratic) spectrum.
//!
//! Higher-order tapers concentrate their energy progressively further from
//! the center of the analysis band, so the trend of eigenspectrum power
//! across taper order carries local curvature information. A least-squares
//! line through the per-order powers, against each order's squared band
//! offset, estimates the second derivative of the true spectrum; the
//! adaptive estimate is then corrected for the squared-curvature bias it
//! picks up at line features.

use crate::kernel::EstimateError;
use nalgebra::{Matrix2, Vector2};

/// Fraction of the uncorrected power the corrected estimate may not drop
/// below. Keeps the output positive when the curvature estimate is noisy.
const CORRECTION_FLOOR: f64 = 1e-3;

/// Apply the curvature correction to an adaptively weighted spectrum.
///
/// `bandwidth` is the full concentration bandwidth `2 NW / (N dt)` in Hz.
pub fn quadratic_spectrum(
    spectrum: &[f64],
    power: &[Vec<f64>],
    bandwidth: f64,
) -> Result<Vec<f64>, EstimateError> {
    let k = power.len();
    if k < 2 {
        return Err(EstimateError::InsufficientTapers {
            required: 2,
            got: k,
        });
    }

    // Squared band offset sampled by each taper order.
    let half = bandwidth / 2.0;
    let moments: Vec<f64> = (0..k)
        .map(|ki| {
            let u = (ki as f64 + 0.5) / k as f64;
            half * half * u * u
        })
        .collect();

    // Normal equations for the straight-line fit are shared by every bin.
    let sum_mu: f64 = moments.iter().sum();
    let sum_mu2: f64 = moments.iter().map(|m| m * m).sum();
    let normal = Matrix2::new(k as f64, sum_mu, sum_mu, sum_mu2);
    let lu = normal.lu();

    let nf = spectrum.len();
    let mut corrected = vec![0.0; nf];
    for j in 0..nf {
        let sum_p: f64 = power.iter().map(|row| row[j]).sum();
        let sum_mup: f64 = power
            .iter()
            .zip(moments.iter())
            .map(|(row, m)| m * row[j])
            .sum();
        let slope = match lu.solve(&Vector2::new(sum_p, sum_mup)) {
            Some(coeffs) => coeffs[1],
            None => 0.0,
        };
        // P_k ~ S + (S'' / 2) mu_k, so the fitted slope is half the
        // curvature.
        let curvature = 2.0 * slope;
        let s = spectrum[j];
        if !curvature.is_finite() {
            return Err(EstimateError::NumericalDegeneracy {
                stage: "quadratic curvature fit",
            });
        }
        corrected[j] = if s > 0.0 {
            let bias = bandwidth.powi(4) / 576.0 * curvature * curvature / s;
            (s - bias).max(CORRECTION_FLOOR * s)
        } else {
            s
        };
    }
    Ok(corrected)
}
