//! Sine tapers for the Riedel-Sidorenko adaptive PSD estimator.

use core::f64::consts::PI;

/// Generate the first `num_tapers` sine tapers of length `len`:
/// `h_k(n) = sqrt(2 / (N + 1)) * sin(pi k (n + 1) / (N + 1))` for
/// `k = 1..=num_tapers`. The family is exactly orthonormal.
pub fn sine_tapers(len: usize, num_tapers: usize) -> Vec<Vec<f64>> {
    let norm = (2.0 / (len as f64 + 1.0)).sqrt();
    (1..=num_tapers)
        .map(|k| {
            (0..len)
                .map(|n| norm * (PI * k as f64 * (n + 1) as f64 / (len as f64 + 1.0)).sin())
                .collect()
        })
        .collect()
}
