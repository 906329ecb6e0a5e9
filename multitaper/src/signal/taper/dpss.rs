//! Discrete prolate spheroidal (Slepian) taper generation.
//!
//! The tapers are eigenvectors of the classic symmetric tridiagonal form for
//! a given length and time-bandwidth product. The tridiagonal eigenvalues
//! are only a proxy for spectral concentration, so each taper's concentration
//! ratio is recomputed as a Rayleigh quotient against the bandlimiting
//! (Dirichlet-kernel) operator.

use crate::kernel::{ConfigError, EstimateError, KernelLifecycle};
use crate::linalg::top_eigenpairs;
use crate::signal::traits::TaperGenerate;
use core::f64::consts::PI;
use itertools::Itertools;
use tracing::debug;

/// Orthonormal taper set paired with concentration eigenvalues.
#[derive(Debug, Clone, PartialEq)]
pub struct TaperSet {
    /// One unit-energy taper per row, ordered by descending concentration.
    pub tapers: Vec<Vec<f64>>,
    /// Concentration ratios in `(0, 1]`, strictly descending.
    pub eigenvalues: Vec<f64>,
    /// Time-bandwidth product the set was generated for.
    pub time_bandwidth: f64,
}

impl TaperSet {
    /// Number of tapers in the set.
    pub fn num_tapers(&self) -> usize {
        self.tapers.len()
    }

    /// Taper length in samples.
    pub fn len(&self) -> usize {
        self.tapers.first().map_or(0, Vec::len)
    }

    /// True when the set holds no tapers.
    pub fn is_empty(&self) -> bool {
        self.tapers.is_empty()
    }
}

/// Constructor config for [`DpssKernel`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DpssConfig {
    /// Taper length in samples.
    pub len: usize,
    /// Time-bandwidth product `NW`.
    pub time_bandwidth: f64,
    /// Number of tapers to return.
    pub num_tapers: usize,
}

/// Trait-first Slepian taper kernel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DpssKernel {
    len: usize,
    time_bandwidth: f64,
    num_tapers: usize,
}

impl KernelLifecycle for DpssKernel {
    type Config = DpssConfig;

    fn try_new(config: Self::Config) -> Result<Self, ConfigError> {
        if config.len < 2 {
            return Err(ConfigError::InvalidParameter {
                arg: "len",
                reason: "taper length must be at least 2",
            });
        }
        if !config.time_bandwidth.is_finite() || config.time_bandwidth <= 0.0 {
            return Err(ConfigError::InvalidParameter {
                arg: "time_bandwidth",
                reason: "time-bandwidth product must be finite and > 0",
            });
        }
        if config.num_tapers < 1 {
            return Err(ConfigError::InvalidParameter {
                arg: "num_tapers",
                reason: "at least one taper is required",
            });
        }
        if config.num_tapers > config.len {
            return Err(ConfigError::InvalidParameter {
                arg: "num_tapers",
                reason: "cannot exceed the taper length",
            });
        }
        Ok(Self {
            len: config.len,
            time_bandwidth: config.time_bandwidth,
            num_tapers: config.num_tapers,
        })
    }
}

impl TaperGenerate for DpssKernel {
    fn run_alloc(&self) -> Result<TaperSet, EstimateError> {
        dpss_impl(self.len, self.time_bandwidth, self.num_tapers)
    }
}

fn dpss_impl(n: usize, nw: f64, k: usize) -> Result<TaperSet, EstimateError> {
    if k as f64 > 2.0 * nw - 1.0 {
        debug!("requested {k} tapers with NW = {nw}; trailing concentrations will be near zero");
    }
    let half_bandwidth = nw / n as f64;
    let cos2w = (2.0 * PI * half_bandwidth).cos();
    let diag: Vec<f64> = (0..n)
        .map(|i| {
            let c = (n as f64 - 1.0 - 2.0 * i as f64) / 2.0;
            c * c * cos2w
        })
        .collect();
    let off: Vec<f64> = (1..n)
        .map(|i| (i as f64) * (n as f64 - i as f64) / 2.0)
        .collect();

    let eig = top_eigenpairs(&diag, &off, k)?;
    let mut tapers = eig.vectors;
    for (order, taper) in tapers.iter_mut().enumerate() {
        unit_energy(taper);
        fix_sign(taper, order);
    }

    let mut eigenvalues = concentrations(&tapers, half_bandwidth);
    // Roundoff can saturate neighboring concentrations at 1.0 for large NW;
    // break such ties by an ulp so the ordering contract stays strict.
    for i in 1..eigenvalues.len() {
        if eigenvalues[i] >= eigenvalues[i - 1] {
            eigenvalues[i] = eigenvalues[i - 1] * (1.0 - f64::EPSILON);
        }
    }
    if !eigenvalues.iter().tuple_windows().all(|(a, b)| a > b) {
        return Err(EstimateError::NumericalDegeneracy {
            stage: "taper concentration ordering",
        });
    }

    Ok(TaperSet {
        tapers,
        eigenvalues,
        time_bandwidth: nw,
    })
}

fn unit_energy(taper: &mut [f64]) {
    let norm = taper.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm > 0.0 {
        for v in taper.iter_mut() {
            *v /= norm;
        }
    }
}

/// Sign convention: an even-order taper is symmetric and normalized so its
/// mean (equivalently, its central sample) is positive; an odd-order taper is
/// antisymmetric and normalized so the first sample of non-negligible
/// magnitude at or after the midpoint is positive.
fn fix_sign(taper: &mut [f64], order: usize) {
    let flip = if order % 2 == 0 {
        let s: f64 = taper.iter().sum();
        if s.abs() > 1e-12 {
            s < 0.0
        } else {
            taper[taper.len() / 2] < 0.0
        }
    } else {
        let mid = taper.len() / 2;
        taper[mid..]
            .iter()
            .find(|v| v.abs() > 1e-12)
            .is_some_and(|v| *v < 0.0)
    };
    if flip {
        for v in taper.iter_mut() {
            *v = -*v;
        }
    }
}

/// Rayleigh quotient of each taper against the bandlimiting operator
/// `B[m][n] = sin(2 pi W (m - n)) / (pi (m - n))`, `B[n][n] = 2W`. The matrix
/// is Toeplitz, so only its first column is materialized.
fn concentrations(tapers: &[Vec<f64>], half_bandwidth: f64) -> Vec<f64> {
    let n = tapers.first().map_or(0, Vec::len);
    let kernel: Vec<f64> = (0..n)
        .map(|j| {
            if j == 0 {
                2.0 * half_bandwidth
            } else {
                (2.0 * PI * half_bandwidth * j as f64).sin() / (PI * j as f64)
            }
        })
        .collect();

    tapers
        .iter()
        .map(|taper| {
            let mut quotient = 0.0;
            for (m, &tm) in taper.iter().enumerate() {
                let mut row = 0.0;
                for (j, &tj) in taper.iter().enumerate() {
                    let lag = m.abs_diff(j);
                    row += kernel[lag] * tj;
                }
                quotient += tm * row;
            }
            quotient.min(1.0).max(f64::MIN_POSITIVE)
        })
        .collect()
}

/// Generate `num_tapers` Slepian tapers of length `len` for the given
/// time-bandwidth product.
pub fn dpss(len: usize, time_bandwidth: f64, num_tapers: usize) -> Result<TaperSet, EstimateError> {
    let kernel = DpssKernel::try_new(DpssConfig {
        len,
        time_bandwidth,
        num_tapers,
    })?;
    kernel.run_alloc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn tapers_are_pairwise_orthonormal() {
        let set = dpss(128, 4.0, 6).expect("taper set");
        for a in 0..6 {
            for b in 0..6 {
                let dot: f64 = set.tapers[a]
                    .iter()
                    .zip(set.tapers[b].iter())
                    .map(|(x, y)| x * y)
                    .sum();
                let expected = if a == b { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(dot, expected, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn concentrations_are_strictly_descending_in_unit_interval() {
        let set = dpss(96, 3.5, 5).expect("taper set");
        for pair in set.eigenvalues.windows(2) {
            assert!(pair[0] > pair[1]);
        }
        for &lambda in &set.eigenvalues {
            assert!(lambda > 0.0 && lambda <= 1.0);
        }
        // Low orders at this NW are extremely well concentrated.
        assert!(set.eigenvalues[0] > 0.999);
    }

    #[test]
    fn taper_order_counts_sign_changes() {
        let set = dpss(64, 4.0, 5).expect("taper set");
        for (order, taper) in set.tapers.iter().enumerate() {
            // Ignore the numerically tiny tails when counting oscillations.
            let body: Vec<f64> = taper.iter().copied().filter(|v| v.abs() > 1e-10).collect();
            let changes = body
                .windows(2)
                .filter(|w| w[0].signum() != w[1].signum())
                .count();
            assert_eq!(changes, order, "taper order {order}");
        }
    }

    #[test]
    fn sign_convention_is_reproducible() {
        let set = dpss(65, 3.0, 4).expect("taper set");
        // Even orders: positive mean.
        assert!(set.tapers[0].iter().sum::<f64>() > 0.0);
        assert!(set.tapers[2].iter().sum::<f64>() > 0.0);
        // Odd orders: positive just right of the midpoint.
        for order in [1usize, 3] {
            let taper = &set.tapers[order];
            let v = taper[taper.len() / 2..]
                .iter()
                .find(|v| v.abs() > 1e-12)
                .expect("non-negligible sample");
            assert!(*v > 0.0, "taper order {order}");
        }
    }

    #[test]
    fn excess_tapers_are_still_returned() {
        // K beyond 2 NW - 1 is allowed; trailing concentrations collapse.
        let set = dpss(64, 2.0, 6).expect("taper set");
        assert_eq!(set.num_tapers(), 6);
        assert!(set.eigenvalues[5] < 0.5);
    }

    #[test]
    fn constructor_rejects_bad_parameters() {
        assert!(DpssKernel::try_new(DpssConfig {
            len: 1,
            time_bandwidth: 4.0,
            num_tapers: 1,
        })
        .is_err());
        assert!(DpssKernel::try_new(DpssConfig {
            len: 64,
            time_bandwidth: 0.0,
            num_tapers: 1,
        })
        .is_err());
        assert!(DpssKernel::try_new(DpssConfig {
            len: 64,
            time_bandwidth: 4.0,
            num_tapers: 0,
        })
        .is_err());
        assert!(DpssKernel::try_new(DpssConfig {
            len: 8,
            time_bandwidth: 4.0,
            num_tapers: 9,
        })
        .is_err());
    }
}
