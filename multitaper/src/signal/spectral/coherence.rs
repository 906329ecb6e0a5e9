//! Adaptively weighted magnitude-squared coherence between two series.
//!
//! Both series are transformed with the same Slepian taper set; adaptive
//! weights are derived per series and merged into a shared per-taper weight
//! `w_k(f) = d_k^x(f) d_k^y(f)`. Normalizing the cross- and auto-spectra
//! with the same weights keeps self-coherence at exactly one and bounds the
//! magnitude-squared coherence by Cauchy-Schwarz.

use crate::kernel::{ConfigError, EstimateError, KernelLifecycle, Read1D};
use crate::signal::spectral::adaptive::adaptive_spectrum;
use crate::signal::spectral::transform::{eigenspectra, onesided_freqs, onesided_scale};
use crate::signal::taper::dpss;
use crate::signal::traits::CrossSpectrum1D;
use crate::stats;
use rustfft::num_complex::Complex;

/// Constructor config for [`CoherenceKernel`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoherenceConfig {
    /// Sampling interval in seconds (shared by both series).
    pub dt: f64,
    /// Time-bandwidth product `NW`.
    pub time_bandwidth: f64,
    /// Number of Slepian tapers.
    pub num_tapers: usize,
    /// Number of leading one-sided frequency bins to return.
    pub n_freq: usize,
    /// Coverage probability for the significance threshold.
    pub probability: f64,
    /// Remove each series' mean before tapering.
    pub demean: bool,
    /// Adaptive-weight iteration tolerance.
    pub tolerance: f64,
    /// Adaptive-weight iteration budget.
    pub max_iterations: usize,
    /// Also return the cross-spectrum phase.
    pub want_phase: bool,
    /// Also return the transfer function `S_xy / S_xx`.
    pub want_transfer: bool,
}

impl CoherenceConfig {
    /// Defaults for everything past the taper parameters: 95% significance,
    /// mean removal on, phase on, transfer function off.
    pub fn new(dt: f64, time_bandwidth: f64, num_tapers: usize, n_freq: usize) -> Self {
        Self {
            dt,
            time_bandwidth,
            num_tapers,
            n_freq,
            probability: 0.95,
            demean: true,
            tolerance: 1e-8,
            max_iterations: 100,
            want_phase: true,
            want_transfer: false,
        }
    }
}

/// Coherence estimate bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct CoherenceResult {
    /// One-sided frequency axis, truncated to the requested bin count.
    pub frequencies: Vec<f64>,
    /// Magnitude-squared coherence in `[0, 1]`.
    pub msc: Vec<f64>,
    /// Cross-spectrum phase in `(-pi, pi]`, when requested.
    pub phase: Option<Vec<f64>>,
    /// Adaptively weighted auto-spectrum of the first series.
    pub spec_x: Vec<f64>,
    /// Adaptively weighted auto-spectrum of the second series.
    pub spec_y: Vec<f64>,
    /// Per-frequency coherence level above which the estimate is significant
    /// at the configured probability.
    pub significance: Vec<f64>,
    /// Effective degrees of freedom per frequency.
    pub dof: Vec<f64>,
    /// Transfer function `S_xy / S_xx`, when requested.
    pub transfer: Option<Vec<Complex<f64>>>,
    /// False when either series' adaptive iteration hit its budget.
    pub converged: bool,
}

/// Trait-first coherence kernel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoherenceKernel {
    config: CoherenceConfig,
}

impl KernelLifecycle for CoherenceKernel {
    type Config = CoherenceConfig;

    fn try_new(config: Self::Config) -> Result<Self, ConfigError> {
        if !config.dt.is_finite() || config.dt <= 0.0 {
            return Err(ConfigError::InvalidParameter {
                arg: "dt",
                reason: "sampling interval must be finite and > 0",
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
        if config.n_freq < 2 {
            return Err(ConfigError::InvalidParameter {
                arg: "n_freq",
                reason: "need at least two output bins",
            });
        }
        if !(0.0..1.0).contains(&config.probability) || config.probability <= 0.0 {
            return Err(ConfigError::InvalidParameter {
                arg: "probability",
                reason: "coverage probability must lie in (0, 1)",
            });
        }
        if !config.tolerance.is_finite() || config.tolerance <= 0.0 {
            return Err(ConfigError::InvalidParameter {
                arg: "tolerance",
                reason: "iteration tolerance must be finite and > 0",
            });
        }
        if config.max_iterations == 0 {
            return Err(ConfigError::InvalidParameter {
                arg: "max_iterations",
                reason: "iteration budget must be at least 1",
            });
        }
        Ok(Self { config })
    }
}

impl CrossSpectrum1D for CoherenceKernel {
    type Output = CoherenceResult;

    fn run_alloc<I1, I2>(&self, x: &I1, y: &I2) -> Result<Self::Output, EstimateError>
    where
        I1: Read1D<f64> + ?Sized,
        I2: Read1D<f64> + ?Sized,
    {
        let x = x.read_slice().map_err(EstimateError::from)?;
        let y = y.read_slice().map_err(EstimateError::from)?;
        self.run_impl(x, y)
    }
}

impl CoherenceKernel {
    fn run_impl(&self, x: &[f64], y: &[f64]) -> Result<CoherenceResult, EstimateError> {
        let cfg = &self.config;
        if y.len() != x.len() {
            return Err(EstimateError::LengthMismatch {
                arg: "series_j",
                expected: x.len(),
                got: y.len(),
            });
        }
        if x.len() < 2 {
            return Err(ConfigError::InvalidParameter {
                arg: "series_i",
                reason: "need at least two samples",
            }
            .into());
        }
        if cfg.num_tapers < 2 {
            return Err(EstimateError::InsufficientTapers {
                required: 2,
                got: cfg.num_tapers,
            });
        }
        if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
            return Err(EstimateError::NumericalDegeneracy {
                stage: "coherence input",
            });
        }

        let n = x.len();
        let nfft = n.max(2 * (cfg.n_freq - 1));
        let nf = cfg.n_freq;

        let tapers = dpss(n, cfg.time_bandwidth, cfg.num_tapers)?;
        let xd = if cfg.demean { stats::demean(x) } else { x.to_vec() };
        let yd = if cfg.demean { stats::demean(y) } else { y.to_vec() };
        let var_x = stats::variance(&xd);
        let var_y = stats::variance(&yd);

        let spec_x = eigenspectra(&xd, &tapers.tapers, nfft);
        let spec_y = eigenspectra(&yd, &tapers.tapers, nfft);
        let pow_x = spec_x.onesided_power();
        let pow_y = spec_y.onesided_power();

        let adapt_x = adaptive_spectrum(
            &pow_x,
            &tapers.eigenvalues,
            var_x,
            cfg.tolerance,
            cfg.max_iterations,
        )?;
        let adapt_y = adaptive_spectrum(
            &pow_y,
            &tapers.eigenvalues,
            var_y,
            cfg.tolerance,
            cfg.max_iterations,
        )?;

        let k = cfg.num_tapers;
        let mut msc = vec![0.0; nf];
        let mut phase = vec![0.0; nf];
        let mut sxx_out = vec![0.0; nf];
        let mut syy_out = vec![0.0; nf];
        let mut dof = vec![0.0; nf];
        let mut significance = vec![1.0; nf];
        let mut transfer = vec![Complex::new(0.0, 0.0); nf];

        for j in 0..nf {
            let mut weights: Vec<f64> = (0..k)
                .map(|ki| (adapt_x.weight_sq[ki][j] * adapt_y.weight_sq[ki][j]).sqrt())
                .collect();
            let mut wsum: f64 = weights.iter().sum();
            if wsum <= f64::MIN_POSITIVE {
                // Both series are below the noise floor here; fall back to
                // the unweighted average so the bin stays defined.
                weights.iter_mut().for_each(|w| *w = 1.0);
                wsum = k as f64;
            }

            let mut sxy = Complex::new(0.0, 0.0);
            let mut sxx = 0.0;
            let mut syy = 0.0;
            let mut w2sum = 0.0;
            for ki in 0..k {
                let w = weights[ki];
                let yx = spec_x.spectra[ki][j];
                let yy = spec_y.spectra[ki][j];
                sxy += w * yx * yy.conj();
                sxx += w * yx.norm_sqr();
                syy += w * yy.norm_sqr();
                w2sum += w * w;
            }
            sxy /= wsum;
            sxx /= wsum;
            syy /= wsum;

            let denom = sxx * syy;
            msc[j] = if denom > 0.0 {
                (sxy.norm_sqr() / denom).clamp(0.0, 1.0)
            } else {
                0.0
            };
            phase[j] = sxy.im.atan2(sxy.re);
            let scale = onesided_scale(nfft, cfg.dt, j);
            sxx_out[j] = sxx * scale;
            syy_out[j] = syy * scale;
            transfer[j] = if sxx > 0.0 {
                sxy / sxx
            } else {
                Complex::new(0.0, 0.0)
            };

            dof[j] = if w2sum > 0.0 {
                2.0 * wsum * wsum / w2sum
            } else {
                2.0
            };
            if dof[j] > 2.0 + 1e-9 {
                let f_star = stats::fisher_f_quantile(2.0, dof[j] - 2.0, cfg.probability)?;
                significance[j] = (f_star / ((dof[j] - 2.0) / 2.0 + f_star)).clamp(0.0, 1.0);
            }
        }

        let frequencies = onesided_freqs(nfft, cfg.dt)
            .into_iter()
            .take(nf)
            .collect();
        Ok(CoherenceResult {
            frequencies,
            msc,
            phase: cfg.want_phase.then_some(phase),
            spec_x: sxx_out,
            spec_y: syy_out,
            significance,
            dof,
            transfer: cfg.want_transfer.then_some(transfer),
            converged: adapt_x.converged && adapt_y.converged,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use core::f64::consts::PI;

    fn shared_tone_pair(n: usize) -> (Vec<f64>, Vec<f64>) {
        // Common 0.1-cycles-per-sample tone buried in distinct deterministic
        // broadband components.
        let x: Vec<f64> = (0..n)
            .map(|i| {
                (2.0 * PI * 0.1 * i as f64).sin() + 0.3 * ((i * 7) % 13) as f64 * 0.1
            })
            .collect();
        let y: Vec<f64> = (0..n)
            .map(|i| {
                (2.0 * PI * 0.1 * i as f64).sin() + 0.3 * ((i * 11) % 17) as f64 * 0.1
            })
            .collect();
        (x, y)
    }

    #[test]
    fn self_coherence_is_unity() {
        let (x, _) = shared_tone_pair(256);
        let kernel =
            CoherenceKernel::try_new(CoherenceConfig::new(1.0, 3.5, 5, 128)).expect("kernel");
        let result = kernel.run_alloc(&x, &x).expect("coherence");
        for &c in &result.msc {
            assert_abs_diff_eq!(c, 1.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn coherence_stays_in_unit_interval() {
        let (x, y) = shared_tone_pair(256);
        let kernel =
            CoherenceKernel::try_new(CoherenceConfig::new(1.0, 3.5, 5, 128)).expect("kernel");
        let result = kernel.run_alloc(&x, &y).expect("coherence");
        assert_eq!(result.msc.len(), 128);
        for &c in &result.msc {
            assert!((0.0..=1.0).contains(&c));
        }
        for &p in result.phase.as_ref().expect("phase requested") {
            assert!(p > -PI - 1e-12 && p <= PI + 1e-12);
        }
    }

    #[test]
    fn shared_tone_is_coherent_at_its_frequency() {
        let (x, y) = shared_tone_pair(512);
        let kernel =
            CoherenceKernel::try_new(CoherenceConfig::new(1.0, 3.5, 5, 257)).expect("kernel");
        let result = kernel.run_alloc(&x, &y).expect("coherence");
        // 0.1 cycles/sample on a 512-bin two-sided grid is bin 51.
        let bin = (0.1_f64 * 512.0).round() as usize;
        assert!(
            result.msc[bin] > 0.9,
            "shared tone coherence was {}",
            result.msc[bin]
        );
        assert!(result.msc[bin] > result.significance[bin]);
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let kernel =
            CoherenceKernel::try_new(CoherenceConfig::new(1.0, 3.5, 5, 64)).expect("kernel");
        let x = vec![0.0; 128];
        let y = vec![0.0; 127];
        let err = kernel.run_alloc(&x, &y).expect_err("length mismatch");
        assert!(matches!(err, EstimateError::LengthMismatch { .. }));
    }

    #[test]
    fn single_taper_is_rejected_at_run_time() {
        let kernel =
            CoherenceKernel::try_new(CoherenceConfig::new(1.0, 1.5, 1, 64)).expect("kernel");
        let x = vec![1.0; 128];
        let err = kernel.run_alloc(&x, &x).expect_err("needs two tapers");
        assert!(matches!(err, EstimateError::InsufficientTapers { .. }));
    }

    #[test]
    fn transfer_function_of_a_scaled_copy_is_the_gain() {
        let (x, _) = shared_tone_pair(256);
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v).collect();
        let config = CoherenceConfig {
            want_transfer: true,
            ..CoherenceConfig::new(1.0, 3.5, 5, 100)
        };
        let kernel = CoherenceKernel::try_new(config).expect("kernel");
        let result = kernel.run_alloc(&x, &y).expect("coherence");
        let transfer = result.transfer.expect("transfer requested");
        // H = S_xy / S_xx = conj-gain; for a real scale factor of 2 the
        // transfer function is 2 at every energetic bin.
        let bin = (0.1_f64 * 256.0).round() as usize;
        assert_abs_diff_eq!(transfer[bin].re, 2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(transfer[bin].im, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn constructor_rejects_bad_probability() {
        assert!(CoherenceKernel::try_new(CoherenceConfig {
            probability: 1.0,
            ..CoherenceConfig::new(1.0, 3.5, 5, 64)
        })
        .is_err());
        assert!(CoherenceKernel::try_new(CoherenceConfig {
            probability: 0.0,
            ..CoherenceConfig::new(1.0, 3.5, 5, 64)
        })
        .is_err());
    }
}
