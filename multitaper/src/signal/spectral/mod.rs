//! Multitaper spectral estimators.
//!
//! The adaptive (Thomson) and quadratic PSD estimators, the sine-taper
//! adaptive PSD, jackknife confidence intervals, and coherence all live
//! here, split into one module per stage of the pipeline. The kernels at
//! this level tie the stages together behind validated configs.

pub mod adaptive;
pub mod coherence;
pub mod jackknife;
pub mod quadratic;
pub mod sine;
pub mod transform;

pub use coherence::{CoherenceConfig, CoherenceKernel, CoherenceResult};
pub use jackknife::JackknifeBounds;
pub use sine::{SinePsdConfig, SinePsdEstimate, SinePsdKernel};
pub use transform::EigenSpectra;

use crate::kernel::{ConfigError, EstimateError, KernelLifecycle, Read1D, Write1D};
use crate::signal::taper::dpss;
use crate::signal::traits::{CrossSpectrum1D, PowerSpectrum1D};
use crate::stats;

/// Zero-padding policy for the forward transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadTo {
    /// Transform at the series length.
    None,
    /// Transform at an integer multiple of the series length.
    Factor(usize),
    /// Transform at an explicit length, at least the series length.
    Length(usize),
}

impl PadTo {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        match self {
            PadTo::Factor(f) if *f < 1 => Err(ConfigError::InvalidParameter {
                arg: "pad",
                reason: "padding factor must be at least 1",
            }),
            _ => Ok(()),
        }
    }

    pub(crate) fn resolve(&self, n: usize) -> Result<usize, EstimateError> {
        match self {
            PadTo::None => Ok(n),
            PadTo::Factor(f) => Ok(n * f),
            PadTo::Length(m) => {
                if *m >= n {
                    Ok(*m)
                } else {
                    Err(EstimateError::LengthMismatch {
                        arg: "pad",
                        expected: n,
                        got: *m,
                    })
                }
            }
        }
    }

    pub(crate) fn resolve_unchecked(&self, n: usize) -> usize {
        match self {
            PadTo::None => n,
            PadTo::Factor(f) => n * (*f).max(1),
            PadTo::Length(m) => (*m).max(n),
        }
    }
}

/// Multitaper power spectral density estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct PsdEstimate {
    /// One-sided frequency axis spanning `[0, Nyquist]`.
    pub frequencies: Vec<f64>,
    /// One-sided power spectral density, non-negative.
    pub power: Vec<f64>,
    /// Per-taper adaptive weights in `[0, 1]`, one row per taper.
    pub weights: Option<Vec<Vec<f64>>>,
    /// Effective degrees of freedom per frequency bin.
    pub dof: Option<Vec<f64>>,
    /// Jackknife confidence bounds around `power`.
    pub jackknife: Option<JackknifeBounds>,
    /// False when the adaptive iteration hit its budget.
    pub converged: bool,
}

/// Constructor config for [`MultitaperKernel`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MultitaperConfig {
    /// Sampling interval in seconds.
    pub dt: f64,
    /// Time-bandwidth product `NW`.
    pub time_bandwidth: f64,
    /// Number of Slepian tapers.
    pub num_tapers: usize,
    /// Zero-padding policy.
    pub pad: PadTo,
    /// Apply the curvature (quadratic) correction.
    pub quadratic: bool,
    /// Jackknife coverage probability, when confidence bounds are wanted.
    pub jackknife: Option<f64>,
    /// Remove the series mean before tapering.
    pub demean: bool,
    /// Adaptive-weight iteration tolerance.
    pub tolerance: f64,
    /// Adaptive-weight iteration budget.
    pub max_iterations: usize,
}

impl MultitaperConfig {
    /// Defaults past the taper parameters: no padding, linear estimate, no
    /// jackknife, mean removal on, tolerance `1e-8`, budget 100.
    pub fn new(dt: f64, time_bandwidth: f64, num_tapers: usize) -> Self {
        Self {
            dt,
            time_bandwidth,
            num_tapers,
            pad: PadTo::None,
            quadratic: false,
            jackknife: None,
            demean: true,
            tolerance: 1e-8,
            max_iterations: 100,
        }
    }
}

/// Trait-first adaptive multitaper PSD kernel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MultitaperKernel {
    config: MultitaperConfig,
}

impl KernelLifecycle for MultitaperKernel {
    type Config = MultitaperConfig;

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
        if let Some(p) = config.jackknife {
            if !p.is_finite() || p <= 0.0 || p >= 1.0 {
                return Err(ConfigError::InvalidParameter {
                    arg: "jackknife",
                    reason: "coverage probability must lie in (0, 1)",
                });
            }
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
        config.pad.validate()?;
        Ok(Self { config })
    }
}

impl MultitaperKernel {
    /// One-sided output length for an input of `input_len` samples.
    pub fn output_len(&self, input_len: usize) -> usize {
        self.config.pad.resolve_unchecked(input_len) / 2 + 1
    }

    fn run_impl(&self, data: &[f64]) -> Result<PsdEstimate, EstimateError> {
        let cfg = &self.config;
        if data.len() < 2 {
            return Err(ConfigError::InvalidParameter {
                arg: "data",
                reason: "need at least two samples",
            }
            .into());
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(EstimateError::NumericalDegeneracy {
                stage: "multitaper input",
            });
        }
        let n = data.len();
        if cfg.num_tapers > n {
            return Err(ConfigError::InvalidParameter {
                arg: "num_tapers",
                reason: "cannot exceed the series length",
            }
            .into());
        }
        if cfg.quadratic && cfg.num_tapers < 2 {
            return Err(EstimateError::InsufficientTapers {
                required: 2,
                got: cfg.num_tapers,
            });
        }
        if cfg.jackknife.is_some() && cfg.num_tapers < 2 {
            return Err(EstimateError::InsufficientTapers {
                required: 2,
                got: cfg.num_tapers,
            });
        }

        let nfft = cfg.pad.resolve(n)?;
        let x = if cfg.demean {
            stats::demean(data)
        } else {
            data.to_vec()
        };
        let variance = stats::variance(&x);

        let tapers = dpss(n, cfg.time_bandwidth, cfg.num_tapers)?;
        let spectra = transform::eigenspectra(&x, &tapers.tapers, nfft);
        let power = spectra.onesided_power();

        let adapted = adaptive::adaptive_spectrum(
            &power,
            &tapers.eigenvalues,
            variance,
            cfg.tolerance,
            cfg.max_iterations,
        )?;

        let combined = if cfg.quadratic {
            let bandwidth = 2.0 * cfg.time_bandwidth / (n as f64 * cfg.dt);
            quadratic::quadratic_spectrum(&adapted.spectrum, &power, bandwidth)?
        } else {
            adapted.spectrum.clone()
        };

        let out_power: Vec<f64> = combined
            .iter()
            .enumerate()
            .map(|(j, &s)| s * transform::onesided_scale(nfft, cfg.dt, j))
            .collect();

        let bounds = match cfg.jackknife {
            Some(probability) => Some(jackknife::jackknife_bounds(
                &power,
                &adapted.weight_sq,
                &out_power,
                probability,
            )?),
            None => None,
        };

        let weights: Vec<Vec<f64>> = adapted
            .weight_sq
            .iter()
            .zip(tapers.eigenvalues.iter())
            .map(|(row, &lambda)| {
                row.iter()
                    .map(|&d2| (lambda * d2).sqrt().clamp(0.0, 1.0))
                    .collect()
            })
            .collect();

        Ok(PsdEstimate {
            frequencies: transform::onesided_freqs(nfft, cfg.dt),
            power: out_power,
            weights: Some(weights),
            dof: Some(adapted.dof),
            jackknife: bounds,
            converged: adapted.converged,
        })
    }
}

impl PowerSpectrum1D for MultitaperKernel {
    type Output = PsdEstimate;

    fn run_into<I, OF, OP>(
        &self,
        input: &I,
        freqs: &mut OF,
        power: &mut OP,
    ) -> Result<(), EstimateError>
    where
        I: Read1D<f64> + ?Sized,
        OF: Write1D<f64> + ?Sized,
        OP: Write1D<f64> + ?Sized,
    {
        let input = input.read_slice().map_err(EstimateError::from)?;
        let estimate = self.run_impl(input)?;

        let f_out = freqs.write_slice_mut().map_err(EstimateError::from)?;
        if f_out.len() != estimate.frequencies.len() {
            return Err(EstimateError::LengthMismatch {
                arg: "freqs",
                expected: estimate.frequencies.len(),
                got: f_out.len(),
            });
        }
        let p_out = power.write_slice_mut().map_err(EstimateError::from)?;
        if p_out.len() != estimate.power.len() {
            return Err(EstimateError::LengthMismatch {
                arg: "power",
                expected: estimate.power.len(),
                got: p_out.len(),
            });
        }
        f_out.copy_from_slice(&estimate.frequencies);
        p_out.copy_from_slice(&estimate.power);
        Ok(())
    }

    fn run_alloc<I>(&self, input: &I) -> Result<Self::Output, EstimateError>
    where
        I: Read1D<f64> + ?Sized,
    {
        let input = input.read_slice().map_err(EstimateError::from)?;
        self.run_impl(input)
    }
}

/// Adaptive multitaper PSD of a real series.
pub fn multitaper_psd(data: &[f64], config: MultitaperConfig) -> Result<PsdEstimate, EstimateError> {
    let kernel = MultitaperKernel::try_new(config)?;
    kernel.run_alloc(data)
}

/// Sine-taper PSD with optional per-frequency adaptive taper counts.
pub fn sine_psd(data: &[f64], config: SinePsdConfig) -> Result<SinePsdEstimate, EstimateError> {
    let kernel = SinePsdKernel::try_new(config)?;
    kernel.run_alloc(data)
}

/// Adaptively weighted magnitude-squared coherence between two series.
pub fn coherence(
    x: &[f64],
    y: &[f64],
    config: CoherenceConfig,
) -> Result<CoherenceResult, EstimateError> {
    let kernel = CoherenceKernel::try_new(config)?;
    kernel.run_alloc(x, y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use core::f64::consts::PI;
    use rustfft::num_complex::Complex;
    use rustfft::FftPlanner;

    /// Deterministic broadband series from a 64-bit LCG, roughly white.
    fn lcg_noise(n: usize) -> Vec<f64> {
        let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
        (0..n)
            .map(|_| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                (state >> 33) as f64 / (1u64 << 30) as f64 - 1.0
            })
            .collect()
    }

    fn tone_plus_noise(n: usize, cycles_per_sample: f64, amplitude: f64) -> Vec<f64> {
        lcg_noise(n)
            .into_iter()
            .enumerate()
            .map(|(i, w)| amplitude * (2.0 * PI * cycles_per_sample * i as f64).sin() + w)
            .collect()
    }

    #[test]
    fn psd_is_nonnegative_with_increasing_frequency_axis() {
        let data = tone_plus_noise(256, 50.0 / 256.0, 3.0);
        let psd = multitaper_psd(&data, MultitaperConfig::new(1.0, 4.0, 5)).expect("psd");
        assert_eq!(psd.frequencies.len(), 129);
        assert_eq!(psd.power.len(), 129);
        assert!(psd.power.iter().all(|&p| p >= 0.0));
        assert_abs_diff_eq!(psd.frequencies[0], 0.0, epsilon = 1e-15);
        assert_abs_diff_eq!(*psd.frequencies.last().expect("bins"), 0.5, epsilon = 1e-12);
        for pair in psd.frequencies.windows(2) {
            assert!(pair[1] > pair[0]);
        }
        assert!(psd.converged);
    }

    fn peak_bin(power: &[f64]) -> usize {
        power
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).expect("finite"))
            .map(|(i, _)| i)
            .expect("non-empty")
    }

    #[test]
    fn sinusoid_peak_lands_within_one_bin() {
        let f0 = 50.0 / 256.0;
        let pure: Vec<f64> = (0..256)
            .map(|i| (2.0 * PI * f0 * i as f64).sin())
            .collect();

        // A single taper has a strictly unimodal spectral window.
        let psd = multitaper_psd(&pure, MultitaperConfig::new(1.0, 1.5, 1)).expect("psd");
        let peak = peak_bin(&psd.power);
        assert_abs_diff_eq!(psd.frequencies[peak], f0, epsilon = 1.0 / 256.0 + 1e-12);

        // A full taper set flattens the line across its concentration band;
        // the maximum stays inside the half-bandwidth NW / (N dt).
        let psd = multitaper_psd(&pure, MultitaperConfig::new(1.0, 4.0, 5)).expect("psd");
        let peak = peak_bin(&psd.power);
        assert_abs_diff_eq!(psd.frequencies[peak], f0, epsilon = 4.0 / 256.0 + 1e-12);
    }

    #[test]
    fn single_taper_matches_direct_tapered_periodogram() {
        // NW = 1.5 with one taper degenerates to the order-zero Slepian
        // window; the estimate must equal dt * |FFT(h0 x)|^2 one-sided.
        let data = tone_plus_noise(128, 0.2, 2.0);
        let dt = 0.5;
        let psd = multitaper_psd(&data, MultitaperConfig::new(dt, 1.5, 1)).expect("psd");

        let taper = crate::signal::taper::dpss(128, 1.5, 1).expect("taper");
        let x = crate::stats::demean(&data);
        let mut buf: Vec<Complex<f64>> = x
            .iter()
            .zip(taper.tapers[0].iter())
            .map(|(&v, &h)| Complex::new(v * h, 0.0))
            .collect();
        FftPlanner::<f64>::new()
            .plan_fft_forward(128)
            .process(&mut buf);
        for j in 0..=64 {
            let expected = buf[j].norm_sqr() * transform::onesided_scale(128, dt, j);
            assert_abs_diff_eq!(psd.power[j], expected, epsilon = 1e-9 * (1.0 + expected));
        }
    }

    #[test]
    fn jackknife_brackets_the_estimate_and_widens_with_coverage() {
        let data = tone_plus_noise(300, 0.12, 2.0);
        let narrow = multitaper_psd(
            &data,
            MultitaperConfig {
                jackknife: Some(0.90),
                ..MultitaperConfig::new(1.0, 4.5, 5)
            },
        )
        .expect("psd");
        let wide = multitaper_psd(
            &data,
            MultitaperConfig {
                jackknife: Some(0.99),
                ..MultitaperConfig::new(1.0, 4.5, 5)
            },
        )
        .expect("psd");

        let jk_narrow = narrow.jackknife.as_ref().expect("bounds");
        let jk_wide = wide.jackknife.as_ref().expect("bounds");
        for j in 0..narrow.power.len() {
            assert!(jk_narrow.lower[j] <= narrow.power[j]);
            assert!(narrow.power[j] <= jk_narrow.upper[j]);
            assert!(jk_wide.lower[j] <= jk_narrow.lower[j] + 1e-12);
            assert!(jk_wide.upper[j] + 1e-12 >= jk_narrow.upper[j]);
        }
    }

    #[test]
    fn quadratic_estimate_differs_on_curved_spectra() {
        let data = tone_plus_noise(256, 0.2, 5.0);
        let linear = multitaper_psd(&data, MultitaperConfig::new(1.0, 4.5, 5)).expect("psd");
        let quad = multitaper_psd(
            &data,
            MultitaperConfig {
                quadratic: true,
                ..MultitaperConfig::new(1.0, 4.5, 5)
            },
        )
        .expect("psd");
        let max_rel = linear
            .power
            .iter()
            .zip(quad.power.iter())
            .map(|(a, b)| (a - b).abs() / a.abs().max(f64::MIN_POSITIVE))
            .fold(0.0f64, f64::max);
        assert!(
            max_rel > 1e-9,
            "quadratic correction left a curved spectrum untouched"
        );
        assert!(quad.power.iter().all(|&p| p > 0.0));
    }

    #[test]
    fn weights_and_dof_stay_in_range() {
        let data = tone_plus_noise(256, 0.1, 4.0);
        let psd = multitaper_psd(&data, MultitaperConfig::new(1.0, 4.0, 5)).expect("psd");
        let weights = psd.weights.as_ref().expect("weights");
        assert_eq!(weights.len(), 5);
        for row in weights {
            assert!(row.iter().all(|&w| (0.0..=1.0).contains(&w)));
        }
        for &v in psd.dof.as_ref().expect("dof") {
            assert!((2.0 - 1e-9..=10.0 + 1e-9).contains(&v));
        }
    }

    #[test]
    fn broadband_power_integrates_to_roughly_the_variance() {
        let data = lcg_noise(512);
        let variance = crate::stats::variance(&data);
        let psd = multitaper_psd(&data, MultitaperConfig::new(1.0, 4.0, 5)).expect("psd");
        let df = psd.frequencies[1] - psd.frequencies[0];
        let total: f64 = psd.power.iter().map(|p| p * df).sum();
        assert!(
            total > variance / 3.0 && total < variance * 3.0,
            "integrated PSD {total} strayed from variance {variance}"
        );
    }

    #[test]
    fn padding_refines_the_frequency_grid() {
        let data = tone_plus_noise(128, 0.2, 2.0);
        let padded = multitaper_psd(
            &data,
            MultitaperConfig {
                pad: PadTo::Factor(2),
                ..MultitaperConfig::new(1.0, 4.0, 5)
            },
        )
        .expect("psd");
        assert_eq!(padded.power.len(), 129);
        assert_abs_diff_eq!(
            *padded.frequencies.last().expect("bins"),
            0.5,
            epsilon = 1e-12
        );
    }

    #[test]
    fn run_into_validates_output_lengths() {
        let kernel = MultitaperKernel::try_new(MultitaperConfig::new(1.0, 4.0, 5)).expect("kernel");
        let data = tone_plus_noise(128, 0.2, 2.0);
        let expected = kernel.output_len(128);
        let mut freqs = vec![0.0; expected];
        let mut power = vec![0.0; expected - 1];
        let err = kernel
            .run_into(&data, &mut freqs, &mut power)
            .expect_err("mismatched output length should error");
        assert!(matches!(err, EstimateError::LengthMismatch { .. }));
    }

    #[test]
    fn parameter_errors_are_rejected_before_work() {
        assert!(MultitaperKernel::try_new(MultitaperConfig::new(0.0, 4.0, 5)).is_err());
        assert!(MultitaperKernel::try_new(MultitaperConfig::new(1.0, -1.0, 5)).is_err());
        assert!(MultitaperKernel::try_new(MultitaperConfig::new(1.0, 4.0, 0)).is_err());
        assert!(MultitaperKernel::try_new(MultitaperConfig {
            jackknife: Some(1.0),
            ..MultitaperConfig::new(1.0, 4.0, 5)
        })
        .is_err());

        let short = [1.0f64];
        let err = multitaper_psd(&short, MultitaperConfig::new(1.0, 4.0, 1)).expect_err("short");
        assert!(matches!(err, EstimateError::Config(_)));
    }

    #[test]
    fn quadratic_and_jackknife_each_need_two_tapers() {
        let data = tone_plus_noise(128, 0.2, 2.0);
        let err = multitaper_psd(
            &data,
            MultitaperConfig {
                quadratic: true,
                ..MultitaperConfig::new(1.0, 1.5, 1)
            },
        )
        .expect_err("quadratic with one taper");
        assert!(matches!(err, EstimateError::InsufficientTapers { .. }));

        let err = multitaper_psd(
            &data,
            MultitaperConfig {
                jackknife: Some(0.95),
                ..MultitaperConfig::new(1.0, 1.5, 1)
            },
        )
        .expect_err("jackknife with one taper");
        assert!(matches!(err, EstimateError::InsufficientTapers { .. }));
    }

    #[test]
    fn non_finite_input_fails_fast() {
        let mut data = tone_plus_noise(128, 0.2, 2.0);
        data[7] = f64::NAN;
        let err = multitaper_psd(&data, MultitaperConfig::new(1.0, 4.0, 5)).expect_err("nan");
        assert!(matches!(err, EstimateError::NumericalDegeneracy { .. }));
    }
}
