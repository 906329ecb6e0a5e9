//! Wigner-Ville time-frequency distributions.
//!
//! Real inputs are first lifted to their analytic signal, which removes the
//! negative-frequency image that would otherwise fold interference onto DC.
//! The engine then builds the instantaneous autocorrelation
//! `R(t, m) = z(t + m) conj(z(t - m))` on a time-by-lag grid and
//! Fourier-transforms along the lag axis; with the two-sample lag step and
//! the analytic signal the frequency axis covers `[0, Nyquist)`. The raw
//! bilinear form carries oscillatory cross terms; an optional separable
//! Gaussian kernel applied in the (Doppler, lag) ambiguity domain suppresses
//! them at a configurable resolution trade-off. Negative values in the
//! output are expected: the distribution is a quasi-probability.

use crate::kernel::{ConfigError, EstimateError, KernelLifecycle, Read1D};
use crate::signal::traits::TimeFrequency1D;
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// Cross-term smoothing policy for the ambiguity domain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SmoothingFilter {
    /// Keep the raw bilinear distribution.
    None,
    /// Separable Gaussian in Doppler and lag. `width` is the lag-domain
    /// standard deviation in samples; the Doppler spread is its reciprocal
    /// scale. Defaults to `N / (2 NW)` when not given.
    Gauss {
        /// Lag-domain standard deviation in samples.
        width: Option<f64>,
    },
}

/// Constructor config for [`WignerVilleKernel`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WignerConfig {
    /// Sampling interval in seconds.
    pub dt: f64,
    /// Time-bandwidth product controlling the default smoothing spread.
    pub time_bandwidth: f64,
    /// Cross-term smoothing kernel.
    pub filter: SmoothingFilter,
}

impl WignerConfig {
    /// Gaussian-smoothed configuration with the default spread.
    pub fn new(dt: f64, time_bandwidth: f64) -> Self {
        Self {
            dt,
            time_bandwidth,
            filter: SmoothingFilter::Gauss { width: None },
        }
    }
}

/// Real-valued auto distribution over (time, frequency).
#[derive(Debug, Clone, PartialEq)]
pub struct WignerDistribution {
    /// Time axis in seconds, one entry per input sample.
    pub times: Vec<f64>,
    /// Frequency axis covering `[0, Nyquist)`.
    pub frequencies: Vec<f64>,
    /// `times.len() x frequencies.len()` matrix; may be negative.
    pub values: Vec<Vec<f64>>,
}

/// Complex-valued cross distribution over (time, frequency).
#[derive(Debug, Clone, PartialEq)]
pub struct CrossWignerDistribution {
    /// Time axis in seconds, one entry per input sample.
    pub times: Vec<f64>,
    /// Frequency axis covering `[0, Nyquist)`.
    pub frequencies: Vec<f64>,
    /// `times.len() x frequencies.len()` complex matrix.
    pub values: Vec<Vec<Complex<f64>>>,
}

/// Trait-first Wigner-Ville kernel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WignerVilleKernel {
    dt: f64,
    time_bandwidth: f64,
    filter: SmoothingFilter,
}

impl KernelLifecycle for WignerVilleKernel {
    type Config = WignerConfig;

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
        if let SmoothingFilter::Gauss { width: Some(w) } = config.filter {
            if !w.is_finite() || w <= 0.0 {
                return Err(ConfigError::InvalidParameter {
                    arg: "width",
                    reason: "smoothing width must be finite and > 0",
                });
            }
        }
        Ok(Self {
            dt: config.dt,
            time_bandwidth: config.time_bandwidth,
            filter: config.filter,
        })
    }
}

impl TimeFrequency1D for WignerVilleKernel {
    type Output = WignerDistribution;

    fn run_alloc<I>(&self, input: &I) -> Result<Self::Output, EstimateError>
    where
        I: Read1D<f64> + ?Sized,
    {
        let x = input.read_slice().map_err(EstimateError::from)?;
        validate_series(x, "data")?;
        let z = analytic_signal(x);
        let matrix = self.bilinear(&z, &z)?;
        Ok(WignerDistribution {
            times: self.time_axis(x.len()),
            frequencies: self.freq_axis(x.len()),
            values: matrix
                .into_iter()
                .map(|row| row.into_iter().map(|v| v.re).collect())
                .collect(),
        })
    }
}

impl WignerVilleKernel {
    /// Cross distribution between two equal-length series.
    pub fn run_cross<I1, I2>(
        &self,
        x: &I1,
        y: &I2,
    ) -> Result<CrossWignerDistribution, EstimateError>
    where
        I1: Read1D<f64> + ?Sized,
        I2: Read1D<f64> + ?Sized,
    {
        let x = x.read_slice().map_err(EstimateError::from)?;
        let y = y.read_slice().map_err(EstimateError::from)?;
        if y.len() != x.len() {
            return Err(EstimateError::LengthMismatch {
                arg: "series_j",
                expected: x.len(),
                got: y.len(),
            });
        }
        validate_series(x, "series_i")?;
        validate_series(y, "series_j")?;
        let zx = analytic_signal(x);
        let zy = analytic_signal(y);
        let values = self.bilinear(&zx, &zy)?;
        Ok(CrossWignerDistribution {
            times: self.time_axis(x.len()),
            frequencies: self.freq_axis(x.len()),
            values,
        })
    }

    fn time_axis(&self, n: usize) -> Vec<f64> {
        (0..n).map(|t| t as f64 * self.dt).collect()
    }

    fn freq_axis(&self, n: usize) -> Vec<f64> {
        let nlag = n.next_power_of_two();
        (0..nlag)
            .map(|k| k as f64 / (2.0 * nlag as f64 * self.dt))
            .collect()
    }

    /// Instantaneous-correlation matrix, optionally ambiguity-smoothed, then
    /// transformed along the lag axis. Rows are time, columns are frequency
    /// bins over `[0, Nyquist)`.
    fn bilinear(
        &self,
        x: &[Complex<f64>],
        y: &[Complex<f64>],
    ) -> Result<Vec<Vec<Complex<f64>>>, EstimateError> {
        let n = x.len();
        let nlag = n.next_power_of_two();

        // R[t][j] with FFT-ordered lag index: j <= nlag/2 holds lag +j,
        // j > nlag/2 holds lag j - nlag.
        let mut corr = vec![vec![Complex::new(0.0, 0.0); nlag]; n];
        for (t, row) in corr.iter_mut().enumerate() {
            for (j, slot) in row.iter_mut().enumerate() {
                let m = if j <= nlag / 2 {
                    j as isize
                } else {
                    j as isize - nlag as isize
                };
                let fwd = t as isize + m;
                let bwd = t as isize - m;
                if fwd >= 0 && (fwd as usize) < n && bwd >= 0 && (bwd as usize) < n {
                    *slot = x[fwd as usize] * y[bwd as usize].conj();
                }
            }
        }

        if let SmoothingFilter::Gauss { width } = self.filter {
            let sigma_lag = width.unwrap_or(n as f64 / (2.0 * self.time_bandwidth));
            self.smooth_ambiguity(&mut corr, nlag, sigma_lag);
        }

        // Lag-axis transform per time row. The lag step is 2 dt, so bin k
        // sits at k / (2 nlag dt); the analytic signal keeps the full
        // Nyquist span alias-free.
        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(nlag);
        let mut out = Vec::with_capacity(n);
        for row in corr.iter_mut() {
            fft.process(row);
            if row.iter().any(|v| !v.re.is_finite() || !v.im.is_finite()) {
                return Err(EstimateError::NumericalDegeneracy {
                    stage: "Wigner-Ville lag transform",
                });
            }
            out.push(row.clone());
        }
        Ok(out)
    }

    /// Multiply the ambiguity function (time-axis FFT of the correlation
    /// matrix) by a separable Gaussian and transform back.
    fn smooth_ambiguity(&self, corr: &mut [Vec<Complex<f64>>], nlag: usize, sigma_lag: f64) {
        let n = corr.len();
        let ntime = n.next_power_of_two();
        let mut planner = FftPlanner::<f64>::new();
        let fwd = planner.plan_fft_forward(ntime);
        let inv = planner.plan_fft_inverse(ntime);

        let sigma_doppler = ntime as f64 / (2.0 * core::f64::consts::PI * sigma_lag);
        let doppler_gain: Vec<f64> = (0..ntime)
            .map(|q| {
                let centered = q.min(ntime - q) as f64;
                (-0.5 * (centered / sigma_doppler).powi(2)).exp()
            })
            .collect();

        let mut column = vec![Complex::new(0.0, 0.0); ntime];
        for j in 0..nlag {
            let m = if j <= nlag / 2 {
                j as f64
            } else {
                j as f64 - nlag as f64
            };
            let lag_gain = (-0.5 * (m / sigma_lag).powi(2)).exp();

            for slot in column.iter_mut() {
                *slot = Complex::new(0.0, 0.0);
            }
            for (t, row) in corr.iter().enumerate() {
                column[t] = row[j];
            }
            fwd.process(&mut column);
            for (q, slot) in column.iter_mut().enumerate() {
                *slot *= lag_gain * doppler_gain[q];
            }
            inv.process(&mut column);
            let scale = 1.0 / ntime as f64;
            for (t, row) in corr.iter_mut().enumerate() {
                row[j] = column[t] * scale;
            }
        }
    }
}

/// Analytic signal via the frequency-domain Hilbert construction: keep DC
/// (and Nyquist for even lengths), double the positive frequencies, zero the
/// negative ones.
fn analytic_signal(x: &[f64]) -> Vec<Complex<f64>> {
    let n = x.len();
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(n);
    let ifft = planner.plan_fft_inverse(n);

    let mut buf: Vec<Complex<f64>> = x.iter().map(|&v| Complex::new(v, 0.0)).collect();
    fft.process(&mut buf);
    let positive_top = if n % 2 == 0 { n / 2 - 1 } else { n / 2 };
    for (k, v) in buf.iter_mut().enumerate() {
        if (1..=positive_top).contains(&k) {
            *v *= 2.0;
        } else if k > n / 2 {
            *v = Complex::new(0.0, 0.0);
        }
    }
    ifft.process(&mut buf);
    let scale = 1.0 / n as f64;
    for v in buf.iter_mut() {
        *v *= scale;
    }
    buf
}

/// Auto Wigner-Ville distribution of a real series.
pub fn wigner_ville(
    data: &[f64],
    config: WignerConfig,
) -> Result<WignerDistribution, EstimateError> {
    let kernel = WignerVilleKernel::try_new(config)?;
    kernel.run_alloc(data)
}

/// Cross Wigner-Ville distribution between two equal-length real series.
pub fn cross_wigner_ville(
    x: &[f64],
    y: &[f64],
    config: WignerConfig,
) -> Result<CrossWignerDistribution, EstimateError> {
    let kernel = WignerVilleKernel::try_new(config)?;
    kernel.run_cross(x, y)
}

fn validate_series(x: &[f64], arg: &'static str) -> Result<(), EstimateError> {
    if x.len() < 2 {
        return Err(ConfigError::InvalidParameter {
            arg,
            reason: "need at least two samples",
        }
        .into());
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(EstimateError::NumericalDegeneracy {
            stage: "Wigner-Ville input",
        });
    }
    Ok(())
}
