//! Taper-weighted eigenspectra.
//!
//! Multiplies a series elementwise with each taper, zero-pads to the
//! transform length, and computes the complex spectrum per taper. The
//! per-taper transforms touch disjoint outputs, so the fan-out is
//! data-parallel under the `parallel` feature.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// Complex spectra of the tapered series, one row per taper.
#[derive(Debug, Clone, PartialEq)]
pub struct EigenSpectra {
    /// `K x nfft` complex matrix.
    pub spectra: Vec<Vec<Complex<f64>>>,
    /// Transform length the tapered series were padded to.
    pub nfft: usize,
}

impl EigenSpectra {
    /// Number of one-sided frequency bins.
    pub fn num_bins(&self) -> usize {
        self.nfft / 2 + 1
    }

    /// Per-taper power over the one-sided bins, in raw (unscaled) units.
    pub fn onesided_power(&self) -> Vec<Vec<f64>> {
        let nf = self.num_bins();
        self.spectra
            .iter()
            .map(|row| row.iter().take(nf).map(Complex::norm_sqr).collect())
            .collect()
    }
}

/// Compute eigenspectra for a (already mean-adjusted) series. Padding is an
/// exact zero-fill up to `nfft`.
pub fn eigenspectra(data: &[f64], tapers: &[Vec<f64>], nfft: usize) -> EigenSpectra {
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(nfft);

    let transform_one = |taper: &Vec<f64>| {
        let mut buf = vec![Complex::new(0.0, 0.0); nfft];
        for (dst, (&x, &h)) in buf.iter_mut().zip(data.iter().zip(taper.iter())) {
            *dst = Complex::new(x * h, 0.0);
        }
        fft.process(&mut buf);
        buf
    };

    #[cfg(feature = "parallel")]
    let spectra: Vec<Vec<Complex<f64>>> = tapers.par_iter().map(transform_one).collect();
    #[cfg(not(feature = "parallel"))]
    let spectra: Vec<Vec<Complex<f64>>> = tapers.iter().map(transform_one).collect();

    EigenSpectra { spectra, nfft }
}

/// One-sided frequency axis for a transform of length `nfft` sampled at
/// interval `dt`, spanning `[0, Nyquist]`.
pub fn onesided_freqs(nfft: usize, dt: f64) -> Vec<f64> {
    let nf = nfft / 2 + 1;
    (0..nf).map(|j| j as f64 / (nfft as f64 * dt)).collect()
}

/// One-sided density scaling for bin `j`: `dt`, doubled everywhere except DC
/// and (for even transform lengths) Nyquist.
pub fn onesided_scale(nfft: usize, dt: f64, j: usize) -> f64 {
    if j == 0 || (nfft % 2 == 0 && j == nfft / 2) {
        dt
    } else {
        2.0 * dt
    }
}
