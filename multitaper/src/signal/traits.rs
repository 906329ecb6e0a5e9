//! Trait interfaces for the estimation capabilities.
//!
//! These traits define the trait-first API shape shared by the taper,
//! spectral, and time-frequency kernels.

use crate::kernel::{EstimateError, Read1D, Write1D};
use crate::signal::taper::TaperSet;

/// Taper-set generation capability.
pub trait TaperGenerate {
    /// Generate the configured taper set.
    fn run_alloc(&self) -> Result<TaperSet, EstimateError>;
}

/// 1D power-spectrum estimation capability.
pub trait PowerSpectrum1D {
    /// Full estimate bundle produced by `run_alloc`.
    type Output;

    /// Run the estimator and write the frequency and power vectors into
    /// caller-provided buffers.
    fn run_into<I, OF, OP>(
        &self,
        input: &I,
        freqs: &mut OF,
        power: &mut OP,
    ) -> Result<(), EstimateError>
    where
        I: Read1D<f64> + ?Sized,
        OF: Write1D<f64> + ?Sized,
        OP: Write1D<f64> + ?Sized;

    /// Run the estimator and allocate the full output bundle.
    fn run_alloc<I>(&self, input: &I) -> Result<Self::Output, EstimateError>
    where
        I: Read1D<f64> + ?Sized;
}

/// 1D cross-spectrum estimation capability over a pair of series.
pub trait CrossSpectrum1D {
    /// Full estimate bundle produced by `run_alloc`.
    type Output;

    /// Run the estimator over two equal-length series.
    fn run_alloc<I1, I2>(&self, x: &I1, y: &I2) -> Result<Self::Output, EstimateError>
    where
        I1: Read1D<f64> + ?Sized,
        I2: Read1D<f64> + ?Sized;
}

/// 1D time-frequency distribution capability.
pub trait TimeFrequency1D {
    /// Distribution bundle produced by `run_alloc`.
    type Output;

    /// Run the transform over a single series.
    fn run_alloc<I>(&self, input: &I) -> Result<Self::Output, EstimateError>
    where
        I: Read1D<f64> + ?Sized;
}
