//! Multitaper spectral estimation.
//!
//! Batch, array-in/array-out estimators built on Slepian (DPSS) tapers:
//! Thomson's adaptively weighted PSD with optional quadratic (curvature)
//! correction and jackknife confidence intervals, the Riedel-Sidorenko
//! sine-taper PSD with per-frequency taper counts, adaptively weighted
//! magnitude-squared coherence, and smoothed Wigner-Ville time-frequency
//! distributions.
//!
//! The estimators are exposed both as plain functions and as trait-first
//! kernels: a config struct is validated once through
//! [`kernel::KernelLifecycle::try_new`], and the resulting kernel runs over
//! anything that yields a contiguous slice (`Vec`, slices, `ndarray`
//! arrays).
//!
//! ```
//! use multitaper::{multitaper_psd, MultitaperConfig};
//!
//! let data: Vec<f64> = (0..256)
//!     .map(|i| (0.4 * i as f64).sin() + 0.1 * (1.3 * i as f64).cos())
//!     .collect();
//! let psd = multitaper_psd(&data, MultitaperConfig::new(1.0, 4.0, 5)).unwrap();
//! assert_eq!(psd.frequencies.len(), 129);
//! assert!(psd.power.iter().all(|&p| p >= 0.0));
//! ```

pub mod kernel;
pub mod linalg;
pub mod signal;
pub mod stats;

pub use kernel::{ConfigError, EstimateError, KernelLifecycle, Read1D, Write1D};
pub use signal::spectral::{
    coherence, multitaper_psd, sine_psd, CoherenceConfig, CoherenceKernel, CoherenceResult,
    JackknifeBounds, MultitaperConfig, MultitaperKernel, PadTo, PsdEstimate, SinePsdConfig,
    SinePsdEstimate, SinePsdKernel,
};
pub use signal::taper::{dpss, DpssConfig, DpssKernel, TaperSet};
pub use signal::traits::{CrossSpectrum1D, PowerSpectrum1D, TaperGenerate, TimeFrequency1D};
pub use signal::wigner::{
    cross_wigner_ville, wigner_ville, CrossWignerDistribution, SmoothingFilter, WignerConfig,
    WignerDistribution, WignerVilleKernel,
};
