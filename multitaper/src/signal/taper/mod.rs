//! Taper families used by the spectral estimators.

pub mod dpss;
pub mod sine;

pub use dpss::{dpss, DpssConfig, DpssKernel, TaperSet};
pub use sine::sine_tapers;
