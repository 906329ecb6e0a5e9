//! Signal-analysis building blocks: tapers, spectral estimators, and
//! time-frequency distributions.

pub mod spectral;
pub mod taper;
pub mod traits;
pub mod wigner;

pub use spectral::{
    coherence, multitaper_psd, sine_psd, CoherenceConfig, CoherenceKernel, CoherenceResult,
    JackknifeBounds, MultitaperConfig, MultitaperKernel, PadTo, PsdEstimate, SinePsdConfig,
    SinePsdEstimate, SinePsdKernel,
};
pub use taper::{dpss, DpssConfig, DpssKernel, TaperSet};
pub use wigner::{
    cross_wigner_ville, wigner_ville, CrossWignerDistribution, SmoothingFilter, WignerConfig,
    WignerDistribution, WignerVilleKernel,
};
