use core::fmt;

/// Validation errors raised at kernel construction or adapter binding time.
///
/// Scalar parameter and shape problems are rejected here, before any array
/// is allocated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required input or configuration field is empty.
    EmptyInput {
        /// Name of the argument that is empty.
        arg: &'static str,
    },
    /// A scalar configuration parameter is out of its valid range.
    InvalidParameter {
        /// Name of the argument.
        arg: &'static str,
        /// Human readable reason.
        reason: &'static str,
    },
    /// A contiguous 1D slice view could not be obtained.
    NonContiguous {
        /// Name of the argument that is non-contiguous.
        arg: &'static str,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EmptyInput { arg } => write!(f, "Input `{arg}` was empty."),
            ConfigError::InvalidParameter { arg, reason } => {
                write!(f, "Invalid parameter `{arg}`: {reason}")
            }
            ConfigError::NonContiguous { arg } => {
                write!(f, "Argument `{arg}` is not contiguous in memory.")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Runtime failures raised by estimator entrypoints.
///
/// Adaptive-iteration non-convergence is deliberately not represented here;
/// it degrades gracefully into a `converged: false` flag on the estimate.
/// Eigensolver budget exhaustion, on the other hand, leaves no usable taper
/// set and is a hard [`EstimateError::Convergence`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EstimateError {
    /// Two runtime buffers disagreed on length.
    LengthMismatch {
        /// Name of the argument.
        arg: &'static str,
        /// Required length.
        expected: usize,
        /// Received length.
        got: usize,
    },
    /// The estimator requires more tapers than the configuration carries.
    InsufficientTapers {
        /// Minimum taper count the operation needs.
        required: usize,
        /// Configured taper count.
        got: usize,
    },
    /// An iterative solver exhausted its iteration budget.
    Convergence {
        /// Which solver stage gave up.
        stage: &'static str,
        /// The iteration budget that was exhausted.
        iterations: usize,
    },
    /// A non-finite value was found in the input or an intermediate result.
    NumericalDegeneracy {
        /// Which computation stage detected the degeneracy.
        stage: &'static str,
    },
    /// Adapter binding or configuration failure.
    Config(ConfigError),
}

impl From<ConfigError> for EstimateError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl fmt::Display for EstimateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EstimateError::LengthMismatch { arg, expected, got } => {
                write!(
                    f,
                    "Length mismatch on `{arg}`. Expected {expected}, got {got}."
                )
            }
            EstimateError::InsufficientTapers { required, got } => {
                write!(f, "Estimator requires at least {required} tapers, got {got}.")
            }
            EstimateError::Convergence { stage, iterations } => {
                write!(f, "{stage} did not converge within {iterations} iterations.")
            }
            EstimateError::NumericalDegeneracy { stage } => {
                write!(f, "Non-finite value detected during {stage}.")
            }
            EstimateError::Config(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for EstimateError {}

#[cfg(test)]
mod tests {
    use super::{ConfigError, EstimateError};

    #[test]
    fn config_error_display_names_argument() {
        let err = ConfigError::InvalidParameter {
            arg: "time_bandwidth",
            reason: "must be positive",
        };
        let msg = err.to_string();
        assert!(msg.contains("time_bandwidth"));
        assert!(msg.contains("must be positive"));
    }

    #[test]
    fn estimate_error_wraps_config_error() {
        let err = EstimateError::from(ConfigError::EmptyInput { arg: "data" });
        assert!(matches!(err, EstimateError::Config(_)));
        assert!(err.to_string().contains("data"));
    }

    #[test]
    fn insufficient_tapers_display_reports_counts() {
        let err = EstimateError::InsufficientTapers {
            required: 2,
            got: 1,
        };
        let msg = err.to_string();
        assert!(msg.contains('2'));
        assert!(msg.contains('1'));
    }
}
