use super::ConfigError;

/// Constructor validation lifecycle shared by kernel structs.
///
/// Every estimator kernel is built from a plain config struct through
/// `try_new`, which rejects invalid scalar parameters before any buffer is
/// allocated. A constructed kernel is immutable and reusable across calls.
pub trait KernelLifecycle: Sized {
    /// Kernel config type.
    type Config;

    /// Construct a validated kernel from config.
    fn try_new(config: Self::Config) -> Result<Self, ConfigError>;
}
