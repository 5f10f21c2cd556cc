use stimkit_core::HostError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrialError {
    /// A required host service was not supplied. Raised before anything is
    /// rendered.
    #[error("host service unavailable: {0}")]
    HostServiceUnavailable(&'static str),

    #[error(transparent)]
    Host(#[from] HostError),
}
