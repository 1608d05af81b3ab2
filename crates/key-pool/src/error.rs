//! Error types for generation requests

use generation::FailureKind;

/// Terminal failures of one `generate` call. Every variant renders a message
/// meant to be shown to the operator verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("no API keys configured; add at least one key before generating")]
    ConfigurationMissing,

    #[error("{kind}: {message}")]
    Generation { kind: FailureKind, message: String },

    #[error("all {attempts} API keys failed; last error: {last_message}")]
    AllAttemptsExhausted { attempts: usize, last_message: String },
}

impl Error {
    /// Stable label for JSON error bodies and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Error::ConfigurationMissing => "configuration_missing",
            Error::Generation { kind, .. } => kind.label(),
            Error::AllAttemptsExhausted { .. } => "all_attempts_exhausted",
        }
    }
}

/// Result alias for generation requests.
pub type Result<T> = std::result::Result<T, Error>;
