//! Text generation against the external LLM provider
//!
//! Defines the `Generator` trait that decouples the retry policy from the
//! provider wire format. One `call` is one outbound request with one
//! credential; the result is always a classified `GenerationOutcome`, never a
//! retry. GeminiClient implements the trait against the Gemini
//! `generateContent` REST endpoint.

pub mod classify;
pub mod constants;
pub mod gemini;

pub use classify::{classify_message, classify_status};
pub use constants::*;
pub use gemini::GeminiClient;

use common::Credential;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Failure categories of a single provider call.
///
/// Only the category crosses into the retry policy; the raw provider text is
/// carried alongside for display and never inspected again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Provider answered without text (safety filter withheld the output)
    Blocked,
    /// Rate or quota exhaustion on this credential
    QuotaExceeded,
    /// Credential rejected as invalid or unauthorized
    AuthInvalid,
    /// Timeouts, connection failures, provider 5xx
    OtherTransient,
    /// Anything unclassified
    OtherFatal,
}

impl FailureKind {
    /// Stable label for JSON error bodies, logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            FailureKind::Blocked => "blocked",
            FailureKind::QuotaExceeded => "quota_exceeded",
            FailureKind::AuthInvalid => "auth_invalid",
            FailureKind::OtherTransient => "transient",
            FailureKind::OtherFatal => "provider_error",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classified result of one provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// Trimmed response text
    Success(String),
    Failure { kind: FailureKind, message: String },
}

impl GenerationOutcome {
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        GenerationOutcome::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, GenerationOutcome::Success(_))
    }

    /// `"success"` or the failure kind's label.
    pub fn label(&self) -> &'static str {
        match self {
            GenerationOutcome::Success(_) => "success",
            GenerationOutcome::Failure { kind, .. } => kind.label(),
        }
    }
}

/// A single-shot text generator.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn Generator>`), so the retry controller can be driven by a scripted
/// generator in tests and by GeminiClient in the service.
pub trait Generator: Send + Sync {
    /// Identifier for logging (e.g. "gemini")
    fn id(&self) -> &str;

    /// Send `request_text` with the fixed request configuration, authorized by
    /// `credential`. Exactly one outbound call; no internal retries.
    fn call<'a>(
        &'a self,
        credential: &'a Credential,
        request_text: &'a str,
    ) -> Pin<Box<dyn Future<Output = GenerationOutcome> + Send + 'a>>;
}
