//! Gemini `generateContent` client
//!
//! Builds the fixed request around the user's story, sends it with one API
//! key, and normalizes whatever comes back into a `GenerationOutcome`:
//! extracted text, a blocked (empty) answer, or a classified provider error.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use common::Credential;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::classify::{classify_status, classify_transport};
use crate::constants::{
    API_KEY_HEADER, MODEL, SAFETY_SETTINGS, SYSTEM_INSTRUCTION, SafetySetting, TEMPERATURE,
};
use crate::{FailureKind, GenerationOutcome, Generator};

/// Upper bound on how much of a non-JSON error body ends up in a message.
const MAX_ERROR_BODY_CHARS: usize = 300;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: [Content<'a>; 1],
    system_instruction: Content<'a>,
    generation_config: GenerationConfig,
    safety_settings: &'static [SafetySetting],
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

impl<'a> GenerateContentRequest<'a> {
    fn new(user_text: &'a str) -> Self {
        Self {
            contents: [Content {
                role: Some("user"),
                parts: [Part { text: user_text }],
            }],
            system_instruction: Content {
                role: None,
                parts: [Part {
                    text: SYSTEM_INSTRUCTION,
                }],
            },
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
            },
            safety_settings: SAFETY_SETTINGS,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first candidate with thought parts skipped, trimmed.
    /// `None` when nothing but whitespace is left.
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let joined: String = content
            .parts
            .iter()
            .filter(|p| !p.thought)
            .filter_map(|p| p.text.as_deref())
            .collect();
        let trimmed = joined.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    fn blocked_message(&self) -> String {
        let reason = self
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
            .map(|r| format!("prompt blocked: {r}"))
            .or_else(|| {
                self.candidates
                    .first()
                    .and_then(|c| c.finish_reason.as_deref())
                    .filter(|r| *r != "STOP")
                    .map(|r| format!("finish reason: {r}"))
            });
        match reason {
            Some(reason) => format!(
                "no content returned ({reason}); the output may have been withheld by the safety filter"
            ),
            None => "no content returned; the output may have been withheld by the safety filter"
                .to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    status: Option<String>,
}

/// Human-readable message for a non-success provider response.
fn provider_error_message(status: u16, body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => match envelope.error.status {
            Some(code) => format!("{code} ({status}): {}", envelope.error.message),
            None => format!("HTTP {status}: {}", envelope.error.message),
        },
        Err(_) => {
            let snippet: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
            if snippet.trim().is_empty() {
                format!("HTTP {status} with empty body")
            } else {
                format!("HTTP {status}: {}", snippet.trim())
            }
        }
    }
}

/// `Generator` backed by the Gemini REST API.
///
/// Holds a shared reqwest client; the per-request timeout is applied to each
/// call so a hung provider surfaces as `OtherTransient` instead of blocking
/// the caller indefinitely.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl GeminiClient {
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            timeout,
        }
    }

    /// Full `generateContent` URL for the fixed model.
    pub fn generate_url(&self) -> String {
        format!(
            "{}/models/{MODEL}:generateContent",
            self.endpoint.trim_end_matches('/')
        )
    }

    async fn generate(&self, credential: &Credential, request_text: &str) -> GenerationOutcome {
        let body = GenerateContentRequest::new(request_text);

        let response = match self
            .http
            .post(self.generate_url())
            .header(API_KEY_HEADER, credential.expose().as_str())
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                let kind = classify_transport(&e);
                warn!(kind = kind.label(), error = %e, "provider request failed");
                return GenerationOutcome::failure(kind, format!("provider request failed: {e}"));
            }
        };

        let status = response.status();
        let raw = match response.text().await {
            Ok(raw) => raw,
            Err(e) => {
                let kind = classify_transport(&e);
                warn!(kind = kind.label(), error = %e, "failed to read provider response");
                return GenerationOutcome::failure(
                    kind,
                    format!("failed to read provider response: {e}"),
                );
            }
        };

        if !status.is_success() {
            let kind = classify_status(status.as_u16(), &raw);
            warn!(
                status = status.as_u16(),
                kind = kind.label(),
                "provider returned error"
            );
            return GenerationOutcome::failure(kind, provider_error_message(status.as_u16(), &raw));
        }

        let parsed: GenerateContentResponse = match serde_json::from_str(&raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "provider response is not valid JSON");
                return GenerationOutcome::failure(
                    FailureKind::OtherFatal,
                    format!("invalid provider response: {e}"),
                );
            }
        };

        match parsed.text() {
            Some(text) => {
                debug!(chars = text.len(), "provider returned text");
                GenerationOutcome::Success(text)
            }
            None => {
                warn!(
                    candidates = parsed.candidates.len(),
                    "provider response has no text content"
                );
                GenerationOutcome::failure(FailureKind::Blocked, parsed.blocked_message())
            }
        }
    }
}

impl Generator for GeminiClient {
    fn id(&self) -> &str {
        "gemini"
    }

    fn call<'a>(
        &'a self,
        credential: &'a Credential,
        request_text: &'a str,
    ) -> Pin<Box<dyn Future<Output = GenerationOutcome> + Send + 'a>> {
        Box::pin(self.generate(credential, request_text))
    }
}
