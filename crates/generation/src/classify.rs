//! Failure classification for provider error responses
//!
//! Provider errors are plain text (or JSON whose `message`/`status` fields are
//! free text), so quota and credential problems are recognised by substring.
//! This is a best-effort heuristic kept behind `FailureKind`: the retry policy
//! only ever sees the kind.

use crate::FailureKind;

/// Phrases meaning the credential ran out of rate or quota.
const QUOTA_PATTERNS: &[&str] = &[
    "quota",
    "resource_exhausted",
    "resource has been exhausted",
    "rate limit",
    "too many requests",
];

/// Phrases meaning the credential itself was rejected.
const AUTH_PATTERNS: &[&str] = &[
    "api key not valid",
    "api_key_invalid",
    "invalid api key",
    "unauthenticated",
    "permission_denied",
    "api key expired",
];

/// Classify a provider error message by its wording.
///
/// Returns `None` when the message names neither quota nor credential
/// problems; callers decide how to treat the rest. Matching is
/// case-insensitive and quota wins over auth when both appear.
pub fn classify_message(message: &str) -> Option<FailureKind> {
    let lower = message.to_lowercase();
    if QUOTA_PATTERNS.iter().any(|p| lower.contains(p)) {
        return Some(FailureKind::QuotaExceeded);
    }
    if AUTH_PATTERNS.iter().any(|p| lower.contains(p)) {
        return Some(FailureKind::AuthInvalid);
    }
    None
}

/// Classify a non-success HTTP response by status and body.
///
/// The body wording takes precedence (Gemini reports a bad key as 400
/// `INVALID_ARGUMENT`). Otherwise: 429 is quota, 401/403 are credential
/// failures, 408/5xx are transient, everything else is fatal.
pub fn classify_status(status: u16, body: &str) -> FailureKind {
    if let Some(kind) = classify_message(body) {
        return kind;
    }
    match status {
        429 => FailureKind::QuotaExceeded,
        401 | 403 => FailureKind::AuthInvalid,
        408 | 500..=599 => FailureKind::OtherTransient,
        _ => FailureKind::OtherFatal,
    }
}

/// Classify a transport-level failure (no HTTP response was received).
pub fn classify_transport(err: &reqwest::Error) -> FailureKind {
    if err.is_timeout() || err.is_connect() {
        return FailureKind::OtherTransient;
    }
    classify_message(&err.to_string()).unwrap_or(FailureKind::OtherFatal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_message_resource_exhausted() {
        let body = r#"{"error":{"code":429,"message":"Resource has been exhausted (e.g. check quota).","status":"RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(classify_message(body), Some(FailureKind::QuotaExceeded));
    }

    #[test]
    fn quota_message_case_insensitive() {
        assert_eq!(
            classify_message("You exceeded your current QUOTA"),
            Some(FailureKind::QuotaExceeded)
        );
    }

    #[test]
    fn auth_message_key_not_valid() {
        let body = r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(classify_message(body), Some(FailureKind::AuthInvalid));
    }

    #[test]
    fn auth_message_unauthenticated() {
        assert_eq!(
            classify_message("Request had invalid authentication credentials. UNAUTHENTICATED"),
            Some(FailureKind::AuthInvalid)
        );
    }

    #[test]
    fn unrelated_message_is_unclassified() {
        assert_eq!(
            classify_message("Invalid JSON payload received. Unknown name \"foo\""),
            None
        );
        assert_eq!(classify_message(""), None);
    }

    #[test]
    fn status_400_with_key_message_is_auth() {
        let body = r#"{"error":{"message":"API key not valid."}}"#;
        assert_eq!(classify_status(400, body), FailureKind::AuthInvalid);
    }

    #[test]
    fn status_400_plain_is_fatal() {
        assert_eq!(
            classify_status(400, "malformed request"),
            FailureKind::OtherFatal
        );
    }

    #[test]
    fn status_429_without_wording_is_quota() {
        assert_eq!(classify_status(429, ""), FailureKind::QuotaExceeded);
    }

    #[test]
    fn status_401_and_403_are_auth() {
        assert_eq!(classify_status(401, "nope"), FailureKind::AuthInvalid);
        assert_eq!(classify_status(403, "forbidden"), FailureKind::AuthInvalid);
    }

    #[test]
    fn status_5xx_and_408_are_transient() {
        for status in [408, 500, 502, 503, 504] {
            assert_eq!(
                classify_status(status, "try later"),
                FailureKind::OtherTransient,
                "status {status}"
            );
        }
    }

    #[test]
    fn status_404_is_fatal() {
        assert_eq!(
            classify_status(404, "model not found"),
            FailureKind::OtherFatal
        );
    }

    #[test]
    fn quota_wording_wins_over_status() {
        assert_eq!(
            classify_status(503, "quota exceeded for project"),
            FailureKind::QuotaExceeded
        );
    }
}
