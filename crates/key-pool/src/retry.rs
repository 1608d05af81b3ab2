//! Bounded key rotation around a single generation request
//!
//! One `generate` call makes at most one attempt per key in the pool. Attempts
//! are strictly sequential because each rotation decision depends on the
//! previous outcome:
//!
//! - Ready → Attempting (pool non-empty)
//! - Attempting → Done(Success) (provider returned text)
//! - Attempting → Attempting(next) (quota/auth failure, more than one key)
//! - Attempting → Done(Failure) (any other failure, or only one key)
//! - Attempting → Done(Exhausted) (every key tried)

use std::sync::Arc;
use std::time::Instant;

use generation::{FailureKind, GenerationOutcome, Generator};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::pool::KeyPool;

/// One provider call made during a `generate` run. Diagnostic only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    /// 1-based
    pub attempt_number: usize,
    /// Pool index of the key used
    pub credential_index: usize,
    pub outcome: GenerationOutcome,
}

/// Result of a `generate` run together with every attempt it made.
#[derive(Debug)]
pub struct GenerateReport {
    pub result: Result<String>,
    pub attempts: Vec<AttemptRecord>,
}

/// Whether a failure justifies trying the next key.
///
/// Only quota and credential failures depend on which key was used; blocked
/// content or a malformed request fails the same way with every key.
pub fn should_rotate(kind: FailureKind, total_keys: usize) -> bool {
    matches!(kind, FailureKind::QuotaExceeded | FailureKind::AuthInvalid) && total_keys > 1
}

/// Drives a `Generator` across the keys of a `KeyPool`.
///
/// The pool is shared (`Arc`) with whatever reconfigures it; the controller is
/// the only caller of `advance`. Concurrent `generate` calls queue on an
/// internal gate so the cursor has a single writer at any time.
pub struct RetryController {
    pool: Arc<KeyPool>,
    generator: Arc<dyn Generator>,
    gate: Mutex<()>,
}

impl RetryController {
    pub fn new(pool: Arc<KeyPool>, generator: Arc<dyn Generator>) -> Self {
        Self {
            pool,
            generator,
            gate: Mutex::new(()),
        }
    }

    pub fn pool(&self) -> &Arc<KeyPool> {
        &self.pool
    }

    /// Turn `user_text` into generated text, rotating keys on quota/auth
    /// failures. The caller validates that the text is not blank.
    pub async fn generate(&self, user_text: &str) -> Result<String> {
        self.run(user_text).await.result
    }

    /// Same as `generate`, also returning the attempt log.
    pub async fn run(&self, user_text: &str) -> GenerateReport {
        let _gate = self.gate.lock().await;
        let started = Instant::now();
        let mut attempts = Vec::new();

        let total_keys = self.pool.size().await;
        if total_keys == 0 {
            warn!("generation requested with no API keys configured");
            return GenerateReport {
                result: Err(Error::ConfigurationMissing),
                attempts,
            };
        }

        let mut attempt = 0usize;
        let mut last_message: Option<String> = None;

        while attempt < total_keys {
            let Some(selected) = self.pool.selected().await else {
                warn!(attempt, "key pool emptied during generation");
                return GenerateReport {
                    result: Err(Error::ConfigurationMissing),
                    attempts,
                };
            };

            debug!(
                attempt = attempt + 1,
                total_keys,
                key_index = selected.index,
                generator = self.generator.id(),
                "dispatching generation attempt"
            );
            let outcome = self.generator.call(&selected.key, user_text).await;
            attempts.push(AttemptRecord {
                attempt_number: attempt + 1,
                credential_index: selected.index,
                outcome: outcome.clone(),
            });

            match outcome {
                GenerationOutcome::Success(text) => {
                    info!(
                        attempts = attempt + 1,
                        key_index = selected.index,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "generation succeeded"
                    );
                    return GenerateReport {
                        result: Ok(text),
                        attempts,
                    };
                }
                GenerationOutcome::Failure { kind, message } => {
                    metrics::counter!("cineprompt_attempt_failures_total", "kind" => kind.label())
                        .increment(1);

                    if !should_rotate(kind, total_keys) {
                        warn!(
                            attempt = attempt + 1,
                            key_index = selected.index,
                            kind = kind.label(),
                            error = %message,
                            "generation failed, not retrying"
                        );
                        return GenerateReport {
                            result: Err(Error::Generation { kind, message }),
                            attempts,
                        };
                    }

                    warn!(
                        attempt = attempt + 1,
                        total_keys,
                        key_index = selected.index,
                        kind = kind.label(),
                        error = %message,
                        "key rejected, rotating to next key"
                    );
                    metrics::counter!("cineprompt_key_rotations_total").increment(1);
                    self.pool.advance().await;
                    last_message = Some(message);
                    attempt += 1;
                }
            }
        }

        let last_message = last_message.unwrap_or_else(|| "unknown error".to_string());
        warn!(
            attempts = total_keys,
            last_error = %last_message,
            "every API key failed"
        );
        GenerateReport {
            result: Err(Error::AllAttemptsExhausted {
                attempts: total_keys,
                last_message,
            }),
            attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Delimiter;
    use common::Credential;
    use std::collections::VecDeque;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex as StdMutex;

    /// Generator replaying a fixed script of outcomes and recording which key
    /// each call used.
    struct Scripted {
        outcomes: StdMutex<VecDeque<GenerationOutcome>>,
        keys_used: StdMutex<Vec<String>>,
    }

    impl Scripted {
        fn new(outcomes: Vec<GenerationOutcome>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: StdMutex::new(outcomes.into()),
                keys_used: StdMutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.keys_used.lock().unwrap().len()
        }

        fn keys_used(&self) -> Vec<String> {
            self.keys_used.lock().unwrap().clone()
        }
    }

    impl Generator for Scripted {
        fn id(&self) -> &str {
            "scripted"
        }

        fn call<'a>(
            &'a self,
            credential: &'a Credential,
            _request_text: &'a str,
        ) -> Pin<Box<dyn Future<Output = GenerationOutcome> + Send + 'a>> {
            Box::pin(async move {
                self.keys_used
                    .lock()
                    .unwrap()
                    .push(credential.expose().clone());
                self.outcomes
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or_else(|| {
                        GenerationOutcome::failure(FailureKind::OtherFatal, "script exhausted")
                    })
            })
        }
    }

    fn success(text: &str) -> GenerationOutcome {
        GenerationOutcome::Success(text.to_string())
    }

    fn fail(kind: FailureKind, message: &str) -> GenerationOutcome {
        GenerationOutcome::failure(kind, message)
    }

    fn controller(keys: &str, script: &Arc<Scripted>) -> RetryController {
        let pool = Arc::new(KeyPool::from_config(keys, Delimiter::Comma));
        RetryController::new(pool, script.clone())
    }

    #[test]
    fn rotation_policy() {
        assert!(should_rotate(FailureKind::QuotaExceeded, 2));
        assert!(should_rotate(FailureKind::AuthInvalid, 5));
        assert!(!should_rotate(FailureKind::QuotaExceeded, 1));
        assert!(!should_rotate(FailureKind::AuthInvalid, 1));
        for kind in [
            FailureKind::Blocked,
            FailureKind::OtherTransient,
            FailureKind::OtherFatal,
        ] {
            assert!(!should_rotate(kind, 10), "{kind} must never rotate");
        }
    }

    #[tokio::test]
    async fn empty_pool_fails_without_calling_provider() {
        let script = Scripted::new(vec![success("never")]);
        let ctl = controller("", &script);

        let report = ctl.run("story").await;
        assert_eq!(report.result, Err(Error::ConfigurationMissing));
        assert!(report.attempts.is_empty());
        assert_eq!(script.calls(), 0);
    }

    #[tokio::test]
    async fn first_key_success_returns_text() {
        let script = Scripted::new(vec![success("Title: X")]);
        let ctl = controller("k1,k2", &script);

        assert_eq!(ctl.generate("story").await.unwrap(), "Title: X");
        assert_eq!(script.calls(), 1);
        assert_eq!(ctl.pool().cursor().await, Some(0));
    }

    #[tokio::test]
    async fn single_key_quota_fails_without_rotating() {
        let script = Scripted::new(vec![
            fail(FailureKind::QuotaExceeded, "quota exceeded"),
            success("should not be reached"),
        ]);
        let ctl = controller("k1", &script);

        let err = ctl.generate("story").await.unwrap_err();
        assert_eq!(
            err,
            Error::Generation {
                kind: FailureKind::QuotaExceeded,
                message: "quota exceeded".into()
            }
        );
        assert_eq!(script.calls(), 1);
        assert_eq!(ctl.pool().cursor().await, Some(0));
    }

    #[tokio::test]
    async fn auth_then_success_rotates_once() {
        let script = Scripted::new(vec![
            fail(FailureKind::AuthInvalid, "API key not valid"),
            success("Title: X\nCinematic Description: ..."),
        ]);
        let ctl = controller("k1,k2", &script);

        let report = ctl.run("story").await;
        assert_eq!(
            report.result.unwrap(),
            "Title: X\nCinematic Description: ..."
        );
        assert_eq!(report.attempts.len(), 2);
        assert_eq!(report.attempts[0].credential_index, 0);
        assert_eq!(report.attempts[1].credential_index, 1);
        assert_eq!(report.attempts[1].attempt_number, 2);
        assert_eq!(script.keys_used(), vec!["k1", "k2"]);
        assert_eq!(ctl.pool().cursor().await, Some(1));
    }

    #[tokio::test]
    async fn k_failures_then_success_advances_k_positions() {
        let n = 5;
        let keys: Vec<String> = (0..n).map(|i| format!("k{i}")).collect();
        for k in 0..n {
            let mut script_outcomes = Vec::new();
            for i in 0..k {
                let kind = if i % 2 == 0 {
                    FailureKind::QuotaExceeded
                } else {
                    FailureKind::AuthInvalid
                };
                script_outcomes.push(fail(kind, "rejected"));
            }
            script_outcomes.push(success("ok"));
            let script = Scripted::new(script_outcomes);
            let ctl = controller(&keys.join(","), &script);

            assert_eq!(ctl.generate("story").await.unwrap(), "ok", "k={k}");
            assert_eq!(script.calls(), k + 1, "k={k}");
            assert_eq!(ctl.pool().cursor().await, Some(k), "k={k}");
        }
    }

    #[tokio::test]
    async fn rotation_continues_from_current_cursor() {
        let script = Scripted::new(vec![
            fail(FailureKind::QuotaExceeded, "quota"),
            success("ok"),
        ]);
        let pool = Arc::new(KeyPool::new());
        pool.restore(vec!["k1".into(), "k2".into(), "k3".into()], 2)
            .await;
        let ctl = RetryController::new(pool, script.clone());

        assert_eq!(ctl.generate("story").await.unwrap(), "ok");
        assert_eq!(script.keys_used(), vec!["k3", "k1"]);
        assert_eq!(ctl.pool().cursor().await, Some(0));
    }

    #[tokio::test]
    async fn all_keys_quota_exhausts_after_exactly_n_attempts() {
        let script = Scripted::new(vec![
            fail(FailureKind::QuotaExceeded, "quota on k1"),
            fail(FailureKind::QuotaExceeded, "quota on k2"),
            fail(FailureKind::QuotaExceeded, "quota on k3"),
            success("must not be used"),
        ]);
        let ctl = controller("k1,k2,k3", &script);

        let report = ctl.run("story").await;
        assert_eq!(
            report.result,
            Err(Error::AllAttemptsExhausted {
                attempts: 3,
                last_message: "quota on k3".into()
            })
        );
        assert_eq!(report.attempts.len(), 3);
        assert_eq!(script.calls(), 3);
        // Full cycle lands back on the starting key
        assert_eq!(ctl.pool().cursor().await, Some(0));
    }

    #[tokio::test]
    async fn blocked_never_rotates() {
        let script = Scripted::new(vec![
            fail(FailureKind::Blocked, "no content returned"),
            success("must not be used"),
        ]);
        let ctl = controller("k1,k2,k3", &script);

        let err = ctl.generate("story").await.unwrap_err();
        assert_eq!(err.label(), "blocked");
        assert!(err.to_string().contains("blocked"), "got: {err}");
        assert_eq!(script.calls(), 1);
        assert_eq!(ctl.pool().cursor().await, Some(0));
    }

    #[tokio::test]
    async fn single_key_blocked_fails_after_one_attempt() {
        let script = Scripted::new(vec![fail(FailureKind::Blocked, "no content returned")]);
        let ctl = controller("k1", &script);

        let report = ctl.run("story").await;
        let err = report.result.unwrap_err();
        assert_eq!(err.to_string(), "blocked: no content returned");
        assert_eq!(report.attempts.len(), 1);
    }

    #[tokio::test]
    async fn fatal_and_transient_never_rotate() {
        for kind in [FailureKind::OtherFatal, FailureKind::OtherTransient] {
            let script = Scripted::new(vec![fail(kind, "boom"), success("unused")]);
            let ctl = controller("k1,k2", &script);

            let err = ctl.generate("story").await.unwrap_err();
            assert_eq!(
                err,
                Error::Generation {
                    kind,
                    message: "boom".into()
                }
            );
            assert_eq!(script.calls(), 1, "{kind}");
            assert_eq!(ctl.pool().cursor().await, Some(0), "{kind}");
        }
    }

    #[tokio::test]
    async fn quota_then_blocked_stops_on_blocked() {
        let script = Scripted::new(vec![
            fail(FailureKind::QuotaExceeded, "quota"),
            fail(FailureKind::Blocked, "no content returned"),
            success("unused"),
        ]);
        let ctl = controller("k1,k2,k3", &script);

        let err = ctl.generate("story").await.unwrap_err();
        assert_eq!(err.label(), "blocked");
        assert_eq!(script.calls(), 2);
        assert_eq!(ctl.pool().cursor().await, Some(1));
    }

    #[tokio::test]
    async fn concurrent_generates_are_serialized() {
        let script = Scripted::new(vec![
            fail(FailureKind::QuotaExceeded, "quota"),
            success("first"),
            fail(FailureKind::QuotaExceeded, "quota"),
            success("second"),
        ]);
        let ctl = Arc::new(controller("k1,k2", &script));

        let a = tokio::spawn({
            let ctl = ctl.clone();
            async move { ctl.generate("a").await }
        });
        let b = tokio::spawn({
            let ctl = ctl.clone();
            async move { ctl.generate("b").await }
        });
        let mut results = vec![a.await.unwrap().unwrap(), b.await.unwrap().unwrap()];
        results.sort();

        // Each run rotated exactly once; interleaving would have mixed them up
        assert_eq!(results, vec!["first", "second"]);
        assert_eq!(script.keys_used(), vec!["k1", "k2", "k2", "k1"]);
    }

    #[tokio::test]
    async fn rotations_are_counted() {
        use metrics_exporter_prometheus::PrometheusBuilder;

        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        let script = Scripted::new(vec![
            fail(FailureKind::AuthInvalid, "bad key"),
            success("ok"),
        ]);
        let ctl = controller("k1,k2", &script);
        {
            let _guard = metrics::set_default_local_recorder(&recorder);
            ctl.generate("story").await.unwrap();
        }

        let output = handle.render();
        assert!(
            output.contains("cineprompt_key_rotations_total 1"),
            "got: {output}"
        );
        assert!(
            output.contains("kind=\"auth_invalid\""),
            "got: {output}"
        );
    }
}
