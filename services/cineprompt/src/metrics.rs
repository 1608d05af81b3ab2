//! Prometheus metrics exposition
//!
//! - `cineprompt_generations_total` (counter): label `result`
//! - `cineprompt_generation_duration_seconds` (histogram): label `result`
//! - `cineprompt_attempt_failures_total` (counter): label `kind`, emitted by key-pool
//! - `cineprompt_key_rotations_total` (counter), emitted by key-pool

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

const DURATION_METRIC: &str = "cineprompt_generation_duration_seconds";

/// Generation calls run from sub-second to several provider timeouts when
/// rotating across keys.
const DURATION_BUCKETS: &[f64] = &[0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0];

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(DURATION_METRIC.to_string()), DURATION_BUCKETS)?
        .install_recorder()
}

/// Record one finished `/generate` call. `result` is `success` or an error label.
pub fn record_generation(result: &str, duration_secs: f64) {
    metrics::counter!("cineprompt_generations_total", "result" => result.to_string())
        .increment(1);
    metrics::histogram!(DURATION_METRIC, "result" => result.to_string()).record(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusRecorder;

    /// Isolated recorder/handle pair; install_recorder() can only run once
    /// per process.
    fn isolated_recorder() -> (PrometheusRecorder, PrometheusHandle) {
        let recorder = PrometheusBuilder::new()
            .set_buckets_for_metric(Matcher::Full(DURATION_METRIC.to_string()), DURATION_BUCKETS)
            .expect("failed to set histogram buckets")
            .build_recorder();
        let handle = recorder.handle();
        (recorder, handle)
    }

    #[test]
    fn record_does_not_panic_without_recorder() {
        record_generation("success", 0.5);
    }

    #[test]
    fn record_generation_writes_counter_and_histogram() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_generation("success", 1.2);
        record_generation("blocked", 0.8);

        let output = handle.render();
        assert!(output.contains("cineprompt_generations_total"));
        assert!(output.contains("result=\"success\""));
        assert!(output.contains("result=\"blocked\""));
        assert!(
            output.contains("cineprompt_generation_duration_seconds_bucket"),
            "histogram must render _bucket lines"
        );
        assert!(output.contains("le=\"120\""));
    }
}
