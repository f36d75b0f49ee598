//! Prometheus metrics exposition
//!
//! - `oauth_sim_requests_total` (counter): labels `endpoint`, `status`
//! - `oauth_sim_request_duration_seconds` (histogram): label `endpoint`
//!
//! Tests read these through `/metrics` to tell how often the proxy under
//! test hit a given simulator endpoint.

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

const DURATION_METRIC: &str = "oauth_sim_request_duration_seconds";

const DURATION_BUCKETS: &[f64] = &[0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.5, 1.0];

fn builder() -> anyhow::Result<PrometheusBuilder> {
    Ok(PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(DURATION_METRIC.to_string()), DURATION_BUCKETS)?)
}

/// Install the global Prometheus recorder and return its render handle.
pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    Ok(builder()?.install_recorder()?)
}

pub fn record_request(endpoint: &str, status: u16, duration_secs: f64) {
    metrics::counter!(
        "oauth_sim_requests_total",
        "endpoint" => endpoint.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!(DURATION_METRIC, "endpoint" => endpoint.to_string()).record(duration_secs);
}

#[cfg(test)]
pub(crate) fn isolated_recorder() -> (
    metrics_exporter_prometheus::PrometheusRecorder,
    PrometheusHandle,
) {
    let recorder = builder()
        .expect("failed to set histogram buckets")
        .build_recorder();
    let handle = recorder.handle();
    (recorder, handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_without_recorder_is_a_noop() {
        record_request("/token", 200, 0.01);
    }

    #[test]
    fn counter_and_histogram_carry_endpoint_labels() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_request("/token", 200, 0.002);
        record_request("/token", 400, 0.001);
        record_request("/ping", 401, 0.0003);

        let output = handle.render();
        assert!(output.contains("oauth_sim_requests_total"));
        assert!(output.contains("endpoint=\"/token\""));
        assert!(output.contains("status=\"400\""));
        assert!(output.contains("endpoint=\"/ping\""));
        assert!(
            output.contains("oauth_sim_request_duration_seconds_bucket"),
            "duration must render as a histogram"
        );
        assert!(output.contains("le=\"0.0005\""));
    }
}
