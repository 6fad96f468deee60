use axum::{
    Router,
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
    routing::get,
};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tracing::warn;

static OBSERVABILITY_ENABLED: OnceLock<bool> = OnceLock::new();

const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.25, 0.5, 0.75, 1.0, 2.5, 5.0, 7.5, 10.0,
];

/// `OBSERVABILITY_ENABLED`, on unless set to `false` or `0`.
pub fn is_observability_enabled() -> bool {
    *OBSERVABILITY_ENABLED.get_or_init(|| {
        std::env::var("OBSERVABILITY_ENABLED")
            .map(|v| v.to_lowercase() != "false" && v != "0")
            .unwrap_or(true)
    })
}

/// Installs the Prometheus recorder and its upkeep task. `None` when
/// observability is off or a recorder could not be installed.
pub fn init_metrics() -> Option<PrometheusHandle> {
    if !is_observability_enabled() {
        return None;
    }

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            LATENCY_BUCKETS,
        )
        .and_then(|builder| builder.install_recorder())
        .map_err(|e| warn!(error = %e, "Prometheus recorder not installed"))
        .ok()?;

    let upkeep_handle = handle.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(5)).await;
            upkeep_handle.run_upkeep();
        }
    });

    Some(handle)
}

pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    if !is_observability_enabled() {
        return next.run(req).await;
    }

    let start = Instant::now();
    let method = req.method().as_str().to_owned();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| req.uri().path().to_owned());

    gauge!("http_requests_active").increment(1.0);

    let response = next.run(req).await;

    let latency = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    counter!("http_requests_total", "method" => method.clone(), "path" => path.clone(), "status" => status)
        .increment(1);
    histogram!("http_request_duration_seconds", "method" => method, "path" => path).record(latency);
    gauge!("http_requests_active").decrement(1.0);

    response
}

/// Router served on `METRICS_PORT`.
pub fn metrics_app(handle: PrometheusHandle) -> Router {
    Router::new().route("/metrics", get(move || async move { handle.render() }))
}

// Business metrics

pub fn track_login_success(role: &str) {
    if !is_observability_enabled() {
        return;
    }
    counter!("user_logins_total", "role" => role.to_string(), "status" => "success").increment(1);
}

pub fn track_login_failure(reason: &'static str) {
    if !is_observability_enabled() {
        return;
    }
    counter!("user_logins_total", "role" => "unknown", "status" => "failure", "reason" => reason)
        .increment(1);
}

pub fn track_account_locked() {
    if !is_observability_enabled() {
        return;
    }
    counter!("account_lockouts_total").increment(1);
}

pub fn track_jwt_issued() {
    if !is_observability_enabled() {
        return;
    }
    counter!("jwt_tokens_issued_total").increment(1);
}

pub fn track_enrollment_created() {
    if !is_observability_enabled() {
        return;
    }
    counter!("enrollments_total", "status" => "created").increment(1);
}

pub fn track_enrollment_rejected(reason: &'static str) {
    if !is_observability_enabled() {
        return;
    }
    counter!("enrollments_total", "status" => "rejected", "reason" => reason).increment(1);
}

pub fn track_grades_recorded(count: usize) {
    if !is_observability_enabled() {
        return;
    }
    counter!("grades_recorded_total").increment(count as u64);
}

pub fn track_document_uploaded(size_bytes: usize) {
    if !is_observability_enabled() {
        return;
    }
    counter!("documents_uploaded_total").increment(1);
    histogram!("document_upload_bytes").record(size_bytes as f64);
}

pub fn track_notifications_sent(target: &'static str, recipients: usize) {
    if !is_observability_enabled() {
        return;
    }
    counter!("notifications_sent_total", "target" => target).increment(recipients as u64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_counters_without_recorder_are_noops() {
        track_login_success("admin");
        track_login_failure("bad_password");
        track_account_locked();
        track_jwt_issued();
        track_enrollment_created();
        track_enrollment_rejected("capacity");
        track_grades_recorded(3);
        track_document_uploaded(1024);
        track_notifications_sent("role", 12);
    }
}
