use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{opts, Encoder, IntCounterVec, Registry, TextEncoder};

pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

fn counter(name: &str, help: &str, labels: &[&str]) -> IntCounterVec {
    let c = IntCounterVec::new(opts!(name, help), labels).expect("static metric definition");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
}

pub static RECONCILE_TOTAL: Lazy<IntCounterVec> =
    Lazy::new(|| counter("mysql_operator_reconcile_total", "Reconcile invocations by outcome", &["outcome"]));
pub static RECONCILE_ERRORS: Lazy<IntCounterVec> =
    Lazy::new(|| counter("mysql_operator_reconcile_errors_total", "Failed reconciles by error class", &["error"]));
pub static CHILD_WRITES: Lazy<IntCounterVec> =
    Lazy::new(|| counter("mysql_operator_child_writes_total", "Create/update calls on child objects", &["kind", "op"]));
pub static ADMISSION_TOTAL: Lazy<IntCounterVec> =
    Lazy::new(|| counter("mysql_operator_admission_total", "Admission reviews by hook and verdict", &["hook", "allowed"]));
pub static CONVERSION_TOTAL: Lazy<IntCounterVec> =
    Lazy::new(|| counter("mysql_operator_conversion_total", "Conversion reviews by result", &["result"]));

pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buf = Vec::new();
    if encoder.encode(&metric_families, &mut buf).is_err() { return StatusCode::INTERNAL_SERVER_ERROR.into_response(); }
    ([("Content-Type", "text/plain; version=0.0.4")], buf).into_response()
}
