//! HTTP(S) entry points the API server calls: admission hooks per schema
//! version, CRD conversion, probes and metrics.
use std::time::Duration;

use axum::routing::{get, post};
use axum::{Json, Router};
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use kube::core::admission::AdmissionReview;
use kube::core::DynamicObject;
use serde::Serialize;
use tracing::info;

use crate::admission::{mutate_review, validate_review};
use crate::config::OperatorConfig;
use crate::conversion::{convert_review, ConversionReview};
use crate::crd::{v1alpha1, v1alpha2, CONVERSION_PATH};
use crate::telemetry::metrics_handler;

pub const MUTATE_V1ALPHA1_PATH: &str = "/mutate-mysql-sample-com-v1alpha1-mysql";
pub const MUTATE_V1ALPHA2_PATH: &str = "/mutate-mysql-sample-com-v1alpha2-mysql";
pub const VALIDATE_V1ALPHA1_PATH: &str = "/validate-mysql-sample-com-v1alpha1-mysql";
pub const VALIDATE_V1ALPHA2_PATH: &str = "/validate-mysql-sample-com-v1alpha2-mysql";

type ReviewResponse = Json<AdmissionReview<DynamicObject>>;

async fn mutate_v1alpha1(Json(review): Json<AdmissionReview<v1alpha1::MySQL>>) -> ReviewResponse { Json(mutate_review(review)) }
async fn mutate_v1alpha2(Json(review): Json<AdmissionReview<v1alpha2::MySQL>>) -> ReviewResponse { Json(mutate_review(review)) }
async fn validate_v1alpha1(Json(review): Json<AdmissionReview<v1alpha1::MySQL>>) -> ReviewResponse { Json(validate_review(review)) }
async fn validate_v1alpha2(Json(review): Json<AdmissionReview<v1alpha2::MySQL>>) -> ReviewResponse { Json(validate_review(review)) }
async fn convert(Json(review): Json<ConversionReview>) -> Json<ConversionReview> { Json(convert_review(review)) }

#[derive(Serialize)]
pub struct HealthResponse { pub status: &'static str }

async fn healthz() -> Json<HealthResponse> { Json(HealthResponse { status: "ok" }) }

pub fn router() -> Router {
    Router::new()
        .route(MUTATE_V1ALPHA1_PATH, post(mutate_v1alpha1))
        .route(MUTATE_V1ALPHA2_PATH, post(mutate_v1alpha2))
        .route(VALIDATE_V1ALPHA1_PATH, post(validate_v1alpha1))
        .route(VALIDATE_V1ALPHA2_PATH, post(validate_v1alpha2))
        .route(CONVERSION_PATH, post(convert))
        .route("/healthz", get(healthz))
        .route("/readyz", get(healthz))
        .route("/metrics", get(metrics_handler))
}

/// Serves until Ctrl+C, then drains for up to five seconds.
pub async fn serve(config: &OperatorConfig) -> anyhow::Result<()> {
    let handle = Handle::new();
    let shutdown = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!(target: "shutdown.signal", "received Ctrl+C");
            shutdown.graceful_shutdown(Some(Duration::from_secs(5)));
        }
    });
    let addr = config.webhook_addr;
    let app = router().into_make_service();
    match &config.tls {
        Some(tls) => {
            let rustls = RustlsConfig::from_pem_file(&tls.cert, &tls.key).await?;
            info!(%addr, cert=?tls.cert, "webhook.listening.tls");
            axum_server::bind_rustls(addr, rustls).handle(handle).serve(app).await?;
        }
        None => {
            info!(%addr, "webhook.listening.plain");
            axum_server::bind(addr).handle(handle).serve(app).await?;
        }
    }
    Ok(())
}
