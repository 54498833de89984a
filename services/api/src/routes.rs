use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use fund_leads::error::AppError;
use fund_leads::workflows::enquiries::{enquiry_router, EnquiryRepository, EnquiryService};
use fund_leads::workflows::jobs::{DigestSummary, StaleScanSummary};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct StaleLeadsRequest {
    #[serde(default)]
    pub(crate) days_threshold: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct WeeklyDigestRequest {
    #[serde(default)]
    pub(crate) window_days: Option<i64>,
}

pub(crate) fn with_enquiry_routes<R>(service: Arc<EnquiryService<R>>) -> axum::Router
where
    R: EnquiryRepository + 'static,
{
    enquiry_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/jobs/stale-leads",
            axum::routing::post(stale_leads_endpoint),
        )
        .route(
            "/api/v1/jobs/weekly-digest",
            axum::routing::post(weekly_digest_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Cron trigger; an absent body uses the configured threshold.
pub(crate) async fn stale_leads_endpoint(
    Extension(state): Extension<AppState>,
    payload: Option<Json<StaleLeadsRequest>>,
) -> Result<Json<StaleScanSummary>, AppError> {
    let Json(request) = payload.unwrap_or_default();
    let days = request
        .days_threshold
        .unwrap_or(state.jobs.stale_after_days);
    let summary = state.jobs.stale.scan(days).await?;
    Ok(Json(summary))
}

pub(crate) async fn weekly_digest_endpoint(
    Extension(state): Extension<AppState>,
    payload: Option<Json<WeeklyDigestRequest>>,
) -> Result<Json<DigestSummary>, AppError> {
    let Json(request) = payload.unwrap_or_default();
    let days = request
        .window_days
        .unwrap_or(state.jobs.digest_window_days);
    let summary = state.jobs.digest.run(days).await?;
    Ok(Json(summary))
}
