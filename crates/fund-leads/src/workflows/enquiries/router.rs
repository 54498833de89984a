use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{EnquiryId, EnquiryStatus, EnquirySubmission};
use super::repository::{EnquiryRepository, EnquiryView, RepositoryError};
use super::service::{EnquiryService, EnquiryServiceError};

/// Router builder exposing HTTP endpoints for intake and status management.
pub fn enquiry_router<R>(service: Arc<EnquiryService<R>>) -> Router
where
    R: EnquiryRepository + 'static,
{
    Router::new()
        .route("/api/v1/enquiries", post(submit_handler::<R>))
        .route("/api/v1/enquiries/status", post(status_update_handler::<R>))
        .route("/api/v1/enquiries/:enquiry_id", get(fetch_handler::<R>))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub enquiry_id: String,
    pub new_status: EnquiryStatus,
    #[serde(default)]
    pub actor: Option<String>,
}

pub(crate) async fn submit_handler<R>(
    State(service): State<Arc<EnquiryService<R>>>,
    axum::Json(submission): axum::Json<EnquirySubmission>,
) -> Response
where
    R: EnquiryRepository + 'static,
{
    match service.submit(submission).await {
        Ok(enquiry) => {
            let payload = json!({
                "enquiry_id": enquiry.id,
                "status": enquiry.status.label(),
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(EnquiryServiceError::Validation(error)) => {
            let payload = json!({
                "error": error.to_string(),
            });
            (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
        }
        Err(EnquiryServiceError::RateLimited { retry_after }) => {
            let payload = json!({
                "error": EnquiryServiceError::RateLimited { retry_after }.to_string(),
            });
            (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, retry_after.num_seconds().to_string())],
                axum::Json(payload),
            )
                .into_response()
        }
        Err(other) => {
            tracing::error!(error = %other, "enquiry submission failed");
            let payload = json!({
                "error": "unable to record enquiry",
            });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn fetch_handler<R>(
    State(service): State<Arc<EnquiryService<R>>>,
    Path(enquiry_id): Path<String>,
) -> Response
where
    R: EnquiryRepository + 'static,
{
    let id = EnquiryId(enquiry_id);
    match service.get(&id) {
        Ok(enquiry) => (StatusCode::OK, axum::Json(EnquiryView::from(&enquiry))).into_response(),
        Err(EnquiryServiceError::Repository(RepositoryError::NotFound)) => {
            let payload = json!({
                "error": "enquiry not found",
                "enquiry_id": id.0,
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(other) => {
            let payload = json!({
                "error": other.to_string(),
            });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn status_update_handler<R>(
    State(service): State<Arc<EnquiryService<R>>>,
    axum::Json(request): axum::Json<StatusUpdateRequest>,
) -> Response
where
    R: EnquiryRepository + 'static,
{
    let id = EnquiryId(request.enquiry_id);
    let actor = request
        .actor
        .as_deref()
        .map(str::trim)
        .filter(|actor| !actor.is_empty())
        .unwrap_or("system");

    match service.transition(&id, request.new_status, actor).await {
        Ok(outcome) => {
            let payload = json!({
                "enquiry_id": id,
                "status": outcome.enquiry().status.label(),
                "changed": outcome.changed(),
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(EnquiryServiceError::InvalidTransition(error)) => {
            let payload = json!({
                "error": error.to_string(),
                "status": error.from.label(),
            });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        Err(EnquiryServiceError::Repository(RepositoryError::Conflict)) => {
            let payload = json!({
                "error": "enquiry was updated concurrently; retry",
            });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        Err(EnquiryServiceError::Repository(RepositoryError::NotFound)) => {
            let payload = json!({
                "error": "enquiry not found",
                "enquiry_id": id,
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(other) => {
            let payload = json!({
                "error": other.to_string(),
            });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}
