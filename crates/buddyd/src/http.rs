// # Status HTTP surface
//
// Read-only views of the reconciler plus an on-demand sync trigger:
//
// - `GET /healthz`: liveness, always `ok`
// - `GET /records`: record groups currently owned by this instance
// - `GET /endpoints`: endpoints currently reported by the source
// - `POST /sync` (also `GET`): run one cycle and return its report
//
// A sync requested while the periodic loop is mid-cycle waits for that
// cycle to finish, then runs its own.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use buddy_core::{CycleReport, Endpoint, RecordGroup, Reconciler};
use std::sync::Arc;
use tracing::error;

/// Build the status router around a shared reconciler
pub fn router(reconciler: Arc<Reconciler>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/records", get(records))
        .route("/endpoints", get(endpoints))
        .route("/sync", get(sync).post(sync))
        .with_state(reconciler)
}

/// Errors are returned as plain text with status 500
struct ApiError(buddy_core::Error);

impl From<buddy_core::Error> for ApiError {
    fn from(err: buddy_core::Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string()).into_response()
    }
}

async fn healthz() -> &'static str {
    "ok"
}

async fn records(
    State(reconciler): State<Arc<Reconciler>>,
) -> Result<Json<Vec<RecordGroup>>, ApiError> {
    Ok(Json(reconciler.records().await?))
}

async fn endpoints(
    State(reconciler): State<Arc<Reconciler>>,
) -> Result<Json<Vec<Endpoint>>, ApiError> {
    Ok(Json(reconciler.endpoints().await?))
}

async fn sync(State(reconciler): State<Arc<Reconciler>>) -> Result<Json<CycleReport>, ApiError> {
    match reconciler.synchronize().await {
        Ok(report) => Ok(Json(report)),
        Err(e) => {
            error!("On-demand sync failed: {}", e);
            Err(e.into())
        }
    }
}
