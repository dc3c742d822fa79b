use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, warn};

use geodash_core::DataviewError;
use geodash_dataviews::RequestParams;

use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse<'a> {
    pub status: &'a str,
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

/// Dataview error rendered as `{ message, type, http_status }`.
#[derive(Debug)]
pub struct ApiError(pub DataviewError);

impl From<DataviewError> for ApiError {
    fn from(err: DataviewError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = self.0.to_body();
        if self.0.is_server_error() {
            error!(error = %self.0, kind = %body.kind, "dataview request failed");
        } else {
            warn!(error = %self.0, kind = %body.kind, "dataview request rejected");
        }
        let status =
            StatusCode::from_u16(body.http_status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(body)).into_response()
    }
}

pub async fn get_dataview(
    State(state): State<AppState>,
    Path((token, name)): Path<(String, String)>,
    Query(params): Query<RequestParams>,
) -> Result<Json<Value>, ApiError> {
    let provider = state.mapconfigs.provider(&token);
    let output = state
        .backend
        .get_dataview(&provider, state.db.as_ref(), &name, &params)
        .await?;
    if !output.stats.is_empty() {
        debug!(dataview = %name, stats = %serde_json::Value::Object(output.stats.clone()), "dataview stats");
    }
    Ok(Json(output.result))
}

pub async fn search_dataview(
    State(state): State<AppState>,
    Path((token, name)): Path<(String, String)>,
    Query(params): Query<RequestParams>,
) -> Result<Json<Value>, ApiError> {
    let provider = state.mapconfigs.provider(&token);
    let result = state
        .backend
        .search(&provider, state.db.as_ref(), &name, &params)
        .await?;
    Ok(Json(result))
}
