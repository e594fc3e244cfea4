use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use display_model::{ConfigId, DisplaySettingsFields, PhotoDescriptor};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::display::DisplayService;
use crate::error::DisplayError;
use crate::qr;

const DEFAULT_PRELOAD: usize = 3;

#[derive(Clone)]
pub struct AppState {
    pub service: DisplayService,
    pub public_url: Option<String>,
    pub bind_addr: SocketAddr,
    pub preload_limit: usize,
    /// Parent of every per-request token; cancelled on shutdown.
    pub cancel: CancellationToken,
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/settings", get(active_settings).post(create_settings))
        .route("/settings/all", get(all_settings))
        .route(
            "/settings/{id}",
            get(settings_by_id)
                .put(update_settings)
                .delete(delete_settings),
        )
        .route("/settings/{id}/activate", post(activate_settings))
        .route("/next", get(next_photo))
        .route("/current", get(current_photo))
        .route("/preload", get(preload_photos))
        .route("/count", get(photo_count))
        .route("/reset", post(reset_sequence))
        .route("/admin-url", get(admin_url))
        .route("/admin-qr.png", get(admin_qr));

    Router::new().nest("/api/display", api).with_state(state)
}

/// Serves the API on `bind_addr` until `state.cancel` fires.
pub async fn serve(state: AppState, bind_addr: SocketAddr) -> Result<()> {
    let shutdown = state.cancel.clone();
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind display web server on {bind_addr}"))?;
    tracing::info!(%bind_addr, "starting display web server");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
        })
        .await
        .context("display web server failed")?;
    tracing::info!("display web server stopped");
    Ok(())
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    reason: &'static str,
    message: String,
}

impl ApiError {
    fn bad_request(reason: &'static str, message: impl ToString) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            reason,
            message: message.to_string(),
        }
    }

    fn internal(reason: &'static str, err: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            reason,
            message: format!("{err:#}"),
        }
    }
}

fn status_for(err: &DisplayError) -> StatusCode {
    match err {
        DisplayError::Validation(_) => StatusCode::BAD_REQUEST,
        DisplayError::NotFound(_) => StatusCode::NOT_FOUND,
        DisplayError::CannotDeleteLast => StatusCode::CONFLICT,
        // nginx's "client closed request"
        DisplayError::Cancelled => {
            StatusCode::from_u16(499).unwrap_or(StatusCode::SERVICE_UNAVAILABLE)
        }
        DisplayError::Library(_) | DisplayError::Persistence(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<DisplayError> for ApiError {
    fn from(err: DisplayError) -> Self {
        Self {
            status: status_for(&err),
            reason: err.reason(),
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(err: JsonRejection) -> Self {
        Self::bad_request("invalid-body", err.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(err: QueryRejection) -> Self {
        Self::bad_request("invalid-query", err.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(err: PathRejection) -> Self {
        Self::bad_request("invalid-path", err.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(reason = self.reason, error = %self.message, "request failed");
        } else {
            tracing::debug!(reason = self.reason, error = %self.message, status = %self.status, "request rejected");
        }
        let body = Json(json!({ "error": self.message, "reason": self.reason }));
        (self.status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Default, Deserialize)]
struct ConfigQuery {
    #[serde(rename = "configId")]
    config_id: Option<ConfigId>,
}

#[derive(Debug, Default, Deserialize)]
struct PreloadQuery {
    count: Option<usize>,
    #[serde(rename = "configId")]
    config_id: Option<ConfigId>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CountBody {
    config_id: Option<ConfigId>,
    count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResetBody {
    config_id: ConfigId,
}

#[derive(Debug, Serialize)]
struct AdminUrlBody {
    url: String,
}

fn photo_or_empty(photo: Option<PhotoDescriptor>) -> Response {
    match photo {
        Some(photo) => Json(photo).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn active_settings(State(state): State<AppState>) -> ApiResult<Response> {
    let config = state.service.get_active_settings().await?;
    Ok(Json(config).into_response())
}

async fn all_settings(State(state): State<AppState>) -> Response {
    Json(state.service.get_all_settings().await).into_response()
}

async fn settings_by_id(
    State(state): State<AppState>,
    path: std::result::Result<Path<ConfigId>, PathRejection>,
) -> ApiResult<Response> {
    let Path(id) = path?;
    let config = state.service.get_settings_by_id(id).await?;
    Ok(Json(config).into_response())
}

async fn create_settings(
    State(state): State<AppState>,
    body: std::result::Result<Json<DisplaySettingsFields>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(fields) = body?;
    let config = state.service.create_settings(&fields).await?;
    Ok((StatusCode::CREATED, Json(config)).into_response())
}

async fn update_settings(
    State(state): State<AppState>,
    path: std::result::Result<Path<ConfigId>, PathRejection>,
    body: std::result::Result<Json<DisplaySettingsFields>, JsonRejection>,
) -> ApiResult<Response> {
    let Path(id) = path?;
    let Json(fields) = body?;
    let config = state.service.update_settings(id, &fields).await?;
    Ok(Json(config).into_response())
}

async fn delete_settings(
    State(state): State<AppState>,
    path: std::result::Result<Path<ConfigId>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(id) = path?;
    state.service.delete_settings(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn activate_settings(
    State(state): State<AppState>,
    path: std::result::Result<Path<ConfigId>, PathRejection>,
) -> ApiResult<Response> {
    let Path(id) = path?;
    let config = state.service.activate_settings(id).await?;
    Ok(Json(config).into_response())
}

async fn next_photo(
    State(state): State<AppState>,
    query: std::result::Result<Query<ConfigQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(query) = query?;
    let cancel = state.cancel.child_token();
    let photo = state
        .service
        .get_next_photo(query.config_id, &cancel)
        .await?;
    Ok(photo_or_empty(photo))
}

async fn current_photo(
    State(state): State<AppState>,
    query: std::result::Result<Query<ConfigQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(query) = query?;
    let cancel = state.cancel.child_token();
    let photo = state
        .service
        .get_current_photo(query.config_id, &cancel)
        .await?;
    Ok(photo_or_empty(photo))
}

async fn preload_photos(
    State(state): State<AppState>,
    query: std::result::Result<Query<PreloadQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(query) = query?;
    let count = query
        .count
        .unwrap_or(DEFAULT_PRELOAD)
        .min(state.preload_limit);
    let cancel = state.cancel.child_token();
    let photos = state
        .service
        .get_preload_photos(count, query.config_id, &cancel)
        .await?;
    Ok(Json(photos).into_response())
}

async fn photo_count(
    State(state): State<AppState>,
    query: std::result::Result<Query<ConfigQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(query) = query?;
    let cancel = state.cancel.child_token();
    let count = state
        .service
        .get_photo_count(query.config_id, &cancel)
        .await?;
    Ok(Json(CountBody {
        config_id: query.config_id,
        count,
    })
    .into_response())
}

async fn reset_sequence(
    State(state): State<AppState>,
    query: std::result::Result<Query<ConfigQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(query) = query?;
    let config_id = state.service.reset_sequence(query.config_id).await?;
    tracing::info!(config_id, "sequence reset requested");
    Ok(Json(ResetBody { config_id }).into_response())
}

fn request_admin_url(state: &AppState, headers: &HeaderMap) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok());
    qr::admin_url(state.public_url.as_deref(), host, state.bind_addr)
}

async fn admin_url(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let url = request_admin_url(&state, &headers);
    Json(AdminUrlBody { url }).into_response()
}

async fn admin_qr(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Response> {
    let url = request_admin_url(&state, &headers);
    let png = qr::render_png(&url).map_err(|err| ApiError::internal("qr-error", err))?;
    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use display_model::{SourceScope, ValidationError};

    #[test]
    fn display_errors_map_to_statuses() {
        let cases = [
            (
                DisplayError::Validation(ValidationError::MissingSourceId(SourceScope::Album)),
                400,
            ),
            (DisplayError::NotFound(7), 404),
            (DisplayError::CannotDeleteLast, 409),
            (DisplayError::Cancelled, 499),
            (DisplayError::Library(anyhow::anyhow!("offline")), 500),
            (DisplayError::Persistence(anyhow::anyhow!("disk full")), 500),
        ];
        for (err, status) in cases {
            let reason = err.reason();
            let api = ApiError::from(err);
            assert_eq!(api.status.as_u16(), status);
            assert_eq!(api.reason, reason);
        }
    }
}
