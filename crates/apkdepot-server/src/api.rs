// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of ApkDepot.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

use apkdepot_core::artifact::has_artifact_extension;
use apkdepot_core::{Depot, DepotError};
use apkdepot_shared::admin::{ErrorResponse, MessageResponse, UpdatePolicyRequest, UploadResponse};
use apkdepot_shared::catalog::{CatalogEntry, VersionListQuery, VersionListResponse};
use apkdepot_shared::update::{CheckUpdateQuery, CheckUpdateResponse};

/// Multipart field carrying the uploaded package
pub const UPLOAD_FIELD: &str = "apkfile";

#[derive(Debug, Clone)]
pub struct AppState {
    pub depot: Arc<Depot>,
}

/// JSON error body with a status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<DepotError> for ApiError {
    fn from(err: DepotError) -> Self {
        let status = if matches!(err, DepotError::NotFound(_)) {
            StatusCode::NOT_FOUND
        } else if err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self::new(status, err.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        DepotError::Io(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, error = %self.message, "Request failed");
        } else {
            warn!(status = %self.status, error = %self.message, "Request rejected");
        }
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

// The depot does blocking file and process I/O; keep it off the async workers.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> apkdepot_core::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::internal(format!("worker task failed: {e}")))?
        .map_err(ApiError::from)
}

/// GET /api/check-update - automatic update check from a device
pub async fn check_update_handler(
    State(state): State<AppState>,
    Query(query): Query<CheckUpdateQuery>,
) -> Result<Json<CheckUpdateResponse>, ApiError> {
    let depot = Arc::clone(&state.depot);
    Ok(Json(blocking(move || depot.check_update(&query)).await?))
}

/// GET /api/version-list - manual version list for a package
pub async fn version_list_handler(
    State(state): State<AppState>,
    Query(query): Query<VersionListQuery>,
) -> Result<Json<VersionListResponse>, ApiError> {
    let depot = Arc::clone(&state.depot);
    let response = blocking(move || depot.list_versions(query.package_name.as_deref())).await?;
    Ok(Json(response))
}

/// GET /api/apks - every stored build with its rollout settings
pub async fn catalog_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<CatalogEntry>>, ApiError> {
    let depot = Arc::clone(&state.depot);
    Ok(Json(blocking(move || depot.catalog()).await?))
}

/// POST /api/config/update - change rollout rate and forced-update baseline
pub async fn update_config_handler(
    State(state): State<AppState>,
    body: Result<Json<UpdatePolicyRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::bad_request(format!("Invalid JSON: {e}")))?;
    let depot = Arc::clone(&state.depot);
    blocking(move || depot.update_policy(&request)).await?;
    Ok(Json(MessageResponse::new("Config updated")))
}

/// POST /api/upload - store a build and advance its package's latest version
pub async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(e.status(), e.body_text()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let original_name = field.file_name().unwrap_or_default().to_owned();
        if !has_artifact_extension(&original_name) {
            return Err(ApiError::bad_request(
                "Invalid file type. Only .apk files are allowed.",
            ));
        }

        let staged = state.depot.staging_file()?;
        let mut writer = tokio::fs::File::from_std(staged.reopen()?);
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| ApiError::new(e.status(), e.body_text()))?
        {
            writer.write_all(&chunk).await?;
        }
        writer.flush().await?;
        drop(writer);

        let depot = Arc::clone(&state.depot);
        let outcome = blocking(move || depot.ingest(staged)).await?;
        info!(
            original_name = %original_name,
            saved_as = %outcome.file_name,
            "Upload accepted"
        );

        return Ok(Json(UploadResponse {
            message: "Upload successful".to_owned(),
            saved_as: outcome.file_name,
            package_name: outcome.package_name,
            version_code: outcome.version_code,
            became_latest: outcome.became_latest,
        }));
    }

    Err(ApiError::bad_request("Invalid file"))
}

/// DELETE /api/apks/{file_name} - remove a stored build
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let depot = Arc::clone(&state.depot);
    blocking(move || depot.delete_artifact(&file_name)).await?;
    Ok(Json(MessageResponse::new("Deleted")))
}
