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

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{DefaultBodyLimit, Request};
use axum::http::{Method, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use apkdepot_core::artifact::has_artifact_extension;
use apkdepot_core::{AaptInspector, ArtifactStore, Depot, PackageInspector, PolicyStore};

use crate::api::{self, AppState};
use crate::config::ServerConfig;
use crate::dashboard;

/// Local mount of the artifact directory. `downloads.url_prefix` may point
/// elsewhere, e.g. at a CDN mirroring it.
pub const DOWNLOAD_ROUTE: &str = "/apks";

/// Open the snapshot and artifact directory named in `config` and wire them
/// to `inspector`.
pub fn build_depot(config: &ServerConfig, inspector: Arc<dyn PackageInspector>) -> Result<Depot> {
    let store = Arc::new(PolicyStore::open(&config.storage.metadata_file));
    let artifacts = ArtifactStore::open(&config.storage.artifact_dir).with_context(|| {
        format!(
            "Failed to create artifact directory: {}",
            config.storage.artifact_dir
        )
    })?;
    Ok(Depot::new(store, artifacts, inspector).with_download_prefix(&config.downloads.url_prefix))
}

pub fn aapt_inspector(config: &ServerConfig) -> Arc<dyn PackageInspector> {
    Arc::new(AaptInspector::new(&config.inspector.aapt_path))
}

pub fn router(depot: Arc<Depot>, config: &ServerConfig) -> Router {
    let downloads = Router::new()
        .fallback_service(ServeDir::new(depot.artifacts().dir()))
        .layer(middleware::from_fn(stored_artifacts_only));
    let state = AppState { depot };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/", get(dashboard::dashboard_handler))
        .route("/api/check-update", get(api::check_update_handler))
        .route("/api/version-list", get(api::version_list_handler))
        .route("/api/apks", get(api::catalog_handler))
        .route("/api/apks/{file_name}", delete(api::delete_handler))
        .route("/api/config/update", post(api::update_config_handler))
        .route(
            "/api/upload",
            post(api::upload_handler)
                .layer(DefaultBodyLimit::max(config.storage.max_upload_bytes)),
        )
        .nest_service(DOWNLOAD_ROUTE, downloads)
        .with_state(state)
        .layer(cors)
}

// The artifact directory also holds in-flight uploads; only finished `.apk`
// files are downloadable.
async fn stored_artifacts_only(request: Request, next: Next) -> Response {
    let name = request.uri().path().rsplit('/').next().unwrap_or_default();
    if name.starts_with('.') || !has_artifact_extension(name) {
        return StatusCode::NOT_FOUND.into_response();
    }
    next.run(request).await
}
