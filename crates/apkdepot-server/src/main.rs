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

use tracing::info;
use tracing_subscriber::EnvFilter;

use apkdepot_server::app;
use apkdepot_server::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("apkdepot_server=info,apkdepot_core=info")),
        )
        .init();

    let config_path = std::env::args().nth(1);
    info!(path = ?config_path, "Loading configuration");
    let config = ServerConfig::load(config_path.as_deref())?;

    let depot = Arc::new(app::build_depot(&config, app::aapt_inspector(&config))?);
    info!(
        packages = depot.store().len(),
        artifact_dir = %config.storage.artifact_dir,
        "Release policies loaded"
    );

    let router = app::router(depot, &config);

    let addr = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("ApkDepot server listening on {addr}");
    axum::serve(listener, router).await?;

    Ok(())
}
