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

use std::collections::HashSet;
use std::sync::Arc;

use askama::Template;
use axum::extract::State;
use axum::response::{Html, IntoResponse};
use chrono::Utc;
use tracing::error;

use apkdepot_core::{Depot, ReleasePolicy};
use apkdepot_shared::catalog::CatalogEntry;

use crate::api::AppState;

#[derive(Debug, Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub artifacts: Vec<DashboardArtifact>,
    pub policies: Vec<DashboardPolicy>,
    pub total: usize,
    pub server_time: String,
}

#[derive(Debug)]
pub struct DashboardArtifact {
    pub file_name: String,
    pub app_name: String,
    pub package_name: String,
    pub version_name: String,
    pub version_code: u32,
    pub file_size: String,
    pub upload_time: String,
    pub icon_base64: Option<String>,
    pub download_url: String,
    pub is_latest: bool,
}

#[derive(Debug)]
pub struct DashboardPolicy {
    pub package_name: String,
    pub latest_version: String,
    pub rollout_percent: String,
    pub min_force_version_code: u32,
    /// The policy points at a build that is no longer stored
    pub latest_missing: bool,
}

fn rollout_percent(rate: i32) -> String {
    format!("{:.2}%", f64::from(rate) / 100.0)
}

fn dashboard_policy(policy: &ReleasePolicy, stored: &HashSet<&str>) -> DashboardPolicy {
    let has_latest = !policy.latest_file_name.is_empty();
    DashboardPolicy {
        package_name: policy.package_name.clone(),
        latest_version: if has_latest {
            format!("{} ({})", policy.latest_version_name, policy.latest_version_code)
        } else {
            "none".to_owned()
        },
        rollout_percent: rollout_percent(policy.rollout_rate),
        min_force_version_code: policy.min_force_version_code,
        latest_missing: has_latest && !stored.contains(policy.latest_file_name.as_str()),
    }
}

fn dashboard_artifact(depot: &Depot, entry: CatalogEntry) -> DashboardArtifact {
    let is_latest = depot
        .store()
        .get(&entry.package_name)
        .is_some_and(|p| p.latest_file_name == entry.file_name);
    DashboardArtifact {
        download_url: depot.download_url(&entry.file_name),
        upload_time: entry.upload_time.format("%Y-%m-%d %H:%M:%S").to_string(),
        file_name: entry.file_name,
        app_name: entry.app_name,
        package_name: entry.package_name,
        version_name: entry.version_name,
        version_code: entry.version_code,
        file_size: entry.file_size,
        icon_base64: entry.icon_base64,
        is_latest,
    }
}

fn render(depot: &Depot) -> Result<String, String> {
    let catalog = depot.catalog().map_err(|e| e.to_string())?;
    let stored: HashSet<&str> = catalog.iter().map(|e| e.file_name.as_str()).collect();
    let policies: Vec<DashboardPolicy> = depot
        .store()
        .snapshot()
        .iter()
        .map(|p| dashboard_policy(p, &stored))
        .collect();

    let artifacts: Vec<DashboardArtifact> = catalog
        .into_iter()
        .map(|entry| dashboard_artifact(depot, entry))
        .collect();

    let template = DashboardTemplate {
        total: artifacts.len(),
        artifacts,
        policies,
        server_time: Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    };
    template.render().map_err(|e| e.to_string())
}

/// GET / - HTML overview of stored builds and release policies
pub async fn dashboard_handler(State(state): State<AppState>) -> impl IntoResponse {
    let depot = Arc::clone(&state.depot);
    match tokio::task::spawn_blocking(move || render(&depot)).await {
        Ok(Ok(html)) => Html(html),
        Ok(Err(e)) => {
            error!(error = %e, "Failed to render dashboard");
            Html("<h1>Error loading dashboard</h1>".to_owned())
        }
        Err(e) => {
            error!(error = %e, "Dashboard task failed");
            Html("<h1>Error loading dashboard</h1>".to_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rollout_percent() {
        assert_eq!(rollout_percent(0), "0.00%");
        assert_eq!(rollout_percent(1), "0.01%");
        assert_eq!(rollout_percent(2500), "25.00%");
        assert_eq!(rollout_percent(10_000), "100.00%");
    }

    #[test]
    fn test_policy_flags_missing_latest() {
        let policy = ReleasePolicy {
            package_name: "com.example.app".to_owned(),
            latest_version_code: 5,
            latest_version_name: "1.0.5".to_owned(),
            latest_file_name: "com.example.app_5.apk".to_owned(),
            min_force_version_code: 0,
            rollout_rate: 100,
        };

        let stored = HashSet::from(["com.example.app_5.apk"]);
        let row = dashboard_policy(&policy, &stored);
        assert!(!row.latest_missing);
        assert_eq!(row.latest_version, "1.0.5 (5)");

        let row = dashboard_policy(&policy, &HashSet::new());
        assert!(row.latest_missing);
    }

    #[test]
    fn test_policy_without_builds() {
        let row = dashboard_policy(&ReleasePolicy::new("com.example.app"), &HashSet::new());
        assert_eq!(row.latest_version, "none");
        assert!(!row.latest_missing);
    }
}
