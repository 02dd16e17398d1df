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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionListQuery {
    #[serde(default)]
    pub package_name: Option<String>,
}

/// One stored build of a package, as shown in the manual version list.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionEntry {
    pub file_name: String,
    pub version_code: u32,
    pub version_name: String,
    /// Size in bytes
    pub size: u64,
    /// Human-readable size, e.g. "2.00 MB"
    pub file_size: String,
    pub upload_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionListResponse {
    /// Clients below this version must treat any listed update as mandatory
    pub min_force_version_code: u32,
    pub versions: Vec<VersionEntry>,
}

/// A stored artifact enriched with the release policy of its package.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub file_name: String,
    pub app_name: String,
    pub package_name: String,
    pub version_name: String,
    pub version_code: u32,
    pub size: u64,
    pub file_size: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_base64: Option<String>,
    pub upload_time: DateTime<Utc>,
    pub rollout_rate: i32,
    pub min_force_version_code: u32,
}
