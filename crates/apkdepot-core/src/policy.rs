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

//! Release policy record

use serde::{Deserialize, Serialize};

/// Rollout rates are expressed in parts per ten thousand of the device
/// population.
pub const ROLLOUT_SCALE: i32 = 10_000;

/// Per-package release policy, as persisted in the metadata snapshot.
///
/// The latest-version fields are owned by ingestion and only move forward;
/// `min_force_version_code` and `rollout_rate` are owned by the admin.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReleasePolicy {
    pub package_name: String,
    pub latest_version_code: u32,
    pub latest_version_name: String,
    /// Canonical artifact name of the latest build
    pub latest_file_name: String,
    /// Clients below this version are forced to update
    pub min_force_version_code: u32,
    /// Share of devices offered the latest build, 0..=10000
    pub rollout_rate: i32,
}

impl ReleasePolicy {
    /// A fresh, fully gated-off policy for a package nobody has configured yet.
    pub fn new(package_name: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
            rollout_rate: 0,
            ..Self::default()
        }
    }

    pub fn is_valid_rollout_rate(rate: i32) -> bool {
        (0..=ROLLOUT_SCALE).contains(&rate)
    }
}
