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

//! Gray-scale rollout decision

use crate::policy::{ROLLOUT_SCALE, ReleasePolicy};

const BUCKETS: u32 = 10_000;

/// Outcome of an update check for one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateDecision {
    /// No policy, or the client already runs the latest version
    UpToDate,
    /// A newer build exists but this device is outside the rollout
    Held,
    Update {
        force: bool,
        version_code: u32,
        version_name: String,
        file_name: String,
    },
}

impl UpdateDecision {
    pub fn has_update(&self) -> bool {
        matches!(self, Self::Update { .. })
    }
}

/// Stable bucket of a device in `0..10000`: CRC-32 (IEEE) of the raw
/// identifier bytes.
pub fn rollout_bucket(device_id: &str) -> u32 {
    crc32fast::hash(device_id.as_bytes()) % BUCKETS
}

/// Whether `device_id` falls inside a rollout of `rollout_rate` parts per ten
/// thousand. Raising the rate never drops a device that was already in.
pub fn in_rollout(device_id: &str, rollout_rate: i32) -> bool {
    if rollout_rate <= 0 {
        return false;
    }
    if rollout_rate >= ROLLOUT_SCALE {
        return true;
    }
    i64::from(rollout_bucket(device_id)) < i64::from(rollout_rate)
}

/// Decide what a client on `client_version_code` should be offered.
pub fn decide(
    device_id: &str,
    client_version_code: u32,
    policy: Option<&ReleasePolicy>,
) -> UpdateDecision {
    let Some(policy) = policy else {
        return UpdateDecision::UpToDate;
    };
    if policy.latest_version_code <= client_version_code {
        return UpdateDecision::UpToDate;
    }
    if !in_rollout(device_id, policy.rollout_rate) {
        return UpdateDecision::Held;
    }

    UpdateDecision::Update {
        force: client_version_code < policy.min_force_version_code,
        version_code: policy.latest_version_code,
        version_name: policy.latest_version_name.clone(),
        file_name: policy.latest_file_name.clone(),
    }
}
