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

use serde::{Deserialize, Serialize};

/// Raw query of `GET /api/check-update`. Every field is optional on the wire
/// so that a missing parameter surfaces as a validation error instead of a
/// rejected extractor.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckUpdateQuery {
    #[serde(default)]
    pub package_name: Option<String>,
    #[serde(default)]
    pub version_code: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
}

/// Answer to an update check. Only `has_update` is present when the device
/// should stay on its current version.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckUpdateResponse {
    pub has_update: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_code: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

impl CheckUpdateResponse {
    pub fn no_update() -> Self {
        Self {
            has_update: false,
            force: None,
            version_code: None,
            version_name: None,
            download_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_update_serializes_only_flag() {
        let json = serde_json::to_value(CheckUpdateResponse::no_update()).unwrap();
        assert_eq!(json, serde_json::json!({ "hasUpdate": false }));
    }

    #[test]
    fn update_uses_camel_case_fields() {
        let resp = CheckUpdateResponse {
            has_update: true,
            force: Some(true),
            version_code: Some(10),
            version_name: Some("1.0.10".to_owned()),
            download_url: Some("/apks/com.example_10.apk".to_owned()),
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["hasUpdate"], true);
        assert_eq!(json["force"], true);
        assert_eq!(json["versionCode"], 10);
        assert_eq!(json["downloadUrl"], "/apks/com.example_10.apk");
    }

    #[test]
    fn query_tolerates_missing_fields() {
        let query: CheckUpdateQuery =
            serde_json::from_value(serde_json::json!({ "packageName": "com.example" })).unwrap();
        assert_eq!(query.package_name.as_deref(), Some("com.example"));
        assert!(query.version_code.is_none());
        assert!(query.device_id.is_none());
    }
}
