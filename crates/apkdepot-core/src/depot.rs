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

//! Query and admin façade over the policy store and the artifact directory

use std::cmp::Reverse;
use std::io::ErrorKind;
use std::sync::Arc;

use apkdepot_shared::admin::UpdatePolicyRequest;
use apkdepot_shared::catalog::{CatalogEntry, VersionEntry, VersionListResponse};
use apkdepot_shared::update::{CheckUpdateQuery, CheckUpdateResponse};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::artifact::{ArtifactStore, StoredArtifact, format_file_size, is_safe_file_name};
use crate::error::{DepotError, Result};
use crate::ingest::{self, IngestOutcome};
use crate::inspector::{PackageInfo, PackageInspector};
use crate::policy::ReleasePolicy;
use crate::rollout::{self, UpdateDecision};
use crate::store::PolicyStore;

const DEFAULT_DOWNLOAD_PREFIX: &str = "/apks";

/// Validated form of [`CheckUpdateQuery`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckUpdateRequest {
    pub package_name: String,
    pub version_code: u32,
    pub device_id: String,
}

impl CheckUpdateRequest {
    pub fn parse(query: &CheckUpdateQuery) -> Result<Self> {
        let (Some(package_name), Some(version_code), Some(device_id)) = (
            non_empty(query.package_name.as_deref()),
            non_empty(query.version_code.as_deref()),
            non_empty(query.device_id.as_deref()),
        ) else {
            return Err(DepotError::validation("Missing params"));
        };

        let version_code = version_code
            .trim()
            .parse::<u32>()
            .map_err(|_| DepotError::validation(format!("Invalid versionCode: {version_code}")))?;

        Ok(Self {
            package_name: package_name.to_owned(),
            version_code,
            device_id: device_id.to_owned(),
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Entry point for every operation the server exposes.
#[derive(Debug)]
pub struct Depot {
    store: Arc<PolicyStore>,
    artifacts: ArtifactStore,
    inspector: Arc<dyn PackageInspector>,
    download_prefix: String,
}

impl Depot {
    pub fn new(
        store: Arc<PolicyStore>,
        artifacts: ArtifactStore,
        inspector: Arc<dyn PackageInspector>,
    ) -> Self {
        Self {
            store,
            artifacts,
            inspector,
            download_prefix: DEFAULT_DOWNLOAD_PREFIX.to_owned(),
        }
    }

    /// URL prefix under which stored artifacts are downloadable.
    pub fn with_download_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.download_prefix = prefix.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn store(&self) -> &PolicyStore {
        &self.store
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    pub fn download_url(&self, file_name: &str) -> String {
        format!("{}/{file_name}", self.download_prefix)
    }

    pub fn check_update(&self, query: &CheckUpdateQuery) -> Result<CheckUpdateResponse> {
        let request = CheckUpdateRequest::parse(query)?;
        let policy = self.store.get(&request.package_name);
        let decision = rollout::decide(&request.device_id, request.version_code, policy.as_ref());

        debug!(
            package = %request.package_name,
            client_version = request.version_code,
            device_id = %request.device_id,
            ?decision,
            "Update check"
        );

        Ok(match decision {
            UpdateDecision::UpToDate | UpdateDecision::Held => CheckUpdateResponse::no_update(),
            UpdateDecision::Update {
                force,
                version_code,
                version_name,
                file_name,
            } => CheckUpdateResponse {
                has_update: true,
                force: Some(force),
                version_code: Some(version_code),
                version_name: Some(version_name),
                download_url: Some(self.download_url(&file_name)),
            },
        })
    }

    /// Every stored build of one package, newest version first, with the
    /// forced-update baseline.
    pub fn list_versions(&self, package_name: Option<&str>) -> Result<VersionListResponse> {
        let package_name = non_empty(package_name)
            .ok_or_else(|| DepotError::validation("Missing packageName"))?;

        let mut versions: Vec<VersionEntry> = self
            .inspect_all()?
            .into_iter()
            .filter(|(_, info)| info.package_name == package_name)
            .map(|(artifact, info)| VersionEntry {
                file_size: format_file_size(artifact.size),
                file_name: artifact.name,
                version_code: info.version_code,
                version_name: info.version_name,
                size: artifact.size,
                upload_time: artifact.modified,
            })
            .collect();
        versions.sort_by(|a, b| {
            b.version_code
                .cmp(&a.version_code)
                .then_with(|| a.file_name.cmp(&b.file_name))
        });

        let min_force_version_code = self
            .store
            .get(package_name)
            .map_or(0, |p| p.min_force_version_code);

        Ok(VersionListResponse {
            min_force_version_code,
            versions,
        })
    }

    /// Every stored build with its package's rollout settings, most recently
    /// uploaded first.
    pub fn catalog(&self) -> Result<Vec<CatalogEntry>> {
        let mut entries: Vec<CatalogEntry> = self
            .inspect_all()?
            .into_iter()
            .map(|(artifact, info)| {
                let policy = self.store.get(&info.package_name);
                CatalogEntry {
                    icon_base64: info.icon_base64(),
                    file_size: format_file_size(artifact.size),
                    file_name: artifact.name,
                    app_name: info.app_name.unwrap_or_else(|| info.package_name.clone()),
                    package_name: info.package_name,
                    version_name: info.version_name,
                    version_code: info.version_code,
                    size: artifact.size,
                    upload_time: artifact.modified,
                    rollout_rate: policy.as_ref().map_or(0, |p| p.rollout_rate),
                    min_force_version_code: policy.map_or(0, |p| p.min_force_version_code),
                }
            })
            .collect();
        entries.sort_by_key(|e| (Reverse(e.upload_time), e.file_name.clone()));
        Ok(entries)
    }

    /// Admin write of the rollout fields. Latest-version fields are left alone.
    pub fn update_policy(&self, request: &UpdatePolicyRequest) -> Result<ReleasePolicy> {
        if request.package_name.is_empty() {
            return Err(DepotError::validation("Missing packageName"));
        }
        if !ReleasePolicy::is_valid_rollout_rate(request.rollout_rate) {
            return Err(DepotError::validation(format!(
                "rolloutRate must be between 0 and 10000, got {}",
                request.rollout_rate
            )));
        }

        let policy = self.store.update_or_create(&request.package_name, |p| {
            p.min_force_version_code = request.min_force_version_code;
            p.rollout_rate = request.rollout_rate;
            p.clone()
        });
        if let Err(e) = self.store.flush() {
            warn!(
                error = %e,
                package = %request.package_name,
                "Failed to persist policy snapshot after config update"
            );
        }

        info!(
            package = %policy.package_name,
            rollout_rate = policy.rollout_rate,
            min_force_version_code = policy.min_force_version_code,
            "Release policy updated"
        );
        Ok(policy)
    }

    pub fn staging_file(&self) -> Result<NamedTempFile> {
        Ok(self.artifacts.staging_file()?)
    }

    pub fn ingest(&self, staged: NamedTempFile) -> Result<IngestOutcome> {
        ingest::ingest(&self.store, &self.artifacts, self.inspector.as_ref(), staged)
    }

    /// Remove a stored build. The release policy is not touched, even if it
    /// still points at this file.
    pub fn delete_artifact(&self, file_name: &str) -> Result<()> {
        if !is_safe_file_name(file_name) {
            return Err(DepotError::validation("Invalid filename"));
        }
        self.artifacts.delete(file_name).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                DepotError::NotFound(file_name.to_owned())
            } else {
                DepotError::Io(e)
            }
        })
    }

    // Artifacts the inspector cannot read are skipped so one broken file
    // never hides the rest of the catalog.
    fn inspect_all(&self) -> Result<Vec<(StoredArtifact, PackageInfo)>> {
        let artifacts = self.artifacts.list()?;
        let mut inspected = Vec::with_capacity(artifacts.len());
        for artifact in artifacts {
            match self.inspector.inspect(&artifact.path) {
                Ok(info) => inspected.push((artifact, info)),
                Err(e) => {
                    warn!(file = %artifact.name, error = %e, "Could not parse artifact, skipping");
                }
            }
        }
        Ok(inspected)
    }
}
