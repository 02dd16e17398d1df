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

//! Ingestion of uploaded builds

use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::artifact::{ArtifactStore, canonical_name, is_safe_package_name};
use crate::error::{InspectError, Result};
use crate::inspector::{PackageInfo, PackageInspector};
use crate::store::PolicyStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    pub package_name: String,
    pub version_code: u32,
    pub version_name: String,
    pub file_name: String,
    /// Whether this build is now the package's latest
    pub became_latest: bool,
}

/// Inspect `staged`, store it under its canonical name and move the latest
/// pointer if the build is not older than the current latest.
///
/// An unparsable upload is rejected and `staged` is dropped, which removes it.
/// A failed snapshot flush is only logged: the in-memory policy stays updated.
pub fn ingest(
    store: &PolicyStore,
    artifacts: &ArtifactStore,
    inspector: &dyn PackageInspector,
    staged: NamedTempFile,
) -> Result<IngestOutcome> {
    let info = inspector.inspect(staged.path())?;
    if !is_safe_package_name(&info.package_name) {
        return Err(InspectError::Unparsable {
            path: staged.path().display().to_string(),
            reason: format!("unsupported package name: {:?}", info.package_name),
        }
        .into());
    }

    let file_name = canonical_name(&info.package_name, info.version_code);
    artifacts.import(staged, &file_name)?;

    let became_latest = advance_latest(store, &info, &file_name);
    if let Err(e) = store.flush() {
        warn!(
            error = %e,
            package = %info.package_name,
            "Failed to persist policy snapshot after ingestion"
        );
    }

    info!(
        package = %info.package_name,
        version_code = info.version_code,
        file_name = %file_name,
        became_latest,
        "Build ingested"
    );

    Ok(IngestOutcome {
        package_name: info.package_name,
        version_code: info.version_code,
        version_name: info.version_name,
        file_name,
        became_latest,
    })
}

/// Point the package's policy at `file_name` unless it already points at a
/// newer version. Returns whether the pointer moved.
///
/// Equal version codes win so that a re-upload refreshes the version name.
/// A package seen for the first time starts at version code 0, so its first
/// build always becomes latest.
pub fn advance_latest(store: &PolicyStore, info: &PackageInfo, file_name: &str) -> bool {
    store.update_or_create(&info.package_name, |policy| {
        if info.version_code < policy.latest_version_code {
            return false;
        }
        policy.latest_version_code = info.version_code;
        policy.latest_version_name.clone_from(&info.version_name);
        file_name.clone_into(&mut policy.latest_file_name);
        true
    })
}
