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

//! Artifact naming and the on-disk artifact directory

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;
use tracing::{debug, info};

pub const ARTIFACT_EXTENSION: &str = "apk";

/// Stored name of a build. Depends only on package and version code, so a
/// re-upload of the same build replaces the previous file and different
/// versions never collide.
pub fn canonical_name(package_name: &str, version_code: u32) -> String {
    format!("{package_name}_{version_code}.{ARTIFACT_EXTENSION}")
}

/// Package names become part of a file name; only allow what a manifest
/// package attribute can contain.
pub fn is_safe_package_name(package_name: &str) -> bool {
    !package_name.is_empty()
        && !package_name.contains("..")
        && package_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Names accepted for lookups and deletes: a single path component.
pub fn is_safe_file_name(file_name: &str) -> bool {
    !file_name.is_empty()
        && file_name != "."
        && !file_name.contains("..")
        && !file_name.contains(['/', '\\'])
}

pub fn has_artifact_extension(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(ARTIFACT_EXTENSION))
}

#[derive(Debug, Clone)]
pub struct StoredArtifact {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

impl StoredArtifact {
    fn from_path(name: String, path: PathBuf) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(&path)?;
        Ok(Self {
            name,
            path,
            size: metadata.len(),
            modified: DateTime::<Utc>::from(metadata.modified()?),
        })
    }
}

/// Directory holding every uploaded build under its canonical name.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        info!(dir = %dir.display(), "Artifact directory ready");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Scratch file for an incoming upload. It lives inside the artifact
    /// directory so that [`ArtifactStore::import`] is a plain rename, and its
    /// extension keeps it out of [`ArtifactStore::list`].
    pub fn staging_file(&self) -> std::io::Result<NamedTempFile> {
        tempfile::Builder::new()
            .prefix(".upload-")
            .suffix(".part")
            .tempfile_in(&self.dir)
    }

    /// Sync `staged` to disk and move it to `name`, replacing any existing
    /// artifact of that name.
    pub fn import(&self, staged: NamedTempFile, name: &str) -> std::io::Result<StoredArtifact> {
        staged.as_file().sync_all()?;
        let path = self.path_of(name);
        staged.persist(&path).map_err(|e| e.error)?;
        debug!(name, "Artifact stored");
        StoredArtifact::from_path(name.to_owned(), path)
    }

    /// Every `.apk` regular file in the directory, in no particular order.
    pub fn list(&self) -> std::io::Result<Vec<StoredArtifact>> {
        let mut artifacts = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if !has_artifact_extension(&name) {
                continue;
            }
            match StoredArtifact::from_path(name, entry.path()) {
                Ok(artifact) => artifacts.push(artifact),
                // Deleted between read_dir and stat
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(artifacts)
    }

    pub fn delete(&self, name: &str) -> std::io::Result<()> {
        std::fs::remove_file(self.path_of(name))?;
        info!(name, "Artifact deleted");
        Ok(())
    }
}

/// Human-readable size in B, KB or MB (1024-based).
#[expect(
    clippy::cast_precision_loss,
    reason = "display only, two decimals are shown"
)]
pub fn format_file_size(size: u64) -> String {
    if size < 1024 {
        return format!("{size} B");
    }
    let kb = size as f64 / 1024.0;
    if kb < 1024.0 {
        return format!("{kb:.2} KB");
    }
    format!("{:.2} MB", kb / 1024.0)
}
