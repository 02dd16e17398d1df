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

//! Test doubles shared by the unit tests of this crate

use std::io::{Cursor, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::artifact::ArtifactStore;
use crate::error::InspectError;
use crate::inspector::{PackageInfo, PackageInspector, package_info_from_badging};

/// PNG signature plus a few bytes; enough to stand in for an icon
pub const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];

/// Treats a package file as a JSON-encoded [`PackageInfo`].
#[derive(Debug, Default)]
pub struct JsonInspector;

impl PackageInspector for JsonInspector {
    fn inspect(&self, path: &Path) -> Result<PackageInfo, InspectError> {
        let bytes = std::fs::read(path)?;
        serde_json::from_slice(&bytes).map_err(|e| InspectError::Unparsable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

/// Answers every package with fixed `aapt2 dump badging` output, reading the
/// icon from the real archive.
#[derive(Debug)]
pub struct BadgingInspector {
    pub badging: String,
}

impl PackageInspector for BadgingInspector {
    fn inspect(&self, path: &Path) -> Result<PackageInfo, InspectError> {
        package_info_from_badging(path, &self.badging)
    }
}

/// Zip archive holding `entries`, laid out like a package.
pub fn package_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, bytes) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

pub fn package_bytes(package_name: &str, version_code: u32) -> Vec<u8> {
    serde_json::to_vec(&PackageInfo {
        package_name: package_name.to_owned(),
        version_code,
        version_name: format!("1.0.{version_code}"),
        app_name: Some("Example".to_owned()),
        icon_png: None,
    })
    .unwrap()
}

pub fn staged_bytes(artifacts: &ArtifactStore, bytes: &[u8]) -> NamedTempFile {
    let mut file = artifacts.staging_file().unwrap();
    file.write_all(bytes).unwrap();
    file
}

pub fn staged_package(
    artifacts: &ArtifactStore,
    package_name: &str,
    version_code: u32,
) -> NamedTempFile {
    staged_bytes(artifacts, &package_bytes(package_name, version_code))
}
