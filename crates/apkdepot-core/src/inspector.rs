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

//! Package inspection
//!
//! Decoding the binary manifest is not done here. [`AaptInspector`]
//! delegates to the Android `aapt2` tool and parses its text output; the
//! launcher icon it names is then read straight from the package archive.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Command;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use zip::ZipArchive;
use zip::result::ZipError;

use crate::error::InspectError;

/// Identity of an application package.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageInfo {
    pub package_name: String,
    pub version_code: u32,
    #[serde(default)]
    pub version_name: String,
    #[serde(default)]
    pub app_name: Option<String>,
    /// PNG bytes of the launcher icon, when the inspector can extract it
    #[serde(skip)]
    pub icon_png: Option<Vec<u8>>,
}

impl PackageInfo {
    pub fn icon_base64(&self) -> Option<String> {
        self.icon_png.as_deref().map(|png| STANDARD.encode(png))
    }
}

pub trait PackageInspector: Send + Sync + std::fmt::Debug {
    fn inspect(&self, path: &Path) -> Result<PackageInfo, InspectError>;
}

/// Runs `aapt2 dump badging <file>`.
#[derive(Debug, Clone)]
pub struct AaptInspector {
    program: PathBuf,
}

impl AaptInspector {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl PackageInspector for AaptInspector {
    fn inspect(&self, path: &Path) -> Result<PackageInfo, InspectError> {
        let output = Command::new(&self.program)
            .arg("dump")
            .arg("badging")
            .arg(path)
            .output()?;

        if !output.status.success() {
            return Err(InspectError::Unparsable {
                path: path.display().to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        let info = package_info_from_badging(path, &String::from_utf8_lossy(&output.stdout))?;
        debug!(
            path = %path.display(),
            package = %info.package_name,
            version_code = info.version_code,
            "Package inspected"
        );
        Ok(info)
    }
}

/// Largest launcher icon accepted from a package
const MAX_ICON_BYTES: u64 = 1024 * 1024;

/// Parsed `aapt2 dump badging` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Badging {
    /// Identity; `icon_png` is always `None` here
    pub info: PackageInfo,
    /// Archive entry of the highest-density PNG launcher icon
    pub icon_entry: Option<String>,
}

/// Parse `badging` for the package at `path` and attach its launcher icon.
///
/// A missing or unreadable icon is not an error; the package is still
/// listed, just without an icon.
pub fn package_info_from_badging(path: &Path, badging: &str) -> Result<PackageInfo, InspectError> {
    let Badging {
        mut info,
        icon_entry,
    } = parse_badging(badging).map_err(|reason| InspectError::Unparsable {
        path: path.display().to_string(),
        reason,
    })?;

    if let Some(entry) = icon_entry {
        match read_icon(path, &entry) {
            Ok(png) => info.icon_png = png,
            Err(e) => {
                warn!(path = %path.display(), entry = %entry, error = %e, "Could not read launcher icon");
            }
        }
    }
    Ok(info)
}

/// Read `entry` out of the package archive. Oversized icons are dropped.
pub fn read_icon(package: &Path, entry: &str) -> Result<Option<Vec<u8>>, ZipError> {
    let mut archive = ZipArchive::new(File::open(package)?)?;
    let icon = archive.by_name(entry)?;
    if icon.size() > MAX_ICON_BYTES {
        debug!(entry, size = icon.size(), "Launcher icon too large, skipping");
        return Ok(None);
    }

    let mut png = Vec::with_capacity(usize::try_from(icon.size()).unwrap_or_default());
    icon.take(MAX_ICON_BYTES).read_to_end(&mut png)?;
    Ok(Some(png))
}

/// Extract package identity and icon location from `aapt2 dump badging`
/// output.
pub fn parse_badging(output: &str) -> Result<Badging, String> {
    let package_line = output
        .lines()
        .find(|line| line.starts_with("package:"))
        .ok_or_else(|| "no package line in badging output".to_owned())?;

    let package_name = attribute(package_line, "name")
        .filter(|name| !name.is_empty())
        .ok_or_else(|| "package name missing".to_owned())?;
    let version_code = attribute(package_line, "versionCode")
        .ok_or_else(|| "versionCode missing".to_owned())?;
    let version_code = version_code
        .parse::<u32>()
        .map_err(|_| format!("invalid versionCode: {version_code}"))?;
    let version_name = attribute(package_line, "versionName").unwrap_or_default();

    let app_name = output
        .lines()
        .find_map(|line| line.strip_prefix("application-label:"))
        .map(|label| label.trim().trim_matches('\'').to_owned())
        .filter(|label| !label.is_empty());

    Ok(Badging {
        info: PackageInfo {
            package_name: package_name.to_owned(),
            version_code,
            version_name: version_name.to_owned(),
            app_name,
            icon_png: None,
        },
        icon_entry: icon_entry(output),
    })
}

// `application-icon-<density>:'<entry>'` lines, falling back to the icon
// attribute of the `application:` line. Adaptive (XML) icons are skipped.
fn icon_entry(output: &str) -> Option<String> {
    let by_density = output
        .lines()
        .filter_map(|line| {
            let rest = line.strip_prefix("application-icon-")?;
            let (density, entry) = rest.split_once(':')?;
            let density = density.parse::<u32>().ok()?;
            Some((density, entry.trim().trim_matches('\'')))
        })
        .filter(|(_, entry)| is_png_entry(entry))
        .max_by_key(|(density, _)| *density)
        .map(|(_, entry)| entry);

    by_density
        .or_else(|| {
            output
                .lines()
                .filter(|line| line.starts_with("application:"))
                .find_map(|line| attribute(line, "icon"))
                .filter(|entry| is_png_entry(entry))
        })
        .map(str::to_owned)
}

fn is_png_entry(entry: &str) -> bool {
    Path::new(entry)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
}

// Attributes look like ` key='value'`; the leading space keeps `name` from
// matching the tail of `compileSdkVersionCodename`.
fn attribute<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let needle = format!(" {key}='");
    let (_, rest) = line.split_once(needle.as_str())?;
    rest.split_once('\'').map(|(value, _)| value)
}
