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

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

pub const DEFAULT_CONFIG_PATH: &str = "apkdepot.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub inspector: InspectorSettings,
    #[serde(default)]
    pub downloads: DownloadSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: String,
    #[serde(default = "default_metadata_file")]
    pub metadata_file: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InspectorSettings {
    #[serde(default = "default_aapt_path")]
    pub aapt_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadSettings {
    /// Prefix of the `downloadUrl` handed to clients
    #[serde(default = "default_url_prefix")]
    pub url_prefix: String,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_owned()
}

fn default_port() -> u16 {
    8080
}

fn default_artifact_dir() -> String {
    "apks".to_owned()
}

fn default_metadata_file() -> String {
    "metadata.json".to_owned()
}

fn default_max_upload_bytes() -> usize {
    500 * 1024 * 1024
}

fn default_aapt_path() -> String {
    "aapt2".to_owned()
}

fn default_url_prefix() -> String {
    "/apks".to_owned()
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            artifact_dir: default_artifact_dir(),
            metadata_file: default_metadata_file(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl Default for InspectorSettings {
    fn default() -> Self {
        Self {
            aapt_path: default_aapt_path(),
        }
    }
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            url_prefix: default_url_prefix(),
        }
    }
}

impl ServerConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(Path::new(path))
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).with_context(|| "Failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Load the config named on the command line, or `apkdepot.toml` if it
    /// exists, or the built-in defaults. `PORT` overrides the listen port.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::from_file(DEFAULT_CONFIG_PATH)?,
            None => {
                info!("No config file found, using defaults");
                Self::default()
            }
        };

        if let Ok(port) = std::env::var("PORT") {
            config.server.port = port
                .parse()
                .with_context(|| format!("PORT is not a valid port number: {port}"))?;
        }
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.storage.artifact_dir.is_empty() {
            bail!("storage.artifact_dir must be set");
        }
        if self.storage.metadata_file.is_empty() {
            bail!("storage.metadata_file must be set");
        }
        if self.storage.max_upload_bytes == 0 {
            bail!("storage.max_upload_bytes must be greater than zero");
        }
        if self.inspector.aapt_path.is_empty() {
            bail!("inspector.aapt_path must be set");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = ServerConfig::from_toml("").unwrap();
        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.artifact_dir, "apks");
        assert_eq!(config.storage.metadata_file, "metadata.json");
        assert_eq!(config.storage.max_upload_bytes, 500 * 1024 * 1024);
        assert_eq!(config.inspector.aapt_path, "aapt2");
        assert_eq!(config.downloads.url_prefix, "/apks");
    }

    #[test]
    fn test_partial_sections() {
        let config = ServerConfig::from_toml(
            r#"
            [server]
            port = 9000

            [storage]
            artifact_dir = "/data/apks"

            [downloads]
            url_prefix = "https://cdn.example.com/apks"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert_eq!(config.storage.artifact_dir, "/data/apks");
        assert_eq!(config.storage.metadata_file, "metadata.json");
        assert_eq!(config.downloads.url_prefix, "https://cdn.example.com/apks");
    }

    #[test]
    fn test_validation_rejects_zero_upload_limit() {
        let err = ServerConfig::from_toml("[storage]\nmax_upload_bytes = 0\n").unwrap_err();
        assert!(err.to_string().contains("max_upload_bytes"));
    }

    #[test]
    fn test_validation_rejects_empty_paths() {
        assert!(ServerConfig::from_toml("[storage]\nartifact_dir = \"\"\n").is_err());
        assert!(ServerConfig::from_toml("[inspector]\naapt_path = \"\"\n").is_err());
    }

    #[test]
    fn test_example_config_parses() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../apkdepot.example.toml");
        let config = ServerConfig::from_file(path).unwrap();
        assert_eq!(config.storage.max_upload_bytes, default_max_upload_bytes());
        assert_eq!(config.downloads.url_prefix, "/apks");
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        assert!(ServerConfig::load(Some("/nonexistent/apkdepot.toml")).is_err());
    }
}
