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

//! Error types for the release-policy engine

use thiserror::Error;

/// Failures of the policy snapshot.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot serialization error: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("snapshot deserialization error: {0}")]
    Deserialize(#[source] serde_json::Error),
}

/// Failures of the package inspector.
#[derive(Debug, Error)]
pub enum InspectError {
    #[error("unparsable package {path}: {reason}")]
    Unparsable { path: String, reason: String },

    #[error("package inspector failed to run: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum DepotError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Inspect(#[from] InspectError),

    #[error("artifact not found: {0}")]
    NotFound(String),

    #[error("artifact storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DepotError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether the caller sent something we cannot accept, as opposed to a
    /// failure on our side.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Inspect(InspectError::Unparsable { .. })
        )
    }
}

pub type Result<T> = std::result::Result<T, DepotError>;
