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

//! ApkDepot release-policy engine
//!
//! Keeps one release policy per package, decides per device whether an update
//! is offered (and whether it is mandatory), and names uploaded builds so that
//! the "latest" pointer only ever moves forward.

pub mod artifact;
pub mod depot;
pub mod error;
pub mod ingest;
pub mod inspector;
pub mod policy;
pub mod rollout;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use artifact::{ArtifactStore, StoredArtifact, canonical_name};
pub use depot::{CheckUpdateRequest, Depot};
pub use error::{DepotError, InspectError, Result, StoreError};
pub use ingest::IngestOutcome;
pub use inspector::{AaptInspector, PackageInfo, PackageInspector};
pub use policy::{ROLLOUT_SCALE, ReleasePolicy};
pub use rollout::{UpdateDecision, decide, in_rollout};
pub use store::PolicyStore;
