// SPDX-FileCopyrightText: 2026 Hangar Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin lifecycle, repository synchronization and catalog for the Hangar host.
//!
//! - [`LocalPlugin`] drives one installed module through load, unload and reload.
//! - [`PluginRepository`] fetches and validates one remote catalog.
//! - [`CatalogManager`] aggregates both and exposes the available and
//!   updatable projections.
//!
//! Every controller receives its collaborators through a shared [`PluginHost`].

pub mod ban;
pub mod catalog;
pub mod coordinator;
pub mod dylib;
pub mod events;
pub mod host;
pub mod local;
pub mod manifest;
pub mod migration;
pub mod profile;
pub mod repository;

pub use ban::{BanList, name_hash};
pub use catalog::{
    AvailableEntry, AvailableUpdate, BulkOutcome, CatalogManager, InstalledOnlyReason,
};
pub use coordinator::Coordinator;
pub use dylib::{DylibContext, DylibLoader};
pub use events::{CatalogEvent, EventBus};
pub use host::{LoadedIdentities, PluginHost};
pub use local::{LocalPlugin, developer_working_id};
pub use manifest::{LocalManifest, ManifestValidity, RemoteManifest, RepoRef};
pub use migration::{MigrationReport, migrate_legacy_markers};
pub use profile::ProfileManager;
pub use repository::PluginRepository;
