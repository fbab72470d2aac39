// SPDX-FileCopyrightText: 2026 Hangar Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-time migration of legacy marker files into the installed manifest.
//!
//! Older installs flagged a module as disabled or testing by dropping an
//! empty `<stem>.disabled` / `<stem>.testing` file next to it. The migration
//! folds those into manifest fields, mints a working-plugin id where one is
//! missing, saves, then deletes the markers. It runs during the installed scan,
//! never on the load/unload path.

use std::path::Path;

use hangar_core::{HangarError, ModuleKind};
use tracing::{info, warn};
use uuid::Uuid;

use crate::manifest::{LocalManifest, disabled_marker_path, manifest_path, testing_marker_path};

/// Report of what the migration did to one module.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    /// A `.disabled` marker was folded into the manifest.
    pub disabled_marker: bool,
    /// A `.testing` marker was folded into the manifest.
    pub testing_marker: bool,
    /// Working-plugin id minted for a manifest that had none.
    pub minted_working_id: Option<Uuid>,
    /// Non-fatal warnings (e.g., a marker that could not be deleted).
    pub warnings: Vec<String>,
}

impl MigrationReport {
    pub fn changed(&self) -> bool {
        self.disabled_marker || self.testing_marker || self.minted_working_id.is_some()
    }
}

/// Migrate the markers and working id of the module at `module_file`.
///
/// Developer modules never get a persisted working id; theirs is derived from
/// their path.
pub fn migrate_legacy_markers(
    module_file: &Path,
    kind: ModuleKind,
) -> Result<MigrationReport, HangarError> {
    let manifest_file = manifest_path(module_file);
    let mut manifest = LocalManifest::load(&manifest_file)?;
    let mut report = MigrationReport::default();

    let disabled = disabled_marker_path(module_file);
    if disabled.exists() {
        manifest.disabled = true;
        report.disabled_marker = true;
    }

    let testing = testing_marker_path(module_file);
    if testing.exists() {
        manifest.testing = true;
        report.testing_marker = true;
    }

    if kind == ModuleKind::Installed && manifest.working_plugin_id.is_nil() {
        let id = Uuid::new_v4();
        manifest.working_plugin_id = id;
        report.minted_working_id = Some(id);
    }

    if !report.changed() {
        return Ok(report);
    }

    manifest.save(&manifest_file, "legacy migration")?;

    for marker in [&disabled, &testing] {
        if marker.exists()
            && let Err(e) = std::fs::remove_file(marker)
        {
            warn!(path = %marker.display(), error = %e, "failed to delete legacy marker");
            report
                .warnings
                .push(format!("could not delete {}: {e}", marker.display()));
        }
    }

    info!(
        plugin = %manifest.internal_name(),
        disabled = report.disabled_marker,
        testing = report.testing_marker,
        minted = report.minted_working_id.is_some(),
        "migrated legacy plugin state"
    );
    Ok(report)
}
