// SPDX-FileCopyrightText: 2026 Hangar Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Module manifests: the repository form and the installed form.
//!
//! Manifests are JSON with PascalCase keys; camelCase spellings are accepted
//! as aliases and unknown keys are ignored. The installed manifest lives next
//! to its module file as `<module stem>.json`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use hangar_core::{AssemblyVersion, HangarError};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// File extension of module binaries on this platform.
pub const MODULE_EXTENSION: &str = std::env::consts::DLL_EXTENSION;

/// The repository a manifest was fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub url: String,
    pub is_third_party: bool,
}

/// A manifest as published by a repository.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RemoteManifest {
    /// Stable key, unique within a repository.
    #[serde(default, alias = "internalName")]
    pub internal_name: String,

    #[serde(default, alias = "name")]
    pub name: String,

    #[serde(default, alias = "author", skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(default, alias = "punchline", skip_serializing_if = "Option::is_none")]
    pub punchline: Option<String>,

    #[serde(default, alias = "description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, alias = "assemblyVersion")]
    pub assembly_version: Option<AssemblyVersion>,

    #[serde(
        default,
        alias = "testingAssemblyVersion",
        skip_serializing_if = "Option::is_none"
    )]
    pub testing_assembly_version: Option<AssemblyVersion>,

    #[serde(
        default,
        alias = "minimumHostVersion",
        skip_serializing_if = "Option::is_none"
    )]
    pub minimum_host_version: Option<AssemblyVersion>,

    #[serde(default, alias = "apiLevel")]
    pub api_level: i32,

    #[serde(default, alias = "testingApiLevel", skip_serializing_if = "Option::is_none")]
    pub testing_api_level: Option<i32>,

    /// Project page, not the catalog the manifest came from.
    #[serde(default, alias = "repoUrl", skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,

    #[serde(default, alias = "isTestingExclusive")]
    pub is_testing_exclusive: bool,

    #[serde(default, alias = "isHide")]
    pub is_hide: bool,

    #[serde(default, alias = "downloadCount")]
    pub download_count: u64,

    /// Unix seconds.
    #[serde(default, alias = "lastUpdate", skip_serializing_if = "Option::is_none")]
    pub last_update: Option<i64>,

    #[serde(default, alias = "changelog", skip_serializing_if = "Option::is_none")]
    pub changelog: Option<String>,

    #[serde(default, alias = "testingChangelog", skip_serializing_if = "Option::is_none")]
    pub testing_changelog: Option<String>,

    /// The instance may be disposed off the coordination thread.
    #[serde(default, alias = "canUnloadAsync")]
    pub can_unload_async: bool,

    /// The instance must be constructed on the coordination thread.
    #[serde(default, alias = "loadSync")]
    pub load_sync: bool,

    #[serde(skip)]
    pub source_repo: Option<Arc<RepoRef>>,
}

/// Outcome of checking a repository manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestValidity {
    Valid,
    /// Accepted, but worth a warning.
    Suspicious(String),
    /// Dropped from the visible list.
    Invalid(String),
}

impl RemoteManifest {
    /// The testing version when `testing` and one is published, else the stable version.
    pub fn effective_version(&self, testing: bool) -> AssemblyVersion {
        match (testing, self.testing_assembly_version) {
            (true, Some(v)) => v,
            _ => self.assembly_version.unwrap_or_default(),
        }
    }

    /// The testing API level when `testing` and one is published, else the stable level.
    pub fn effective_api_level(&self, testing: bool) -> i32 {
        match (testing, self.testing_api_level) {
            (true, Some(level)) => level,
            _ => self.api_level,
        }
    }

    /// Whether a testing build newer than the stable one is published.
    pub fn has_newer_testing_build(&self) -> bool {
        match (self.testing_assembly_version, self.assembly_version) {
            (Some(testing), Some(stable)) => testing > stable,
            (Some(_), None) => true,
            _ => false,
        }
    }

    /// Derived from the owning repository; `false` before the manifest is stamped.
    pub fn is_third_party(&self) -> bool {
        self.source_repo
            .as_ref()
            .is_some_and(|repo| repo.is_third_party)
    }

    pub fn source_url(&self) -> Option<&str> {
        self.source_repo.as_ref().map(|repo| repo.url.as_str())
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_update
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }

    /// Check the hard and soft invariants of a repository manifest.
    pub fn validity(&self) -> ManifestValidity {
        if self.internal_name.trim().is_empty() {
            return ManifestValidity::Invalid("missing internal name".into());
        }
        if self.name.trim().is_empty() {
            return ManifestValidity::Invalid("missing name".into());
        }
        if self.assembly_version.is_none() {
            return ManifestValidity::Invalid("missing assembly version".into());
        }
        if self.has_newer_testing_build() && self.testing_api_level.is_none() {
            return ManifestValidity::Suspicious(
                "testing version is newer than stable but no testing API level is set".into(),
            );
        }
        ManifestValidity::Valid
    }
}

/// The manifest of an installed module.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LocalManifest {
    #[serde(flatten)]
    pub manifest: RemoteManifest,

    /// Catalog URL the module was installed from.
    #[serde(default, alias = "installedFromUrl")]
    pub installed_from_url: String,

    #[serde(default, alias = "isThirdParty")]
    pub is_third_party: bool,

    /// Minted once per installation; nil until then.
    #[serde(default, alias = "workingPluginId")]
    pub working_plugin_id: Uuid,

    /// Legacy flag carried over from a `.disabled` marker.
    #[serde(default, alias = "disabled")]
    pub disabled: bool,

    /// Use the testing build's version and API level.
    #[serde(default, alias = "testing")]
    pub testing: bool,

    #[serde(default, alias = "scheduledForDeletion")]
    pub scheduled_for_deletion: bool,
}

impl LocalManifest {
    /// The installed form of a repository manifest.
    pub fn from_remote(remote: RemoteManifest, installed_from_url: impl Into<String>) -> Self {
        let is_third_party = remote.is_third_party();
        Self {
            manifest: remote,
            installed_from_url: installed_from_url.into(),
            is_third_party,
            ..Self::default()
        }
    }

    pub fn internal_name(&self) -> &str {
        &self.manifest.internal_name
    }

    pub fn effective_version(&self) -> AssemblyVersion {
        self.manifest.effective_version(self.testing)
    }

    pub fn effective_api_level(&self) -> i32 {
        self.manifest.effective_api_level(self.testing)
    }

    /// Read and parse a manifest file.
    pub fn load(path: &Path) -> Result<Self, HangarError> {
        let content = std::fs::read_to_string(path).map_err(|e| HangarError::Manifest {
            message: format!("cannot read {}", path.display()),
            source: Some(Box::new(e)),
        })?;
        let manifest: Self = serde_json::from_str(&content).map_err(|e| HangarError::Manifest {
            message: format!("cannot parse {}", path.display()),
            source: Some(Box::new(e)),
        })?;
        if manifest.internal_name().trim().is_empty() {
            return Err(HangarError::Manifest {
                message: format!("{} has no internal name", path.display()),
                source: None,
            });
        }
        Ok(manifest)
    }

    /// Write the manifest to `path`, replacing it atomically.
    pub fn save(&self, path: &Path, reason: &str) -> Result<(), HangarError> {
        let body = serde_json::to_string_pretty(self).map_err(|e| HangarError::Manifest {
            message: format!("cannot serialize manifest of {}", self.internal_name()),
            source: Some(Box::new(e)),
        })?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, body)
            .and_then(|()| std::fs::rename(&tmp, path))
            .map_err(|e| HangarError::Manifest {
                message: format!("cannot write {}", path.display()),
                source: Some(Box::new(e)),
            })?;
        debug!(plugin = %self.internal_name(), reason, "manifest saved");
        Ok(())
    }
}

/// `<module stem>.json` next to the module file.
pub fn manifest_path(module_file: &Path) -> PathBuf {
    module_file.with_extension("json")
}

/// Legacy `<module stem>.disabled` marker.
pub fn disabled_marker_path(module_file: &Path) -> PathBuf {
    module_file.with_extension("disabled")
}

/// Legacy `<module stem>.testing` marker.
pub fn testing_marker_path(module_file: &Path) -> PathBuf {
    module_file.with_extension("testing")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(json: &str) -> RemoteManifest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn accepts_pascal_and_camel_case() {
        let a = remote(r#"{"InternalName": "Sample", "Name": "Sample", "AssemblyVersion": "1.0"}"#);
        let b = remote(r#"{"internalName": "Sample", "name": "Sample", "assemblyVersion": "1.0"}"#);
        assert_eq!(a.internal_name, b.internal_name);
        assert_eq!(a.assembly_version, b.assembly_version);
    }

    #[test]
    fn unknown_fields_are_ignored_and_missing_optionals_are_absent() {
        let m = remote(r#"{"InternalName": "Sample", "Name": "S", "AssemblyVersion": "1.0", "Tags": ["x"]}"#);
        assert!(m.testing_assembly_version.is_none());
        assert!(m.testing_api_level.is_none());
        assert!(m.last_update.is_none());
        assert!(m.author.is_none());
    }

    #[test]
    fn malformed_version_fails_to_parse() {
        let result = serde_json::from_str::<RemoteManifest>(
            r#"{"InternalName": "Sample", "AssemblyVersion": "one"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn effective_values_honor_testing() {
        let m = remote(
            r#"{"InternalName": "S", "Name": "S", "AssemblyVersion": "1.0",
                "TestingAssemblyVersion": "1.1", "ApiLevel": 11, "TestingApiLevel": 12}"#,
        );
        assert_eq!(m.effective_version(false), AssemblyVersion::new(1, 0, 0, 0));
        assert_eq!(m.effective_version(true), AssemblyVersion::new(1, 1, 0, 0));
        assert_eq!(m.effective_api_level(false), 11);
        assert_eq!(m.effective_api_level(true), 12);
    }

    #[test]
    fn validity_rules() {
        let missing_name = remote(r#"{"Name": "S", "AssemblyVersion": "1.0"}"#);
        assert!(matches!(missing_name.validity(), ManifestValidity::Invalid(_)));

        let missing_version = remote(r#"{"InternalName": "S", "Name": "S"}"#);
        assert!(matches!(missing_version.validity(), ManifestValidity::Invalid(_)));

        let suspicious = remote(
            r#"{"InternalName": "S", "Name": "S", "AssemblyVersion": "1.0", "TestingAssemblyVersion": "2.0"}"#,
        );
        assert!(matches!(suspicious.validity(), ManifestValidity::Suspicious(_)));

        let fine = remote(r#"{"InternalName": "S", "Name": "S", "AssemblyVersion": "1.0"}"#);
        assert_eq!(fine.validity(), ManifestValidity::Valid);
    }

    #[test]
    fn local_manifest_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let module = dir.path().join(format!("Sample.{MODULE_EXTENSION}"));
        let path = manifest_path(&module);

        let mut local = LocalManifest::from_remote(
            remote(r#"{"InternalName": "Sample", "Name": "Sample", "AssemblyVersion": "1.2.3"}"#),
            "https://example.com/repo.json",
        );
        local.working_plugin_id = Uuid::new_v4();
        local.testing = true;
        local.save(&path, "test").unwrap();

        let back = LocalManifest::load(&path).unwrap();
        assert_eq!(back.internal_name(), "Sample");
        assert_eq!(back.working_plugin_id, local.working_plugin_id);
        assert!(back.testing);
        assert_eq!(back.installed_from_url, "https://example.com/repo.json");
        assert_eq!(back.effective_version(), AssemblyVersion::new(1, 2, 3, 0));
    }

    #[test]
    fn marker_paths_share_the_module_stem() {
        let module = Path::new("/plugins/Sample/1.0.0.0/Sample.so");
        assert_eq!(manifest_path(module), Path::new("/plugins/Sample/1.0.0.0/Sample.json"));
        assert_eq!(disabled_marker_path(module), Path::new("/plugins/Sample/1.0.0.0/Sample.disabled"));
        assert_eq!(testing_marker_path(module), Path::new("/plugins/Sample/1.0.0.0/Sample.testing"));
    }
}
