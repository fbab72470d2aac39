// SPDX-FileCopyrightText: 2026 Hangar Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! On-disk fixtures: installed layouts, developer modules, catalog documents.
//!
//! Manifests are written as raw JSON in the same PascalCase shape the host
//! reads, so fixtures double as format checks.

use std::path::{Path, PathBuf};

use hangar_config::model::{DevLocation, HangarConfig};
use serde_json::{Value, json};
use tempfile::TempDir;
use uuid::Uuid;

/// Platform module file name for `internal_name`.
pub fn module_file_name(internal_name: &str) -> String {
    format!("{internal_name}.{}", std::env::consts::DLL_EXTENSION)
}

/// A minimal valid repository manifest.
pub fn remote_manifest(internal_name: &str, version: &str, api_level: i32) -> Value {
    json!({
        "InternalName": internal_name,
        "Name": internal_name,
        "Author": "fixture",
        "AssemblyVersion": version,
        "ApiLevel": api_level,
    })
}

/// A catalog document holding `manifests`.
pub fn catalog_json(manifests: &[Value]) -> String {
    Value::Array(manifests.to_vec()).to_string()
}

/// Merge the keys of `extra` into `base`.
fn merge(base: &mut Value, extra: Value) {
    if let (Value::Object(base), Value::Object(extra)) = (base, extra) {
        base.extend(extra);
    }
}

fn write_module(module_file: &Path, manifest: &Value) {
    if let Some(dir) = module_file.parent() {
        std::fs::create_dir_all(dir).expect("create module directory");
    }
    std::fs::write(module_file, b"fixture module").expect("write module file");
    std::fs::write(
        module_file.with_extension("json"),
        serde_json::to_vec_pretty(manifest).expect("serialize manifest"),
    )
    .expect("write manifest");
}

/// Write an installed module under `<plugin_dir>/<name>/<version>/` and return its module file.
///
/// `extra` is merged into the manifest (e.g. `{"WorkingPluginId": ..}`).
pub fn write_installed(
    plugin_dir: &Path,
    internal_name: &str,
    version: &str,
    api_level: i32,
    installed_from_url: &str,
    extra: Value,
) -> PathBuf {
    let module_file = plugin_dir
        .join(internal_name)
        .join(version)
        .join(module_file_name(internal_name));
    let mut manifest = remote_manifest(internal_name, version, api_level);
    merge(
        &mut manifest,
        json!({
            "InstalledFromUrl": installed_from_url,
            "WorkingPluginId": Uuid::new_v4(),
        }),
    );
    merge(&mut manifest, extra);
    write_module(&module_file, &manifest);
    module_file
}

/// Write a developer module directly inside `dir` and return its module file.
pub fn write_dev_plugin(dir: &Path, internal_name: &str, version: &str, api_level: i32) -> PathBuf {
    let module_file = dir.join(module_file_name(internal_name));
    write_module(&module_file, &remote_manifest(internal_name, version, api_level));
    module_file
}

/// Temporary plugin and config directories for one test.
pub struct TestDirs {
    root: TempDir,
}

impl TestDirs {
    pub fn new() -> Self {
        Self {
            root: TempDir::new().expect("create temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn plugin_dir(&self) -> PathBuf {
        self.root.path().join("installedPlugins")
    }

    pub fn config_dir(&self) -> PathBuf {
        self.root.path().join("pluginConfigs")
    }

    pub fn dev_dir(&self) -> PathBuf {
        self.root.path().join("dev")
    }
}

impl Default for TestDirs {
    fn default() -> Self {
        Self::new()
    }
}

/// A configuration pointing at `dirs`, with a zero grace delay and `main_repo_url`.
pub fn test_config(dirs: &TestDirs, main_repo_url: &str) -> HangarConfig {
    let mut config = HangarConfig::default();
    config.host.plugin_directory = dirs.plugin_dir();
    config.host.config_directory = dirs.config_dir();
    config.repos.main_repo_url = main_repo_url.to_string();
    config.policy.wait_before_dispose_ms = 0;
    config
}

/// Register `module_files` as enabled developer locations.
pub fn with_dev_locations(mut config: HangarConfig, module_files: &[PathBuf]) -> HangarConfig {
    config
        .dev
        .locations
        .extend(module_files.iter().map(|path| DevLocation {
            path: path.clone(),
            enabled: true,
        }));
    config
}
