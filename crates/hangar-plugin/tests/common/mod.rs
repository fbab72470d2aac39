// SPDX-FileCopyrightText: 2026 Hangar Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared setup for hangar-plugin integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use hangar_config::ConfigHandle;
use hangar_config::model::HangarConfig;
use hangar_core::ModuleKind;
use hangar_plugin::{CatalogManager, Coordinator, LocalPlugin, PluginHost, ProfileManager};
use hangar_test_utils::{
    MemoryLoader, ModuleProbe, TestDirs, TestModule, test_config, write_dev_plugin,
    write_installed,
};
use serde_json::{Value, json};

pub const MAIN_URL: &str = "https://plugins.test/pluginmaster.json";
pub const API_LEVEL: i32 = 12;

/// A host wired to an in-memory loader and a temp directory tree.
pub struct Harness {
    pub dirs: TestDirs,
    pub loader: MemoryLoader,
    pub config: ConfigHandle,
    pub host: Arc<PluginHost>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Build a harness after letting `tweak` adjust the default test configuration.
    pub fn with_config(tweak: impl FnOnce(&mut HangarConfig)) -> Self {
        let dirs = TestDirs::new();
        let mut config = test_config(&dirs, MAIN_URL);
        tweak(&mut config);
        let config = ConfigHandle::in_memory(config);

        let loader = MemoryLoader::new();
        let profiles = Arc::new(ProfileManager::new(config.clone()));
        let coordinator = Coordinator::for_current_runtime().expect("coordinator");
        let host = Arc::new(PluginHost::new(
            config.clone(),
            Arc::new(loader.clone()),
            profiles,
            coordinator,
        ));

        Self {
            dirs,
            loader,
            config,
            host,
        }
    }

    pub fn catalog(&self) -> CatalogManager {
        CatalogManager::new(Arc::clone(&self.host)).expect("catalog")
    }

    /// Write an installed module, script it, and return its module file and probe.
    pub fn write_installed(
        &self,
        name: &str,
        version: &str,
        module: TestModule,
        extra: Value,
    ) -> (PathBuf, Arc<ModuleProbe>) {
        let file = write_installed(
            &self.dirs.plugin_dir(),
            name,
            version,
            API_LEVEL,
            MAIN_URL,
            extra,
        );
        let probe = self.loader.register(&file, module);
        (file, probe)
    }

    /// An installed controller for a fresh module called `name`.
    pub fn installed(&self, name: &str) -> (Arc<LocalPlugin>, Arc<ModuleProbe>) {
        self.installed_with(name, TestModule::new(name), json!({}))
    }

    pub fn installed_with(
        &self,
        name: &str,
        module: TestModule,
        extra: Value,
    ) -> (Arc<LocalPlugin>, Arc<ModuleProbe>) {
        let (file, probe) = self.write_installed(name, "1.0.0.0", module, extra);
        let plugin = LocalPlugin::new(Arc::clone(&self.host), file, ModuleKind::Installed)
            .expect("installed controller");
        (Arc::new(plugin), probe)
    }

    /// A developer controller for a fresh module called `name`.
    pub fn developer(&self, name: &str, module: TestModule) -> (Arc<LocalPlugin>, Arc<ModuleProbe>) {
        let file = write_dev_plugin(&self.dirs.dev_dir(), name, "1.0.0.0", API_LEVEL);
        let probe = self.loader.register(&file, module);
        let plugin = LocalPlugin::new(Arc::clone(&self.host), file, ModuleKind::Developer)
            .expect("developer controller");
        (Arc::new(plugin), probe)
    }
}
