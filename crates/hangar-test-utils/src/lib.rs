// SPDX-FileCopyrightText: 2026 Hangar Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Hangar integration tests.
//!
//! Provides an in-memory module loader and on-disk fixtures so lifecycle and
//! catalog tests run without building real shared libraries.
//!
//! # Components
//!
//! - [`MemoryLoader`] - module loader keyed by path, with scripted behaviors
//! - [`ModuleProbe`] - counters and timestamps recorded by one scripted module
//! - [`FailingScope`] - scoped service whose disposal always fails
//! - [`fixtures`] - installed/developer layouts, catalog JSON and configs

pub mod fixtures;
pub mod memory_loader;
pub mod test_plugin;

pub use fixtures::{
    TestDirs, catalog_json, module_file_name, remote_manifest, test_config, with_dev_locations,
    write_dev_plugin, write_installed,
};
pub use memory_loader::{MemoryLoader, OpenFailure, TestModule};
pub use test_plugin::{FailingScope, ModuleProbe, PluginBehavior, TestPlugin};
