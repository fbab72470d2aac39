// SPDX-FileCopyrightText: 2026 Hangar Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Seam traits between the lifecycle controller and its collaborators.
//!
//! The controller is handed implementations of these at construction;
//! nothing here is looked up from ambient state.

pub mod loader;
pub mod plugin;
pub mod profile;
pub mod scoped;

pub use loader::{ModuleContext, ModuleLoader};
pub use plugin::{HostedPlugin, PluginEntry, PluginFactory, PluginInit};
pub use profile::ProfileResolver;
pub use scoped::ScopedService;
