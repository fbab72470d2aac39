// SPDX-FileCopyrightText: 2026 Hangar Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The well-known static a dynamic module exports.
//!
//! A module crate built as a `cdylib` calls [`declare_plugin!`](crate::declare_plugin)
//! exactly once. The loader looks up [`DECLARATION_SYMBOL`], refuses modules built
//! against a different `hangar-core`, and turns the declaration into a
//! [`PluginEntry`].

use crate::error::BoxError;
use crate::traits::{HostedPlugin, PluginEntry, PluginInit};

/// Version of `hangar-core` a module was compiled against.
pub const CORE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// NUL-terminated name of the exported declaration static.
pub const DECLARATION_SYMBOL: &[u8] = b"HANGAR_PLUGIN_DECLARATION\0";

/// Constructor signature exported by a module.
pub type CreateFn = fn(PluginInit) -> Result<Box<dyn HostedPlugin>, BoxError>;

/// Exported by every dynamic module under [`DECLARATION_SYMBOL`].
#[derive(Debug, Clone, Copy)]
pub struct PluginDeclaration {
    pub core_version: &'static str,
    pub identity: &'static str,
    pub create: CreateFn,
}

impl PluginDeclaration {
    /// Whether the module was built against this `hangar-core`.
    pub fn is_compatible(&self) -> bool {
        self.core_version == CORE_VERSION
    }

    pub fn entry(&self) -> PluginEntry {
        let create = self.create;
        PluginEntry::new(self.identity, move |init| create(init))
    }
}

/// Export a module's declaration.
///
/// ```ignore
/// struct Greeter;
/// impl hangar_core::HostedPlugin for Greeter {}
///
/// fn create(_init: hangar_core::PluginInit)
///     -> Result<Box<dyn hangar_core::HostedPlugin>, hangar_core::BoxError> {
///     Ok(Box::new(Greeter))
/// }
///
/// hangar_core::declare_plugin!("greeter", create);
/// ```
#[macro_export]
macro_rules! declare_plugin {
    ($identity:expr, $create:path) => {
        #[doc(hidden)]
        #[unsafe(no_mangle)]
        pub static HANGAR_PLUGIN_DECLARATION: $crate::PluginDeclaration =
            $crate::PluginDeclaration {
                core_version: $crate::CORE_VERSION,
                identity: $identity,
                create: $create,
            };
    };
}
