// SPDX-FileCopyrightText: 2026 Hangar Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The capability object a module exports, and the entry point that builds it.

use std::fmt;
use std::sync::Arc;

use crate::error::BoxError;
use crate::module::{PluginInterface, ServiceScope};

/// A live module instance.
///
/// Construction happens through the module's [`PluginEntry`]; disposal
/// consumes the instance so it can run at most once.
pub trait HostedPlugin: Send + 'static {
    /// Release everything the instance holds.
    fn dispose(self: Box<Self>) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Everything handed to a module constructor.
pub struct PluginInit {
    /// The per-load host interface.
    pub interface: Arc<PluginInterface>,
    /// The module's private service scope.
    pub services: Arc<ServiceScope>,
}

/// Builds a module instance.
pub type PluginFactory =
    Arc<dyn Fn(PluginInit) -> Result<Box<dyn HostedPlugin>, BoxError> + Send + Sync>;

/// The single entry point resolved from a module context.
#[derive(Clone)]
pub struct PluginEntry {
    /// Binary identity; two live modules may not share one.
    pub identity: String,
    pub factory: PluginFactory,
}

impl PluginEntry {
    pub fn new<F>(identity: impl Into<String>, factory: F) -> Self
    where
        F: Fn(PluginInit) -> Result<Box<dyn HostedPlugin>, BoxError> + Send + Sync + 'static,
    {
        Self {
            identity: identity.into(),
            factory: Arc::new(factory),
        }
    }

    pub fn instantiate(&self, init: PluginInit) -> Result<Box<dyn HostedPlugin>, BoxError> {
        (self.factory)(init)
    }
}

impl fmt::Debug for PluginEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginEntry")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}
