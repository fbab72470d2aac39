// SPDX-FileCopyrightText: 2026 Hangar Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Module loader adapter: opens an isolated binary unit and resolves its entry point.

use std::path::Path;

use crate::error::{BoxError, HangarError};
use crate::traits::plugin::PluginEntry;

/// Opens module contexts for module files.
pub trait ModuleLoader: Send + Sync {
    /// Open a context for `path`.
    ///
    /// Fails with [`HangarError::DependencyResolution`] when the binary or one of
    /// its dependencies cannot be mapped, and [`HangarError::InvalidModule`] when
    /// the file is not a module at all.
    fn open(&self, path: &Path) -> Result<Box<dyn ModuleContext>, HangarError>;
}

/// One open binary image.
///
/// Entries resolved from a context must be dropped before the context is disposed.
pub trait ModuleContext: Send + 'static {
    /// Re-read the backing file, replacing the current image.
    fn reload(&mut self) -> Result<(), HangarError>;

    /// Resolve the module's single entry point.
    fn entry(&self) -> Result<PluginEntry, HangarError>;

    /// Release the image.
    fn dispose(self: Box<Self>) -> Result<(), BoxError>;
}
