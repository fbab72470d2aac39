// SPDX-FileCopyrightText: 2026 Hangar Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared-library module loader.
//!
//! Each module file is mapped into its own [`Library`]. The module exports a
//! [`PluginDeclaration`] under [`DECLARATION_SYMBOL`] via `declare_plugin!`.

use std::path::{Path, PathBuf};

use hangar_core::{
    BoxError, DECLARATION_SYMBOL, HangarError, ModuleContext, ModuleLoader, PluginDeclaration,
    PluginEntry,
};
use libloading::Library;
use tracing::debug;

/// Opens module files as shared libraries.
#[derive(Debug, Default, Clone, Copy)]
pub struct DylibLoader;

impl DylibLoader {
    pub fn new() -> Self {
        Self
    }
}

impl ModuleLoader for DylibLoader {
    fn open(&self, path: &Path) -> Result<Box<dyn ModuleContext>, HangarError> {
        if !path.is_file() {
            return Err(HangarError::InvalidModule {
                path: path.to_path_buf(),
                message: "module file does not exist".into(),
            });
        }
        let library = map_library(path)?;
        debug!(path = %path.display(), "module library mapped");
        Ok(Box::new(DylibContext {
            path: path.to_path_buf(),
            library: Some(library),
        }))
    }
}

fn map_library(path: &Path) -> Result<Library, HangarError> {
    // SAFETY: mapping runs the library's initializers. Module files are
    // trusted by virtue of being installed or registered by the user.
    unsafe { Library::new(path) }.map_err(|e| HangarError::DependencyResolution {
        path: path.to_path_buf(),
        message: e.to_string(),
        source: Some(Box::new(e)),
    })
}

/// One mapped module library.
pub struct DylibContext {
    path: PathBuf,
    library: Option<Library>,
}

impl DylibContext {
    fn library(&self) -> Result<&Library, HangarError> {
        self.library.as_ref().ok_or_else(|| HangarError::InvalidModule {
            path: self.path.clone(),
            message: "module library is not mapped".into(),
        })
    }
}

impl ModuleContext for DylibContext {
    fn reload(&mut self) -> Result<(), HangarError> {
        // The old image has to be gone before the file is mapped again, or the
        // loader hands back the same mapping.
        if let Some(old) = self.library.take() {
            old.close()
                .map_err(|e| HangarError::Internal(format!("failed to unmap module: {e}")))?;
        }
        self.library = Some(map_library(&self.path)?);
        debug!(path = %self.path.display(), "module library remapped");
        Ok(())
    }

    fn entry(&self) -> Result<PluginEntry, HangarError> {
        let library = self.library()?;
        // SAFETY: the symbol is declared by `declare_plugin!` with this exact type.
        let declaration = unsafe { library.get::<*const PluginDeclaration>(DECLARATION_SYMBOL) }
            .map_err(|e| HangarError::InvalidModule {
                path: self.path.clone(),
                message: format!("no plugin declaration exported: {e}"),
            })?;
        // SAFETY: the pointer targets a static inside the still-mapped library.
        let declaration: PluginDeclaration = unsafe { **declaration };

        if !declaration.is_compatible() {
            return Err(HangarError::InvalidModule {
                path: self.path.clone(),
                message: format!(
                    "built against hangar-core {}, host has {}",
                    declaration.core_version,
                    hangar_core::CORE_VERSION
                ),
            });
        }
        Ok(declaration.entry())
    }

    fn dispose(mut self: Box<Self>) -> Result<(), BoxError> {
        match self.library.take() {
            Some(library) => library.close().map_err(Into::into),
            None => Ok(()),
        }
    }
}
