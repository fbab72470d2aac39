// SPDX-FileCopyrightText: 2026 Hangar Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory [`ModuleLoader`] keyed by module path.
//!
//! Tests register a [`TestModule`] per path and get back its [`ModuleProbe`].
//! The behavior is looked up again on every entry resolution, so changing it
//! between loads takes effect on the next reload.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use hangar_core::{BoxError, HangarError, ModuleContext, ModuleLoader, PluginEntry};

use crate::test_plugin::{ModuleProbe, PluginBehavior, TestPlugin};

/// How opening a scripted module fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenFailure {
    DependencyResolution,
    InvalidModule,
}

/// A scripted module.
#[derive(Debug, Clone)]
pub struct TestModule {
    /// Binary identity reported by the entry point.
    pub identity: String,
    pub behavior: PluginBehavior,
    pub open_failure: Option<OpenFailure>,
}

impl TestModule {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            behavior: PluginBehavior::default(),
            open_failure: None,
        }
    }

    pub fn with_behavior(mut self, behavior: PluginBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn failing_open(mut self, failure: OpenFailure) -> Self {
        self.open_failure = Some(failure);
        self
    }
}

struct Registered {
    module: TestModule,
    probe: Arc<ModuleProbe>,
}

/// Module loader backed by a path → [`TestModule`] table.
#[derive(Clone, Default)]
pub struct MemoryLoader {
    modules: Arc<Mutex<HashMap<PathBuf, Registered>>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the module at `path`, replacing any previous script and probe.
    pub fn register(&self, path: impl Into<PathBuf>, module: TestModule) -> Arc<ModuleProbe> {
        let probe = Arc::new(ModuleProbe::default());
        self.table().insert(
            path.into(),
            Registered {
                module,
                probe: Arc::clone(&probe),
            },
        );
        probe
    }

    /// Change the behavior of an already registered module.
    pub fn set_behavior(&self, path: &Path, behavior: PluginBehavior) {
        if let Some(entry) = self.table().get_mut(path) {
            entry.module.behavior = behavior;
        }
    }

    pub fn probe(&self, path: &Path) -> Option<Arc<ModuleProbe>> {
        self.table().get(path).map(|entry| Arc::clone(&entry.probe))
    }

    fn table(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, Registered>> {
        self.modules.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lookup(&self, path: &Path) -> Option<(TestModule, Arc<ModuleProbe>)> {
        self.table()
            .get(path)
            .map(|entry| (entry.module.clone(), Arc::clone(&entry.probe)))
    }
}

impl ModuleLoader for MemoryLoader {
    fn open(&self, path: &Path) -> Result<Box<dyn ModuleContext>, HangarError> {
        let Some((module, probe)) = self.lookup(path) else {
            return Err(HangarError::InvalidModule {
                path: path.to_path_buf(),
                message: "no scripted module at this path".into(),
            });
        };

        match module.open_failure {
            Some(OpenFailure::DependencyResolution) => {
                return Err(HangarError::DependencyResolution {
                    path: path.to_path_buf(),
                    message: "scripted dependency failure".into(),
                    source: None,
                });
            }
            Some(OpenFailure::InvalidModule) => {
                return Err(HangarError::InvalidModule {
                    path: path.to_path_buf(),
                    message: "scripted invalid module".into(),
                });
            }
            None => {}
        }

        probe.record_open();
        Ok(Box::new(MemoryContext {
            path: path.to_path_buf(),
            loader: self.clone(),
            probe,
        }))
    }
}

struct MemoryContext {
    path: PathBuf,
    loader: MemoryLoader,
    probe: Arc<ModuleProbe>,
}

impl ModuleContext for MemoryContext {
    fn reload(&mut self) -> Result<(), HangarError> {
        self.probe.record_reload();
        Ok(())
    }

    fn entry(&self) -> Result<PluginEntry, HangarError> {
        let (module, probe) =
            self.loader
                .lookup(&self.path)
                .ok_or_else(|| HangarError::InvalidModule {
                    path: self.path.clone(),
                    message: "scripted module was unregistered".into(),
                })?;
        let behavior = module.behavior;
        Ok(PluginEntry::new(module.identity, move |init| {
            TestPlugin::construct(behavior.clone(), Arc::clone(&probe), init)
        }))
    }

    fn dispose(self: Box<Self>) -> Result<(), BoxError> {
        self.probe
            .record_context_disposed(std::fs::read(&self.path).ok());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_path_is_invalid() {
        let loader = MemoryLoader::new();
        let err = loader.open(Path::new("/nowhere.so")).err().unwrap();
        assert!(matches!(err, HangarError::InvalidModule { .. }));
    }

    #[test]
    fn open_and_dispose_are_counted() {
        let loader = MemoryLoader::new();
        let path = PathBuf::from("/plugins/Sample.so");
        let probe = loader.register(&path, TestModule::new("sample"));

        let context = loader.open(&path).unwrap();
        assert_eq!(context.entry().unwrap().identity, "sample");
        context.dispose().unwrap();

        assert_eq!(probe.opens(), 1);
        assert_eq!(probe.contexts_disposed(), 1);
        assert!(probe.context_disposed_at().is_some());
    }

    #[test]
    fn scripted_open_failures() {
        let loader = MemoryLoader::new();
        let path = PathBuf::from("/plugins/Broken.so");
        loader.register(
            &path,
            TestModule::new("broken").failing_open(OpenFailure::DependencyResolution),
        );
        let err = loader.open(&path).err().unwrap();
        assert!(matches!(err, HangarError::DependencyResolution { .. }));
    }
}
