// SPDX-FileCopyrightText: 2026 Hangar Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Live configuration shared by the plugin host.
//!
//! Readers take a snapshot with [`ConfigHandle::load`] and never block.
//! Writers replace the whole value through [`ConfigHandle::update`], then
//! [`ConfigHandle::queue_save`] marks it for the next [`ConfigHandle::flush`].

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use hangar_core::HangarError;
use tracing::{debug, info};

use crate::model::{DEFAULT_MAIN_REPO_URL, HangarConfig, is_invalid_main_url};

struct Inner {
    current: ArcSwap<HangarConfig>,
    save_path: Option<PathBuf>,
    dirty: AtomicBool,
    writer: Mutex<()>,
}

/// Cloneable handle to the live configuration.
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<Inner>,
}

impl ConfigHandle {
    /// A handle that persists to `save_path` on [`flush`](Self::flush).
    pub fn new(config: HangarConfig, save_path: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Inner {
                current: ArcSwap::from_pointee(config),
                save_path,
                dirty: AtomicBool::new(false),
                writer: Mutex::new(()),
            }),
        }
    }

    /// A handle with nowhere to persist; saves are recorded but never written.
    pub fn in_memory(config: HangarConfig) -> Self {
        Self::new(config, None)
    }

    /// Current configuration snapshot.
    pub fn load(&self) -> Arc<HangarConfig> {
        self.inner.current.load_full()
    }

    /// Apply `f` to a copy of the configuration and publish the result.
    ///
    /// Writers are serialized; readers holding an older snapshot keep it.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut HangarConfig),
    {
        let _guard = self
            .inner
            .writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut next = HangarConfig::clone(&self.inner.current.load());
        f(&mut next);
        self.inner.current.store(Arc::new(next));
    }

    /// Mark the configuration as needing persistence.
    pub fn queue_save(&self) {
        self.inner.dirty.store(true, Ordering::Release);
    }

    pub fn is_save_queued(&self) -> bool {
        self.inner.dirty.load(Ordering::Acquire)
    }

    pub fn save_path(&self) -> Option<&Path> {
        self.inner.save_path.as_deref()
    }

    /// Write the configuration as TOML if a save is queued.
    ///
    /// Returns whether anything was written.
    pub fn flush(&self) -> Result<bool, HangarError> {
        if !self.inner.dirty.swap(false, Ordering::AcqRel) {
            return Ok(false);
        }
        let Some(path) = self.inner.save_path.as_deref() else {
            debug!("configuration save queued without a save path");
            return Ok(false);
        };

        let result = self.write_to(path);
        if result.is_err() {
            self.queue_save();
        }
        result.map(|()| true)
    }

    fn write_to(&self, path: &Path) -> Result<(), HangarError> {
        let snapshot = self.load();
        let body = toml::to_string_pretty(&*snapshot)
            .map_err(|e| HangarError::Config(format!("failed to serialize configuration: {e}")))?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| HangarError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, body).map_err(|source| HangarError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Replace a main repository URL known to be dead with the default one.
    ///
    /// Returns the URL now in effect; a replacement queues a save.
    pub fn normalize_main_repo_url(&self) -> String {
        let current = self.load().repos.main_repo_url.clone();
        if !is_invalid_main_url(&current) {
            return current;
        }

        info!(
            from = %current,
            to = DEFAULT_MAIN_REPO_URL,
            "replacing retired main repository url"
        );
        self.update(|cfg| cfg.repos.main_repo_url = DEFAULT_MAIN_REPO_URL.to_string());
        self.queue_save();
        DEFAULT_MAIN_REPO_URL.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_publishes_new_snapshot() {
        let handle = ConfigHandle::in_memory(HangarConfig::default());
        let before = handle.load();
        handle.update(|cfg| cfg.policy.safe_mode = true);

        assert!(!before.policy.safe_mode);
        assert!(handle.load().policy.safe_mode);
        assert!(!handle.is_save_queued());
    }

    #[test]
    fn invalid_main_url_is_replaced_and_saved() {
        let mut config = HangarConfig::default();
        config.repos.main_repo_url = "https://legacy.hangar-rs.dev/Plugin/PluginMaster".into();
        let handle = ConfigHandle::in_memory(config);

        assert_eq!(handle.normalize_main_repo_url(), DEFAULT_MAIN_REPO_URL);
        assert_eq!(handle.load().repos.main_repo_url, DEFAULT_MAIN_REPO_URL);
        assert!(handle.is_save_queued());
    }

    #[test]
    fn valid_main_url_is_untouched() {
        let handle = ConfigHandle::in_memory(HangarConfig::default());
        handle.normalize_main_repo_url();
        assert!(!handle.is_save_queued());
    }

    #[test]
    fn flush_writes_toml_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("hangar.toml");
        let handle = ConfigHandle::new(HangarConfig::default(), Some(path.clone()));

        assert!(!handle.flush().unwrap());
        handle.update(|cfg| cfg.policy.safe_mode = true);
        handle.queue_save();
        assert!(handle.flush().unwrap());
        assert!(!handle.flush().unwrap());

        let written = std::fs::read_to_string(&path).unwrap();
        let parsed: HangarConfig = toml::from_str(&written).unwrap();
        assert!(parsed.policy.safe_mode);
    }
}
