// SPDX-FileCopyrightText: 2026 Hangar Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-load host interface handed to a module instance.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::BoxError;
use crate::types::{LoadReason, ModuleKind};

/// Who a module is, as far as the module itself is concerned.
#[derive(Debug, Clone)]
pub struct PluginIdentity {
    pub internal_name: String,
    pub display_name: String,
    pub working_id: Uuid,
    pub kind: ModuleKind,
    pub is_testing: bool,
}

/// The capability object a module receives on construction.
///
/// A fresh interface is built for every load. Disposing it cancels
/// [`PluginInterface::shutdown_token`], which is the module's signal to stop
/// background work before its image is released.
#[derive(Debug)]
pub struct PluginInterface {
    identity: PluginIdentity,
    reason: LoadReason,
    config_directory: PathBuf,
    shutdown: CancellationToken,
    disposed: AtomicBool,
}

impl PluginInterface {
    pub fn new(identity: PluginIdentity, reason: LoadReason, config_directory: PathBuf) -> Self {
        Self {
            identity,
            reason,
            config_directory,
            shutdown: CancellationToken::new(),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn identity(&self) -> &PluginIdentity {
        &self.identity
    }

    pub fn internal_name(&self) -> &str {
        &self.identity.internal_name
    }

    pub fn working_id(&self) -> Uuid {
        self.identity.working_id
    }

    /// Why this activation happened.
    pub fn reason(&self) -> LoadReason {
        self.reason
    }

    pub fn is_dev(&self) -> bool {
        self.identity.kind == ModuleKind::Developer
    }

    pub fn is_testing(&self) -> bool {
        self.identity.is_testing
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// `<config_directory>/<internal name>.json`.
    pub fn config_file(&self) -> PathBuf {
        self.config_directory
            .join(format!("{}.json", self.identity.internal_name))
    }

    /// Cancelled when the interface is disposed.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Cancel the shutdown token. Fails if already disposed.
    pub fn dispose(&self) -> Result<(), BoxError> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Err(format!(
                "interface for {} was already disposed",
                self.identity.internal_name
            )
            .into());
        }
        self.shutdown.cancel();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interface() -> PluginInterface {
        PluginInterface::new(
            PluginIdentity {
                internal_name: "Sample".into(),
                display_name: "Sample Plugin".into(),
                working_id: Uuid::new_v4(),
                kind: ModuleKind::Installed,
                is_testing: false,
            },
            LoadReason::Boot,
            PathBuf::from("/tmp/hangar/config"),
        )
    }

    #[test]
    fn dispose_cancels_token_once() {
        let iface = interface();
        let token = iface.shutdown_token();
        assert!(!token.is_cancelled());

        iface.dispose().unwrap();
        assert!(token.is_cancelled());
        assert!(iface.is_disposed());
        assert!(iface.dispose().is_err());
    }

    #[test]
    fn config_file_uses_internal_name() {
        let iface = interface();
        assert_eq!(
            iface.config_file(),
            PathBuf::from("/tmp/hangar/config/Sample.json")
        );
        assert_eq!(iface.reason(), LoadReason::Boot);
        assert!(!iface.is_dev());
    }
}
