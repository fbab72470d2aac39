// SPDX-FileCopyrightText: 2026 Hangar Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Host services and per-module service scopes.
//!
//! The host registers shared services once on a [`ServiceContainer`]. Each
//! load gets a private [`ServiceScope`] layered on top: the module can look up
//! shared services through it, and anything it registers as scoped is
//! disposed together with the scope.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::debug;

use crate::error::{BoxError, DisposalFailures, DisposalStep};
use crate::traits::ScopedService;

type ServiceMap = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

fn downcast<T: Send + Sync + 'static>(service: &Arc<dyn Any + Send + Sync>) -> Option<Arc<T>> {
    Arc::clone(service).downcast::<T>().ok()
}

/// Services shared by every module.
#[derive(Default)]
pub struct ServiceContainer {
    shared: RwLock<ServiceMap>,
}

impl ServiceContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the shared service of type `T`.
    pub fn provide<T: Send + Sync + 'static>(&self, service: Arc<T>) {
        self.shared
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(TypeId::of::<T>(), service);
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.shared
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&TypeId::of::<T>())
            .and_then(downcast::<T>)
    }

    /// Open a private scope for the module `owner`.
    pub fn create_scope(self: &Arc<Self>, owner: impl Into<String>) -> ServiceScope {
        ServiceScope {
            owner: owner.into(),
            parent: Arc::clone(self),
            private: Mutex::new(HashMap::new()),
            scoped: Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
        }
    }
}

/// One module's private view of the host services.
pub struct ServiceScope {
    owner: String,
    parent: Arc<ServiceContainer>,
    private: Mutex<ServiceMap>,
    scoped: Mutex<Vec<Arc<dyn ScopedService>>>,
    disposed: AtomicBool,
}

impl ServiceScope {
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Register a value visible only through this scope.
    pub fn provide_private<T: Send + Sync + 'static>(&self, service: Arc<T>) {
        self.private
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(TypeId::of::<T>(), service);
    }

    /// Look up `T` in this scope first, then in the shared container.
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        let private = self
            .private
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&TypeId::of::<T>())
            .and_then(downcast::<T>);
        private.or_else(|| self.parent.get::<T>())
    }

    /// Bind a service's lifetime to this scope.
    pub fn add_scoped(&self, service: Arc<dyn ScopedService>) -> Result<(), BoxError> {
        if self.is_disposed() {
            return Err(format!("service scope of {} is disposed", self.owner).into());
        }
        self.scoped
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(service);
        Ok(())
    }

    pub fn scoped_count(&self) -> usize {
        self.scoped
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Dispose scoped services in reverse registration order.
    ///
    /// Every service is attempted; failures are collected. Disposing twice is a no-op.
    pub async fn dispose(&self) -> Result<(), DisposalFailures> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let services: Vec<_> = std::mem::take(
            &mut *self.scoped.lock().unwrap_or_else(PoisonError::into_inner),
        );
        self.private
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();

        let mut failures = DisposalFailures::new(self.owner.clone());
        for service in services.iter().rev() {
            debug!(plugin = %self.owner, service = service.name(), "disposing scoped service");
            failures.record(DisposalStep::ScopedService, service.dispose().await);
        }
        failures.into_result()
    }
}
