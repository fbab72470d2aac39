// SPDX-FileCopyrightText: 2026 Hangar Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scriptable module instances and the probe they report into.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use async_trait::async_trait;
use hangar_core::{BoxError, HostedPlugin, LoadReason, PluginInit, ScopedService};
use tokio_util::sync::CancellationToken;

/// How a scripted module behaves when constructed and disposed.
#[derive(Debug, Clone, Default)]
pub struct PluginBehavior {
    /// Constructor returns an error.
    pub fail_construct: bool,
    /// Constructor panics.
    pub panic_construct: bool,
    /// Instance disposal returns an error.
    pub fail_dispose: bool,
    /// Constructor registers a [`FailingScope`] in its service scope.
    pub failing_scoped_service: bool,
}

impl PluginBehavior {
    pub fn failing_construct() -> Self {
        Self {
            fail_construct: true,
            ..Self::default()
        }
    }

    pub fn failing_dispose() -> Self {
        Self {
            fail_dispose: true,
            ..Self::default()
        }
    }
}

/// Everything a scripted module observed, shared with the test.
#[derive(Debug, Default)]
pub struct ModuleProbe {
    opens: AtomicUsize,
    reloads: AtomicUsize,
    constructed: AtomicUsize,
    instances_disposed: AtomicUsize,
    contexts_disposed: AtomicUsize,
    instance_disposed_at: Mutex<Option<Instant>>,
    context_disposed_at: Mutex<Option<Instant>>,
    released_image: Mutex<Option<Vec<u8>>>,
    last_reason: Mutex<Option<LoadReason>>,
    last_token: Mutex<Option<CancellationToken>>,
    constructed_on: Mutex<Option<String>>,
}

fn stamp<T>(slot: &Mutex<Option<T>>, value: T) {
    *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
}

fn read<T: Clone>(slot: &Mutex<Option<T>>) -> Option<T> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

impl ModuleProbe {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn reloads(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }

    pub fn constructed(&self) -> usize {
        self.constructed.load(Ordering::SeqCst)
    }

    pub fn instances_disposed(&self) -> usize {
        self.instances_disposed.load(Ordering::SeqCst)
    }

    pub fn contexts_disposed(&self) -> usize {
        self.contexts_disposed.load(Ordering::SeqCst)
    }

    pub fn instance_disposed_at(&self) -> Option<Instant> {
        read(&self.instance_disposed_at)
    }

    pub fn context_disposed_at(&self) -> Option<Instant> {
        read(&self.context_disposed_at)
    }

    /// Bytes of the module file when the last context was released.
    pub fn released_image(&self) -> Option<Vec<u8>> {
        read(&self.released_image)
    }

    /// Reason passed to the most recent construction.
    pub fn last_reason(&self) -> Option<LoadReason> {
        read(&self.last_reason)
    }

    /// Shutdown token of the most recent instance's host interface.
    pub fn last_token(&self) -> Option<CancellationToken> {
        read(&self.last_token)
    }

    /// Name of the thread the most recent construction ran on.
    pub fn constructed_on(&self) -> Option<String> {
        read(&self.constructed_on)
    }

    pub(crate) fn record_open(&self) {
        self.opens.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_reload(&self) {
        self.reloads.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_context_disposed(&self, image: Option<Vec<u8>>) {
        self.contexts_disposed.fetch_add(1, Ordering::SeqCst);
        stamp(&self.context_disposed_at, Instant::now());
        if let Some(image) = image {
            stamp(&self.released_image, image);
        }
    }
}

/// A scripted module instance.
pub struct TestPlugin {
    behavior: PluginBehavior,
    probe: Arc<ModuleProbe>,
}

impl TestPlugin {
    /// Run the scripted constructor.
    pub fn construct(
        behavior: PluginBehavior,
        probe: Arc<ModuleProbe>,
        init: PluginInit,
    ) -> Result<Box<dyn HostedPlugin>, BoxError> {
        if behavior.panic_construct {
            panic!("scripted constructor panic");
        }
        if behavior.fail_construct {
            return Err("scripted constructor failure".into());
        }

        probe.constructed.fetch_add(1, Ordering::SeqCst);
        stamp(&probe.last_reason, init.interface.reason());
        stamp(&probe.last_token, init.interface.shutdown_token());
        if let Some(name) = std::thread::current().name() {
            stamp(&probe.constructed_on, name.to_string());
        }

        if behavior.failing_scoped_service {
            init.services
                .add_scoped(Arc::new(FailingScope::new("scripted-scoped")))?;
        }

        Ok(Box::new(Self { behavior, probe }))
    }
}

impl HostedPlugin for TestPlugin {
    fn dispose(self: Box<Self>) -> Result<(), BoxError> {
        self.probe.instances_disposed.fetch_add(1, Ordering::SeqCst);
        stamp(&self.probe.instance_disposed_at, Instant::now());
        if self.behavior.fail_dispose {
            return Err("scripted instance dispose failure".into());
        }
        Ok(())
    }
}

/// A scoped service whose disposal always fails.
#[derive(Debug)]
pub struct FailingScope {
    name: String,
}

impl FailingScope {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl ScopedService for FailingScope {
    fn name(&self) -> &str {
        &self.name
    }

    async fn dispose(&self) -> Result<(), BoxError> {
        Err(format!("{} refused to dispose", self.name).into())
    }
}
