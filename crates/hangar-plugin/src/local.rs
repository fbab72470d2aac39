// SPDX-FileCopyrightText: 2026 Hangar Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The lifecycle controller for one installed module.
//!
//! A [`LocalPlugin`] owns, in acquisition order, the module context, the
//! resolved entry point, the live instance, its private service scope and
//! the host interface handed to it. Load, unload and reload run under a
//! per-controller lock that is taken with `try_lock`: a second request while
//! one is running fails fast with [`HangarError::OperationInvalid`]. Each
//! transition runs on its own task, so it settles even when the caller's
//! future is dropped part way through.
//!
//! Every transition ends in a settled state. Refused preconditions leave the
//! state untouched; failures after `Loading` land in `LoadError`,
//! `DependencyResolutionFailed` or (for an identity collision) `Unloaded`;
//! failed teardown lands in `UnloadError`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use arc_swap::ArcSwap;
use hangar_core::{
    DisposalFailures, DisposalMode, DisposalStep, HangarError, HostedPlugin, ListInvalidationKind,
    LoadReason, ModuleContext, ModuleKind, PluginEntry, PluginIdentity, PluginInit,
    PluginInterface, PluginState, Precondition, ServiceScope,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::coordinator::run_guarded;
use crate::host::PluginHost;
use crate::manifest::{LocalManifest, manifest_path};
use crate::repository::PluginRepository;

/// Resources owned while a module is (or was) loaded.
#[derive(Default)]
struct Resources {
    context: Option<Box<dyn ModuleContext>>,
    entry: Option<PluginEntry>,
    claimed_identity: Option<String>,
    instance: Option<Box<dyn HostedPlugin>>,
    scope: Option<Arc<ServiceScope>>,
    interface: Option<Arc<PluginInterface>>,
}

/// Lifecycle controller for one installed or developer module.
pub struct LocalPlugin {
    host: Arc<PluginHost>,
    kind: ModuleKind,
    module_file: PathBuf,
    manifest_file: PathBuf,
    manifest: ArcSwap<LocalManifest>,
    working_id: Uuid,
    state: RwLock<PluginState>,
    resources: Arc<Mutex<Resources>>,
    has_ever_started_load: AtomicBool,
}

impl std::fmt::Debug for LocalPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalPlugin")
            .field("internal_name", &self.internal_name())
            .field("kind", &self.kind)
            .field("state", &self.state())
            .field("module_file", &self.module_file)
            .finish_non_exhaustive()
    }
}

/// Working id of a developer module: stable per module path.
pub fn developer_working_id(module_file: &Path) -> Uuid {
    Uuid::new_v5(
        &Uuid::NAMESPACE_URL,
        module_file.to_string_lossy().as_bytes(),
    )
}

impl LocalPlugin {
    /// Build a controller for the module at `module_file`, reading its manifest.
    ///
    /// An installed module without a working id gets one minted and persisted.
    pub fn new(
        host: Arc<PluginHost>,
        module_file: PathBuf,
        kind: ModuleKind,
    ) -> Result<Self, HangarError> {
        let manifest_file = manifest_path(&module_file);
        let mut manifest = LocalManifest::load(&manifest_file)?;

        let working_id = match kind {
            ModuleKind::Developer => developer_working_id(&module_file),
            ModuleKind::Installed => {
                if manifest.working_plugin_id.is_nil() {
                    manifest.working_plugin_id = Uuid::new_v4();
                    manifest.save(&manifest_file, "minted working plugin id")?;
                }
                manifest.working_plugin_id
            }
        };

        debug!(
            plugin = %manifest.internal_name(),
            %working_id,
            kind = %kind,
            path = %module_file.display(),
            "plugin controller created"
        );

        Ok(Self {
            host,
            kind,
            module_file,
            manifest_file,
            manifest: ArcSwap::from_pointee(manifest),
            working_id,
            state: RwLock::new(PluginState::Unloaded),
            resources: Arc::new(Mutex::new(Resources::default())),
            has_ever_started_load: AtomicBool::new(false),
        })
    }

    // --- read-only views ---

    pub fn state(&self) -> PluginState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: PluginState) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        debug!(plugin = %self.internal_name(), from = %*state, to = %next, "state transition");
        *state = next;
    }

    /// Current manifest snapshot.
    pub fn manifest(&self) -> Arc<LocalManifest> {
        self.manifest.load_full()
    }

    pub fn internal_name(&self) -> String {
        self.manifest.load().internal_name().to_string()
    }

    pub fn name(&self) -> String {
        self.manifest.load().manifest.name.clone()
    }

    pub fn working_id(&self) -> Uuid {
        self.working_id
    }

    pub fn kind(&self) -> ModuleKind {
        self.kind
    }

    pub fn is_dev(&self) -> bool {
        self.kind == ModuleKind::Developer
    }

    pub fn module_file(&self) -> &Path {
        &self.module_file
    }

    pub fn is_loaded(&self) -> bool {
        self.state() == PluginState::Loaded
    }

    pub fn is_testing(&self) -> bool {
        self.manifest.load().testing
    }

    pub fn is_third_party(&self) -> bool {
        self.manifest.load().is_third_party
    }

    pub fn has_ever_started_load(&self) -> bool {
        self.has_ever_started_load.load(Ordering::Acquire)
    }

    /// Module API level differs from the host's.
    pub fn is_outdated(&self) -> bool {
        self.manifest.load().effective_api_level() != self.host.config().load().host.api_level
    }

    pub fn ban_reason(&self) -> Option<String> {
        let manifest = self.manifest.load();
        self.host
            .bans()
            .find(manifest.internal_name(), manifest.effective_version())
            .map(|ban| ban.reason.clone())
    }

    pub fn is_banned(&self) -> bool {
        self.ban_reason().is_some()
    }

    /// Whether the load policy allows this module right now.
    pub fn check_policy(&self) -> bool {
        self.policy_refusal().is_none()
    }

    fn policy_refusal(&self) -> Option<&'static str> {
        let config = self.host.config().load();
        if config.policy.safe_mode {
            return Some("safe mode is engaged");
        }
        if config.policy.no_third_party && self.is_third_party() {
            return Some("third-party plugins are disabled");
        }
        None
    }

    /// Compatible, not stuck in a failed unload, and allowed by policy.
    pub fn applicable_for_load(&self) -> bool {
        let level = self.manifest.load().effective_api_level();
        self.host.config().load().accepts_api_level(level)
            && !(!self.is_dev() && self.state() == PluginState::UnloadError)
            && self.check_policy()
    }

    /// Whether any enabled profile wants this module. Does not declare it.
    pub async fn is_wanted_by_any_profile(&self) -> bool {
        let name = self.internal_name();
        match self
            .host
            .profiles()
            .want_state(self.working_id, &name, false, false)
            .await
        {
            Ok(wanted) => wanted,
            Err(e) => {
                warn!(plugin = %name, error = %e, "profile lookup failed");
                false
            }
        }
    }

    /// The repository this module is served from, if any.
    ///
    /// The main repository serves every first-party module; a third-party
    /// module is served by the repository it was installed from.
    pub fn source_repository<'a>(
        &self,
        repos: &'a [Arc<PluginRepository>],
    ) -> Option<&'a Arc<PluginRepository>> {
        if self.is_dev() {
            return None;
        }
        let manifest = self.manifest.load();
        repos.iter().find(|repo| {
            (!repo.is_third_party() && !manifest.is_third_party)
                || repo.url() == manifest.installed_from_url
        })
    }

    /// Whether a module context is currently held. Waits for a running transition.
    pub async fn has_module_context(&self) -> bool {
        self.resources.lock().await.context.is_some()
    }

    /// Persist the scheduled-for-deletion flag.
    pub fn schedule_deletion(&self, scheduled: bool) -> Result<(), HangarError> {
        self.update_manifest("scheduled for deletion", |m| {
            m.scheduled_for_deletion = scheduled;
        })
    }

    /// Persist the testing flag. Takes effect on the next load.
    pub fn set_testing(&self, testing: bool) -> Result<(), HangarError> {
        self.update_manifest("testing toggled", |m| m.testing = testing)
    }

    fn update_manifest<F>(&self, reason: &str, f: F) -> Result<(), HangarError>
    where
        F: FnOnce(&mut LocalManifest),
    {
        let mut next = LocalManifest::clone(&self.manifest.load());
        f(&mut next);
        next.save(&self.manifest_file, reason)?;
        self.manifest.store(Arc::new(next));
        Ok(())
    }

    // --- transitions ---

    fn lock(&self) -> Result<OwnedMutexGuard<Resources>, HangarError> {
        Arc::clone(&self.resources).try_lock_owned().map_err(|_| {
            HangarError::invalid(self.internal_name(), "operation already in progress")
        })
    }

    /// Take the controller lock and drive `transition` on a spawned task.
    ///
    /// Once started, the transition runs to completion even if the returned
    /// future is dropped.
    async fn run_transition<F, Fut>(self: &Arc<Self>, transition: F) -> Result<(), HangarError>
    where
        F: FnOnce(Arc<Self>, OwnedMutexGuard<Resources>) -> Fut,
        Fut: Future<Output = Result<(), HangarError>> + Send + 'static,
    {
        let res = self.lock()?;
        let task = tokio::spawn(transition(Arc::clone(self), res));
        match task.await {
            Ok(result) => result,
            Err(join) => Err(HangarError::Internal(format!(
                "{}: transition task failed: {join}",
                self.internal_name()
            ))),
        }
    }

    /// Load the module.
    ///
    /// `reloading` forces the module context to re-read its binary; developer
    /// modules always do.
    pub async fn load(
        self: &Arc<Self>,
        reason: LoadReason,
        reloading: bool,
    ) -> Result<(), HangarError> {
        self.run_transition(move |this, mut res| async move {
            this.load_locked(&mut res, reason, reloading).await
        })
        .await
    }

    /// Unload the module, releasing the module context according to `mode`.
    pub async fn unload(self: &Arc<Self>, mode: DisposalMode) -> Result<(), HangarError> {
        self.run_transition(move |this, mut res| async move {
            this.unload_locked(&mut res, mode).await
        })
        .await
    }

    /// Unload keeping the module context warm, then load with [`LoadReason::Reload`].
    ///
    /// The controller lock is held across both halves.
    pub async fn reload(self: &Arc<Self>) -> Result<(), HangarError> {
        self.run_transition(|this, mut res| async move {
            let state = this.state();
            let skip_unload = this.is_dev() && state == PluginState::UnloadError;
            if !skip_unload && matches!(state, PluginState::Loaded | PluginState::LoadError) {
                this.unload_locked(&mut res, DisposalMode::None).await?;
            }
            this.load_locked(&mut res, LoadReason::Reload, true).await
        })
        .await
    }

    /// Release everything, including a context retained by a previous unload.
    ///
    /// Used before the controller is dropped from the installed set.
    pub async fn dispose(self: &Arc<Self>) -> Result<(), HangarError> {
        self.run_transition(|this, mut res| async move {
            if matches!(
                this.state(),
                PluginState::Loaded | PluginState::Loading | PluginState::Unloading
            ) {
                return Err(HangarError::invalid(
                    this.internal_name(),
                    "cannot dispose a loaded plugin",
                ));
            }
            this.clear_and_dispose(&mut res, DisposalMode::ImmediateDispose)
                .await
                .map_err(HangarError::Disposal)
        })
        .await
    }

    fn check_load_state(&self) -> Result<(), HangarError> {
        let name = self.internal_name();
        match self.state() {
            PluginState::Unloaded => Ok(()),
            state if state.is_error() && self.is_dev() => Ok(()),
            PluginState::Loaded => Err(HangarError::invalid(name, "already loaded")),
            PluginState::LoadError => Err(HangarError::invalid(
                name,
                "a previous load failed; unload it first",
            )),
            PluginState::UnloadError => Err(HangarError::invalid(
                name,
                "a previous unload failed; restart the host",
            )),
            PluginState::DependencyResolutionFailed => Err(HangarError::invalid(
                name,
                "dependencies could not be resolved; restart the host",
            )),
            PluginState::Loading | PluginState::Unloading => {
                Err(HangarError::invalid(name, "operation already in progress"))
            }
        }
    }

    fn check_preconditions(&self) -> Result<(), HangarError> {
        let config = self.host.config().load();
        let manifest = self.manifest.load();
        let refuse = |reason: Precondition| {
            warn!(plugin = %manifest.internal_name(), reason = %reason, "load refused");
            Err(HangarError::PreconditionFailed {
                plugin: manifest.internal_name().to_string(),
                reason,
            })
        };

        if let Some(ban) = self
            .host
            .bans()
            .find(manifest.internal_name(), manifest.effective_version())
        {
            return refuse(Precondition::Banned {
                reason: ban.reason.clone(),
            });
        }

        if let Some(required) = manifest.manifest.minimum_host_version
            && required > config.host.version
        {
            return refuse(Precondition::HostTooOld {
                required,
                host: config.host.version,
            });
        }

        let level = manifest.effective_api_level();
        if !self.is_dev() && !config.accepts_api_level(level) {
            return refuse(Precondition::ApiLevel {
                module: level,
                host: config.host.api_level,
            });
        }

        if let Some(reason) = self.policy_refusal() {
            return refuse(Precondition::Policy {
                reason: reason.to_string(),
            });
        }

        Ok(())
    }

    async fn load_locked(
        &self,
        res: &mut Resources,
        reason: LoadReason,
        reloading: bool,
    ) -> Result<(), HangarError> {
        self.check_load_state()?;

        if self.is_dev() {
            self.refresh_dev_manifest();
        }

        self.check_preconditions()?;

        let name = self.internal_name();
        if !self.is_wanted_by_any_profile().await {
            warn!(plugin = %name, "loading a plugin no profile wants");
        }

        if self.manifest.load().scheduled_for_deletion {
            self.schedule_deletion(false)?;
        }

        self.set_state(PluginState::Loading);
        self.has_ever_started_load.store(true, Ordering::Release);
        info!(plugin = %name, reason = %reason, path = %self.module_file.display(), "loading plugin");

        match self.activate(res, reason, reloading).await {
            Ok(()) => {
                self.set_state(PluginState::Loaded);
                info!(plugin = %name, "plugin loaded");
                self.host
                    .events()
                    .state_changed(ListInvalidationKind::Loaded, &name);
                Ok(())
            }
            Err(err) => {
                let next = match &err {
                    HangarError::DependencyResolution { .. } => {
                        PluginState::DependencyResolutionFailed
                    }
                    HangarError::DuplicateIdentity { .. } => PluginState::Unloaded,
                    _ => PluginState::LoadError,
                };
                self.set_state(next);
                error!(plugin = %name, state = %next, error = %err, "plugin load failed");
                Err(err)
            }
        }
    }

    /// Everything between `Loading` and `Loaded`.
    async fn activate(
        &self,
        res: &mut Resources,
        reason: LoadReason,
        reloading: bool,
    ) -> Result<(), HangarError> {
        let name = self.internal_name();

        if res.context.is_none() {
            res.context = Some(self.host.loader().open(&self.module_file)?);
            res.entry = None;
        }

        if reloading || self.is_dev() {
            res.entry = None;
            if let Some(context) = res.context.as_mut()
                && let Err(e) = context.reload()
            {
                self.reset_context(res);
                return Err(e);
            }
        }

        if res.entry.is_none() {
            let resolved = match res.context.as_ref() {
                Some(context) => context.entry(),
                None => Err(HangarError::Internal("module context vanished".into())),
            };
            match resolved {
                Ok(entry) => res.entry = Some(entry),
                Err(e) => {
                    self.reset_context(res);
                    return Err(e);
                }
            }
        }

        let entry = res
            .entry
            .clone()
            .ok_or_else(|| HangarError::Internal("entry point missing after resolution".into()))?;

        if let Err(owner) = self.host.identities().claim(&entry.identity, self.working_id) {
            warn!(plugin = %name, identity = %entry.identity, %owner, "duplicate module identity");
            return Err(HangarError::DuplicateIdentity {
                plugin: name,
                identity: entry.identity,
            });
        }
        res.claimed_identity = Some(entry.identity.clone());

        let manifest = self.manifest.load_full();
        let config = self.host.config().load();
        let interface = Arc::new(PluginInterface::new(
            PluginIdentity {
                internal_name: name.clone(),
                display_name: manifest.manifest.name.clone(),
                working_id: self.working_id,
                kind: self.kind,
                is_testing: manifest.testing,
            },
            reason,
            config.host.config_directory.clone(),
        ));
        res.interface = Some(Arc::clone(&interface));

        let scope = Arc::new(self.host.services().create_scope(name.clone()));
        res.scope = Some(Arc::clone(&scope));

        let init = PluginInit {
            interface,
            services: scope,
        };
        let constructed = if manifest.manifest.load_sync {
            debug!(plugin = %name, "constructing on the coordination thread");
            self.host
                .coordinator()
                .run(move || entry.instantiate(init))
                .await
                .map_err(|e| instantiation(&name, e))
                .and_then(|built| built.map_err(|source| instantiation(&name, source)))
        } else {
            run_guarded(|| entry.instantiate(init))
                .map_err(|panic| instantiation(&name, format!("constructor panicked: {panic}")))
                .and_then(|built| built.map_err(|source| instantiation(&name, source)))
        };

        match constructed {
            Ok(instance) => {
                res.instance = Some(instance);
                Ok(())
            }
            Err(err) => {
                // The instance never existed; release what was acquired for it.
                if let Err(failures) = self
                    .clear_and_dispose(res, DisposalMode::ImmediateDispose)
                    .await
                {
                    error!(plugin = %name, error = %failures, "cleanup after failed load was incomplete");
                }
                Err(err)
            }
        }
    }

    async fn unload_locked(
        &self,
        res: &mut Resources,
        mode: DisposalMode,
    ) -> Result<(), HangarError> {
        let name = self.internal_name();
        match self.state() {
            PluginState::Loaded | PluginState::LoadError => {}
            PluginState::UnloadError | PluginState::DependencyResolutionFailed if self.is_dev() => {}
            PluginState::Unloaded => {
                return Err(HangarError::invalid(name, "already unloaded"));
            }
            PluginState::UnloadError | PluginState::DependencyResolutionFailed => {
                return Err(HangarError::invalid(
                    name,
                    "cannot unload from a failed state; restart the host",
                ));
            }
            PluginState::Loading | PluginState::Unloading => {
                return Err(HangarError::invalid(name, "operation already in progress"));
            }
        }

        self.set_state(PluginState::Unloading);
        info!(plugin = %name, mode = %mode, "unloading plugin");

        match self.clear_and_dispose(res, mode).await {
            Ok(()) => {
                self.set_state(PluginState::Unloaded);
                info!(plugin = %name, "plugin unloaded");
                self.host
                    .events()
                    .state_changed(ListInvalidationKind::Unloaded, &name);
                Ok(())
            }
            Err(failures) => {
                self.set_state(PluginState::UnloadError);
                error!(plugin = %name, error = %failures, "plugin unload failed");
                Err(HangarError::Disposal(failures))
            }
        }
    }

    /// Tear down in reverse acquisition order. Every step is attempted.
    async fn clear_and_dispose(
        &self,
        res: &mut Resources,
        mode: DisposalMode,
    ) -> Result<(), DisposalFailures> {
        let name = self.internal_name();
        let mut failures = DisposalFailures::new(name.clone());
        let mut mode = mode;

        match res.instance.take() {
            Some(instance) => {
                let result = if self.manifest.load().manifest.can_unload_async {
                    run_guarded(move || instance.dispose())
                        .unwrap_or_else(|panic| Err(format!("dispose panicked: {panic}").into()))
                } else {
                    debug!(plugin = %name, "disposing on the coordination thread");
                    match self.host.coordinator().run(move || instance.dispose()).await {
                        Ok(result) => result,
                        Err(e) => Err(e.into()),
                    }
                };
                failures.record(DisposalStep::Instance, result);
            }
            // Nothing ran from the image, so it can go right away.
            None => mode = DisposalMode::ImmediateDispose,
        }

        if let Some(identity) = res.claimed_identity.take() {
            self.host.identities().release(&identity, self.working_id);
        }
        res.entry = None;

        if let Some(scope) = res.scope.take() {
            debug!(plugin = %name, "disposing service scope");
            failures.record(DisposalStep::ServiceScope, scope.dispose().await);
        }

        if let Some(interface) = res.interface.take() {
            failures.record(DisposalStep::Interface, interface.dispose());
        }

        if mode != DisposalMode::None
            && let Some(context) = res.context.take()
        {
            let delay = match mode {
                DisposalMode::WaitBeforeDispose => {
                    self.host.config().load().policy.wait_before_dispose()
                }
                _ => std::time::Duration::ZERO,
            };
            debug!(plugin = %name, delay_ms = delay.as_millis() as u64, "releasing module context");
            // Once started, the delay runs to completion even if this future is dropped.
            let release = tokio::spawn(async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                context.dispose()
            });
            let result = match release.await {
                Ok(result) => result,
                Err(join) => Err(format!("context release task failed: {join}").into()),
            };
            failures.record(DisposalStep::ModuleContext, result);
        }

        failures.into_result()
    }

    fn reset_context(&self, res: &mut Resources) {
        res.entry = None;
        if let Some(context) = res.context.take()
            && let Err(e) = context.dispose()
        {
            warn!(plugin = %self.internal_name(), error = %e, "failed to release module context");
        }
    }

    fn refresh_dev_manifest(&self) {
        match LocalManifest::load(&self.manifest_file) {
            Ok(fresh) => self.manifest.store(Arc::new(fresh)),
            Err(e) => {
                warn!(plugin = %self.internal_name(), error = %e, "keeping previous developer manifest");
            }
        }
    }
}

fn instantiation(plugin: &str, source: impl Into<hangar_core::BoxError>) -> HangarError {
    HangarError::Instantiation {
        plugin: plugin.to_string(),
        source: source.into(),
    }
}
