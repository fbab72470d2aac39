// SPDX-FileCopyrightText: 2026 Hangar Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Catalog manager: the repository set, the installed set, and projections over both.
//!
//! Both sets are immutable vectors behind one [`RwLock`]. Mutations build a
//! new vector and swap it in under the write guard; projections clone both
//! `Arc`s under a single read guard and compute from that snapshot.

use std::cmp::Reverse;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use hangar_config::model::HangarConfig;
use hangar_core::{
    AssemblyVersion, DisposalMode, HangarError, ListInvalidationKind, LoadReason, ModuleKind,
    PluginState, RepositoryState,
};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::events::CatalogEvent;
use crate::host::PluginHost;
use crate::local::LocalPlugin;
use crate::manifest::{LocalManifest, MODULE_EXTENSION, RemoteManifest, manifest_path};
use crate::migration::migrate_legacy_markers;
use crate::repository::{PluginRepository, build_client};

/// Why an installed module has no repository listing beside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum InstalledOnlyReason {
    /// Loaded from a local build.
    Developer,
    /// Installed from a repository that is no longer configured.
    Orphaned,
    /// The source repository loaded fine but no longer lists the module.
    Decommissioned,
    /// The source repository has not loaded successfully yet.
    Pending,
}

/// One row of the available projection.
#[derive(Debug, Clone)]
pub struct AvailableEntry {
    pub remote: Option<Arc<RemoteManifest>>,
    pub installed: Option<Arc<LocalPlugin>>,
    /// Set when there is no repository listing.
    pub installed_only: Option<InstalledOnlyReason>,
}

impl AvailableEntry {
    pub fn internal_name(&self) -> String {
        match (&self.remote, &self.installed) {
            (Some(remote), _) => remote.internal_name.clone(),
            (None, Some(plugin)) => plugin.internal_name(),
            (None, None) => String::new(),
        }
    }

    pub fn source_url(&self) -> Option<&str> {
        self.remote.as_ref().and_then(|m| m.source_url())
    }
}

/// An installed module with a newer version published.
#[derive(Debug, Clone)]
pub struct AvailableUpdate {
    pub plugin: Arc<LocalPlugin>,
    pub manifest: Arc<RemoteManifest>,
    pub installed_version: AssemblyVersion,
    pub available_version: AssemblyVersion,
    pub use_testing: bool,
}

/// Outcome of a bulk load or unload.
#[derive(Debug, Default)]
pub struct BulkOutcome {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, HangarError)>,
}

impl BulkOutcome {
    fn record(&mut self, name: String, result: Result<(), HangarError>) {
        match result {
            Ok(()) => self.succeeded.push(name),
            Err(e) => self.failed.push((name, e)),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Default, Clone)]
struct CatalogSnapshot {
    repos: Arc<Vec<Arc<PluginRepository>>>,
    installed: Arc<Vec<Arc<LocalPlugin>>>,
}

/// Whether repository manifests for `internal_name` should be read with their testing values.
pub fn repo_testing(config: &HangarConfig, internal_name: &str) -> bool {
    config.policy.do_plugin_test && config.policy.is_testing_opted_in(internal_name)
}

/// Whether a repository manifest may be offered for installation.
fn is_installable(config: &HangarConfig, manifest: &RemoteManifest) -> bool {
    let testing = repo_testing(config, &manifest.internal_name);
    if manifest.is_hide || (manifest.is_testing_exclusive && !testing) {
        return false;
    }
    config.accepts_api_level(manifest.effective_api_level(testing))
}

/// Aggregates repositories and installed modules.
pub struct CatalogManager {
    host: Arc<PluginHost>,
    client: reqwest::Client,
    snapshot: RwLock<CatalogSnapshot>,
}

impl CatalogManager {
    pub fn new(host: Arc<PluginHost>) -> Result<Self, HangarError> {
        Ok(Self::with_client(host, build_client()?))
    }

    pub fn with_client(host: Arc<PluginHost>, client: reqwest::Client) -> Self {
        Self {
            host,
            client,
            snapshot: RwLock::new(CatalogSnapshot::default()),
        }
    }

    pub fn host(&self) -> &Arc<PluginHost> {
        &self.host
    }

    pub async fn repos(&self) -> Arc<Vec<Arc<PluginRepository>>> {
        Arc::clone(&self.snapshot.read().await.repos)
    }

    pub async fn installed(&self) -> Arc<Vec<Arc<LocalPlugin>>> {
        Arc::clone(&self.snapshot.read().await.installed)
    }

    pub async fn find_installed(&self, working_id: Uuid) -> Option<Arc<LocalPlugin>> {
        self.installed()
            .await
            .iter()
            .find(|p| p.working_id() == working_id)
            .cloned()
    }

    /// Installed modules with `internal_name`; a developer build may sit beside an installed copy.
    pub async fn find_by_internal_name(&self, internal_name: &str) -> Vec<Arc<LocalPlugin>> {
        self.installed()
            .await
            .iter()
            .filter(|p| p.internal_name() == internal_name)
            .cloned()
            .collect()
    }

    // --- repositories ---

    /// Rebuild the repository set from configuration, optionally reloading it.
    pub async fn set_repos_from_config(&self, reload: bool) {
        let main = PluginRepository::create_main(self.client.clone(), self.host.config());
        let config = self.host.config().load();
        let main_url = main.url().to_string();
        let timeout = config.repos.fetch_timeout();

        let mut repos = vec![Arc::new(main)];
        repos.extend(config.repos.third_party.iter().map(|entry| {
            Arc::new(
                PluginRepository::new(self.client.clone(), &entry.url, &main_url, entry.enabled)
                    .with_timeout(timeout),
            )
        }));
        info!(count = repos.len(), "repository set rebuilt");

        self.snapshot.write().await.repos = Arc::new(repos);
        self.host.events().publish(CatalogEvent::AvailableChanged);

        if reload {
            self.reload_all_repos().await;
        }
    }

    /// Reload every enabled repository concurrently.
    pub async fn reload_all_repos(&self) {
        let repos = self.repos().await;
        join_all(
            repos
                .iter()
                .filter(|repo| repo.is_enabled())
                .map(|repo| repo.reload()),
        )
        .await;

        let failed = repos
            .iter()
            .filter(|repo| repo.state() == RepositoryState::Fail)
            .count();
        if failed > 0 {
            warn!(failed, "some repositories failed to reload");
        }
        self.host.events().publish(CatalogEvent::AvailableChanged);
    }

    // --- installed set ---

    async fn register(&self, plugin: Arc<LocalPlugin>) {
        let mut snapshot = self.snapshot.write().await;
        let mut installed = Vec::clone(&snapshot.installed);
        installed.push(plugin);
        snapshot.installed = Arc::new(installed);
    }

    async fn deregister(&self, working_id: Uuid) -> Option<Arc<LocalPlugin>> {
        let mut snapshot = self.snapshot.write().await;
        let position = snapshot
            .installed
            .iter()
            .position(|p| p.working_id() == working_id)?;
        let mut installed = Vec::clone(&snapshot.installed);
        let removed = installed.remove(position);
        snapshot.installed = Arc::new(installed);
        Some(removed)
    }

    async fn is_registered(&self, module_file: &Path) -> bool {
        self.installed()
            .await
            .iter()
            .any(|p| p.module_file() == module_file)
    }

    /// Create a controller and declare it in the default profile.
    async fn adopt(
        &self,
        module_file: PathBuf,
        kind: ModuleKind,
    ) -> Result<Arc<LocalPlugin>, HangarError> {
        let plugin = Arc::new(LocalPlugin::new(
            Arc::clone(&self.host),
            module_file,
            kind,
        )?);
        let default_state = !plugin.manifest().disabled;
        self.host
            .profiles()
            .want_state(
                plugin.working_id(),
                &plugin.internal_name(),
                default_state,
                true,
            )
            .await?;
        self.register(Arc::clone(&plugin)).await;
        Ok(plugin)
    }

    /// Register installed modules found under the plugin directory.
    ///
    /// Layout is `<plugin_directory>/<InternalName>/<version>/<InternalName>.<ext>`;
    /// the highest version directory with a readable manifest wins. Versions
    /// scheduled for deletion are deleted instead of registered.
    pub async fn scan_installed(&self) -> Result<Vec<Arc<LocalPlugin>>, HangarError> {
        let root = self.host.config().load().host.plugin_directory.clone();
        if !root.is_dir() {
            debug!(path = %root.display(), "plugin directory does not exist");
            return Ok(Vec::new());
        }

        let mut adopted = Vec::new();
        for name_dir in read_dirs(&root)? {
            let Some(internal_name) = name_dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let internal_name = internal_name.to_string();

            let Some(module_file) = self.pick_installed_version(&name_dir, &internal_name)? else {
                continue;
            };
            if self.is_registered(&module_file).await {
                continue;
            }

            match self.adopt(module_file.clone(), ModuleKind::Installed).await {
                Ok(plugin) => {
                    info!(plugin = %internal_name, working_id = %plugin.working_id(), "registered installed plugin");
                    adopted.push(plugin);
                }
                Err(e) => {
                    error!(plugin = %internal_name, path = %module_file.display(), error = %e, "could not register installed plugin");
                }
            }
        }

        if !adopted.is_empty() {
            self.host.events().publish(CatalogEvent::InstalledChanged);
        }
        Ok(adopted)
    }

    /// The module file of the newest usable version under `name_dir`.
    fn pick_installed_version(
        &self,
        name_dir: &Path,
        internal_name: &str,
    ) -> Result<Option<PathBuf>, HangarError> {
        let mut versions: Vec<(AssemblyVersion, PathBuf)> = read_dirs(name_dir)?
            .into_iter()
            .filter_map(|dir| {
                let version = dir.file_name()?.to_str()?.parse().ok()?;
                Some((version, dir))
            })
            .collect();
        versions.sort_by_key(|(version, _)| Reverse(*version));

        for (version, dir) in versions {
            let module_file = dir.join(format!("{internal_name}.{MODULE_EXTENSION}"));
            if !module_file.is_file() || !manifest_path(&module_file).is_file() {
                debug!(path = %dir.display(), "skipping incomplete version directory");
                continue;
            }

            if let Err(e) = migrate_legacy_markers(&module_file, ModuleKind::Installed) {
                warn!(plugin = internal_name, %version, error = %e, "unreadable manifest, trying older versions");
                continue;
            }

            let manifest = match LocalManifest::load(&manifest_path(&module_file)) {
                Ok(manifest) => manifest,
                Err(e) => {
                    warn!(plugin = internal_name, %version, error = %e, "unreadable manifest, trying older versions");
                    continue;
                }
            };

            if manifest.scheduled_for_deletion {
                info!(plugin = internal_name, %version, "deleting version scheduled for deletion");
                if let Err(e) = std::fs::remove_dir_all(&dir) {
                    warn!(path = %dir.display(), error = %e, "failed to delete scheduled plugin version");
                }
                continue;
            }

            return Ok(Some(module_file));
        }
        Ok(None)
    }

    /// Sync developer modules with the enabled developer locations.
    ///
    /// New locations get a controller; controllers whose location was removed
    /// or disabled are dropped once they are unloaded.
    pub async fn scan_dev_plugins(&self) -> Result<Vec<Arc<LocalPlugin>>, HangarError> {
        let config = self.host.config().load();
        let wanted: Vec<&PathBuf> = config
            .dev
            .locations
            .iter()
            .filter(|location| location.enabled)
            .map(|location| &location.path)
            .collect();

        let mut changed = false;
        for plugin in self.installed().await.iter() {
            if plugin.is_dev()
                && !wanted.iter().any(|path| plugin.module_file() == path.as_path())
                && plugin.state() == PluginState::Unloaded
            {
                info!(plugin = %plugin.internal_name(), "dropping developer plugin no longer configured");
                if let Err(e) = plugin.dispose().await {
                    warn!(plugin = %plugin.internal_name(), error = %e, "developer plugin did not release cleanly");
                }
                self.deregister(plugin.working_id()).await;
                changed = true;
            }
        }

        let mut adopted = Vec::new();
        for path in wanted {
            if !path.is_file() {
                warn!(path = %path.display(), "developer plugin file does not exist");
                continue;
            }
            if !manifest_path(path).is_file() {
                warn!(path = %path.display(), "developer plugin has no manifest");
                continue;
            }
            if self.is_registered(path).await {
                continue;
            }
            if let Err(e) = migrate_legacy_markers(path, ModuleKind::Developer) {
                warn!(path = %path.display(), error = %e, "developer manifest migration failed");
                continue;
            }
            match self.adopt(path.clone(), ModuleKind::Developer).await {
                Ok(plugin) => {
                    info!(plugin = %plugin.internal_name(), path = %path.display(), "registered developer plugin");
                    adopted.push(plugin);
                    changed = true;
                }
                Err(e) => {
                    error!(path = %path.display(), error = %e, "could not register developer plugin");
                }
            }
        }

        if changed {
            self.host.events().publish(CatalogEvent::InstalledChanged);
        }
        Ok(adopted)
    }

    /// Install a module file already on disk and load it if it is wanted.
    ///
    /// The file is copied into the installed layout. When the module is
    /// already installed it must be unloaded; its module context is released
    /// before any file is written, the new version keeps its working id and
    /// the old version is scheduled for deletion. A load failure is returned
    /// after the module has been registered.
    pub async fn install_local(
        &self,
        module_path: &Path,
        manifest: LocalManifest,
        reason: LoadReason,
    ) -> Result<Arc<LocalPlugin>, HangarError> {
        let mut manifest = manifest;
        let internal_name = manifest.internal_name().to_string();
        if internal_name.is_empty() {
            return Err(HangarError::Manifest {
                message: "cannot install a manifest without an internal name".into(),
                source: None,
            });
        }

        let previous = self
            .find_by_internal_name(&internal_name)
            .await
            .into_iter()
            .find(|p| !p.is_dev());
        if let Some(old) = &previous {
            if old.state() != PluginState::Unloaded {
                return Err(HangarError::invalid(
                    internal_name,
                    "unload the installed version before replacing it",
                ));
            }
            manifest.working_plugin_id = old.working_id();
        } else if manifest.working_plugin_id.is_nil() {
            manifest.working_plugin_id = Uuid::new_v4();
        }

        // The old module must not hold a mapped image while its files are rewritten.
        if let Some(old) = &previous {
            old.dispose().await?;
        }

        let plugin_dir = self.host.config().load().host.plugin_directory.clone();
        let target_dir = plugin_dir
            .join(&internal_name)
            .join(manifest.effective_version().to_string());
        let module_file = target_dir.join(format!("{internal_name}.{MODULE_EXTENSION}"));
        std::fs::create_dir_all(&target_dir).map_err(io_error(&target_dir))?;
        if module_path != module_file {
            std::fs::copy(module_path, &module_file).map_err(io_error(&module_file))?;
        }
        manifest.scheduled_for_deletion = false;
        manifest.save(&manifest_path(&module_file), "installed")?;

        if let Some(old) = previous {
            if old.module_file() != module_file {
                old.schedule_deletion(true)?;
            }
            self.deregister(old.working_id()).await;
        }

        let plugin = Arc::new(LocalPlugin::new(
            Arc::clone(&self.host),
            module_file,
            ModuleKind::Installed,
        )?);
        let wanted = self
            .host
            .profiles()
            .want_state(plugin.working_id(), &internal_name, true, true)
            .await?;
        self.register(Arc::clone(&plugin)).await;
        info!(plugin = %internal_name, version = %plugin.manifest().effective_version(), "plugin installed");
        self.host.events().publish(CatalogEvent::InstalledChanged);
        self.host
            .events()
            .state_changed(ListInvalidationKind::Installed, &internal_name);

        if wanted && plugin.applicable_for_load() {
            plugin.load(reason, false).await?;
        }
        Ok(plugin)
    }

    /// Remove an unloaded module from the installed set.
    ///
    /// Installed modules are scheduled for deletion; their files go on the next scan.
    pub async fn remove_installed(&self, working_id: Uuid) -> Result<(), HangarError> {
        let plugin = self
            .find_installed(working_id)
            .await
            .ok_or_else(|| HangarError::invalid(working_id.to_string(), "not installed"))?;
        if plugin.state() != PluginState::Unloaded {
            return Err(HangarError::invalid(
                plugin.internal_name(),
                "only unloaded plugins can be removed",
            ));
        }

        plugin.dispose().await?;
        if !plugin.is_dev() {
            plugin.schedule_deletion(true)?;
        }
        self.deregister(working_id).await;

        let name = plugin.internal_name();
        info!(plugin = %name, %working_id, "plugin removed");
        self.host.events().publish(CatalogEvent::InstalledChanged);
        self.host
            .events()
            .state_changed(ListInvalidationKind::Removed, &name);
        Ok(())
    }

    // --- bulk lifecycle ---

    /// Load every unloaded module that a profile wants and that may load.
    pub async fn load_wanted(&self, reason: LoadReason) -> BulkOutcome {
        let installed = self.installed().await;
        let mut candidates = Vec::new();
        for plugin in installed.iter() {
            if plugin.state() != PluginState::Unloaded {
                continue;
            }
            if !plugin.applicable_for_load() {
                debug!(plugin = %plugin.internal_name(), "not applicable for load");
                continue;
            }
            if plugin.is_wanted_by_any_profile().await {
                candidates.push(Arc::clone(plugin));
            }
        }

        let results = join_all(candidates.iter().map(|p| p.load(reason, false))).await;
        let mut outcome = BulkOutcome::default();
        for (plugin, result) in candidates.iter().zip(results) {
            outcome.record(plugin.internal_name(), result);
        }
        info!(
            loaded = outcome.succeeded.len(),
            failed = outcome.failed.len(),
            "startup load finished"
        );
        outcome
    }

    /// Unload every loaded module, releasing module contexts immediately.
    pub async fn unload_all(&self) -> BulkOutcome {
        let installed = self.installed().await;
        let targets: Vec<_> = installed
            .iter()
            .filter(|p| matches!(p.state(), PluginState::Loaded | PluginState::LoadError))
            .cloned()
            .collect();

        let results = join_all(
            targets
                .iter()
                .map(|p| p.unload(DisposalMode::ImmediateDispose)),
        )
        .await;
        let mut outcome = BulkOutcome::default();
        for (plugin, result) in targets.iter().zip(results) {
            outcome.record(plugin.internal_name(), result);
        }
        outcome
    }

    /// Mark the module wanted in the default profile and load it.
    pub async fn enable(&self, working_id: Uuid) -> Result<(), HangarError> {
        let plugin = self
            .find_installed(working_id)
            .await
            .ok_or_else(|| HangarError::invalid(working_id.to_string(), "not installed"))?;
        self.host
            .profiles()
            .set_want_state(working_id, &plugin.internal_name(), true)
            .await?;
        if plugin.state() == PluginState::Loaded {
            return Ok(());
        }
        plugin.load(LoadReason::Enable, false).await
    }

    /// Mark the module unwanted in the default profile and unload it.
    pub async fn disable(&self, working_id: Uuid) -> Result<(), HangarError> {
        let plugin = self
            .find_installed(working_id)
            .await
            .ok_or_else(|| HangarError::invalid(working_id.to_string(), "not installed"))?;
        self.host
            .profiles()
            .set_want_state(working_id, &plugin.internal_name(), false)
            .await?;
        if plugin.state() == PluginState::Unloaded {
            return Ok(());
        }
        plugin.unload(DisposalMode::WaitBeforeDispose).await
    }

    // --- projections ---

    /// Repository manifests paired with installed modules, then installed-only modules.
    pub async fn available(&self) -> Vec<AvailableEntry> {
        let snapshot = self.snapshot.read().await.clone();
        let config = self.host.config().load();
        let repos = snapshot.repos.as_slice();

        let mut paired = vec![false; snapshot.installed.len()];
        let mut listed = Vec::new();
        for repo in repos.iter().filter(|r| r.is_enabled()) {
            for manifest in repo.manifests().iter() {
                let installed = snapshot.installed.iter().enumerate().find(|(_, p)| {
                    !p.is_dev()
                        && p.internal_name() == manifest.internal_name
                        && p.source_repository(repos)
                            .is_some_and(|source| source.url() == repo.url())
                });
                match installed {
                    Some((index, plugin)) => {
                        paired[index] = true;
                        listed.push(AvailableEntry {
                            remote: Some(Arc::clone(manifest)),
                            installed: Some(Arc::clone(plugin)),
                            installed_only: None,
                        });
                    }
                    None if is_installable(&config, manifest) => listed.push(AvailableEntry {
                        remote: Some(Arc::clone(manifest)),
                        installed: None,
                        installed_only: None,
                    }),
                    None => {}
                }
            }
        }
        listed.sort_by(|a, b| a.source_url().cmp(&b.source_url()));

        for (plugin, _) in snapshot
            .installed
            .iter()
            .zip(paired)
            .filter(|(_, paired)| !paired)
        {
            let reason = if plugin.is_dev() {
                InstalledOnlyReason::Developer
            } else {
                match plugin.source_repository(repos) {
                    None => InstalledOnlyReason::Orphaned,
                    Some(repo) if repo.state() == RepositoryState::Success => {
                        InstalledOnlyReason::Decommissioned
                    }
                    Some(_) => InstalledOnlyReason::Pending,
                }
            };
            listed.push(AvailableEntry {
                remote: None,
                installed: Some(Arc::clone(plugin)),
                installed_only: Some(reason),
            });
        }
        listed
    }

    /// Installed modules whose repository publishes a newer compatible version.
    pub async fn updatable(&self) -> Vec<AvailableUpdate> {
        let snapshot = self.snapshot.read().await.clone();
        let config = self.host.config().load();
        let repos = snapshot.repos.as_slice();

        let mut updates = Vec::new();
        for plugin in snapshot.installed.iter().filter(|p| !p.is_dev()) {
            let Some(repo) = plugin.source_repository(repos) else {
                continue;
            };
            let name = plugin.internal_name();
            let Some(manifest) = repo.find(&name) else {
                continue;
            };

            let use_testing = plugin.is_testing() || repo_testing(&config, &name);
            let available_version = manifest.effective_version(use_testing);
            let installed_version = plugin.manifest().effective_version();
            if available_version <= installed_version {
                continue;
            }
            if !config.accepts_api_level(manifest.effective_api_level(use_testing)) {
                debug!(plugin = %name, "newer version targets another API level");
                continue;
            }
            if !config.policy.update_disabled_plugins && !plugin.is_wanted_by_any_profile().await
            {
                continue;
            }

            updates.push(AvailableUpdate {
                plugin: Arc::clone(plugin),
                manifest,
                installed_version,
                available_version,
                use_testing,
            });
        }
        updates
    }
}

fn read_dirs(path: &Path) -> Result<Vec<PathBuf>, HangarError> {
    let entries = std::fs::read_dir(path).map_err(io_error(path))?;
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();
    Ok(dirs)
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> HangarError + use<> {
    let path = path.to_path_buf();
    move |source| HangarError::Io { path, source }
}
