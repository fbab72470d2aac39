// SPDX-FileCopyrightText: 2026 Hangar Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot catalog subcommands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use hangar_config::{ConfigHandle, HangarConfig};
use hangar_core::{HangarError, LoadReason};
use hangar_plugin::{
    CatalogManager, Coordinator, DylibLoader, LocalManifest, LocalPlugin, PluginHost,
    ProfileManager,
};
use tracing::{debug, warn};

/// Wire a catalog over real shared-library modules.
pub fn build_catalog(
    config: HangarConfig,
    save_path: Option<PathBuf>,
) -> Result<CatalogManager, HangarError> {
    let handle = ConfigHandle::new(config, save_path);
    let profiles = Arc::new(ProfileManager::new(handle.clone()));
    let coordinator = Coordinator::for_current_runtime()?;
    let host = PluginHost::new(handle, Arc::new(DylibLoader::new()), profiles, coordinator);
    CatalogManager::new(Arc::new(host))
}

/// Build a catalog and populate it from disk and, optionally, the network.
async fn open_catalog(
    config: HangarConfig,
    save_path: Option<PathBuf>,
    fetch: bool,
) -> Result<CatalogManager, HangarError> {
    let catalog = build_catalog(config, save_path)?;
    catalog.set_repos_from_config(fetch).await;
    let installed = catalog.scan_installed().await?;
    let dev = catalog.scan_dev_plugins().await?;
    debug!(installed = installed.len(), dev = dev.len(), "catalog populated");
    Ok(catalog)
}

/// Persist whatever the command queued.
fn finish(catalog: &CatalogManager) -> Result<(), HangarError> {
    if catalog.host().config().flush()? {
        debug!("configuration written");
    }
    Ok(())
}

/// Pick the installed plugin a user means by `name`, preferring non-developer ones.
async fn resolve(catalog: &CatalogManager, name: &str) -> Result<Arc<LocalPlugin>, HangarError> {
    let mut matches = catalog.find_by_internal_name(name).await;
    matches.sort_by_key(|p| p.is_dev());
    matches
        .into_iter()
        .next()
        .ok_or_else(|| HangarError::invalid(name, "no installed plugin with that name"))
}

pub async fn run_repos(
    config: HangarConfig,
    save_path: Option<PathBuf>,
) -> Result<(), HangarError> {
    let catalog = build_catalog(config, save_path)?;
    catalog.set_repos_from_config(true).await;

    for repo in catalog.repos().await.iter() {
        let kind = if repo.is_third_party() { "third-party" } else { "main" };
        let enabled = if repo.is_enabled() { "" } else { " (disabled)" };
        println!(
            "{:<12} {:<11} {:>4} manifests  {}{enabled}",
            repo.state().to_string(),
            kind,
            repo.manifests().len(),
            repo.url()
        );
    }
    finish(&catalog)
}

pub async fn run_available(
    config: HangarConfig,
    save_path: Option<PathBuf>,
) -> Result<(), HangarError> {
    let catalog = open_catalog(config, save_path, true).await?;

    for entry in catalog.available().await {
        let name = entry.internal_name();
        match (&entry.remote, &entry.installed, entry.installed_only) {
            (Some(remote), installed, _) => {
                let marker = if installed.is_some() { "*" } else { " " };
                println!(
                    "{marker} {:<32} {:<14} {}",
                    name,
                    remote.effective_version(false).to_string(),
                    entry.source_url().unwrap_or_default()
                );
            }
            (None, Some(plugin), reason) => {
                let reason = reason.map(|r| r.to_string()).unwrap_or_default();
                println!(
                    "* {:<32} {:<14} [{reason}]",
                    name,
                    plugin.manifest().effective_version().to_string()
                );
            }
            (None, None, _) => {}
        }
    }
    finish(&catalog)
}

pub async fn run_installed(
    config: HangarConfig,
    save_path: Option<PathBuf>,
) -> Result<(), HangarError> {
    let catalog = open_catalog(config, save_path, false).await?;

    for plugin in catalog.installed().await.iter() {
        let mut flags = Vec::new();
        if plugin.is_dev() {
            flags.push("dev");
        }
        if plugin.is_testing() {
            flags.push("testing");
        }
        if plugin.is_banned() {
            flags.push("banned");
        }
        if plugin.is_outdated() {
            flags.push("outdated");
        }
        if plugin.is_wanted_by_any_profile().await {
            flags.push("wanted");
        }
        println!(
            "{:<32} {:<14} {:<26} {} {}",
            plugin.internal_name(),
            plugin.manifest().effective_version().to_string(),
            plugin.state().to_string(),
            plugin.working_id(),
            flags.join(",")
        );
    }
    finish(&catalog)
}

pub async fn run_updatable(
    config: HangarConfig,
    save_path: Option<PathBuf>,
) -> Result<(), HangarError> {
    let catalog = open_catalog(config, save_path, true).await?;

    let updates = catalog.updatable().await;
    if updates.is_empty() {
        println!("hangar: all plugins are up to date");
    }
    for update in updates {
        let channel = if update.use_testing { " (testing)" } else { "" };
        println!(
            "{:<32} {} -> {}{channel}",
            update.plugin.internal_name(),
            update.installed_version,
            update.available_version
        );
    }
    finish(&catalog)
}

pub async fn run_install(
    config: HangarConfig,
    save_path: Option<PathBuf>,
    module: &Path,
    manifest: &Path,
) -> Result<(), HangarError> {
    let catalog = open_catalog(config, save_path, false).await?;
    let manifest = LocalManifest::load(manifest)?;

    let result = catalog
        .install_local(module, manifest, LoadReason::Install)
        .await;
    if let Ok(plugin) = &result {
        println!(
            "hangar: installed {} {} ({})",
            plugin.internal_name(),
            plugin.manifest().effective_version(),
            plugin.state()
        );
    }
    shutdown(&catalog).await;
    finish(&catalog)?;
    result.map(|_| ())
}

pub async fn run_remove(
    config: HangarConfig,
    save_path: Option<PathBuf>,
    name: &str,
) -> Result<(), HangarError> {
    let catalog = open_catalog(config, save_path, false).await?;
    let plugin = resolve(&catalog, name).await?;
    catalog.remove_installed(plugin.working_id()).await?;
    println!("hangar: removed {name}");
    finish(&catalog)
}

pub async fn run_enable(
    config: HangarConfig,
    save_path: Option<PathBuf>,
    name: &str,
) -> Result<(), HangarError> {
    let catalog = open_catalog(config, save_path, false).await?;
    let plugin = resolve(&catalog, name).await?;
    let result = catalog.enable(plugin.working_id()).await;
    // The profile change is persisted even when the trial load fails.
    finish(&catalog)?;
    result?;
    println!("hangar: enabled {name} ({})", plugin.state());
    shutdown(&catalog).await;
    Ok(())
}

pub async fn run_disable(
    config: HangarConfig,
    save_path: Option<PathBuf>,
    name: &str,
) -> Result<(), HangarError> {
    let catalog = open_catalog(config, save_path, false).await?;
    let plugin = resolve(&catalog, name).await?;
    catalog.disable(plugin.working_id()).await?;
    println!("hangar: disabled {name}");
    finish(&catalog)
}

/// Unload whatever a one-shot command left loaded.
pub async fn shutdown(catalog: &CatalogManager) {
    let outcome = catalog.unload_all().await;
    for (name, e) in &outcome.failed {
        warn!(plugin = %name, error = %e, "unload failed during shutdown");
    }
}

/// Whether any installed plugin ended up in a failed state.
pub async fn any_failed(catalog: &CatalogManager) -> bool {
    catalog.installed().await.iter().any(|p| p.state().is_error())
}
