// SPDX-FileCopyrightText: 2026 Hangar Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `hangar serve` - host every wanted plugin until interrupted.

use std::path::PathBuf;

use hangar_config::HangarConfig;
use hangar_core::{HangarError, LoadReason};
use hangar_plugin::CatalogEvent;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::commands::{any_failed, build_catalog, shutdown};

pub async fn run_serve(
    config: HangarConfig,
    save_path: Option<PathBuf>,
) -> Result<(), HangarError> {
    let catalog = build_catalog(config, save_path)?;
    let mut events = catalog.host().events().subscribe();

    catalog.set_repos_from_config(true).await;
    catalog.scan_installed().await?;
    catalog.scan_dev_plugins().await?;

    let outcome = catalog.load_wanted(LoadReason::Boot).await;
    for (name, e) in &outcome.failed {
        warn!(plugin = %name, error = %e, "plugin failed to load at startup");
    }
    if any_failed(&catalog).await {
        warn!("some plugins are in a failed state");
    }
    info!(loaded = outcome.succeeded.len(), "hangar serving; press Ctrl-C to stop");

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!(error = %e, "failed to listen for Ctrl-C");
                }
                break;
            }
            event = events.recv() => match event {
                Ok(CatalogEvent::StateChanged { kind, internal_names }) => {
                    debug!(%kind, plugins = ?internal_names, "plugin list changed");
                }
                Ok(other) => debug!(event = ?other, "catalog event"),
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "event stream lagged"),
                Err(RecvError::Closed) => {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        warn!(error = %e, "failed to listen for Ctrl-C");
                    }
                    break;
                }
            },
        }
    }

    info!("shutting down");
    shutdown(&catalog).await;
    if catalog.host().config().flush()? {
        info!("configuration saved on shutdown");
    }
    Ok(())
}
