// SPDX-FileCopyrightText: 2026 Hangar Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hangar - a plugin host with repository sync and a lifecycle-managed catalog.
//!
//! This is the binary entry point for the Hangar command-line front end.

mod commands;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Hangar - a plugin host with repository sync and a lifecycle-managed catalog.
#[derive(Parser, Debug)]
#[command(name = "hangar", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override `host.log_level`.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Load every wanted plugin and run until interrupted.
    Serve,
    /// Fetch every configured repository and show its state.
    Repos,
    /// List repository manifests merged with installed plugins.
    Available,
    /// List installed and developer plugins.
    Installed,
    /// List installed plugins with a newer published version.
    Updatable,
    /// Install a module file with its manifest.
    Install {
        /// Path to the module file.
        module: PathBuf,
        /// Path to the manifest JSON written next to the installed module.
        #[arg(long)]
        manifest: PathBuf,
    },
    /// Remove an unloaded installed plugin.
    Remove { name: String },
    /// Turn a plugin on in the default profile and load it.
    Enable { name: String },
    /// Turn a plugin off in the default profile and unload it.
    Disable { name: String },
    /// Validate the configuration and exit.
    CheckConfig,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => hangar_config::load_and_validate_path(path),
        None => hangar_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            hangar_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let log_level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.host.log_level.clone());
    init_tracing(&log_level);

    let save_path = cli
        .config
        .clone()
        .or_else(hangar_config::loader::user_config_path);

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config, save_path).await,
        Some(Commands::Repos) => commands::run_repos(config, save_path).await,
        Some(Commands::Available) => commands::run_available(config, save_path).await,
        Some(Commands::Installed) => commands::run_installed(config, save_path).await,
        Some(Commands::Updatable) => commands::run_updatable(config, save_path).await,
        Some(Commands::Install { module, manifest }) => {
            commands::run_install(config, save_path, &module, &manifest).await
        }
        Some(Commands::Remove { name }) => commands::run_remove(config, save_path, &name).await,
        Some(Commands::Enable { name }) => commands::run_enable(config, save_path, &name).await,
        Some(Commands::Disable { name }) => commands::run_disable(config, save_path, &name).await,
        Some(Commands::CheckConfig) => {
            println!(
                "hangar: configuration valid (api_level={}, plugin_directory={})",
                config.host.api_level,
                config.host.plugin_directory.display()
            );
            Ok(())
        }
        None => {
            println!("hangar: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "hangar={log_level},hangar_plugin={log_level},hangar_config={log_level},warn"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}
