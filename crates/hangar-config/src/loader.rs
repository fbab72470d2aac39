// SPDX-FileCopyrightText: 2026 Hangar Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./hangar.toml` > `~/.config/hangar/hangar.toml` > `/etc/hangar/hangar.toml`
//! with environment variable overrides via `HANGAR_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::HangarConfig;

/// System-wide configuration file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/hangar/hangar.toml";

/// Configuration file in the working directory.
pub const LOCAL_CONFIG_PATH: &str = "hangar.toml";

/// `~/.config/hangar/hangar.toml`, if the platform has a config directory.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("hangar").join("hangar.toml"))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/hangar/hangar.toml` (system-wide)
/// 3. `~/.config/hangar/hangar.toml` (user XDG config)
/// 4. `./hangar.toml` (local directory)
/// 5. `HANGAR_*` environment variables
pub fn load_config() -> Result<HangarConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<HangarConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(HangarConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<HangarConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(HangarConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The Figment used by [`load_config`], before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(HangarConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(env_provider())
}

/// Environment provider mapping `HANGAR_<SECTION>_<KEY>` to `<section>.<key>`.
///
/// Uses `Env::map()` rather than `Env::split("_")` because keys contain
/// underscores: `HANGAR_POLICY_SAFE_MODE` must become `policy.safe_mode`.
fn env_provider() -> Env {
    Env::prefixed("HANGAR_").map(|key| {
        let key_str = key.as_str();
        let mapped = ["host_", "repos_", "dev_", "policy_"]
            .iter()
            .find(|section| key_str.starts_with(*section))
            .map(|section| key_str.replacen(section, &section.replace('_', "."), 1))
            .unwrap_or_else(|| key_str.to_string());
        mapped.into()
    })
}
