// SPDX-FileCopyrightText: 2026 Hangar Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Hangar plugin host.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::path::PathBuf;
use std::time::Duration;

use hangar_core::AssemblyVersion;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Main repository used when none is configured.
pub const DEFAULT_MAIN_REPO_URL: &str = "https://plugins.hangar-rs.dev/pluginmaster.json";

/// Main repository URLs that are known to be dead. A configured main URL
/// containing one of these (case-insensitively) is replaced by
/// [`DEFAULT_MAIN_REPO_URL`].
pub const INVALID_MAIN_REPO_URLS: &[&str] = &[
    "https://legacy.hangar-rs.dev/plugin/pluginmaster",
    "http://plugins.hangar-rs.dev/",
];

/// Top-level Hangar configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HangarConfig {
    /// Host identity and directories.
    #[serde(default)]
    pub host: HostConfig,

    /// Plugin repositories.
    #[serde(default)]
    pub repos: RepoConfig,

    /// Developer module locations.
    #[serde(default)]
    pub dev: DevConfig,

    /// Load policy switches.
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Banned module versions.
    #[serde(default)]
    pub bans: Vec<BannedPlugin>,

    /// Profile membership.
    #[serde(default)]
    pub profiles: ProfilesConfig,
}

impl HangarConfig {
    /// Whether a module targeting `api_level` may run on this host.
    pub fn accepts_api_level(&self, api_level: i32) -> bool {
        self.policy.allow_mixed_api_levels || api_level == self.host.api_level
    }
}

/// Host identity and directory configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HostConfig {
    /// Plugin API level this host implements.
    #[serde(default = "default_api_level")]
    pub api_level: i32,

    /// Host version, compared against a module's minimum host version.
    #[serde(default = "default_host_version")]
    pub version: AssemblyVersion,

    /// Root of the installed module tree.
    #[serde(default = "default_plugin_directory")]
    pub plugin_directory: PathBuf,

    /// Where modules keep their own configuration files.
    #[serde(default = "default_config_directory")]
    pub config_directory: PathBuf,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            api_level: default_api_level(),
            version: default_host_version(),
            plugin_directory: default_plugin_directory(),
            config_directory: default_config_directory(),
            log_level: default_log_level(),
        }
    }
}

fn default_api_level() -> i32 {
    12
}

fn default_host_version() -> AssemblyVersion {
    AssemblyVersion::new(1, 0, 0, 0)
}

fn default_plugin_directory() -> PathBuf {
    dirs::data_dir()
        .map(|p| p.join("hangar").join("installedPlugins"))
        .unwrap_or_else(|| PathBuf::from("./installedPlugins"))
}

fn default_config_directory() -> PathBuf {
    dirs::config_dir()
        .map(|p| p.join("hangar").join("pluginConfigs"))
        .unwrap_or_else(|| PathBuf::from("./pluginConfigs"))
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Repository configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RepoConfig {
    /// The main (first-party) repository.
    #[serde(default = "default_main_repo_url")]
    pub main_repo_url: String,

    /// Additional third-party repositories.
    #[serde(default)]
    pub third_party: Vec<ThirdPartyRepo>,

    /// Per-request fetch timeout, in seconds.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            main_repo_url: default_main_repo_url(),
            third_party: Vec::new(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

impl RepoConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

fn default_main_repo_url() -> String {
    DEFAULT_MAIN_REPO_URL.to_string()
}

fn default_fetch_timeout_secs() -> u64 {
    20
}

/// One third-party repository.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ThirdPartyRepo {
    pub url: String,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Whether `url` is on the list of dead main repository URLs.
pub fn is_invalid_main_url(url: &str) -> bool {
    let lowered = url.to_ascii_lowercase();
    INVALID_MAIN_REPO_URLS
        .iter()
        .any(|bad| lowered.contains(&bad.to_ascii_lowercase()))
}

/// Developer module configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DevConfig {
    /// Module files loaded straight from a build directory.
    #[serde(default)]
    pub locations: Vec<DevLocation>,
}

/// A local module build.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DevLocation {
    /// Absolute path to the module file.
    pub path: PathBuf,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Load policy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    /// Refuse to load any module.
    #[serde(default)]
    pub safe_mode: bool,

    /// Refuse to load modules from third-party repositories.
    #[serde(default)]
    pub no_third_party: bool,

    /// Load modules built for a different API level.
    #[serde(default)]
    pub allow_mixed_api_levels: bool,

    /// Ignore the ban list.
    #[serde(default)]
    pub load_banned: bool,

    /// Master switch for testing builds.
    #[serde(default)]
    pub do_plugin_test: bool,

    /// Internal names opted into testing builds.
    #[serde(default)]
    pub testing_opt_ins: Vec<String>,

    /// Offer updates for modules no profile wants.
    #[serde(default)]
    pub update_disabled_plugins: bool,

    /// Grace delay between instance disposal and module context release, in milliseconds.
    #[serde(default = "default_wait_before_dispose_ms")]
    pub wait_before_dispose_ms: u64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            safe_mode: false,
            no_third_party: false,
            allow_mixed_api_levels: false,
            load_banned: false,
            do_plugin_test: false,
            testing_opt_ins: Vec::new(),
            update_disabled_plugins: false,
            wait_before_dispose_ms: default_wait_before_dispose_ms(),
        }
    }
}

impl PolicyConfig {
    pub fn wait_before_dispose(&self) -> Duration {
        Duration::from_millis(self.wait_before_dispose_ms)
    }

    /// Whether repository manifests for `internal_name` should use their testing build.
    pub fn is_testing_opted_in(&self, internal_name: &str) -> bool {
        self.do_plugin_test && self.testing_opt_ins.iter().any(|n| n == internal_name)
    }
}

fn default_wait_before_dispose_ms() -> u64 {
    1000
}

/// A banned module.
///
/// `name` matches either the internal name or its lowercase hex SHA-256.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BannedPlugin {
    pub name: String,

    /// Versions up to and including this one are banned. Absent bans every version.
    #[serde(default)]
    pub assembly_version: Option<AssemblyVersion>,

    #[serde(default)]
    pub reason: String,
}

/// Profile configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProfilesConfig {
    /// Membership of the always-enabled default profile.
    #[serde(default)]
    pub default_plugins: Vec<ProfilePlugin>,

    /// User-defined collections.
    #[serde(default)]
    pub named: Vec<ProfileModel>,
}

/// A user-defined collection of modules.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileModel {
    pub id: Uuid,
    pub name: String,

    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub plugins: Vec<ProfilePlugin>,
}

/// A module's membership in one profile.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProfilePlugin {
    pub working_id: Uuid,
    pub internal_name: String,

    #[serde(default = "default_true")]
    pub enabled: bool,
}
