// SPDX-FileCopyrightText: 2026 Hangar Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Hangar configuration system.

use std::path::PathBuf;

use hangar_config::diagnostic::ConfigError;
use hangar_config::model::HangarConfig;
use hangar_config::{load_and_validate_path, load_and_validate_str, load_config_from_str};
use hangar_core::AssemblyVersion;

/// Valid TOML with every section deserializes successfully.
#[test]
fn valid_toml_deserializes_into_hangar_config() {
    let toml = r#"
[host]
api_level = 11
version = "9.1.0.4"
plugin_directory = "/srv/hangar/plugins"
log_level = "debug"

[repos]
main_repo_url = "https://example.com/pluginmaster.json"
fetch_timeout_secs = 5

[[repos.third_party]]
url = "https://third.example.com/repo.json"

[[repos.third_party]]
url = "https://other.example.com/repo.json"
enabled = false

[[dev.locations]]
path = "/home/dev/sample/target/debug/libsample.so"

[policy]
safe_mode = true
testing_opt_ins = ["Sample"]
wait_before_dispose_ms = 250

[[bans]]
name = "Crashy"
assembly_version = "1.0.2"
reason = "crashes the host"
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.host.api_level, 11);
    assert_eq!(config.host.version, AssemblyVersion::new(9, 1, 0, 4));
    assert_eq!(config.host.plugin_directory, PathBuf::from("/srv/hangar/plugins"));
    assert_eq!(config.repos.fetch_timeout_secs, 5);
    assert_eq!(config.repos.third_party.len(), 2);
    assert!(config.repos.third_party[0].enabled);
    assert!(!config.repos.third_party[1].enabled);
    assert!(config.dev.locations[0].enabled);
    assert!(config.policy.safe_mode);
    assert_eq!(config.policy.wait_before_dispose_ms, 250);
    assert_eq!(config.bans[0].assembly_version, Some(AssemblyVersion::new(1, 0, 2, 0)));
}

/// An empty document yields the compiled defaults.
#[test]
fn empty_toml_yields_defaults() {
    let config = load_config_from_str("").unwrap();
    let defaults = HangarConfig::default();
    assert_eq!(config.host.api_level, defaults.host.api_level);
    assert_eq!(config.repos.main_repo_url, defaults.repos.main_repo_url);
    assert_eq!(config.policy.wait_before_dispose_ms, 1000);
}

/// A typo in a section produces an unknown-key diagnostic with a suggestion.
#[test]
fn unknown_key_gets_suggestion() {
    let toml = r#"
[policy]
safe_mdoe = true
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject unknown field");
    assert!(errors.iter().any(|e| matches!(
        e,
        ConfigError::UnknownKey { key, suggestion: Some(s), .. }
            if key == "safe_mdoe" && s == "safe_mode"
    )));
}

/// Unknown top-level sections are rejected too.
#[test]
fn unknown_section_is_rejected() {
    let errors = load_and_validate_str("[telemetry]\nenabled = true\n").unwrap_err();
    assert!(errors.iter().any(|e| matches!(e, ConfigError::UnknownKey { key, .. } if key == "telemetry")));
}

/// Wrong value types are reported against their key.
#[test]
fn wrong_type_is_reported() {
    let errors = load_and_validate_str("[host]\napi_level = \"twelve\"\n").unwrap_err();
    assert!(errors.iter().any(|e| matches!(
        e,
        ConfigError::InvalidType { key, .. } if key == "host.api_level"
    )));
}

/// A malformed assembly version in a ban entry is rejected.
#[test]
fn malformed_ban_version_is_rejected() {
    let toml = r#"
[[bans]]
name = "Crashy"
assembly_version = "one.two"
"#;
    assert!(load_and_validate_str(toml).is_err());
}

/// Semantic validation runs after deserialization.
#[test]
fn validation_errors_surface_through_load() {
    let toml = r#"
[repos]
main_repo_url = "not a url"

[[repos.third_party]]
url = "ftp://example.com/repo.json"
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|e| matches!(e, ConfigError::Validation { .. })));
}

/// Environment variables override file values with explicit section mapping.
#[test]
fn env_overrides_file_values() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "custom.toml",
            r#"
[policy]
safe_mode = false
wait_before_dispose_ms = 100
"#,
        )?;
        jail.set_env("HANGAR_POLICY_SAFE_MODE", "true");
        jail.set_env("HANGAR_HOST_API_LEVEL", "13");

        let config = load_and_validate_path(&jail.directory().join("custom.toml"))
            .map_err(|errors| format!("{errors:?}"))?;
        assert!(config.policy.safe_mode);
        assert_eq!(config.policy.wait_before_dispose_ms, 100);
        assert_eq!(config.host.api_level, 13);
        Ok(())
    });
}
