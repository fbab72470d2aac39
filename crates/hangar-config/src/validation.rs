// SPDX-FileCopyrightText: 2026 Hangar Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as URL schemes, absolute developer paths, and duplicate repositories.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::HangarConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Whether `url` is an absolute http(s) URL with a host.
pub fn is_http_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    match rest {
        Some(rest) => {
            let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
            !host.is_empty() && !host.contains(char::is_whitespace)
        }
        None => false,
    }
}

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &HangarConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.host.api_level < 0 {
        errors.push(ConfigError::validation(format!(
            "host.api_level must be non-negative, got {}",
            config.host.api_level
        )));
    }

    if !LOG_LEVELS.contains(&config.host.log_level.as_str()) {
        errors.push(ConfigError::validation(format!(
            "host.log_level `{}` must be one of {}",
            config.host.log_level,
            LOG_LEVELS.join(", ")
        )));
    }

    let main = config.repos.main_repo_url.trim();
    if main.is_empty() {
        errors.push(ConfigError::validation("repos.main_repo_url must not be empty"));
    } else if !is_http_url(main) {
        errors.push(ConfigError::validation(format!(
            "repos.main_repo_url `{main}` must be an absolute http or https URL"
        )));
    }

    if config.repos.fetch_timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "repos.fetch_timeout_secs must be at least 1",
        ));
    }

    let mut seen_urls = HashSet::new();
    seen_urls.insert(main.to_ascii_lowercase());
    for (i, repo) in config.repos.third_party.iter().enumerate() {
        let url = repo.url.trim();
        if !is_http_url(url) {
            errors.push(ConfigError::validation(format!(
                "repos.third_party[{i}].url `{url}` must be an absolute http or https URL"
            )));
        }
        if !seen_urls.insert(url.to_ascii_lowercase()) {
            errors.push(ConfigError::validation(format!(
                "duplicate repository url `{url}` in repos.third_party"
            )));
        }
    }

    let mut seen_paths = HashSet::new();
    for (i, location) in config.dev.locations.iter().enumerate() {
        if !location.path.is_absolute() {
            errors.push(ConfigError::validation(format!(
                "dev.locations[{i}].path `{}` must be absolute",
                location.path.display()
            )));
        }
        if !seen_paths.insert(&location.path) {
            errors.push(ConfigError::validation(format!(
                "duplicate developer location `{}`",
                location.path.display()
            )));
        }
    }

    for (i, ban) in config.bans.iter().enumerate() {
        if ban.name.trim().is_empty() {
            errors.push(ConfigError::validation(format!(
                "bans[{i}].name must not be empty"
            )));
        }
    }

    let mut seen_profiles = HashSet::new();
    for profile in &config.profiles.named {
        if !seen_profiles.insert(profile.id) {
            errors.push(ConfigError::validation(format!(
                "duplicate profile id `{}` in profiles.named",
                profile.id
            )));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
