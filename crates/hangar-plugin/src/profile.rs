// SPDX-FileCopyrightText: 2026 Hangar Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Want-state resolution over the configured profiles.

use async_trait::async_trait;
use hangar_config::ConfigHandle;
use hangar_config::model::{HangarConfig, ProfilePlugin};
use hangar_core::{HangarError, ProfileResolver};
use tracing::debug;
use uuid::Uuid;

/// Resolves want-state from `[profiles]` in the live configuration.
///
/// The default profile is always enabled. A module is wanted when any enabled
/// profile lists it as enabled.
#[derive(Clone)]
pub struct ProfileManager {
    config: ConfigHandle,
}

impl ProfileManager {
    pub fn new(config: ConfigHandle) -> Self {
        Self { config }
    }

    /// Whether any profile, enabled or not, mentions the module.
    pub fn is_declared(&self, working_id: Uuid) -> bool {
        memberships(&self.config.load(), working_id).next().is_some()
    }

    /// Names of the profiles listing the module, the default profile as `"default"`.
    pub fn profiles_containing(&self, working_id: Uuid) -> Vec<String> {
        let config = self.config.load();
        let mut names = Vec::new();
        if config
            .profiles
            .default_plugins
            .iter()
            .any(|p| p.working_id == working_id)
        {
            names.push("default".to_string());
        }
        names.extend(
            config
                .profiles
                .named
                .iter()
                .filter(|profile| profile.plugins.iter().any(|p| p.working_id == working_id))
                .map(|profile| profile.name.clone()),
        );
        names
    }
}

/// `(profile enabled, entry)` for every profile entry of `working_id`.
fn memberships(
    config: &HangarConfig,
    working_id: Uuid,
) -> impl Iterator<Item = (bool, &ProfilePlugin)> {
    let default = config
        .profiles
        .default_plugins
        .iter()
        .map(|entry| (true, entry));
    let named = config
        .profiles
        .named
        .iter()
        .flat_map(|profile| profile.plugins.iter().map(move |entry| (profile.enabled, entry)));
    default
        .chain(named)
        .filter(move |(_, entry)| entry.working_id == working_id)
}

#[async_trait]
impl ProfileResolver for ProfileManager {
    async fn want_state(
        &self,
        working_id: Uuid,
        internal_name: &str,
        default_state: bool,
        add_if_missing: bool,
    ) -> Result<bool, HangarError> {
        let config = self.config.load();
        let mut declared = false;
        let mut wanted = false;
        for (profile_enabled, entry) in memberships(&config, working_id) {
            declared = true;
            wanted |= profile_enabled && entry.enabled;
        }

        if declared {
            return Ok(wanted);
        }

        if add_if_missing {
            debug!(plugin = internal_name, %working_id, enabled = default_state, "adding plugin to default profile");
            self.config.update(|cfg| {
                if !cfg
                    .profiles
                    .default_plugins
                    .iter()
                    .any(|p| p.working_id == working_id)
                {
                    cfg.profiles.default_plugins.push(ProfilePlugin {
                        working_id,
                        internal_name: internal_name.to_string(),
                        enabled: default_state,
                    });
                }
            });
            self.config.queue_save();
        }
        Ok(default_state)
    }

    async fn set_want_state(
        &self,
        working_id: Uuid,
        internal_name: &str,
        enabled: bool,
    ) -> Result<(), HangarError> {
        self.config.update(|cfg| {
            let entries = &mut cfg.profiles.default_plugins;
            match entries.iter_mut().find(|p| p.working_id == working_id) {
                Some(entry) => entry.enabled = enabled,
                None => entries.push(ProfilePlugin {
                    working_id,
                    internal_name: internal_name.to_string(),
                    enabled,
                }),
            }
        });
        self.config.queue_save();
        debug!(plugin = internal_name, %working_id, enabled, "default profile updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hangar_config::model::ProfileModel;

    fn manager(config: HangarConfig) -> ProfileManager {
        ProfileManager::new(ConfigHandle::in_memory(config))
    }

    #[tokio::test]
    async fn undeclared_plugin_gets_default_and_is_added() {
        let profiles = manager(HangarConfig::default());
        let id = Uuid::new_v4();

        assert!(!profiles.want_state(id, "Sample", false, false).await.unwrap());
        assert!(!profiles.is_declared(id));

        assert!(profiles.want_state(id, "Sample", true, true).await.unwrap());
        assert!(profiles.is_declared(id));
        assert!(profiles.config.is_save_queued());
        assert_eq!(profiles.profiles_containing(id), vec!["default".to_string()]);
    }

    #[tokio::test]
    async fn any_enabled_profile_wants_the_plugin() {
        let id = Uuid::new_v4();
        let mut config = HangarConfig::default();
        config.profiles.default_plugins.push(ProfilePlugin {
            working_id: id,
            internal_name: "Sample".into(),
            enabled: false,
        });
        config.profiles.named.push(ProfileModel {
            id: Uuid::new_v4(),
            name: "raid".into(),
            enabled: true,
            plugins: vec![ProfilePlugin {
                working_id: id,
                internal_name: "Sample".into(),
                enabled: true,
            }],
        });
        let profiles = manager(config);

        assert!(profiles.want_state(id, "Sample", false, false).await.unwrap());
        assert_eq!(profiles.profiles_containing(id), vec!["default", "raid"]);
    }

    #[tokio::test]
    async fn disabled_profiles_do_not_count() {
        let id = Uuid::new_v4();
        let mut config = HangarConfig::default();
        config.profiles.named.push(ProfileModel {
            id: Uuid::new_v4(),
            name: "off".into(),
            enabled: false,
            plugins: vec![ProfilePlugin {
                working_id: id,
                internal_name: "Sample".into(),
                enabled: true,
            }],
        });
        let profiles = manager(config);

        // Declared, so the default state does not apply.
        assert!(!profiles.want_state(id, "Sample", true, true).await.unwrap());
        assert!(!profiles.config.is_save_queued());
    }

    #[tokio::test]
    async fn set_want_state_flips_default_profile() {
        let profiles = manager(HangarConfig::default());
        let id = Uuid::new_v4();

        profiles.set_want_state(id, "Sample", true).await.unwrap();
        assert!(profiles.want_state(id, "Sample", false, false).await.unwrap());
        profiles.set_want_state(id, "Sample", false).await.unwrap();
        assert!(!profiles.want_state(id, "Sample", true, false).await.unwrap());
    }
}
