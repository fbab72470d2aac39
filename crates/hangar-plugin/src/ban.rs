// SPDX-FileCopyrightText: 2026 Hangar Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ban list lookups.
//!
//! An entry matches a module when its name equals the module's internal name
//! or the lowercase hex SHA-256 of it, and the entry either carries no version
//! or a version at or above the module's effective version.

use hangar_config::HangarConfig;
use hangar_config::model::BannedPlugin;
use hangar_core::AssemblyVersion;
use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of an internal name, as used by hashed ban entries.
pub fn name_hash(internal_name: &str) -> String {
    hex::encode(Sha256::digest(internal_name.as_bytes()))
}

/// The ban list in effect for one configuration snapshot.
#[derive(Debug, Clone, Default)]
pub struct BanList {
    entries: Vec<BannedPlugin>,
}

impl BanList {
    pub fn new(entries: Vec<BannedPlugin>) -> Self {
        Self { entries }
    }

    /// The configured bans, or an empty list when `policy.load_banned` is set.
    pub fn from_config(config: &HangarConfig) -> Self {
        if config.policy.load_banned {
            return Self::default();
        }
        Self::new(config.bans.clone())
    }

    /// The first entry banning `internal_name` at `version`.
    pub fn find(&self, internal_name: &str, version: AssemblyVersion) -> Option<&BannedPlugin> {
        let mut hash = None;
        self.entries.iter().find(|entry| {
            let name_matches = entry.name == internal_name
                || entry
                    .name
                    .eq_ignore_ascii_case(hash.get_or_insert_with(|| name_hash(internal_name)).as_str());
            name_matches && entry.assembly_version.is_none_or(|banned| banned >= version)
        })
    }

    pub fn is_banned(&self, internal_name: &str, version: AssemblyVersion) -> bool {
        self.find(internal_name, version).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ban(name: &str, version: Option<&str>) -> BannedPlugin {
        BannedPlugin {
            name: name.into(),
            assembly_version: version.map(|v| v.parse().unwrap()),
            reason: "test".into(),
        }
    }

    fn v(s: &str) -> AssemblyVersion {
        s.parse().unwrap()
    }

    #[test]
    fn versionless_ban_matches_everything() {
        let list = BanList::new(vec![ban("Crashy", None)]);
        assert!(list.is_banned("Crashy", v("99.0")));
        assert!(!list.is_banned("crashy", v("1.0")));
    }

    #[test]
    fn versioned_ban_stops_at_fixed_version() {
        let list = BanList::new(vec![ban("Crashy", Some("1.2"))]);
        assert!(list.is_banned("Crashy", v("1.1.9")));
        assert!(list.is_banned("Crashy", v("1.2")));
        assert!(!list.is_banned("Crashy", v("1.2.0.1")));
    }

    #[test]
    fn hashed_names_match() {
        let hash = name_hash("Secret").to_uppercase();
        let list = BanList::new(vec![ban(&hash, None)]);
        assert!(list.is_banned("Secret", v("1.0")));
        assert!(!list.is_banned("Public", v("1.0")));
    }

    #[test]
    fn load_banned_disables_the_list() {
        let mut config = HangarConfig::default();
        config.bans.push(ban("Crashy", None));
        assert!(!BanList::from_config(&config).is_empty());
        config.policy.load_banned = true;
        assert!(BanList::from_config(&config).is_empty());
    }

    proptest! {
        #[test]
        fn banned_exactly_up_to_the_ban_version(
            ban_parts in any::<(u16, u16, u16, u16)>(),
            probe_parts in any::<(u16, u16, u16, u16)>(),
        ) {
            let banned = AssemblyVersion::new(ban_parts.0.into(), ban_parts.1.into(), ban_parts.2.into(), ban_parts.3.into());
            let probe = AssemblyVersion::new(probe_parts.0.into(), probe_parts.1.into(), probe_parts.2.into(), probe_parts.3.into());
            let list = BanList::new(vec![BannedPlugin {
                name: "P".into(),
                assembly_version: Some(banned),
                reason: String::new(),
            }]);
            prop_assert_eq!(list.is_banned("P", probe), probe <= banned);
        }
    }
}
