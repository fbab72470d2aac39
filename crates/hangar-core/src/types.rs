// SPDX-FileCopyrightText: 2026 Hangar Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common value types shared by the lifecycle controller, repositories and catalog.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum::{Display, EnumString};
use thiserror::Error;

/// A four-part `major.minor.build.revision` module version.
///
/// Missing trailing parts parse as zero, so `1.2` equals `1.2.0.0`.
/// Ordering is numeric, part by part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct AssemblyVersion {
    pub major: u32,
    pub minor: u32,
    pub build: u32,
    pub revision: u32,
}

impl AssemblyVersion {
    pub const fn new(major: u32, minor: u32, build: u32, revision: u32) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
        }
    }
}

/// Error returned when a version string is not `a[.b[.c[.d]]]`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid assembly version `{input}`: {reason}")]
pub struct ParseVersionError {
    pub input: String,
    pub reason: &'static str,
}

impl FromStr for AssemblyVersion {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |reason| ParseVersionError {
            input: s.to_string(),
            reason,
        };

        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(err("empty version"));
        }

        let mut parts = [0u32; 4];
        let mut count = 0;
        for piece in trimmed.split('.') {
            if count == 4 {
                return Err(err("more than four components"));
            }
            parts[count] = piece
                .parse::<u32>()
                .map_err(|_| err("components must be non-negative integers"))?;
            count += 1;
        }

        Ok(Self::new(parts[0], parts[1], parts[2], parts[3]))
    }
}

impl fmt::Display for AssemblyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

impl Serialize for AssemblyVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AssemblyVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Lifecycle state of one installed module.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
pub enum PluginState {
    #[default]
    Unloaded,
    Loading,
    Loaded,
    Unloading,
    LoadError,
    UnloadError,
    DependencyResolutionFailed,
}

impl PluginState {
    /// Error states an ordinary installed module cannot leave without a restart.
    pub fn is_error(self) -> bool {
        matches!(
            self,
            PluginState::LoadError
                | PluginState::UnloadError
                | PluginState::DependencyResolutionFailed
        )
    }

    /// States a transition is currently running through.
    pub fn is_transitional(self) -> bool {
        matches!(self, PluginState::Loading | PluginState::Unloading)
    }
}

/// Why a module is being activated; handed to the module through its host interface.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
pub enum LoadReason {
    /// Freshly installed.
    Install,
    /// Turned on by the user or a profile change.
    Enable,
    /// Replaced by a newer version.
    Update,
    /// Reloaded in place.
    Reload,
    /// Host startup.
    Boot,
}

/// How much of a module's resources an unload releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum DisposalMode {
    /// Keep the module context warm for a subsequent load.
    None,
    /// Release the module context right after the instance.
    ImmediateDispose,
    /// Release the module context after the configured grace delay.
    WaitBeforeDispose,
}

/// Health of one repository.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
pub enum RepositoryState {
    #[default]
    Idle,
    InProgress,
    Success,
    Fail,
}

/// Whether a module was installed from a repository or points at a local build.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
pub enum ModuleKind {
    Installed,
    Developer,
}

/// What changed in a module state notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ListInvalidationKind {
    Loaded,
    Unloaded,
    Installed,
    Removed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_pads_missing_parts() {
        let v: AssemblyVersion = "1.2".parse().unwrap();
        assert_eq!(v, AssemblyVersion::new(1, 2, 0, 0));
        assert_eq!(v.to_string(), "1.2.0.0");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("".parse::<AssemblyVersion>().is_err());
        assert!("1.2.3.4.5".parse::<AssemblyVersion>().is_err());
        assert!("1.-2".parse::<AssemblyVersion>().is_err());
        assert!("1..2".parse::<AssemblyVersion>().is_err());
        assert!("v1.0".parse::<AssemblyVersion>().is_err());
    }

    #[test]
    fn ordering_is_numeric() {
        let a: AssemblyVersion = "1.10.0.0".parse().unwrap();
        let b: AssemblyVersion = "1.9.9.9".parse().unwrap();
        assert!(a > b);
    }

    #[test]
    fn serde_uses_dotted_string() {
        let v = AssemblyVersion::new(2, 0, 1, 7);
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "\"2.0.1.7\"");
        let back: AssemblyVersion = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
        assert!(serde_json::from_str::<AssemblyVersion>("\"x.y\"").is_err());
    }

    #[test]
    fn error_states() {
        assert!(PluginState::LoadError.is_error());
        assert!(PluginState::DependencyResolutionFailed.is_error());
        assert!(!PluginState::Loaded.is_error());
        assert!(PluginState::Unloading.is_transitional());
        assert_eq!(PluginState::default(), PluginState::Unloaded);
    }

    #[test]
    fn load_reason_display() {
        assert_eq!(LoadReason::Boot.to_string(), "boot");
        assert_eq!("reload".parse::<LoadReason>().unwrap(), LoadReason::Reload);
    }

    proptest! {
        #[test]
        fn ordering_matches_tuple_ordering(
            a in any::<(u32, u32, u32, u32)>(),
            b in any::<(u32, u32, u32, u32)>(),
        ) {
            let va = AssemblyVersion::new(a.0, a.1, a.2, a.3);
            let vb = AssemblyVersion::new(b.0, b.1, b.2, b.3);
            prop_assert_eq!(va.cmp(&vb), a.cmp(&b));
        }

        #[test]
        fn display_parses_back(parts in any::<(u32, u32, u32, u32)>()) {
            let v = AssemblyVersion::new(parts.0, parts.1, parts.2, parts.3);
            prop_assert_eq!(v.to_string().parse::<AssemblyVersion>().unwrap(), v);
        }
    }
}
