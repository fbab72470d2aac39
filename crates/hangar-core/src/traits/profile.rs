// SPDX-FileCopyrightText: 2026 Hangar Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Want-state resolution over user profiles.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::HangarError;

/// Answers whether a module should be active right now.
#[async_trait]
pub trait ProfileResolver: Send + Sync {
    /// Whether any enabled profile wants the module.
    ///
    /// A module no profile mentions resolves to `default_state`; with
    /// `add_if_missing` it is also declared in the default profile.
    async fn want_state(
        &self,
        working_id: Uuid,
        internal_name: &str,
        default_state: bool,
        add_if_missing: bool,
    ) -> Result<bool, HangarError>;

    /// Set the module's membership state in the default profile.
    async fn set_want_state(
        &self,
        working_id: Uuid,
        internal_name: &str,
        enabled: bool,
    ) -> Result<(), HangarError>;
}
