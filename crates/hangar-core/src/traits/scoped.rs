// SPDX-FileCopyrightText: 2026 Hangar Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use async_trait::async_trait;

use crate::error::BoxError;

/// A service whose lifetime is bound to one module's service scope.
#[async_trait]
pub trait ScopedService: Send + Sync {
    /// Human-readable name used in logs.
    fn name(&self) -> &str;

    /// Called once when the owning scope is disposed.
    async fn dispose(&self) -> Result<(), BoxError>;
}
