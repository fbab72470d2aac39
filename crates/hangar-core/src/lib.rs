// SPDX-FileCopyrightText: 2026 Hangar Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Hangar plugin host.
//!
//! This crate provides the error taxonomy, shared value types, the seam traits
//! the lifecycle controller is built against, and the surface a dynamic
//! module links against.

pub mod error;
pub mod module;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{
    BoxError, DisposalFailure, DisposalFailures, DisposalStep, HangarError, Precondition,
};
pub use module::{
    CORE_VERSION, DECLARATION_SYMBOL, PluginDeclaration, PluginIdentity, PluginInterface,
    ServiceContainer, ServiceScope,
};
pub use types::{
    AssemblyVersion, DisposalMode, ListInvalidationKind, LoadReason, ModuleKind,
    ParseVersionError, PluginState, RepositoryState,
};

pub use traits::{
    HostedPlugin, ModuleContext, ModuleLoader, PluginEntry, PluginFactory, PluginInit,
    ProfileResolver, ScopedService,
};
