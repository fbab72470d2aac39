// SPDX-FileCopyrightText: 2026 Hangar Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The surface a module links against: its host interface, its service
//! scope, and the exported declaration the dylib loader looks for.

pub mod declaration;
pub mod interface;
pub mod scope;

pub use declaration::{CORE_VERSION, DECLARATION_SYMBOL, PluginDeclaration};
pub use interface::{PluginIdentity, PluginInterface};
pub use scope::{ServiceContainer, ServiceScope};
