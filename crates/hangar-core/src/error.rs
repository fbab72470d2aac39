// SPDX-FileCopyrightText: 2026 Hangar Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Hangar plugin host.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::AssemblyVersion;

/// Boxed error returned by module-authored code (constructors, disposers, scoped services).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The primary error type used across the lifecycle controller, repositories and catalog.
#[derive(Debug, Error)]
pub enum HangarError {
    /// A load was refused because the module does not meet a host requirement.
    #[error("{plugin}: precondition failed: {reason}")]
    PreconditionFailed { plugin: String, reason: Precondition },

    /// The operation is not allowed from the controller's current state.
    #[error("{plugin}: invalid operation: {message}")]
    OperationInvalid { plugin: String, message: String },

    /// Another loaded module already resolved to the same binary identity.
    #[error("{plugin}: module identity `{identity}` is already loaded")]
    DuplicateIdentity { plugin: String, identity: String },

    /// The file is not a module, or exposes no recognizable entry point.
    #[error("invalid module {}: {message}", path.display())]
    InvalidModule { path: PathBuf, message: String },

    /// The module context could not resolve the module's dependency graph.
    #[error("could not resolve dependencies of {}: {message}", path.display())]
    DependencyResolution {
        path: PathBuf,
        message: String,
        source: Option<BoxError>,
    },

    /// The module's constructor failed or panicked.
    #[error("{plugin}: instantiation failed: {source}")]
    Instantiation { plugin: String, source: BoxError },

    /// One or more teardown steps failed.
    #[error(transparent)]
    Disposal(#[from] DisposalFailures),

    /// A repository document could not be fetched or parsed.
    #[error("repository fetch failed for {url}: {message}")]
    RepositoryFetch {
        url: String,
        message: String,
        source: Option<BoxError>,
    },

    /// A manifest file could not be read, parsed or written.
    #[error("manifest error: {message}")]
    Manifest {
        message: String,
        source: Option<BoxError>,
    },

    /// Filesystem errors outside of manifest handling.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Configuration errors (invalid values, failed persistence).
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HangarError {
    /// Shorthand for an [`HangarError::OperationInvalid`].
    pub fn invalid(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::OperationInvalid {
            plugin: plugin.into(),
            message: message.into(),
        }
    }

    /// The refused precondition, if this is a [`HangarError::PreconditionFailed`].
    pub fn precondition(&self) -> Option<&Precondition> {
        match self {
            Self::PreconditionFailed { reason, .. } => Some(reason),
            _ => None,
        }
    }

    /// Whether the error is a refusal due to the ban list.
    pub fn is_banned(&self) -> bool {
        matches!(self.precondition(), Some(Precondition::Banned { .. }))
    }

    /// Whether the error reports a call from a forbidden state.
    pub fn is_operation_invalid(&self) -> bool {
        matches!(self, Self::OperationInvalid { .. })
    }
}

/// Why a load was refused before any resource was acquired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    /// The module matches an entry in the ban list.
    Banned { reason: String },
    /// The host is older than the module's minimum host version.
    HostTooOld {
        required: AssemblyVersion,
        host: AssemblyVersion,
    },
    /// The module targets a different API level than the host.
    ApiLevel { module: i32, host: i32 },
    /// Safe mode or the third-party policy forbids loading.
    Policy { reason: String },
}

impl fmt::Display for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precondition::Banned { reason } => write!(f, "banned: {reason}"),
            Precondition::HostTooOld { required, host } => {
                write!(f, "requires host {required}, running {host}")
            }
            Precondition::ApiLevel { module, host } => {
                write!(f, "built for API level {module}, host is {host}")
            }
            Precondition::Policy { reason } => write!(f, "disallowed by policy: {reason}"),
        }
    }
}

/// The teardown step a disposal failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum DisposalStep {
    Instance,
    ServiceScope,
    ScopedService,
    Interface,
    ModuleContext,
}

/// A single failed teardown step.
#[derive(Debug)]
pub struct DisposalFailure {
    pub step: DisposalStep,
    pub cause: BoxError,
}

/// Every failure collected while tearing down one module's resources.
///
/// Steps are attempted independently, so a single unload may report
/// several causes. `Display` renders all of them.
#[derive(Debug)]
pub struct DisposalFailures {
    plugin: String,
    failures: Vec<DisposalFailure>,
}

impl DisposalFailures {
    pub fn new(plugin: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            failures: Vec::new(),
        }
    }

    pub fn push(&mut self, step: DisposalStep, cause: impl Into<BoxError>) {
        self.failures.push(DisposalFailure {
            step,
            cause: cause.into(),
        });
    }

    /// Record the error of `result`, if any.
    pub fn record<E: Into<BoxError>>(&mut self, step: DisposalStep, result: Result<(), E>) {
        if let Err(e) = result {
            self.push(step, e);
        }
    }

    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DisposalFailure> {
        self.failures.iter()
    }

    pub fn steps(&self) -> Vec<DisposalStep> {
        self.failures.iter().map(|f| f.step).collect()
    }

    /// `Ok(())` when nothing failed, otherwise the whole collection.
    pub fn into_result(self) -> Result<(), Self> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for DisposalFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} disposal step(s) failed",
            self.plugin,
            self.failures.len()
        )?;
        for (i, failure) in self.failures.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{}: {}", failure.step, failure.cause)?;
        }
        Ok(())
    }
}

impl std::error::Error for DisposalFailures {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.failures
            .first()
            .map(|f| f.cause.as_ref() as &(dyn std::error::Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposal_failures_render_every_cause() {
        let mut failures = DisposalFailures::new("Sample");
        failures.push(DisposalStep::Instance, "instance exploded");
        failures.push(DisposalStep::ServiceScope, "scope exploded");

        let rendered = failures.to_string();
        assert!(rendered.contains("2 disposal step(s) failed"));
        assert!(rendered.contains("instance: instance exploded"));
        assert!(rendered.contains("service_scope: scope exploded"));
        assert_eq!(
            failures.steps(),
            vec![DisposalStep::Instance, DisposalStep::ServiceScope]
        );
    }

    #[test]
    fn empty_failures_are_ok() {
        let mut failures = DisposalFailures::new("Sample");
        failures.record::<BoxError>(DisposalStep::Interface, Ok(()));
        assert!(failures.into_result().is_ok());
    }

    #[test]
    fn precondition_helpers() {
        let err = HangarError::PreconditionFailed {
            plugin: "Sample".into(),
            reason: Precondition::Banned {
                reason: "crashes the host".into(),
            },
        };
        assert!(err.is_banned());
        assert!(!err.is_operation_invalid());
        assert_eq!(
            err.to_string(),
            "Sample: precondition failed: banned: crashes the host"
        );

        let err = HangarError::invalid("Sample", "already loaded");
        assert!(err.is_operation_invalid());
        assert!(err.precondition().is_none());
    }

    #[test]
    fn disposal_converts_into_hangar_error() {
        let mut failures = DisposalFailures::new("Sample");
        failures.push(DisposalStep::ModuleContext, "busy");
        let err: HangarError = failures.into();
        assert!(matches!(err, HangarError::Disposal(ref f) if f.len() == 1));
    }
}
