//! Error handling for blueprint registration, double construction and
//! scenario execution.
//!
//! Every error is fatal to the call that raised it and is meant to surface
//! in the failing test. Nothing in the crate retries or falls back.

use thiserror::Error;

/// Result alias used across the crate.
pub type StubbyResult<T> = Result<T, StubbyError>;

/// Main error type.
#[derive(Debug, Error)]
pub enum StubbyError {
    /// No blueprint was registered under this entity name
    #[error("no blueprint registered for entity `{entity}`")]
    UnknownEntity { entity: String },

    /// No scenario was declared under this name
    #[error("no scenario declared with name `{scenario}`")]
    UnknownScenario { scenario: String },

    /// The requested named instance does not exist on the blueprint
    #[error("blueprint `{entity}` has no named instance `{preset}`")]
    UnknownPreset { entity: String, preset: String },

    /// An association without default was read before a value was supplied
    #[error("association `{association}` of `{entity}` was read before being set")]
    UnresolvedAssociation { entity: String, association: String },

    /// Neither a method override, an association nor an attribute answers
    #[error("`{entity}` double does not respond to `{method}`")]
    UnresolvedMethod { entity: String, method: String },

    /// A test read a slot that no scenario bound
    #[error("slot `{slot}` is not bound in this test context")]
    UnboundSlot { slot: String },

    /// A slot or value does not hold the expected kind of value
    #[error("expected {expected} for `{name}`, found {found}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A scenario depends on itself, directly or transitively
    #[error("cyclic scenario dependency: {}", cycle.join(" -> "))]
    CyclicScenario { cycle: Vec<String> },

    /// Association or method defaults recurse past the configured depth
    #[error(
        "default producers exceeded depth {max_depth} while building: {}",
        chain.join(" -> ")
    )]
    CyclicDefault { chain: Vec<String>, max_depth: usize },

    /// The blueprint declaration is malformed
    #[error("invalid blueprint `{entity}`: {reason}")]
    InvalidBlueprint { entity: String, reason: String },

    /// The scenario declaration is malformed
    #[error("invalid scenario `{scenario}`: {reason}")]
    InvalidScenario { scenario: String, reason: String },

    /// The type ancestry declaration is malformed
    #[error("invalid type declaration `{name}`: {reason}")]
    InvalidType { name: String, reason: String },

    /// Failure raised from user code inside a scenario body
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StubbyError {
    /// Get the error category, used to group failures in test output
    pub fn category(&self) -> &'static str {
        match self {
            StubbyError::UnknownEntity { .. }
            | StubbyError::UnknownScenario { .. }
            | StubbyError::UnknownPreset { .. } => "lookup",
            StubbyError::CyclicScenario { .. }
            | StubbyError::CyclicDefault { .. }
            | StubbyError::InvalidBlueprint { .. }
            | StubbyError::InvalidScenario { .. }
            | StubbyError::InvalidType { .. } => "configuration",
            StubbyError::UnresolvedAssociation { .. }
            | StubbyError::UnresolvedMethod { .. }
            | StubbyError::UnboundSlot { .. }
            | StubbyError::TypeMismatch { .. } => "access",
            StubbyError::Other(_) => "user",
        }
    }

    /// Check if the error stems from a bad blueprint or scenario setup
    /// rather than from the test body
    pub fn is_configuration_error(&self) -> bool {
        self.category() == "configuration"
    }

    pub(crate) fn invalid_blueprint(entity: &str, reason: impl Into<String>) -> Self {
        StubbyError::InvalidBlueprint {
            entity: entity.to_string(),
            reason: reason.into(),
        }
    }
}
