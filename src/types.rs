//! Ancestry table of the real domain types that doubles impersonate.
//!
//! The real types are external to this crate. Only their names, their
//! single-inheritance parent and the name of their identifier attribute are
//! recorded here. Types that were never declared behave as root types.

use crate::blueprint::is_identifier;
use crate::error::{StubbyError, StubbyResult};
use indexmap::IndexMap;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// Declaration of one real type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityType {
    name: String,
    parent: Option<String>,
    identifier: Option<String>,
}

impl EntityType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            identifier: None,
        }
    }

    /// Set the direct supertype.
    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Use another attribute than the configured default as identifier.
    pub fn identified_by(mut self, attribute: impl Into<String>) -> Self {
        self.identifier = Some(attribute.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }
}

#[derive(Debug, PartialEq, Eq)]
struct TypeInfo {
    name: String,
    /// Nearest supertype first.
    ancestors: SmallVec<[String; 4]>,
    identifier: String,
}

/// Resolved snapshot of a type and its ancestry, carried by every double.
///
/// Snapshots are taken when the double is built, so later declarations do
/// not change the answers of doubles that already exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef(Arc<TypeInfo>);

impl TypeRef {
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Supertypes, nearest first. Does not include the type itself.
    pub fn ancestors(&self) -> &[String] {
        &self.0.ancestors
    }

    pub fn identifier_attribute(&self) -> &str {
        &self.0.identifier
    }

    /// Root of the ancestry chain (the type itself for root types).
    pub fn base_type(&self) -> &str {
        self.0
            .ancestors
            .last()
            .map(String::as_str)
            .unwrap_or(&self.0.name)
    }

    /// True if `ty` is this type or one of its supertypes.
    pub fn is_a(&self, ty: &str) -> bool {
        self.0.name == ty || self.0.ancestors.iter().any(|ancestor| ancestor == ty)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

/// Name → declaration table. Kept acyclic by [`TypeHierarchy::declare`].
#[derive(Debug, Default)]
pub struct TypeHierarchy {
    types: IndexMap<String, EntityType>,
}

impl TypeHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a declaration.
    pub fn declare(&mut self, ty: EntityType) -> StubbyResult<()> {
        let invalid = |reason: String| StubbyError::InvalidType {
            name: ty.name.clone(),
            reason,
        };

        if !is_identifier(&ty.name) {
            return Err(invalid("type names must be identifiers".to_string()));
        }
        if let Some(identifier) = ty.identifier() {
            if !is_identifier(identifier) {
                return Err(invalid(format!(
                    "identifier attribute `{identifier}` is not an identifier"
                )));
            }
        }

        // The table is acyclic, so a loop introduced by this declaration
        // has to come back through its own name.
        let mut cursor = ty.parent.clone();
        while let Some(parent) = cursor {
            if parent == ty.name {
                return Err(invalid(format!(
                    "`{}` would become its own ancestor",
                    ty.name
                )));
            }
            cursor = self
                .types
                .get(&parent)
                .and_then(|declared| declared.parent.clone());
        }

        self.types.insert(ty.name.clone(), ty);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&EntityType> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Supertypes of `name`, nearest first.
    pub fn ancestors(&self, name: &str) -> SmallVec<[String; 4]> {
        let mut ancestors = SmallVec::new();
        let mut cursor = self.types.get(name).and_then(|ty| ty.parent.as_deref());
        while let Some(parent) = cursor {
            ancestors.push(parent.to_string());
            cursor = self.types.get(parent).and_then(|ty| ty.parent.as_deref());
        }
        ancestors
    }

    /// Snapshot `name` for a double. Undeclared names resolve to root types
    /// using `default_identifier`.
    pub fn resolve(&self, name: &str, default_identifier: &str) -> TypeRef {
        let identifier = self
            .types
            .get(name)
            .and_then(|ty| ty.identifier.clone())
            .unwrap_or_else(|| default_identifier.to_string());

        TypeRef(Arc::new(TypeInfo {
            name: name.to_string(),
            ancestors: self.ancestors(name),
            identifier,
        }))
    }

    pub fn clear(&mut self) {
        self.types.clear();
    }
}
