//! Identity impersonation.
//!
//! Code under test branches on real domain types ("is this section a
//! Blog?"). Every identity question asked of a double is answered from its
//! impersonated [`TypeRef`], never from the Rust type implementing it.

use crate::double::Double;
use crate::types::TypeRef;

/// Identity surface of an object standing in for a real domain entity.
pub trait Impersonate {
    /// The real type this object answers as.
    fn reported_type(&self) -> &TypeRef;

    /// Whether the object has never been persisted, i.e. carries no
    /// identifier.
    fn is_newly_created(&self) -> bool;

    /// True if `ty` is the reported type or one of its supertypes.
    fn is_instance_of(&self, ty: &str) -> bool {
        self.reported_type().is_a(ty)
    }

    /// True only for the reported type itself.
    fn is_exactly_type(&self, ty: &str) -> bool {
        self.reported_type().name() == ty
    }

    /// Root of the reported type's ancestry.
    fn base_type(&self) -> &str {
        self.reported_type().base_type()
    }

    /// Identifier rendered for URLs, empty for new objects.
    fn to_param(&self) -> String;
}

impl Impersonate for Double {
    fn reported_type(&self) -> &TypeRef {
        self.impersonated()
    }

    fn is_newly_created(&self) -> bool {
        self.id().is_nil()
    }

    fn to_param(&self) -> String {
        self.id().to_string()
    }
}
