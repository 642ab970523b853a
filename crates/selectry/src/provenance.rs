#![forbid(unsafe_code)]

//! Diagnostic metadata describing where a selector was declared.
//!
//! Provenance exists for tooling and error messages only. It never
//! participates in caching, equality, or evaluation.

use std::any::TypeId;
use std::fmt;

/// Owning container identity and declared name of a selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    container: TypeId,
    container_name: &'static str,
    name: String,
}

impl Provenance {
    /// Record that a selector named `name` was declared on container `C`.
    #[must_use]
    pub fn of<C: 'static>(name: impl Into<String>) -> Self {
        Self {
            container: TypeId::of::<C>(),
            container_name: std::any::type_name::<C>(),
            name: name.into(),
        }
    }

    /// Type identity of the owning container.
    #[must_use]
    pub fn container(&self) -> TypeId {
        self.container
    }

    /// Human-readable name of the owning container type.
    #[must_use]
    pub fn container_name(&self) -> &'static str {
        self.container_name
    }

    /// Declared selector name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.container_name, self.name)
    }
}
