//! Core error types for contractor-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering
//! the failure modes of the metadata object model.

use crate::id::{FieldId, MethodId, TypeId};
use thiserror::Error;

/// Core errors produced by the contractor-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Attempting to register a type whose full name already exists in the unit.
    #[error("duplicate type name: '{name}'")]
    DuplicateTypeName { name: String },

    /// A TypeId was not found in the unit.
    #[error("type not found: TypeId({id})", id = id.0)]
    TypeNotFound { id: TypeId },

    /// A MethodId was not found in the unit.
    #[error("method not found: MethodId({id})", id = id.0)]
    MethodNotFound { id: MethodId },

    /// A FieldId was not found in the unit.
    #[error("field not found: FieldId({id})", id = id.0)]
    FieldNotFound { id: FieldId },

    /// The base-type/interface graph contains a cycle.
    #[error("cyclic inheritance involving type '{name}'")]
    CyclicInheritance { name: String },
}
