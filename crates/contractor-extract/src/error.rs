//! Fatal, method-scoped extraction errors.
//!
//! An [`ExtractError`] aborts extraction of one method or type only; batch
//! drivers collect them per member and keep going. Recoverable conditions are
//! [`ExtractionDiagnostic`](crate::diagnostics::ExtractionDiagnostic)s instead.

use contractor_core::{CoreError, MethodId, TypeId};
use thiserror::Error;

use crate::linear::Position;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("method not found: MethodId({id})", id = id.0)]
    MethodNotFound { id: MethodId },

    #[error("type not found: TypeId({id})", id = id.0)]
    TypeNotFound { id: TypeId },

    /// A clump was requested with its start after its end.
    #[error("invalid clump range: {start} is after {end}")]
    InvalidClumpRange { start: Position, end: Position },

    /// A position does not name a statement of the linearized body.
    #[error("position {position} is outside the linearized body")]
    PositionOutOfRange { position: Position },

    /// The scanner classified a statement the builder cannot interpret.
    /// Indicates an internal invariant breach, not bad input.
    #[error("internal consistency error: {reason}")]
    MalformedClump { reason: String },

    /// The injector needs a contract method the unit does not declare.
    #[error("contract method '{name}' with {arity} argument(s) is not declared")]
    MissingContractMethod { name: String, arity: usize },
}
