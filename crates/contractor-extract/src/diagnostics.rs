//! Non-fatal extraction diagnostics.
//!
//! [`ExtractionDiagnostic`] captures every recoverable oddity met while
//! extracting: enough context to locate the problem without re-walking the
//! body. Each diagnostic is also emitted as a `tracing` warning when recorded.

use contractor_core::{MethodId, TypeId};
use serde::{Deserialize, Serialize};

/// A recoverable problem found during extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum ExtractionDiagnostic {
    /// A nested block appears somewhere other than the final statement of
    /// its parent; statements after it are invisible to the scanner.
    #[error("method {method}: nested block at statement {index} of frame {frame} is not trailing")]
    MisplacedNestedBlock {
        method: MethodId,
        frame: usize,
        index: usize,
    },

    /// A recognized contract call had an argument count outside 1..=3.
    #[error("method {method}: call to {name} has {arity} argument(s); clause skipped")]
    UnexpectedArity {
        method: MethodId,
        name: String,
        arity: usize,
    },

    /// Extracting `callee` would re-enter an extraction already in progress.
    #[error("method {method}: cyclic contract dependency on method {callee}; treated as no contract")]
    CyclicContractDependency { method: MethodId, callee: MethodId },

    /// `Contract.Invariant` used outside an invariant method. The call and
    /// the statements feeding it (`discarded` in all) are dropped from the
    /// body.
    #[error("method {method}: Invariant call outside an invariant method ignored; {discarded} statement(s) discarded")]
    InvariantOutsideInvariantMethod { method: MethodId, discarded: usize },

    /// A method-level contract call inside an invariant method.
    #[error("invariant method {method}: unexpected call to {name} ignored")]
    UnexpectedCallInInvariantMethod { method: MethodId, name: String },

    /// Statements in the contract section that feed no clause (for example
    /// code ahead of `EndContractBlock`) were dropped.
    #[error("method {method}: {count} statement(s) before {name} do not belong to any clause")]
    DiscardedStatements {
        method: MethodId,
        name: String,
        count: usize,
    },

    /// A `[ContractClass]` attribute names a type the unit does not define.
    #[error("type {ty}: contract class {target} not found")]
    MissingContractClass { ty: TypeId, target: String },
}

/// Records a diagnostic and logs it.
pub(crate) fn report(sink: &mut Vec<ExtractionDiagnostic>, diagnostic: ExtractionDiagnostic) {
    tracing::warn!("{}", diagnostic);
    sink.push(diagnostic);
}
