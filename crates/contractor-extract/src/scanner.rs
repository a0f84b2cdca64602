//! Contract call scanner.
//!
//! Finds the next statement, at or after a position, whose expression is a
//! call that belongs to the contract section: a contract assertion, or a
//! validator or abbreviator call. Legacy `if (..) throw` prologues are
//! recognized separately by [`crate::legacy`].

use contractor_core::Stmt;

use crate::linear::{LinearBlocks, Position};
use crate::registry::{ContractRegistry, ScanTrigger};

/// Classifies a single statement.
pub fn classify(registry: &ContractRegistry, stmt: &Stmt) -> Option<ScanTrigger> {
    stmt.as_call().and_then(|call| registry.scan_trigger(call))
}

/// Position and classification of the first trigger at or after `start`.
pub fn find_next(
    blocks: &LinearBlocks<'_>,
    registry: &ContractRegistry,
    start: Position,
) -> Option<(Position, ScanTrigger)> {
    blocks
        .iter_from(start)
        .find_map(|(pos, stmt)| classify(registry, stmt).map(|t| (pos, t)))
}
