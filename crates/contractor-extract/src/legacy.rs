//! Legacy `if (guard) throw` preconditions.
//!
//! Before contract calls existed, argument checks were written as
//!
//! ```text
//! if (guard) { [local = ..;]* throw e; }
//! if (guard) { [local = ..;]* VoidHelper(..); }
//! ```
//!
//! with an empty else branch. At the head of a method such a statement is a
//! precondition `!guard` that is checked in every build configuration.

use contractor_core::{Block, Expr, SourceProvider, Stmt, StmtKind, Unit};

use crate::contract::Precondition;
use crate::negate::negate_source_text;
use crate::registry::ContractRegistry;
use crate::source_text::recover_guard_text;

/// The parts of a recognized legacy guard.
#[derive(Debug, Clone, Copy)]
pub struct LegacyGuard<'a> {
    pub guard: &'a Expr,
    /// Local assignments ahead of the failure statement.
    pub prelude: &'a [Stmt],
    /// What runs on failure: the thrown expression or the helper call.
    pub failure: &'a Expr,
}

/// Matches `stmt` against the legacy pattern.
pub fn match_legacy<'a>(
    stmt: &'a Stmt,
    unit: &Unit,
    registry: &ContractRegistry,
) -> Option<LegacyGuard<'a>> {
    let StmtKind::If {
        cond,
        then_block,
        else_block,
    } = &stmt.kind
    else {
        return None;
    };
    if !else_block.is_empty() {
        return None;
    }
    let (last, prelude) = then_block.stmts.split_last()?;
    if !prelude.iter().all(is_local_assignment) {
        return None;
    }

    let failure = match &last.kind {
        StmtKind::Throw(e) => e,
        StmtKind::Expr(e @ Expr::Call(call)) if call.receiver.is_none() => {
            // Contract calls inside the branch are not legacy failures.
            if registry.classify_call(call).is_some() {
                return None;
            }
            let returns_void = unit
                .method(call.callee.method)
                .map(|m| m.return_type.is_void())
                .unwrap_or(false);
            if !returns_void {
                return None;
            }
            e
        }
        _ => return None,
    };

    Some(LegacyGuard {
        guard: cond,
        prelude,
        failure,
    })
}

pub fn is_legacy_pattern(stmt: &Stmt, unit: &Unit, registry: &ContractRegistry) -> bool {
    match_legacy(stmt, unit, registry).is_some()
}

fn is_local_assignment(stmt: &Stmt) -> bool {
    match &stmt.kind {
        StmtKind::Local { .. } => true,
        StmtKind::Assign { target, .. } => matches!(target, Expr::Local(_)),
        _ => false,
    }
}

/// Builds the always-checked precondition for a recognized guard.
///
/// The condition is the structural negation of the guard. When source text
/// is available the guard text is negated heuristically for display.
pub fn build_legacy_precondition(
    stmt: &Stmt,
    legacy: LegacyGuard<'_>,
    sources: Option<&dyn SourceProvider>,
) -> Precondition {
    let failure = if legacy.prelude.is_empty() {
        legacy.failure.clone()
    } else {
        Expr::Block {
            stmts: legacy.prelude.to_vec(),
            value: Box::new(legacy.failure.clone()),
        }
    };

    let original_source = match (sources, &stmt.span) {
        (Some(provider), Some(span)) => {
            recover_guard_text(provider, span).map(|text| negate_source_text(&text))
        }
        _ => None,
    };

    Precondition {
        condition: legacy.guard.clone().negate(),
        description: None,
        original_source,
        locations: stmt.span.iter().cloned().collect(),
        always_checked_at_runtime: true,
        exception_to_throw: Some(failure),
    }
}

/// Rebuilds the `if (!condition) { failure }` statement for a legacy
/// precondition. Inverse of [`build_legacy_precondition`].
pub fn legacy_statement(condition: &Expr, failure: &Expr, unit: &Unit) -> Stmt {
    let mut stmts = Vec::new();
    let last = match failure {
        Expr::Block { stmts: prelude, value } => {
            stmts.extend(prelude.iter().cloned());
            value.as_ref()
        }
        other => other,
    };
    let is_void_call = last
        .as_call()
        .and_then(|c| unit.method(c.callee.method))
        .map(|m| m.return_type.is_void())
        .unwrap_or(false);
    stmts.push(if is_void_call {
        Stmt::expr(last.clone())
    } else {
        Stmt::throw(last.clone())
    });
    Stmt::if_then(condition.clone().negate(), Block::new(stmts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractorConfig;
    use crate::registry::declare_contract_class;
    use contractor_core::{BinaryOp, MethodId, MethodRef, Param, SourceMap, SourceSpan, TypeId, TypeKind, TypeRef};

    struct Fixture {
        unit: Unit,
        registry: ContractRegistry,
        exception: TypeId,
        fail: MethodId,
        make: MethodId,
    }

    fn fixture() -> Fixture {
        let mut unit = Unit::new("legacy");
        declare_contract_class(&mut unit).unwrap();
        let exception = unit.add_type("System", "ArgumentException", TypeKind::Class).unwrap();
        let helpers = unit.add_type("App", "Throw", TypeKind::Class).unwrap();
        let fail = unit
            .add_method(helpers, "Fail", vec![Param::new("name", TypeRef::STRING)], TypeRef::VOID)
            .unwrap();
        let make = unit
            .add_method(helpers, "Make", vec![], TypeRef::Named(exception))
            .unwrap();
        let registry = ContractRegistry::new(&unit, &ExtractorConfig::default());
        Fixture {
            unit,
            registry,
            exception,
            fail,
            make,
        }
    }

    fn x_positive() -> Expr {
        Expr::binary(BinaryOp::Gt, Expr::param(0, "x", TypeRef::I32), Expr::int(0))
    }

    fn new_exception(f: &Fixture) -> Expr {
        Expr::New {
            ty: TypeRef::Named(f.exception),
            ctor: MethodRef::new(MethodId(99), ".ctor"),
            args: vec![],
        }
    }

    #[test]
    fn throw_guard_becomes_always_checked_precondition() {
        let f = fixture();
        let stmt = Stmt::if_then(
            x_positive().negate(),
            Block::new(vec![Stmt::throw(new_exception(&f))]),
        )
        .with_span(SourceSpan::new("a.cs", 1, 1, 1, 46));
        let mut sources = SourceMap::new();
        sources.add_document("a.cs", "if (!(x > 0)) throw new ArgumentException();");

        let legacy = match_legacy(&stmt, &f.unit, &f.registry).unwrap();
        let pre = build_legacy_precondition(&stmt, legacy, Some(&sources));
        assert!(pre.always_checked_at_runtime);
        assert_eq!(pre.condition, x_positive());
        assert_eq!(pre.exception_to_throw, Some(new_exception(&f)));
        assert_eq!(pre.original_source.as_deref(), Some("x > 0"));
        assert_eq!(pre.locations.len(), 1);
    }

    #[test]
    fn void_helper_call_with_local_prelude() {
        let f = fixture();
        let fail = Expr::call(
            MethodRef::new(f.fail, "Fail"),
            vec![Expr::local("name", TypeRef::STRING)],
        );
        let stmt = Stmt::if_then(
            Expr::binary(BinaryOp::Eq, Expr::param(0, "s", TypeRef::STRING), Expr::null()),
            Block::new(vec![
                Stmt::local("name", TypeRef::STRING, Some(Expr::string("s"))),
                Stmt::expr(fail.clone()),
            ]),
        );
        let legacy = match_legacy(&stmt, &f.unit, &f.registry).unwrap();
        assert_eq!(legacy.prelude.len(), 1);
        let pre = build_legacy_precondition(&stmt, legacy, None);
        assert!(matches!(pre.exception_to_throw, Some(Expr::Block { .. })));
        assert_eq!(pre.original_source, None);

        // Inverse reproduces the statement shape.
        let rebuilt = legacy_statement(&pre.condition, pre.exception_to_throw.as_ref().unwrap(), &f.unit);
        assert_eq!(rebuilt.kind, stmt.kind);
    }

    #[test]
    fn rejects_non_matching_shapes() {
        let f = fixture();
        let throw = || Block::new(vec![Stmt::throw(new_exception(&f))]);

        let with_else = Stmt::new(StmtKind::If {
            cond: x_positive(),
            then_block: throw(),
            else_block: Block::new(vec![Stmt::ret(None)]),
        });
        assert!(!is_legacy_pattern(&with_else, &f.unit, &f.registry));

        let non_void = Stmt::if_then(
            x_positive(),
            Block::new(vec![Stmt::expr(Expr::call(MethodRef::new(f.make, "Make"), vec![]))]),
        );
        assert!(!is_legacy_pattern(&non_void, &f.unit, &f.registry));

        let side_effect = Stmt::if_then(
            x_positive(),
            Block::new(vec![
                Stmt::expr(Expr::call(MethodRef::new(f.fail, "Fail"), vec![Expr::null()])),
                Stmt::throw(new_exception(&f)),
            ]),
        );
        assert!(!is_legacy_pattern(&side_effect, &f.unit, &f.registry));

        assert!(!is_legacy_pattern(&Stmt::ret(None), &f.unit, &f.registry));
    }

    #[test]
    fn thrown_call_result_is_rebuilt_as_throw() {
        let f = fixture();
        let make = Expr::call(MethodRef::new(f.make, "Make"), vec![]);
        let rebuilt = legacy_statement(&x_positive(), &make, &f.unit);
        insta::assert_snapshot!(rebuilt.to_string(), @"if (!(x > 0)) { throw Make(); }");
    }
}
