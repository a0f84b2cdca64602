//! Builds one contract clause from a clump.
//!
//! A clump is the run of statements that ends in a contract call. Every
//! statement before the call is folded into a block expression so that
//! `var t = Compute(); Contract.Requires(t > 0);` keeps its evaluation order
//! as the single condition `({ var t = Compute(); t > 0 })`.

use contractor_core::{Call, Expr, Literal, MethodId, SourceProvider, Stmt, TypeRef};

use crate::config::ExtractorConfig;
use crate::contract::{Invariant, Postcondition, Precondition, ThrownException};
use crate::diagnostics::{report, ExtractionDiagnostic};
use crate::error::ExtractError;
use crate::registry::{ContractMethod, ContractRegistry};
use crate::rewrite::rewrite_postcondition;
use crate::source_text::recover_condition_text;

/// A clause produced by [`build_clause`].
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Precondition(Precondition),
    Postcondition(Postcondition),
    ThrownException(ThrownException),
    Invariant(Invariant),
}

/// Read-only inputs shared by every clause built for one method.
#[derive(Clone, Copy)]
pub struct BuildContext<'a> {
    pub method: MethodId,
    pub registry: &'a ContractRegistry,
    pub config: &'a ExtractorConfig,
    pub sources: Option<&'a dyn SourceProvider>,
}

/// The contract call that terminates `clump`.
pub fn terminal_call<'s>(clump: &[&'s Stmt]) -> Result<(&'s Stmt, &'s Call), ExtractError> {
    let last = clump.last().copied().ok_or_else(|| ExtractError::MalformedClump {
        reason: "empty clump".to_string(),
    })?;
    let call = last.as_call().ok_or_else(|| ExtractError::MalformedClump {
        reason: format!("clump ends in `{}`, not a call", last),
    })?;
    Ok((last, call))
}

/// Builds the clause for a clump ending in a call to `kind`.
///
/// Returns `Ok(None)` for calls that produce no clause: markers, section
/// terminators and calls with an unexpected argument count (reported as a
/// diagnostic).
pub fn build_clause(
    ctx: &BuildContext<'_>,
    clump: &[&Stmt],
    kind: ContractMethod,
    diagnostics: &mut Vec<ExtractionDiagnostic>,
) -> Result<Option<Clause>, ExtractError> {
    let (last, call) = terminal_call(clump)?;
    match kind {
        ContractMethod::Requires
        | ContractMethod::Ensures
        | ContractMethod::EnsuresOnThrow
        | ContractMethod::Invariant => {}
        _ => return Ok(None),
    }

    let arity = call.args.len();
    if !(1..=3).contains(&arity) {
        report(
            diagnostics,
            ExtractionDiagnostic::UnexpectedArity {
                method: ctx.method,
                name: kind.name().to_string(),
                arity,
            },
        );
        return Ok(None);
    }

    let prelude = &clump[..clump.len() - 1];
    let condition = fold_prelude(prelude, call.args[0].clone());
    // `null` stands in for a missing message in the three-argument form.
    let description = call
        .args
        .get(1)
        .filter(|d| !matches!(d, Expr::Literal(Literal::Null)))
        .cloned();
    let original_source = source_text(ctx, last, call);
    let locations: Vec<_> = last.span.iter().cloned().collect();
    let type_arg = call.callee.method_args.first().cloned();

    tracing::debug!(
        method = %ctx.method,
        kind = kind.name(),
        condition = %condition,
        "built contract clause"
    );

    let clause = match kind {
        ContractMethod::Requires => Clause::Precondition(Precondition {
            condition,
            description,
            original_source,
            locations,
            always_checked_at_runtime: false,
            exception_to_throw: type_arg.map(Expr::TypeOf),
        }),
        ContractMethod::Ensures => Clause::Postcondition(Postcondition {
            condition: rewrite_postcondition(
                condition,
                ctx.registry,
                ctx.config.implicit_old_parameters,
            ),
            description,
            original_source,
            locations,
        }),
        ContractMethod::EnsuresOnThrow => {
            let exception_type = type_arg.ok_or_else(|| ExtractError::MalformedClump {
                reason: "EnsuresOnThrow call without an exception type argument".to_string(),
            })?;
            Clause::ThrownException(ThrownException {
                exception_type,
                postcondition: Postcondition {
                    condition: rewrite_postcondition(
                        condition,
                        ctx.registry,
                        ctx.config.implicit_old_parameters,
                    ),
                    description,
                    original_source,
                    locations,
                },
            })
        }
        _ => Clause::Invariant(Invariant {
            condition,
            description,
            original_source,
            locations,
        }),
    };
    Ok(Some(clause))
}

/// `value` preceded by `prelude` as a block expression, or `value` alone.
pub fn fold_prelude(prelude: &[&Stmt], value: Expr) -> Expr {
    if prelude.is_empty() {
        value
    } else {
        Expr::Block {
            stmts: prelude.iter().map(|s| (*s).clone()).collect(),
            value: Box::new(value),
        }
    }
}

fn source_text(ctx: &BuildContext<'_>, stmt: &Stmt, call: &Call) -> Option<String> {
    if ctx.registry.is_reference_assembly() {
        if let Some(Expr::Literal(Literal::String(text))) = call.args.get(2) {
            return Some(text.clone());
        }
    }
    if !ctx.config.recover_source_text {
        return None;
    }
    let provider = ctx.sources?;
    recover_condition_text(provider, stmt.span.as_ref()?)
}

/// The exception type carried by `typeof(E)`, for callers that need it back.
pub fn exception_type_of(expr: &Expr) -> Option<&TypeRef> {
    match expr {
        Expr::TypeOf(ty) => Some(ty),
        _ => None,
    }
}
