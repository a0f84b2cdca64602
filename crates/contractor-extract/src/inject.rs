//! Re-emission of extracted contracts as contract-call statements.
//!
//! The inverse of extraction: given a residual body and a contract, rebuild a
//! body whose contract section extracts back to the same contract and the
//! same residual. Legacy preconditions come back as `if (!c) throw ..;`,
//! everything else as calls on the contract class, with the placeholder
//! nodes turned back into `Result<T>()`, `OldValue<T>(e)` and
//! `ValueAtReturn<T>(&e)` calls.

use contractor_core::{
    Attribute, Block, Expr, MethodDef, MethodId, MethodRef, SourceSpan, Stmt, TypeId, TypeRef, Unit,
    Visibility,
};

use crate::contract::{MethodContract, Precondition, TypeContract};
use crate::error::ExtractError;
use crate::extractor::is_constructor_call;
use crate::legacy::{is_legacy_pattern, legacy_statement};
use crate::linear::{LinearBlocks, Position};
use crate::registry::{attrs, ContractMethod, ContractRegistry, ScanTrigger};
use crate::scanner::find_next;

/// Name of the synthesized invariant method.
pub const INVARIANT_METHOD_NAME: &str = "$InvariantMethod$";

/// Writes contracts back into method bodies.
pub struct ContractInjector<'a> {
    unit: &'a Unit,
    registry: &'a ContractRegistry,
}

impl<'a> ContractInjector<'a> {
    pub fn new(unit: &'a Unit, registry: &'a ContractRegistry) -> Self {
        ContractInjector { unit, registry }
    }

    /// Rebuilds the full body of `method` from its residual `body` and
    /// `contract`.
    pub fn inject(
        &self,
        method: &MethodDef,
        body: &Block,
        contract: &MethodContract,
    ) -> Result<Block, ExtractError> {
        if contract.has_no_clauses() {
            return Ok(body.clone());
        }

        let mut rest = body.stmts.as_slice();
        let mut stmts = Vec::new();
        if method.is_constructor() {
            if let Some((first, tail)) = rest.split_first() {
                if is_constructor_call(self.unit, first) {
                    stmts.push(first.clone());
                    rest = tail;
                }
            }
        }

        for pre in &contract.preconditions {
            self.emit_precondition(&mut stmts, pre)?;
        }

        if !contract.postconditions.is_empty() || !contract.thrown_exceptions.is_empty() {
            let helpers = ValueHelpers::resolve(self.unit, self.registry)?;
            for post in &contract.postconditions {
                self.emit_call(
                    &mut stmts,
                    ContractMethod::Ensures,
                    &[],
                    helpers.reinsert(post.condition.clone()),
                    post.description.as_ref(),
                    post.original_source.as_deref(),
                    post.locations.first(),
                )?;
            }
            for thrown in &contract.thrown_exceptions {
                let post = &thrown.postcondition;
                self.emit_call(
                    &mut stmts,
                    ContractMethod::EnsuresOnThrow,
                    std::slice::from_ref(&thrown.exception_type),
                    helpers.reinsert(post.condition.clone()),
                    post.description.as_ref(),
                    post.original_source.as_deref(),
                    post.locations.first(),
                )?;
            }
        }

        let residual = Block::new(rest.to_vec());
        if self.needs_terminator(&residual) {
            let end = self
                .registry
                .method_ref(self.unit, ContractMethod::EndContractBlock, 0, &[])?;
            stmts.push(Stmt::expr(Expr::call(end, vec![])));
        }
        stmts.extend(residual.stmts);
        Ok(Block::new(stmts))
    }

    fn emit_precondition(&self, out: &mut Vec<Stmt>, pre: &Precondition) -> Result<(), ExtractError> {
        match &pre.exception_to_throw {
            Some(Expr::TypeOf(exception)) => self.emit_call(
                out,
                ContractMethod::Requires,
                std::slice::from_ref(exception),
                pre.condition.clone(),
                pre.description.as_ref(),
                pre.original_source.as_deref(),
                pre.locations.first(),
            ),
            Some(failure) if pre.always_checked_at_runtime => {
                let mut stmt = legacy_statement(&pre.condition, failure, self.unit);
                if let Some(span) = pre.locations.first() {
                    stmt = stmt.with_span(span.clone());
                }
                out.push(stmt);
                Ok(())
            }
            _ => self.emit_call(
                out,
                ContractMethod::Requires,
                &[],
                pre.condition.clone(),
                pre.description.as_ref(),
                pre.original_source.as_deref(),
                pre.locations.first(),
            ),
        }
    }

    /// Emits one contract call. A block-expression condition is unfolded
    /// back into its statements followed by the call.
    #[allow(clippy::too_many_arguments)]
    fn emit_call(
        &self,
        out: &mut Vec<Stmt>,
        kind: ContractMethod,
        method_args: &[TypeRef],
        condition: Expr,
        description: Option<&Expr>,
        source: Option<&str>,
        span: Option<&SourceSpan>,
    ) -> Result<(), ExtractError> {
        let condition = match condition {
            Expr::Block { stmts, value } => {
                out.extend(stmts);
                *value
            }
            other => other,
        };

        let mut args = vec![condition];
        match (self.registry.is_reference_assembly(), source) {
            (true, Some(text)) => {
                args.push(description.cloned().unwrap_or_else(Expr::null));
                args.push(Expr::string(text));
            }
            _ => args.extend(description.cloned()),
        }

        let callee = self
            .registry
            .method_ref(self.unit, kind, args.len(), method_args)?;
        let mut stmt = Stmt::expr(Expr::call(callee, args));
        if let Some(span) = span {
            stmt = stmt.with_span(span.clone());
        }
        out.push(stmt);
        Ok(())
    }

    /// Whether `residual` would otherwise be scanned into the contract
    /// section on re-extraction.
    fn needs_terminator(&self, residual: &Block) -> bool {
        let blocks = LinearBlocks::new(residual);
        let Some(start) = blocks.normalize(Position::START) else {
            return false;
        };
        if blocks
            .stmt(start)
            .is_some_and(|s| is_legacy_pattern(s, self.unit, self.registry))
        {
            return true;
        }
        match find_next(&blocks, self.registry, start) {
            Some((_, ScanTrigger::Contract(ContractMethod::Assert | ContractMethod::Assume))) | None => {
                false
            }
            Some(_) => true,
        }
    }

    /// The statements of an invariant method body for `contract`.
    pub fn invariant_body(&self, contract: &TypeContract) -> Result<Block, ExtractError> {
        let mut stmts = Vec::new();
        for inv in &contract.invariants {
            self.emit_call(
                &mut stmts,
                ContractMethod::Invariant,
                &[],
                inv.condition.clone(),
                inv.description.as_ref(),
                inv.original_source.as_deref(),
                inv.locations.first(),
            )?;
        }
        stmts.push(Stmt::ret(None));
        Ok(Block::new(stmts))
    }
}

/// Adds a private `[ContractInvariantMethod]` holding `contract`'s
/// invariants to `ty`. Returns the new method.
pub fn inject_invariant_method(
    unit: &mut Unit,
    registry: &ContractRegistry,
    ty: TypeId,
    contract: &TypeContract,
) -> Result<MethodId, ExtractError> {
    // Build the body against the unit before it is mutated.
    let body = ContractInjector::new(unit, registry).invariant_body(contract)?;

    let id = unit.add_method(ty, INVARIANT_METHOD_NAME, vec![], TypeRef::VOID)?;
    let method = unit
        .method_mut(id)
        .ok_or(ExtractError::MethodNotFound { id })?;
    method.visibility = Visibility::Private;
    method.attributes.push(Attribute::marker(attrs::INVARIANT_METHOD));
    method.body = Some(body);

    tracing::debug!(ty = %ty, invariants = contract.invariants.len(), "injected invariant method");
    Ok(id)
}

/// Generic contract value helpers, resolved once per injection.
struct ValueHelpers {
    result: MethodRef,
    old: MethodRef,
    at_return: MethodRef,
}

impl ValueHelpers {
    fn resolve(unit: &Unit, registry: &ContractRegistry) -> Result<Self, ExtractError> {
        let any = [TypeRef::OBJECT];
        Ok(ValueHelpers {
            result: registry.method_ref(unit, ContractMethod::Result, 0, &any)?,
            old: registry.method_ref(unit, ContractMethod::OldValue, 1, &any)?,
            at_return: registry.method_ref(unit, ContractMethod::ValueAtReturn, 1, &any)?,
        })
    }

    /// Replaces placeholder nodes with helper calls.
    fn reinsert(&self, expr: Expr) -> Expr {
        match expr {
            Expr::ReturnValue(ty) => Expr::call(self.result.clone().with_method_args([ty]), vec![]),
            Expr::OldValue { expr, ty } => Expr::call(
                self.old.clone().with_method_args([ty]),
                vec![self.reinsert(*expr)],
            ),
            Expr::Deref(inner) => match *inner {
                Expr::AddressOf(target) => {
                    let ty = value_type(&target);
                    let target = self.reinsert(*target);
                    Expr::call(
                        self.at_return.clone().with_method_args([ty]),
                        vec![Expr::AddressOf(Box::new(target))],
                    )
                }
                other => Expr::Deref(Box::new(self.reinsert(other))),
            },
            other => other.map_children(&mut |e| self.reinsert(e)),
        }
    }
}

/// The `T` of `ValueAtReturn<T>(ref target)`.
fn value_type(target: &Expr) -> TypeRef {
    let ty = match target {
        Expr::Param { ty, .. } => ty,
        Expr::Local(local) => &local.ty,
        _ => return TypeRef::OBJECT,
    };
    match ty {
        TypeRef::ByRef(inner) => (**inner).clone(),
        other => other.clone(),
    }
}
