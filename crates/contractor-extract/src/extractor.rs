//! Per-method and per-type contract extraction.
//!
//! [`ContractExtractor`] drives the pipeline for one method body:
//!
//! ```text
//! linearize -> { legacy guard | scan -> clump -> build }* -> residual
//! ```
//!
//! Each call works on its own accumulator; the extractor itself only holds
//! the session's read-only state (unit, registry, configuration, optional
//! source provider). Validator and abbreviator calls recurse into the
//! callee's extraction with an in-progress set so cyclic helper chains stop
//! with a diagnostic instead of recursing forever.

use std::collections::HashSet;

use contractor_core::{Block, Expr, MethodDef, MethodId, SourceProvider, Stmt, TypeId, Unit};
use serde::Serialize;

use crate::builder::{build_clause, fold_prelude, terminal_call, BuildContext, Clause};
use crate::config::ExtractorConfig;
use crate::contract::{Invariant, MethodContract, TypeContract};
use crate::diagnostics::{report, ExtractionDiagnostic};
use crate::error::ExtractError;
use crate::legacy::{build_legacy_precondition, match_legacy};
use crate::linear::{LinearBlocks, Position};
use crate::registry::{attrs, ContractMethod, ContractRegistry, ScanTrigger};
use crate::scanner::find_next;
use crate::specialize::{rename_params, substitute_params, Substitution};

/// Result of extracting one method.
#[derive(Debug, Clone, Serialize)]
pub struct MethodExtraction {
    pub method: MethodId,
    /// `None` when the method has no clauses and is not pure.
    pub contract: Option<MethodContract>,
    /// The body with the contract section removed. `None` for methods
    /// without a body.
    pub residual: Option<Block>,
    pub diagnostics: Vec<ExtractionDiagnostic>,
}

/// Result of extracting the invariants of one type.
#[derive(Debug, Clone, Serialize)]
pub struct TypeExtraction {
    pub ty: TypeId,
    pub contract: TypeContract,
    pub diagnostics: Vec<ExtractionDiagnostic>,
}

/// A member whose extraction failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Member {
    Method(MethodId),
    Type(TypeId),
}

#[derive(Debug)]
pub struct MemberFailure {
    pub member: Member,
    pub error: ExtractError,
}

/// Result of [`ContractExtractor::extract_unit`].
#[derive(Debug, Default)]
pub struct UnitExtraction {
    pub methods: Vec<MethodExtraction>,
    pub types: Vec<TypeExtraction>,
    pub failures: Vec<MemberFailure>,
    /// Diagnostics not tied to a single member.
    pub diagnostics: Vec<ExtractionDiagnostic>,
}

/// Contract extraction session over one unit.
pub struct ContractExtractor<'a> {
    unit: &'a Unit,
    registry: ContractRegistry,
    config: ExtractorConfig,
    sources: Option<&'a dyn SourceProvider>,
}

impl<'a> ContractExtractor<'a> {
    pub fn new(unit: &'a Unit, config: ExtractorConfig) -> Self {
        let registry = ContractRegistry::new(unit, &config);
        ContractExtractor {
            unit,
            registry,
            config,
            sources: None,
        }
    }

    /// Enables source text recovery from `sources`.
    pub fn with_sources(mut self, sources: &'a dyn SourceProvider) -> Self {
        self.sources = Some(sources);
        self
    }

    pub fn unit(&self) -> &'a Unit {
        self.unit
    }

    pub fn registry(&self) -> &ContractRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Extracts the contract and residual body of `id`.
    pub fn extract_method(&self, id: MethodId) -> Result<MethodExtraction, ExtractError> {
        let mut in_progress = HashSet::new();
        let mut diagnostics = Vec::new();
        let (contract, residual) = self.extract_with(id, &mut in_progress, &mut diagnostics)?;
        Ok(MethodExtraction {
            method: id,
            contract,
            residual,
            diagnostics,
        })
    }

    /// The method's own contract (no inheritance).
    pub fn own_contract(&self, id: MethodId) -> Result<Option<MethodContract>, ExtractError> {
        Ok(self.extract_method(id)?.contract)
    }

    fn extract_with(
        &self,
        id: MethodId,
        in_progress: &mut HashSet<MethodId>,
        diagnostics: &mut Vec<ExtractionDiagnostic>,
    ) -> Result<(Option<MethodContract>, Option<Block>), ExtractError> {
        let method = self
            .unit
            .method(id)
            .ok_or(ExtractError::MethodNotFound { id })?;
        let is_pure = self.is_pure(method);

        in_progress.insert(id);
        let extracted = match &method.body {
            Some(body) => self
                .extract_body(method, body, in_progress, diagnostics)
                .map(|(c, r)| (c, Some(r))),
            None => self
                .extract_from_contract_class(method, in_progress, diagnostics)
                .map(|c| (c, None)),
        };
        in_progress.remove(&id);
        let (mut contract, residual) = extracted?;

        contract.is_pure |= is_pure;
        let contract = (!contract.has_no_clauses() || contract.is_pure).then_some(contract);
        Ok((contract, residual))
    }

    fn is_pure(&self, method: &MethodDef) -> bool {
        method.has_attribute(attrs::PURE)
            || self
                .unit
                .type_def(method.declaring_type)
                .is_some_and(|t| t.has_attribute(attrs::PURE))
    }

    /// Bodyless interface and abstract methods take their contract from the
    /// type's contract class.
    fn extract_from_contract_class(
        &self,
        method: &MethodDef,
        in_progress: &mut HashSet<MethodId>,
        diagnostics: &mut Vec<ExtractionDiagnostic>,
    ) -> Result<MethodContract, ExtractError> {
        let Some(class) = self.registry.contract_class_of(method.declaring_type) else {
            return Ok(MethodContract::default());
        };
        let Some(carrier) = self.contract_class_method(class, method) else {
            return Ok(MethodContract::default());
        };
        let Some(body) = &carrier.body else {
            return Ok(MethodContract::default());
        };
        if in_progress.contains(&carrier.id) {
            report(
                diagnostics,
                ExtractionDiagnostic::CyclicContractDependency {
                    method: method.id,
                    callee: carrier.id,
                },
            );
            return Ok(MethodContract::default());
        }

        tracing::debug!(
            method = %self.unit.method_display_name(method.id),
            carrier = %self.unit.method_display_name(carrier.id),
            "using contract class"
        );
        in_progress.insert(carrier.id);
        let extracted = self.extract_body(carrier, body, in_progress, diagnostics);
        in_progress.remove(&carrier.id);
        let (contract, _) = extracted?;
        Ok(contract.map_exprs(&mut |e| rename_params(e, &method.params)))
    }

    /// The method of contract class `class` that carries `method`'s contract.
    fn contract_class_method(&self, class: TypeId, method: &MethodDef) -> Option<&'a MethodDef> {
        let mut candidates = self.unit.methods_of(class);
        let explicit = self
            .unit
            .methods_of(class)
            .find(|m| m.explicit_overrides.iter().any(|r| r.method == method.id));
        explicit.or_else(|| {
            candidates.find(|m| {
                m.name == method.name
                    && m.arity() == method.arity()
                    && m.params.iter().zip(&method.params).all(|(a, b)| a.ty == b.ty)
            })
        })
    }

    /// Runs the extraction state machine over one body.
    fn extract_body(
        &self,
        method: &MethodDef,
        body: &Block,
        in_progress: &mut HashSet<MethodId>,
        diagnostics: &mut Vec<ExtractionDiagnostic>,
    ) -> Result<(MethodContract, Block), ExtractError> {
        let blocks = LinearBlocks::new(body);
        blocks.validate(method.id, diagnostics);

        let ctx = BuildContext {
            method: method.id,
            registry: &self.registry,
            config: &self.config,
            sources: self.source_provider(),
        };
        let mut contract = MethodContract::default();

        let mut pos = blocks.normalize(Position::START);
        let prologue = match pos.and_then(|p| blocks.stmt(p)) {
            Some(stmt) if method.is_constructor() && is_constructor_call(self.unit, stmt) => {
                pos = pos.and_then(|p| blocks.next(p));
                Some(stmt.clone())
            }
            _ => None,
        };

        while let Some(p) = pos {
            let Some(stmt) = blocks.stmt(p) else {
                break;
            };

            if self.config.recognize_legacy_requires {
                if let Some(legacy) = match_legacy(stmt, self.unit, &self.registry) {
                    let pre = build_legacy_precondition(stmt, legacy, self.source_provider());
                    tracing::debug!(method = %method.id, condition = %pre.condition, "legacy precondition");
                    contract.locations.extend(pre.locations.iter().cloned());
                    contract.preconditions.push(pre);
                    pos = blocks.next(p);
                    continue;
                }
            }

            let Some((at, trigger)) = find_next(&blocks, &self.registry, p) else {
                break;
            };
            match trigger {
                ScanTrigger::Contract(ContractMethod::Assert | ContractMethod::Assume) => break,
                ScanTrigger::Contract(ContractMethod::EndContractBlock) => {
                    let clump = blocks.clump(p, at)?;
                    if clump.len() > 1 {
                        report(
                            diagnostics,
                            ExtractionDiagnostic::DiscardedStatements {
                                method: method.id,
                                name: ContractMethod::EndContractBlock.name().to_string(),
                                count: clump.len() - 1,
                            },
                        );
                    }
                    pos = blocks.next(at);
                    break;
                }
                ScanTrigger::Contract(ContractMethod::Invariant) => {
                    let clump = blocks.clump(p, at)?;
                    report(
                        diagnostics,
                        ExtractionDiagnostic::InvariantOutsideInvariantMethod {
                            method: method.id,
                            discarded: clump.len(),
                        },
                    );
                }
                ScanTrigger::Contract(kind) => {
                    let clump = blocks.clump(p, at)?;
                    if let Some(clause) = build_clause(&ctx, &clump, kind, diagnostics)? {
                        add_clause(&mut contract, clause);
                    }
                }
                ScanTrigger::Validator(callee) | ScanTrigger::Abbreviator(callee) => {
                    let clump = blocks.clump(p, at)?;
                    let inlined = self.inline_helper(method.id, callee, &clump, in_progress, diagnostics)?;
                    let inlined = if matches!(trigger, ScanTrigger::Validator(_)) {
                        MethodContract {
                            preconditions: inlined.preconditions,
                            ..MethodContract::default()
                        }
                    } else {
                        MethodContract {
                            is_pure: false,
                            ..inlined
                        }
                    };
                    contract.append(inlined);
                }
            }
            pos = blocks.next(at);
        }

        let mut residual = blocks.residual_from(pos);
        if let Some(stmt) = prologue {
            residual.stmts.insert(0, stmt);
        }
        Ok((contract, residual))
    }

    fn source_provider(&self) -> Option<&'a dyn SourceProvider> {
        if self.config.recover_source_text {
            self.sources
        } else {
            None
        }
    }

    /// The callee's own contract, instantiated for the call ending `clump`.
    fn inline_helper(
        &self,
        caller: MethodId,
        callee: MethodId,
        clump: &[&Stmt],
        in_progress: &mut HashSet<MethodId>,
        diagnostics: &mut Vec<ExtractionDiagnostic>,
    ) -> Result<MethodContract, ExtractError> {
        if in_progress.contains(&callee) {
            report(
                diagnostics,
                ExtractionDiagnostic::CyclicContractDependency {
                    method: caller,
                    callee,
                },
            );
            return Ok(MethodContract::default());
        }
        let (_, call) = terminal_call(clump)?;
        let (contract, _) = self.extract_with(callee, in_progress, diagnostics)?;
        let Some(contract) = contract else {
            return Ok(MethodContract::default());
        };

        let substitution = Substitution::new(&call.callee.type_args, &call.callee.method_args);
        let contract = substitution.contract(contract);
        let receiver = call.receiver.as_deref();
        let prelude = &clump[..clump.len() - 1];
        Ok(contract
            .map_exprs(&mut |e| substitute_params(e, &call.args, receiver))
            .map_conditions(&mut |e| fold_prelude(prelude, e)))
    }

    /// Extracts the invariants of `ty` from its `[ContractInvariantMethod]`
    /// methods.
    pub fn extract_type_contract(&self, ty: TypeId) -> Result<TypeExtraction, ExtractError> {
        let def = self
            .unit
            .type_def(ty)
            .ok_or(ExtractError::TypeNotFound { id: ty })?;
        let mut contract = TypeContract::default();
        let mut diagnostics = Vec::new();

        for method in self.unit.methods_of(def.id) {
            if !method.has_attribute(attrs::INVARIANT_METHOD) {
                continue;
            }
            let Some(body) = &method.body else {
                continue;
            };
            contract
                .invariants
                .extend(self.extract_invariants(method, body, &mut diagnostics)?);
        }

        Ok(TypeExtraction {
            ty,
            contract,
            diagnostics,
        })
    }

    fn extract_invariants(
        &self,
        method: &MethodDef,
        body: &Block,
        diagnostics: &mut Vec<ExtractionDiagnostic>,
    ) -> Result<Vec<Invariant>, ExtractError> {
        let blocks = LinearBlocks::new(body);
        blocks.validate(method.id, diagnostics);
        let ctx = BuildContext {
            method: method.id,
            registry: &self.registry,
            config: &self.config,
            sources: self.source_provider(),
        };

        let mut invariants = Vec::new();
        let mut pos = blocks.normalize(Position::START);
        while let Some(p) = pos {
            let Some((at, trigger)) = find_next(&blocks, &self.registry, p) else {
                break;
            };
            match trigger {
                ScanTrigger::Contract(ContractMethod::Invariant) => {
                    let clump = blocks.clump(p, at)?;
                    if let Some(Clause::Invariant(inv)) =
                        build_clause(&ctx, &clump, ContractMethod::Invariant, diagnostics)?
                    {
                        invariants.push(inv);
                    }
                }
                other => {
                    let name = match other {
                        ScanTrigger::Contract(kind) => kind.name().to_string(),
                        ScanTrigger::Validator(id) | ScanTrigger::Abbreviator(id) => {
                            self.unit.method_display_name(id)
                        }
                    };
                    report(
                        diagnostics,
                        ExtractionDiagnostic::UnexpectedCallInInvariantMethod {
                            method: method.id,
                            name,
                        },
                    );
                }
            }
            pos = blocks.next(at);
        }
        Ok(invariants)
    }

    /// Extracts every method and every type of the unit.
    ///
    /// Failures are collected per member; one bad method never stops the
    /// batch.
    pub fn extract_unit(&self) -> UnitExtraction {
        let mut out = UnitExtraction {
            diagnostics: self.registry.diagnostics().to_vec(),
            ..UnitExtraction::default()
        };

        for method in self.unit.methods() {
            if self.registry.is_contract_class(method.declaring_type) {
                continue;
            }
            match self.extract_method(method.id) {
                Ok(extraction) => out.methods.push(extraction),
                Err(error) => {
                    tracing::warn!(
                        method = %self.unit.method_display_name(method.id),
                        %error,
                        "method extraction failed"
                    );
                    out.failures.push(MemberFailure {
                        member: Member::Method(method.id),
                        error,
                    });
                }
            }
        }

        for ty in self.unit.types() {
            if self.registry.is_contract_class(ty.id) {
                continue;
            }
            match self.extract_type_contract(ty.id) {
                Ok(extraction) => out.types.push(extraction),
                Err(error) => out.failures.push(MemberFailure {
                    member: Member::Type(ty.id),
                    error,
                }),
            }
        }

        tracing::info!(
            unit = %self.unit.name,
            methods = out.methods.len(),
            with_contracts = out.methods.iter().filter(|m| m.contract.is_some()).count(),
            types_with_invariants = out.types.iter().filter(|t| !t.contract.is_empty()).count(),
            failures = out.failures.len(),
            "extracted unit"
        );
        out
    }
}

/// A `base(..)` or `this(..)` call at the head of a constructor.
pub(crate) fn is_constructor_call(unit: &Unit, stmt: &Stmt) -> bool {
    stmt.as_call().is_some_and(|call| {
        matches!(call.receiver.as_deref(), Some(Expr::This))
            && unit
                .method(call.callee.method)
                .is_some_and(MethodDef::is_constructor)
    })
}

fn add_clause(contract: &mut MethodContract, clause: Clause) {
    match clause {
        Clause::Precondition(pre) => {
            contract.locations.extend(pre.locations.iter().cloned());
            contract.preconditions.push(pre);
        }
        Clause::Postcondition(post) => {
            contract.locations.extend(post.locations.iter().cloned());
            contract.postconditions.push(post);
        }
        Clause::ThrownException(thrown) => {
            contract
                .locations
                .extend(thrown.postcondition.locations.iter().cloned());
            contract.thrown_exceptions.push(thrown);
        }
        // Method contracts never hold invariants; callers filter them out.
        Clause::Invariant(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::declare_contract_class;
    use contractor_core::{Attribute, BinaryOp, MethodRef, Param, TypeKind, TypeRef};

    struct Fixture {
        unit: Unit,
        contract: TypeId,
        app: TypeId,
    }

    impl Fixture {
        fn new() -> Self {
            let mut unit = Unit::new("x");
            let contract = declare_contract_class(&mut unit).unwrap();
            let app = unit.add_type("App", "Widget", TypeKind::Class).unwrap();
            Fixture {
                unit,
                contract,
                app,
            }
        }

        fn c(&self, name: &str, arity: usize) -> MethodRef {
            self.unit
                .methods_of(self.contract)
                .find(|m| m.name == name && m.arity() == arity && m.generic_params.is_empty())
                .unwrap()
                .reference()
        }

        fn method(&mut self, name: &str, params: Vec<Param>, body: Vec<Stmt>) -> MethodId {
            let id = self
                .unit
                .add_method(self.app, name, params, TypeRef::I32)
                .unwrap();
            self.unit.method_mut(id).unwrap().body = Some(Block::new(body));
            id
        }

        fn extract(&self, id: MethodId) -> MethodExtraction {
            ContractExtractor::new(&self.unit, ExtractorConfig::default())
                .extract_method(id)
                .unwrap()
        }
    }

    fn x() -> Expr {
        Expr::param(0, "x", TypeRef::I32)
    }

    #[test]
    fn no_contract_leaves_body_untouched() {
        let mut f = Fixture::new();
        let body = vec![Stmt::ret(Some(x()))];
        let id = f.method("Plain", vec![Param::new("x", TypeRef::I32)], body.clone());
        let out = f.extract(id);
        assert!(out.contract.is_none());
        assert_eq!(out.residual, Some(Block::new(body)));
    }

    #[test]
    fn pure_without_clauses_still_has_contract() {
        let mut f = Fixture::new();
        let id = f.method("Get", vec![], vec![Stmt::ret(Some(Expr::int(1)))]);
        f.unit
            .method_mut(id)
            .unwrap()
            .attributes
            .push(Attribute::marker(attrs::PURE));
        let out = f.extract(id);
        let contract = out.contract.unwrap();
        assert!(contract.is_pure);
        assert!(contract.has_no_clauses());
    }

    #[test]
    fn end_contract_block_stops_the_section() {
        let mut f = Fixture::new();
        let requires = Stmt::expr(Expr::call(
            f.c("Requires", 1),
            vec![Expr::binary(BinaryOp::Gt, x(), Expr::int(0))],
        ));
        let end = Stmt::expr(Expr::call(f.c("EndContractBlock", 0), vec![]));
        // A Requires after the marker is body code, not contract.
        let late = requires.clone();
        let id = f.method(
            "M",
            vec![Param::new("x", TypeRef::I32)],
            vec![requires, end, late.clone(), Stmt::ret(Some(x()))],
        );
        let out = f.extract(id);
        assert_eq!(out.contract.unwrap().preconditions.len(), 1);
        assert_eq!(out.residual.unwrap().stmts[0], late);
    }

    #[test]
    fn assert_ends_section_and_stays_in_body() {
        let mut f = Fixture::new();
        let requires = Stmt::expr(Expr::call(f.c("Requires", 1), vec![Expr::bool(true)]));
        let work = Stmt::local("t", TypeRef::I32, Some(Expr::int(2)));
        let assert = Stmt::expr(Expr::call(f.c("Assert", 1), vec![Expr::bool(true)]));
        let id = f.method(
            "M",
            vec![],
            vec![requires, work.clone(), assert.clone(), Stmt::ret(None)],
        );
        let out = f.extract(id);
        assert_eq!(out.contract.unwrap().clause_count(), 1);
        assert_eq!(
            out.residual.unwrap().stmts,
            vec![work, assert, Stmt::ret(None)]
        );
    }

    #[test]
    fn invariant_call_in_method_is_diagnosed() {
        let mut f = Fixture::new();
        let setup = Stmt::local("t", TypeRef::I32, Some(Expr::int(1)));
        let inv = Stmt::expr(Expr::call(f.c("Invariant", 1), vec![Expr::bool(true)]));
        let id = f.method("M", vec![], vec![setup, inv, Stmt::ret(None)]);
        let out = f.extract(id);
        assert!(out.contract.is_none());
        assert_eq!(
            out.diagnostics,
            vec![ExtractionDiagnostic::InvariantOutsideInvariantMethod {
                method: id,
                discarded: 2,
            }]
        );
        assert_eq!(out.residual.unwrap().stmts, vec![Stmt::ret(None)]);
    }

    #[test]
    fn constructor_prologue_is_kept_first() {
        let mut f = Fixture::new();
        let base_ctor = f.unit.add_method(f.app, ".ctor", vec![], TypeRef::VOID).unwrap();
        f.unit.method_mut(base_ctor).unwrap().flags.is_constructor = true;

        let base_call = Stmt::expr(Expr::call_on(
            Expr::This,
            MethodRef::new(base_ctor, ".ctor"),
            vec![],
        ));
        let requires = Stmt::expr(Expr::call(f.c("Requires", 1), vec![Expr::bool(true)]));
        let id = f.method(
            ".ctor",
            vec![],
            vec![base_call.clone(), requires, Stmt::ret(None)],
        );
        f.unit.method_mut(id).unwrap().flags.is_constructor = true;

        let out = f.extract(id);
        assert_eq!(out.contract.unwrap().preconditions.len(), 1);
        assert_eq!(out.residual.unwrap().stmts, vec![base_call, Stmt::ret(None)]);
    }

    #[test]
    fn missing_method_is_an_error() {
        let f = Fixture::new();
        let extractor = ContractExtractor::new(&f.unit, ExtractorConfig::default());
        assert!(matches!(
            extractor.extract_method(MethodId(4242)),
            Err(ExtractError::MethodNotFound { .. })
        ));
    }

    #[test]
    fn unit_batch_skips_contract_class() {
        let mut f = Fixture::new();
        f.method("A", vec![], vec![Stmt::ret(Some(Expr::int(0)))]);
        f.method("B", vec![], vec![Stmt::ret(Some(Expr::int(1)))]);
        let extractor = ContractExtractor::new(&f.unit, ExtractorConfig::default());
        let out = extractor.extract_unit();
        assert_eq!(out.methods.len(), 2);
        assert!(out.failures.is_empty());
        assert_eq!(out.types.len(), 1);
    }
}
