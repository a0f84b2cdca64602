//! Contract value objects produced by extraction.
//!
//! Clause lists are ordered: order is checking and documentation order and
//! is preserved by every merge. `original_source` is best-effort display text
//! and may be `None`; `condition` is always present once a clause is built.

use contractor_core::{Expr, SourceSpan, TypeRef};
use serde::{Deserialize, Serialize};

/// A condition callers must establish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Precondition {
    pub condition: Expr,
    pub description: Option<Expr>,
    pub original_source: Option<String>,
    pub locations: Vec<SourceSpan>,
    /// Set only for legacy `if (..) throw` preconditions, which execute in
    /// every build configuration.
    pub always_checked_at_runtime: bool,
    /// Exception object, `typeof(E)` for `Requires<E>`, or the validator call
    /// executed on failure.
    pub exception_to_throw: Option<Expr>,
}

impl Precondition {
    pub fn new(condition: Expr) -> Self {
        Precondition {
            condition,
            description: None,
            original_source: None,
            locations: Vec::new(),
            always_checked_at_runtime: false,
            exception_to_throw: None,
        }
    }
}

/// A condition the method establishes on normal return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Postcondition {
    pub condition: Expr,
    pub description: Option<Expr>,
    pub original_source: Option<String>,
    pub locations: Vec<SourceSpan>,
}

impl Postcondition {
    pub fn new(condition: Expr) -> Self {
        Postcondition {
            condition,
            description: None,
            original_source: None,
            locations: Vec::new(),
        }
    }
}

/// A postcondition that holds when the method throws `exception_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThrownException {
    pub exception_type: TypeRef,
    pub postcondition: Postcondition,
}

/// An object invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invariant {
    pub condition: Expr,
    pub description: Option<Expr>,
    pub original_source: Option<String>,
    pub locations: Vec<SourceSpan>,
}

impl Invariant {
    pub fn new(condition: Expr) -> Self {
        Invariant {
            condition,
            description: None,
            original_source: None,
            locations: Vec::new(),
        }
    }
}

/// The contract of a single method.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MethodContract {
    pub preconditions: Vec<Precondition>,
    pub postconditions: Vec<Postcondition>,
    pub thrown_exceptions: Vec<ThrownException>,
    pub is_pure: bool,
    pub locations: Vec<SourceSpan>,
}

impl MethodContract {
    /// Returns `true` if the contract has no clauses of any kind.
    pub fn has_no_clauses(&self) -> bool {
        self.preconditions.is_empty()
            && self.postconditions.is_empty()
            && self.thrown_exceptions.is_empty()
    }

    /// Total number of clauses.
    pub fn clause_count(&self) -> usize {
        self.preconditions.len() + self.postconditions.len() + self.thrown_exceptions.len()
    }

    /// Appends every clause of `other` after this contract's own clauses.
    ///
    /// No de-duplication: a clause restated by an override appears twice.
    /// Purity is sticky.
    pub fn append(&mut self, other: MethodContract) {
        self.preconditions.extend(other.preconditions);
        self.postconditions.extend(other.postconditions);
        self.thrown_exceptions.extend(other.thrown_exceptions);
        self.locations.extend(other.locations);
        self.is_pure |= other.is_pure;
    }

    /// Applies `f` to every clause condition, description and exception
    /// expression.
    pub fn map_exprs<F>(self, f: &mut F) -> MethodContract
    where
        F: FnMut(Expr) -> Expr,
    {
        fn map_opt<F: FnMut(Expr) -> Expr>(e: Option<Expr>, f: &mut F) -> Option<Expr> {
            e.map(f)
        }
        fn post<F: FnMut(Expr) -> Expr>(p: Postcondition, f: &mut F) -> Postcondition {
            Postcondition {
                condition: f(p.condition),
                description: map_opt(p.description, f),
                original_source: p.original_source,
                locations: p.locations,
            }
        }

        MethodContract {
            preconditions: self
                .preconditions
                .into_iter()
                .map(|p| Precondition {
                    condition: f(p.condition),
                    description: map_opt(p.description, f),
                    original_source: p.original_source,
                    locations: p.locations,
                    always_checked_at_runtime: p.always_checked_at_runtime,
                    exception_to_throw: map_opt(p.exception_to_throw, f),
                })
                .collect(),
            postconditions: self
                .postconditions
                .into_iter()
                .map(|p| post(p, f))
                .collect(),
            thrown_exceptions: self
                .thrown_exceptions
                .into_iter()
                .map(|t| ThrownException {
                    exception_type: t.exception_type,
                    postcondition: post(t.postcondition, f),
                })
                .collect(),
            is_pure: self.is_pure,
            locations: self.locations,
        }
    }

    /// Applies `f` to clause conditions only; descriptions and exception
    /// expressions are kept as they are.
    pub fn map_conditions<F>(mut self, f: &mut F) -> MethodContract
    where
        F: FnMut(Expr) -> Expr,
    {
        fn take(e: &mut Expr) -> Expr {
            std::mem::replace(e, Expr::null())
        }
        for p in &mut self.preconditions {
            p.condition = f(take(&mut p.condition));
        }
        for p in &mut self.postconditions {
            p.condition = f(take(&mut p.condition));
        }
        for t in &mut self.thrown_exceptions {
            t.postcondition.condition = f(take(&mut t.postcondition.condition));
        }
        self
    }
}

/// The invariants of a type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeContract {
    pub invariants: Vec<Invariant>,
}

impl TypeContract {
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}
