//! Parameter and generic substitution over contract expressions.
//!
//! Used wherever a contract moves from one method to another: validator and
//! abbreviator inlining (callee parameters become call arguments) and
//! inheritance (ancestor parameters become the descendant's, ancestor generic
//! parameters become the descendant's instantiation).

use contractor_core::{Expr, Lambda, Local, MethodRef, Param, Stmt, StmtKind, TypeRef};

use crate::contract::{MethodContract, ThrownException};

/// Replaces `Param { index }` with `args[index]` and `this` with `receiver`.
///
/// Indices past `args` and `this` without a receiver are left in place.
/// Placeholders are traversed, so `old(p)` becomes `old(arg)`.
pub fn substitute_params(expr: Expr, args: &[Expr], receiver: Option<&Expr>) -> Expr {
    match expr {
        Expr::Param { index, name, ty } => match args.get(index as usize) {
            Some(arg) => arg.clone(),
            None => Expr::Param { index, name, ty },
        },
        Expr::This => receiver.cloned().unwrap_or(Expr::This),
        other => other.map_children(&mut |e| substitute_params(e, args, receiver)),
    }
}

/// Renames parameter references to the declarations of another method with
/// the same signature (an override or implementation).
pub fn rename_params(expr: Expr, params: &[Param]) -> Expr {
    let args: Vec<Expr> = params
        .iter()
        .enumerate()
        .map(|(i, p)| Expr::param(i as u16, p.name.clone(), p.ty.clone()))
        .collect();
    substitute_params(expr, &args, None)
}

/// A generic instantiation to apply to contract expressions.
#[derive(Debug, Clone, Copy)]
pub struct Substitution<'a> {
    pub type_args: &'a [TypeRef],
    pub method_args: &'a [TypeRef],
}

impl<'a> Substitution<'a> {
    pub fn new(type_args: &'a [TypeRef], method_args: &'a [TypeRef]) -> Self {
        Substitution {
            type_args,
            method_args,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.type_args.is_empty() && self.method_args.is_empty()
    }

    pub fn ty(&self, ty: &TypeRef) -> TypeRef {
        ty.specialize(self.type_args, self.method_args)
    }

    fn method(&self, m: MethodRef) -> MethodRef {
        MethodRef {
            type_args: m.type_args.iter().map(|t| self.ty(t)).collect(),
            method_args: m.method_args.iter().map(|t| self.ty(t)).collect(),
            ..m
        }
    }

    fn stmt(&self, stmt: Stmt) -> Stmt {
        let stmt = match stmt.kind {
            StmtKind::Local { local, init } => Stmt {
                kind: StmtKind::Local {
                    local: Local {
                        ty: self.ty(&local.ty),
                        name: local.name,
                    },
                    init,
                },
                span: stmt.span,
            },
            _ => stmt,
        };
        stmt.map_exprs(&mut |e| self.expr(e))
    }

    /// Specializes every type mentioned in `expr`.
    pub fn expr(&self, expr: Expr) -> Expr {
        if self.is_identity() {
            return expr;
        }
        match expr {
            Expr::Param { index, name, ty } => Expr::Param {
                index,
                name,
                ty: self.ty(&ty),
            },
            Expr::LambdaParam { index, name, ty } => Expr::LambdaParam {
                index,
                name,
                ty: self.ty(&ty),
            },
            Expr::Local(local) => Expr::Local(Local {
                ty: self.ty(&local.ty),
                name: local.name,
            }),
            Expr::TypeOf(ty) => Expr::TypeOf(self.ty(&ty)),
            Expr::ReturnValue(ty) => Expr::ReturnValue(self.ty(&ty)),
            Expr::OldValue { expr, ty } => Expr::OldValue {
                expr: Box::new(self.expr(*expr)),
                ty: self.ty(&ty),
            },
            Expr::New { ty, ctor, args } => Expr::New {
                ty: self.ty(&ty),
                ctor: self.method(ctor),
                args: args.into_iter().map(|a| self.expr(a)).collect(),
            },
            Expr::Call(mut call) => {
                call.callee = self.method(call.callee);
                Expr::Call(call).map_children(&mut |e| self.expr(e))
            }
            Expr::Lambda(Lambda {
                params,
                body,
                captures_this,
            }) => Expr::Lambda(Lambda {
                params: params
                    .into_iter()
                    .map(|p| Param::new(p.name, self.ty(&p.ty)))
                    .collect(),
                body: Box::new(self.expr(*body)),
                captures_this,
            }),
            Expr::Block { stmts, value } => Expr::Block {
                stmts: stmts.into_iter().map(|s| self.stmt(s)).collect(),
                value: Box::new(self.expr(*value)),
            },
            other => other.map_children(&mut |e| self.expr(e)),
        }
    }

    /// Specializes every clause of `contract`, exception types included.
    pub fn contract(&self, contract: MethodContract) -> MethodContract {
        if self.is_identity() {
            return contract;
        }
        let mut contract = contract.map_exprs(&mut |e| self.expr(e));
        contract.thrown_exceptions = contract
            .thrown_exceptions
            .into_iter()
            .map(|t| ThrownException {
                exception_type: self.ty(&t.exception_type),
                postcondition: t.postcondition,
            })
            .collect();
        contract
    }
}
