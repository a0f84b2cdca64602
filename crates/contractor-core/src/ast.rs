//! Statement and expression trees for decompiled method bodies.
//!
//! Method bodies arrive from the decompiler as a [`Block`] of [`Stmt`]s in
//! normalized linear-block form: a nested block may only appear as the final
//! statement of its parent. Expressions are a single tagged sum type
//! ([`Expr`]); rewrite passes are plain functions that pattern-match the
//! cases they care about and delegate the rest to [`Expr::map_children`].
//!
//! Two expression variants exist only in extracted contracts:
//! [`Expr::ReturnValue`] and [`Expr::OldValue`] are the first-class
//! placeholders for `Contract.Result<T>()` and `Contract.OldValue<T>(e)`.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::id::{FieldId, MethodId};
use crate::source::SourceSpan;
use crate::types::TypeRef;

/// Generic argument list. Most references carry zero to two arguments.
pub type TypeArgs = SmallVec<[TypeRef; 2]>;

/// A reference to a method, possibly instantiated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodRef {
    /// The referenced definition.
    pub method: MethodId,
    /// Simple name of the method, carried for display and diagnostics.
    pub name: String,
    /// Instantiation of the declaring type's generic parameters.
    pub type_args: TypeArgs,
    /// Instantiation of the method's own generic parameters.
    pub method_args: TypeArgs,
}

impl MethodRef {
    /// A reference to a non-generic method.
    pub fn new(method: MethodId, name: impl Into<String>) -> Self {
        MethodRef {
            method,
            name: name.into(),
            type_args: SmallVec::new(),
            method_args: SmallVec::new(),
        }
    }

    /// Sets the generic method instantiation.
    pub fn with_method_args(mut self, args: impl IntoIterator<Item = TypeRef>) -> Self {
        self.method_args = args.into_iter().collect();
        self
    }

    /// Sets the declaring type instantiation.
    pub fn with_type_args(mut self, args: impl IntoIterator<Item = TypeRef>) -> Self {
        self.type_args = args.into_iter().collect();
        self
    }
}

/// Constant literal values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    String(String),
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    /// Logical not (`!`).
    Not,
    /// Arithmetic negation (`-`).
    Neg,
    /// Bitwise complement (`~`).
    BitNot,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Short-circuit `&&`.
    And,
    /// Short-circuit `||`.
    Or,
    BitAnd,
    BitOr,
    Xor,
    Shl,
    Shr,
}

impl BinaryOp {
    /// Surface-syntax spelling of the operator.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::Xor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
        }
    }

    /// Binding strength, higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::BitOr => 3,
            BinaryOp::Xor => 4,
            BinaryOp::BitAnd => 5,
            BinaryOp::Eq | BinaryOp::Ne => 6,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 7,
            BinaryOp::Shl | BinaryOp::Shr => 8,
            BinaryOp::Add | BinaryOp::Sub => 9,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 10,
        }
    }
}

/// A local variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Local {
    pub name: String,
    pub ty: TypeRef,
}

/// A parameter declaration (methods and lambdas).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: TypeRef,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Param {
            name: name.into(),
            ty,
        }
    }
}

/// A method invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub callee: MethodRef,
    /// `None` for static calls.
    pub receiver: Option<Box<Expr>>,
    pub args: Vec<Expr>,
    /// `callvirt` rather than `call`.
    pub is_virtual: bool,
}

/// An anonymous delegate or lambda.
///
/// The body refers to `params` through [`Expr::LambdaParam`]; `Expr::Param`
/// inside the body always means a parameter of the enclosing method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lambda {
    pub params: Vec<Param>,
    pub body: Box<Expr>,
    /// Whether the delegate needs an implicit `this` (instance closure).
    pub captures_this: bool,
}

/// Expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal(Literal),
    This,
    /// A parameter of the enclosing method, by declaration position.
    Param { index: u16, name: String, ty: TypeRef },
    /// A parameter of the innermost enclosing lambda.
    LambdaParam { index: u16, name: String, ty: TypeRef },
    Local(Local),
    Field {
        receiver: Option<Box<Expr>>,
        field: FieldId,
        name: String,
    },
    AddressOf(Box<Expr>),
    Deref(Box<Expr>),
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Conditional {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    Call(Call),
    New {
        ty: TypeRef,
        ctor: MethodRef,
        args: Vec<Expr>,
    },
    TypeOf(TypeRef),
    Lambda(Lambda),
    /// Runs `stmts` for their side effects, then yields `value`.
    Block { stmts: Vec<Stmt>, value: Box<Expr> },
    /// The method's return value in a postcondition.
    ReturnValue(TypeRef),
    /// The value of `expr` on method entry.
    OldValue { expr: Box<Expr>, ty: TypeRef },
}

impl Expr {
    pub fn int(value: i64) -> Expr {
        Expr::Literal(Literal::Int(value))
    }

    pub fn bool(value: bool) -> Expr {
        Expr::Literal(Literal::Bool(value))
    }

    pub fn null() -> Expr {
        Expr::Literal(Literal::Null)
    }

    pub fn string(value: impl Into<String>) -> Expr {
        Expr::Literal(Literal::String(value.into()))
    }

    pub fn param(index: u16, name: impl Into<String>, ty: TypeRef) -> Expr {
        Expr::Param {
            index,
            name: name.into(),
            ty,
        }
    }

    pub fn lambda_param(index: u16, name: impl Into<String>, ty: TypeRef) -> Expr {
        Expr::LambdaParam {
            index,
            name: name.into(),
            ty,
        }
    }

    pub fn local(name: impl Into<String>, ty: TypeRef) -> Expr {
        Expr::Local(Local {
            name: name.into(),
            ty,
        })
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Expr {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    /// Structural logical negation.
    ///
    /// Cancels an existing `!` instead of stacking a second one.
    pub fn negate(self) -> Expr {
        match self {
            Expr::Unary {
                op: UnaryOp::Not,
                operand,
            } => *operand,
            Expr::Literal(Literal::Bool(b)) => Expr::bool(!b),
            other => Expr::unary(UnaryOp::Not, other),
        }
    }

    /// A static call.
    pub fn call(callee: MethodRef, args: Vec<Expr>) -> Expr {
        Expr::Call(Call {
            callee,
            receiver: None,
            args,
            is_virtual: false,
        })
    }

    /// An instance call on `receiver`.
    pub fn call_on(receiver: Expr, callee: MethodRef, args: Vec<Expr>) -> Expr {
        Expr::Call(Call {
            callee,
            receiver: Some(Box::new(receiver)),
            args,
            is_virtual: true,
        })
    }

    pub fn field(receiver: Option<Expr>, field: FieldId, name: impl Into<String>) -> Expr {
        Expr::Field {
            receiver: receiver.map(Box::new),
            field,
            name: name.into(),
        }
    }

    pub fn old(expr: Expr, ty: TypeRef) -> Expr {
        Expr::OldValue {
            expr: Box::new(expr),
            ty,
        }
    }

    /// Returns the call if this expression is one.
    pub fn as_call(&self) -> Option<&Call> {
        match self {
            Expr::Call(call) => Some(call),
            _ => None,
        }
    }

    /// Rebuilds this expression with `f` applied to every direct child
    /// expression, including expressions inside nested statements.
    ///
    /// `f` is not applied to `self`. Callers recurse by calling their own
    /// pass from inside `f`.
    pub fn map_children<F>(self, f: &mut F) -> Expr
    where
        F: FnMut(Expr) -> Expr,
    {
        fn boxed<F: FnMut(Expr) -> Expr>(e: Box<Expr>, f: &mut F) -> Box<Expr> {
            Box::new(f(*e))
        }

        match self {
            Expr::Literal(_)
            | Expr::This
            | Expr::Param { .. }
            | Expr::LambdaParam { .. }
            | Expr::Local(_)
            | Expr::TypeOf(_)
            | Expr::ReturnValue(_) => self,
            Expr::Field {
                receiver,
                field,
                name,
            } => Expr::Field {
                receiver: receiver.map(|r| boxed(r, f)),
                field,
                name,
            },
            Expr::AddressOf(inner) => Expr::AddressOf(boxed(inner, f)),
            Expr::Deref(inner) => Expr::Deref(boxed(inner, f)),
            Expr::Unary { op, operand } => Expr::Unary {
                op,
                operand: boxed(operand, f),
            },
            Expr::Binary { op, lhs, rhs } => {
                let lhs = boxed(lhs, f);
                let rhs = boxed(rhs, f);
                Expr::Binary { op, lhs, rhs }
            }
            Expr::Conditional {
                cond,
                then_expr,
                else_expr,
            } => {
                let cond = boxed(cond, f);
                let then_expr = boxed(then_expr, f);
                let else_expr = boxed(else_expr, f);
                Expr::Conditional {
                    cond,
                    then_expr,
                    else_expr,
                }
            }
            Expr::Call(Call {
                callee,
                receiver,
                args,
                is_virtual,
            }) => {
                let receiver = receiver.map(|r| boxed(r, f));
                let args = args.into_iter().map(|a| f(a)).collect();
                Expr::Call(Call {
                    callee,
                    receiver,
                    args,
                    is_virtual,
                })
            }
            Expr::New { ty, ctor, args } => Expr::New {
                ty,
                ctor,
                args: args.into_iter().map(|a| f(a)).collect(),
            },
            Expr::Lambda(Lambda {
                params,
                body,
                captures_this,
            }) => Expr::Lambda(Lambda {
                params,
                body: boxed(body, f),
                captures_this,
            }),
            Expr::Block { stmts, value } => {
                let stmts = stmts.into_iter().map(|s| s.map_exprs(f)).collect();
                let value = boxed(value, f);
                Expr::Block { stmts, value }
            }
            Expr::OldValue { expr, ty } => Expr::OldValue {
                expr: boxed(expr, f),
                ty,
            },
        }
    }

    /// Calls `f` on every direct child expression (read-only counterpart of
    /// [`map_children`](Self::map_children)).
    pub fn for_each_child<F>(&self, f: &mut F)
    where
        F: FnMut(&Expr),
    {
        match self {
            Expr::Literal(_)
            | Expr::This
            | Expr::Param { .. }
            | Expr::LambdaParam { .. }
            | Expr::Local(_)
            | Expr::TypeOf(_)
            | Expr::ReturnValue(_) => {}
            Expr::Field { receiver, .. } => {
                if let Some(r) = receiver {
                    f(r);
                }
            }
            Expr::AddressOf(inner) | Expr::Deref(inner) => f(inner),
            Expr::Unary { operand, .. } => f(operand),
            Expr::Binary { lhs, rhs, .. } => {
                f(lhs);
                f(rhs);
            }
            Expr::Conditional {
                cond,
                then_expr,
                else_expr,
            } => {
                f(cond);
                f(then_expr);
                f(else_expr);
            }
            Expr::Call(call) => {
                if let Some(r) = &call.receiver {
                    f(r);
                }
                call.args.iter().for_each(|a| f(a));
            }
            Expr::New { args, .. } => args.iter().for_each(|a| f(a)),
            Expr::Lambda(lambda) => f(&lambda.body),
            Expr::Block { stmts, value } => {
                for stmt in stmts {
                    stmt.for_each_expr(f);
                }
                f(value);
            }
            Expr::OldValue { expr, .. } => f(expr),
        }
    }

    /// Returns `true` if `pred` holds for this expression or any descendant.
    pub fn any(&self, pred: &dyn Fn(&Expr) -> bool) -> bool {
        if pred(self) {
            return true;
        }
        let mut found = false;
        self.for_each_child(&mut |child| {
            if !found && child.any(pred) {
                found = true;
            }
        });
        found
    }
}

/// Statement kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    /// An expression evaluated for its side effects.
    Expr(Expr),
    /// Local declaration with optional initializer.
    Local { local: Local, init: Option<Expr> },
    /// Assignment to a local, field, parameter or dereferenced address.
    Assign { target: Expr, value: Expr },
    If {
        cond: Expr,
        then_block: Block,
        else_block: Block,
    },
    Throw(Expr),
    Return(Option<Expr>),
    Block(Block),
    Nop,
}

/// A statement with its optional debug location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Option<SourceSpan>,
}

impl Stmt {
    pub fn new(kind: StmtKind) -> Self {
        Stmt { kind, span: None }
    }

    pub fn expr(expr: Expr) -> Self {
        Stmt::new(StmtKind::Expr(expr))
    }

    pub fn local(name: impl Into<String>, ty: TypeRef, init: Option<Expr>) -> Self {
        Stmt::new(StmtKind::Local {
            local: Local {
                name: name.into(),
                ty,
            },
            init,
        })
    }

    pub fn assign(target: Expr, value: Expr) -> Self {
        Stmt::new(StmtKind::Assign { target, value })
    }

    /// `if (cond) { then }` with an empty else branch.
    pub fn if_then(cond: Expr, then_block: Block) -> Self {
        Stmt::new(StmtKind::If {
            cond,
            then_block,
            else_block: Block::default(),
        })
    }

    pub fn throw(expr: Expr) -> Self {
        Stmt::new(StmtKind::Throw(expr))
    }

    pub fn ret(value: Option<Expr>) -> Self {
        Stmt::new(StmtKind::Return(value))
    }

    pub fn block(block: Block) -> Self {
        Stmt::new(StmtKind::Block(block))
    }

    /// Attaches a debug location.
    pub fn with_span(mut self, span: SourceSpan) -> Self {
        self.span = Some(span);
        self
    }

    /// The nested block, if this statement is one.
    pub fn as_block(&self) -> Option<&Block> {
        match &self.kind {
            StmtKind::Block(block) => Some(block),
            _ => None,
        }
    }

    /// The call wrapped by an expression statement, if any.
    pub fn as_call(&self) -> Option<&Call> {
        match &self.kind {
            StmtKind::Expr(expr) => expr.as_call(),
            _ => None,
        }
    }

    /// Rebuilds the statement with `f` applied to each top-level expression
    /// it contains; nested blocks are traversed.
    pub fn map_exprs<F>(self, f: &mut F) -> Stmt
    where
        F: FnMut(Expr) -> Expr,
    {
        let kind = match self.kind {
            StmtKind::Expr(e) => StmtKind::Expr(f(e)),
            StmtKind::Local { local, init } => StmtKind::Local {
                local,
                init: init.map(|e| f(e)),
            },
            StmtKind::Assign { target, value } => StmtKind::Assign {
                target,
                value: f(value),
            },
            StmtKind::If {
                cond,
                then_block,
                else_block,
            } => StmtKind::If {
                cond: f(cond),
                then_block: then_block.map_exprs(f),
                else_block: else_block.map_exprs(f),
            },
            StmtKind::Throw(e) => StmtKind::Throw(f(e)),
            StmtKind::Return(e) => StmtKind::Return(e.map(|e| f(e))),
            StmtKind::Block(block) => StmtKind::Block(block.map_exprs(f)),
            StmtKind::Nop => StmtKind::Nop,
        };
        Stmt {
            kind,
            span: self.span,
        }
    }

    /// Read-only counterpart of [`map_exprs`](Self::map_exprs).
    ///
    /// Assignment targets are visited too.
    pub fn for_each_expr<F>(&self, f: &mut F)
    where
        F: FnMut(&Expr),
    {
        match &self.kind {
            StmtKind::Expr(e) | StmtKind::Throw(e) => f(e),
            StmtKind::Local { init, .. } => {
                if let Some(e) = init {
                    f(e);
                }
            }
            StmtKind::Assign { target, value } => {
                f(target);
                f(value);
            }
            StmtKind::If {
                cond,
                then_block,
                else_block,
            } => {
                f(cond);
                then_block.stmts.iter().for_each(|s| s.for_each_expr(f));
                else_block.stmts.iter().for_each(|s| s.for_each_expr(f));
            }
            StmtKind::Return(e) => {
                if let Some(e) = e {
                    f(e);
                }
            }
            StmtKind::Block(block) => block.stmts.iter().for_each(|s| s.for_each_expr(f)),
            StmtKind::Nop => {}
        }
    }
}

/// An ordered statement list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

impl Block {
    pub fn new(stmts: Vec<Stmt>) -> Self {
        Block { stmts }
    }

    pub fn is_empty(&self) -> bool {
        self.stmts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stmts.len()
    }

    /// The last statement if it is a nested block.
    pub fn trailing_block(&self) -> Option<&Block> {
        self.stmts.last().and_then(Stmt::as_block)
    }

    pub fn map_exprs<F>(self, f: &mut F) -> Block
    where
        F: FnMut(Expr) -> Expr,
    {
        Block {
            stmts: self.stmts.into_iter().map(|s| s.map_exprs(f)).collect(),
        }
    }
}
