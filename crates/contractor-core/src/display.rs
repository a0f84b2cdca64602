//! C#-like rendering of expressions and statements.
//!
//! Used by diagnostics, logs and the CLI. The output is for humans: type
//! references print as `#id` and placeholders print as `result` / `old(e)`.

use std::fmt;

use crate::ast::{BinaryOp, Block, Call, Expr, Literal, MethodRef, Stmt, StmtKind, UnaryOp};

/// Precedence used for parenthesization. Atoms bind tightest.
fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Conditional { .. } | Expr::Lambda(_) => 0,
        Expr::Binary { op, .. } => op.precedence(),
        Expr::Unary { .. } | Expr::AddressOf(_) | Expr::Deref(_) => 11,
        _ => 12,
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, expr: &Expr, min: u8) -> fmt::Result {
    if precedence(expr) < min {
        write!(f, "({})", expr)
    } else {
        write!(f, "{}", expr)
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

fn write_method(f: &mut fmt::Formatter<'_>, callee: &MethodRef) -> fmt::Result {
    write!(f, "{}", callee.name)?;
    if !callee.method_args.is_empty() {
        write!(f, "<")?;
        for (i, arg) in callee.method_args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", arg)?;
        }
        write!(f, ">")?;
    }
    Ok(())
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "null"),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Int(i) => write!(f, "{}", i),
            Literal::Float(x) => write!(f, "{:?}", x),
            Literal::Char(c) => write!(f, "{:?}", c),
            Literal::String(s) => write!(f, "{:?}", s),
        }
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(receiver) = &self.receiver {
            write_operand(f, receiver, 12)?;
            write!(f, ".")?;
        }
        write_method(f, &self.callee)?;
        write!(f, "(")?;
        write_list(f, &self.args)?;
        write!(f, ")")
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(lit) => write!(f, "{}", lit),
            Expr::This => write!(f, "this"),
            Expr::Param { name, .. } | Expr::LambdaParam { name, .. } => write!(f, "{}", name),
            Expr::Local(local) => write!(f, "{}", local.name),
            Expr::Field { receiver, name, .. } => {
                if let Some(r) = receiver {
                    write_operand(f, r, 12)?;
                    write!(f, ".")?;
                }
                write!(f, "{}", name)
            }
            Expr::AddressOf(inner) => {
                write!(f, "&")?;
                write_operand(f, inner, 11)
            }
            Expr::Deref(inner) => {
                write!(f, "*")?;
                write_operand(f, inner, 11)
            }
            Expr::Unary { op, operand } => {
                let symbol = match op {
                    UnaryOp::Not => "!",
                    UnaryOp::Neg => "-",
                    UnaryOp::BitNot => "~",
                };
                write!(f, "{}", symbol)?;
                write_operand(f, operand, 11)
            }
            Expr::Binary { op, lhs, rhs } => {
                let p = op.precedence();
                write_operand(f, lhs, p)?;
                write!(f, " {} ", op.symbol())?;
                // Right operands of equal precedence need parentheses
                // (all binary operators are left-associative).
                write_operand(f, rhs, p + 1)
            }
            Expr::Conditional {
                cond,
                then_expr,
                else_expr,
            } => {
                write_operand(f, cond, BinaryOp::Or.precedence())?;
                write!(f, " ? {} : {}", then_expr, else_expr)
            }
            Expr::Call(call) => write!(f, "{}", call),
            Expr::New { ty, args, .. } => {
                write!(f, "new {}(", ty)?;
                write_list(f, args)?;
                write!(f, ")")
            }
            Expr::TypeOf(ty) => write!(f, "typeof({})", ty),
            Expr::Lambda(lambda) => {
                write!(f, "(")?;
                for (i, p) in lambda.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p.name)?;
                }
                write!(f, ") => {}", lambda.body)
            }
            Expr::Block { stmts, value } => {
                write!(f, "({{ ")?;
                for stmt in stmts {
                    write!(f, "{} ", stmt)?;
                }
                write!(f, "{} }})", value)
            }
            Expr::ReturnValue(_) => write!(f, "result"),
            Expr::OldValue { expr, .. } => write!(f, "old({})", expr),
        }
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            StmtKind::Expr(e) => write!(f, "{};", e),
            StmtKind::Local { local, init } => match init {
                Some(e) => write!(f, "{} {} = {};", local.ty, local.name, e),
                None => write!(f, "{} {};", local.ty, local.name),
            },
            StmtKind::Assign { target, value } => write!(f, "{} = {};", target, value),
            StmtKind::If {
                cond,
                then_block,
                else_block,
            } => {
                write!(f, "if ({}) {}", cond, then_block)?;
                if !else_block.is_empty() {
                    write!(f, " else {}", else_block)?;
                }
                Ok(())
            }
            StmtKind::Throw(e) => write!(f, "throw {};", e),
            StmtKind::Return(Some(e)) => write!(f, "return {};", e),
            StmtKind::Return(None) => write!(f, "return;"),
            StmtKind::Block(block) => write!(f, "{}", block),
            StmtKind::Nop => write!(f, ";"),
        }
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.stmts.is_empty() {
            return write!(f, "{{ }}");
        }
        write!(f, "{{ ")?;
        for stmt in &self.stmts {
            write!(f, "{} ", stmt)?;
        }
        write!(f, "}}")
    }
}
