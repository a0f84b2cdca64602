//! Old/Result rewriting for postconditions.
//!
//! Two independent passes, both pure functions over [`Expr`]:
//!
//! - [`extract_old_and_result`] turns the contract helper calls
//!   `Result<T>()`, `OldValue<T>(e)` and `ValueAtReturn<T>(ref p)` into the
//!   placeholder nodes [`Expr::ReturnValue`], [`Expr::OldValue`] and a
//!   dereference of `p`.
//! - [`wrap_implicit_old`] wraps every remaining parameter reference in an
//!   old-value placeholder: in a postcondition a bare parameter denotes its
//!   value on entry.
//!
//! Preconditions and invariants go through neither pass.

use contractor_core::{Call, Expr, Lambda, TypeRef};

use crate::registry::{ContractMethod, ContractRegistry};

/// Replaces contract value-helper calls with placeholder nodes.
pub fn extract_old_and_result(expr: Expr, registry: &ContractRegistry) -> Expr {
    match expr {
        Expr::Call(call) => match registry.classify_call(&call) {
            Some(ContractMethod::Result) => Expr::ReturnValue(helper_type(&call)),
            Some(ContractMethod::OldValue) if call.args.len() == 1 => {
                let ty = helper_type(&call);
                let mut args = call.args;
                let inner = extract_old_and_result(args.remove(0), registry);
                Expr::old(inner, ty)
            }
            Some(ContractMethod::ValueAtReturn) if call.args.len() == 1 => {
                let mut args = call.args;
                let target = match args.remove(0) {
                    // `ref p` is passed as `&p`; `*&p` is just `p`'s location.
                    Expr::AddressOf(inner) => *inner,
                    other => other,
                };
                let rewritten = extract_old_and_result(target, registry);
                Expr::Deref(Box::new(Expr::AddressOf(Box::new(rewritten))))
            }
            _ => Expr::Call(call).map_children(&mut |e| extract_old_and_result(e, registry)),
        },
        Expr::Lambda(Lambda {
            params,
            body,
            captures_this,
        }) => {
            let body = extract_old_and_result(*body, registry);
            let needs_this = body.any(&|e| matches!(e, Expr::ReturnValue(_)));
            Expr::Lambda(Lambda {
                params,
                body: Box::new(body),
                captures_this: captures_this || needs_this,
            })
        }
        other => other.map_children(&mut |e| extract_old_and_result(e, registry)),
    }
}

/// The `T` of a generic helper call. Falls back to `object` for malformed
/// (non-generic) references.
fn helper_type(call: &Call) -> TypeRef {
    call.callee
        .method_args
        .first()
        .cloned()
        .unwrap_or(TypeRef::OBJECT)
}

/// Wraps parameter references (by value or by address) that are not already
/// inside an old-value placeholder.
///
/// Old placeholders, lambda bodies and `*&p` (a `ValueAtReturn` result,
/// which reads the post-state) are not descended into. Other dereferences
/// are wrapped inside, so `*p` becomes `*old(p)`. Assignment targets inside
/// block expressions are left alone.
pub fn wrap_implicit_old(expr: Expr) -> Expr {
    match expr {
        Expr::Param { ref ty, .. } => {
            let ty = ty.clone();
            Expr::old(expr, ty)
        }
        Expr::AddressOf(inner) if matches!(*inner, Expr::Param { .. }) => {
            let ty = match &*inner {
                Expr::Param { ty, .. } => ty.clone().by_ref(),
                _ => TypeRef::OBJECT,
            };
            Expr::old(Expr::AddressOf(inner), ty)
        }
        Expr::Deref(ref inner) if is_param_address(inner) => expr,
        Expr::OldValue { .. } | Expr::Lambda(_) | Expr::ReturnValue(_) => expr,
        other => other.map_children(&mut wrap_implicit_old),
    }
}

fn is_param_address(expr: &Expr) -> bool {
    matches!(expr, Expr::AddressOf(inner) if matches!(**inner, Expr::Param { .. }))
}

/// The full postcondition pipeline: helper extraction, then (optionally)
/// implicit old wrapping.
pub fn rewrite_postcondition(expr: Expr, registry: &ContractRegistry, implicit_old: bool) -> Expr {
    let expr = extract_old_and_result(expr, registry);
    if implicit_old {
        wrap_implicit_old(expr)
    } else {
        expr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractorConfig;
    use crate::registry::declare_contract_class;
    use contractor_core::{BinaryOp, MethodRef, Param, Unit};

    struct Helpers {
        registry: ContractRegistry,
        result: MethodRef,
        old: MethodRef,
        at_return: MethodRef,
    }

    fn helpers() -> Helpers {
        let mut unit = Unit::new("rw");
        let class = declare_contract_class(&mut unit).unwrap();
        let find = |name: &str, arity| unit.find_method(class, name, arity).unwrap().reference();
        Helpers {
            result: find("Result", 0).with_method_args([TypeRef::I32]),
            old: find("OldValue", 1).with_method_args([TypeRef::I32]),
            at_return: find("ValueAtReturn", 1).with_method_args([TypeRef::I32]),
            registry: ContractRegistry::new(&unit, &ExtractorConfig::default()),
        }
    }

    fn x() -> Expr {
        Expr::param(0, "x", TypeRef::I32)
    }

    #[test]
    fn result_and_old_become_placeholders() {
        let h = helpers();
        let cond = Expr::binary(
            BinaryOp::Gt,
            Expr::call(h.result.clone(), vec![]),
            Expr::call(h.old.clone(), vec![x()]),
        );
        let rewritten = extract_old_and_result(cond, &h.registry);
        insta::assert_snapshot!(rewritten.to_string(), @"result > old(x)");
        assert!(rewritten.any(&|e| matches!(e, Expr::ReturnValue(t) if *t == TypeRef::I32)));
    }

    #[test]
    fn value_at_return_is_a_dereference() {
        let h = helpers();
        let cond = Expr::binary(
            BinaryOp::Eq,
            Expr::call(h.at_return.clone(), vec![Expr::AddressOf(Box::new(x()))]),
            Expr::int(1),
        );
        let rewritten = rewrite_postcondition(cond, &h.registry, true);
        // The dereference reads the post-state and is not wrapped.
        insta::assert_snapshot!(rewritten.to_string(), @"*&x == 1");
    }

    #[test]
    fn lambda_using_result_captures_this() {
        let h = helpers();
        let lambda = Expr::Lambda(Lambda {
            params: vec![Param::new("i", TypeRef::I32)],
            body: Box::new(Expr::binary(
                BinaryOp::Lt,
                Expr::lambda_param(0, "i", TypeRef::I32),
                Expr::call(h.result.clone(), vec![]),
            )),
            captures_this: false,
        });
        match extract_old_and_result(lambda, &h.registry) {
            Expr::Lambda(l) => assert!(l.captures_this),
            other => panic!("expected lambda, got {}", other),
        }
    }

    #[test]
    fn implicit_old_wraps_bare_parameters_once() {
        let cond = Expr::binary(
            BinaryOp::And,
            Expr::binary(BinaryOp::Gt, Expr::ReturnValue(TypeRef::I32), x()),
            Expr::binary(BinaryOp::Ne, Expr::old(x(), TypeRef::I32), Expr::int(0)),
        );
        let wrapped = wrap_implicit_old(cond);
        insta::assert_snapshot!(wrapped.to_string(), @"result > old(x) && old(x) != 0");
        let again = wrap_implicit_old(wrapped.clone());
        assert_eq!(again, wrapped);
    }

    #[test]
    fn implicit_old_wraps_dereferenced_pointer_parameters() {
        let p = Expr::param(0, "p", TypeRef::Pointer(Box::new(TypeRef::I32)));
        let cond = Expr::binary(BinaryOp::Eq, Expr::Deref(Box::new(p)), Expr::int(5));
        let wrapped = wrap_implicit_old(cond);
        insta::assert_snapshot!(wrapped.to_string(), @"*old(p) == 5");
        assert_eq!(wrap_implicit_old(wrapped.clone()), wrapped);
    }

    #[test]
    fn implicit_old_skips_lambdas_and_handles_address_of() {
        let lambda = Expr::Lambda(Lambda {
            params: vec![],
            body: Box::new(x()),
            captures_this: false,
        });
        assert_eq!(wrap_implicit_old(lambda.clone()), lambda);

        let address = Expr::AddressOf(Box::new(x()));
        match wrap_implicit_old(address) {
            Expr::OldValue { ty, .. } => assert_eq!(ty, TypeRef::ByRef(Box::new(TypeRef::I32))),
            other => panic!("expected old value, got {}", other),
        }
    }
}
