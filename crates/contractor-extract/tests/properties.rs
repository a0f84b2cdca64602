//! Property tests for the structural pieces of extraction.
//!
//! - Linearizing a trailing-block chain of depth `d` yields `d + 1` frames
//!   whose contents concatenate to every non-block statement in order.
//! - Clump extraction returns exactly the statements between two positions
//!   and leaves the body untouched.
//! - Once the scanner finds nothing from a position, it finds nothing from
//!   any later position either.
//! - Implicit-old wrapping leaves every parameter leaf (through `*p` and
//!   `&p` alike) under exactly one old-value placeholder.

use contractor_core::{BinaryOp, Block, Expr, MethodRef, Stmt, TypeRef, Unit};
use contractor_extract::linear::{LinearBlocks, Position};
use contractor_extract::registry::ContractRegistry;
use contractor_extract::rewrite::wrap_implicit_old;
use contractor_extract::scanner::find_next;
use contractor_extract::{declare_contract_class, ExtractorConfig};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// Statement counts per nesting level; level `k + 1` is the trailing block
/// of level `k`.
fn levels() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0usize..4, 1..6)
}

/// Builds the nested body and the flat list of its non-block statements.
fn nested_body(levels: &[usize]) -> (Block, Vec<Stmt>) {
    let mut flat = Vec::new();
    let mut counter = 0i64;
    let mut per_level = Vec::new();
    for &count in levels {
        let stmts: Vec<Stmt> = (0..count)
            .map(|_| {
                counter += 1;
                Stmt::expr(Expr::int(counter))
            })
            .collect();
        flat.extend(stmts.iter().cloned());
        per_level.push(stmts);
    }

    let mut inner: Option<Block> = None;
    for mut stmts in per_level.into_iter().rev() {
        if let Some(block) = inner.take() {
            stmts.push(Stmt::block(block));
        }
        inner = Some(Block::new(stmts));
    }
    (inner.unwrap_or_default(), flat)
}

fn all_positions(blocks: &LinearBlocks<'_>) -> Vec<Position> {
    blocks.iter_from(Position::START).map(|(p, _)| p).collect()
}

/// A body mixing plain statements (`false`) and `Requires` calls (`true`).
fn scan_body() -> impl Strategy<Value = Vec<bool>> {
    prop::collection::vec(prop::bool::weighted(0.3), 0..12)
}

fn postcondition() -> impl Strategy<Value = Expr> {
    let leaf = prop_oneof![
        (0u16..3).prop_map(|i| Expr::param(i, format!("p{i}"), TypeRef::I32)),
        (0u16..3).prop_map(|i| Expr::old(Expr::param(i, format!("p{i}"), TypeRef::I32), TypeRef::I32)),
        (-5i64..5).prop_map(Expr::int),
        Just(Expr::ReturnValue(TypeRef::I32)),
        // *p
        (0u16..3).prop_map(|i| Expr::Deref(Box::new(Expr::param(i, format!("p{i}"), TypeRef::I32)))),
        // &p
        (0u16..3).prop_map(|i| Expr::AddressOf(Box::new(Expr::param(i, format!("p{i}"), TypeRef::I32)))),
        // *&p, the post-state read left by ValueAtReturn
        (0u16..3).prop_map(|i| {
            Expr::Deref(Box::new(Expr::AddressOf(Box::new(Expr::param(i, format!("p{i}"), TypeRef::I32)))))
        }),
    ];
    leaf.prop_recursive(4, 24, 2, |inner| {
        (
            prop::sample::select(vec![BinaryOp::Add, BinaryOp::Gt, BinaryOp::Eq, BinaryOp::And]),
            inner.clone(),
            inner,
        )
            .prop_map(|(op, lhs, rhs)| Expr::binary(op, lhs, rhs))
    })
}

/// Old-placeholder nesting depth at every parameter leaf, skipping `*&p`
/// post-state reads.
fn param_old_depths(expr: &Expr, depth: usize, out: &mut Vec<usize>) {
    match expr {
        Expr::Param { .. } => out.push(depth),
        Expr::Deref(inner) if matches!(&**inner, Expr::AddressOf(a) if matches!(**a, Expr::Param { .. })) => {}
        Expr::OldValue { expr, .. } => param_old_depths(expr, depth + 1, out),
        other => other.for_each_child(&mut |child| param_old_depths(child, depth, out)),
    }
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn linearization_frames_and_order(levels in levels()) {
        let (body, flat) = nested_body(&levels);
        let blocks = LinearBlocks::new(&body);
        prop_assert_eq!(blocks.len(), levels.len());

        let concatenated: Vec<Stmt> = (0..blocks.len())
            .flat_map(|b| blocks.content(b).iter().cloned())
            .collect();
        prop_assert_eq!(concatenated, flat);
    }

    #[test]
    fn clump_spans_exactly_the_range(levels in levels(), a in any::<prop::sample::Index>(), b in any::<prop::sample::Index>()) {
        let (body, _) = nested_body(&levels);
        let before = body.clone();
        let blocks = LinearBlocks::new(&body);
        let positions = all_positions(&blocks);
        prop_assume!(!positions.is_empty());

        let (i, j) = {
            let (i, j) = (a.index(positions.len()), b.index(positions.len()));
            (i.min(j), i.max(j))
        };
        let clump = blocks.clump(positions[i], positions[j]).unwrap();
        prop_assert_eq!(clump.len(), j - i + 1);
        for (k, stmt) in clump.iter().enumerate() {
            prop_assert_eq!(Some(*stmt), blocks.stmt(positions[i + k]));
        }
        prop_assert_eq!(&body, &before);
    }

    #[test]
    fn rescan_after_not_found_stays_not_found(calls in scan_body()) {
        let mut unit = Unit::new("scan");
        let class = declare_contract_class(&mut unit).unwrap();
        let requires: MethodRef = unit.find_method(class, "Requires", 1).unwrap().reference();
        let registry = ContractRegistry::new(&unit, &ExtractorConfig::default());

        let stmts: Vec<Stmt> = calls
            .iter()
            .map(|&is_call| {
                if is_call {
                    Stmt::expr(Expr::call(requires.clone(), vec![Expr::bool(true)]))
                } else {
                    Stmt::ret(None)
                }
            })
            .collect();
        let body = Block::new(stmts);
        let blocks = LinearBlocks::new(&body);

        for p in 0..=calls.len() {
            if find_next(&blocks, &registry, Position::new(0, p)).is_none() {
                for q in p..=calls.len() {
                    prop_assert!(find_next(&blocks, &registry, Position::new(0, q)).is_none());
                }
            }
        }
    }

    #[test]
    fn implicit_old_wraps_each_parameter_once(expr in postcondition()) {
        let wrapped = wrap_implicit_old(expr);
        let mut depths = Vec::new();
        param_old_depths(&wrapped, 0, &mut depths);
        prop_assert!(depths.iter().all(|&d| d == 1), "depths {:?} in {}", depths, wrapped);

        // Already wrapped: a second pass changes nothing.
        prop_assert_eq!(wrap_implicit_old(wrapped.clone()), wrapped);
    }
}
