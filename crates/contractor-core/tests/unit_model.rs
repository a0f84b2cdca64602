//! Integration tests for the unit model as a host would use it: build a
//! unit, serialize it, load it back and query the hierarchy.

use contractor_core::{
    BinaryOp, Block, Expr, Param, SourceMap, SourceProvider, SourceSpan, Stmt, TypeHierarchy,
    TypeKind, TypeRef, Unit,
};

fn sample_unit() -> Unit {
    let mut unit = Unit::new("shapes");
    let ishape = unit.add_type("Shapes", "IShape", TypeKind::Interface).unwrap();
    let base = unit.add_type("Shapes", "ShapeBase", TypeKind::Class).unwrap();
    let square = unit.add_type("Shapes", "Square", TypeKind::Class).unwrap();
    unit.type_mut(base).unwrap().interfaces.push(TypeRef::Named(ishape));
    unit.type_mut(square).unwrap().base = Some(TypeRef::Named(base));

    let area = unit
        .add_method(square, "Area", vec![Param::new("scale", TypeRef::I32)], TypeRef::I32)
        .unwrap();
    let scale = Expr::param(0, "scale", TypeRef::I32);
    unit.method_mut(area).unwrap().body = Some(Block::new(vec![
        Stmt::if_then(
            Expr::binary(BinaryOp::Le, scale.clone(), Expr::int(0)),
            Block::new(vec![Stmt::throw(Expr::null())]),
        )
        .with_span(SourceSpan::new("Square.cs", 2, 9, 2, 40)),
        Stmt::ret(Some(Expr::binary(BinaryOp::Mul, scale.clone(), scale))),
    ]));
    unit
}

#[test]
fn unit_survives_json_round_trip() {
    let unit = sample_unit();
    let json = serde_json::to_string_pretty(&unit).unwrap();
    let back: Unit = serde_json::from_str(&json).unwrap();

    let square = back.find_type("Shapes.Square").unwrap();
    let area = back.find_method(square, "Area", 1).unwrap();
    insta::assert_snapshot!(
        area.body.as_ref().unwrap().to_string(),
        @"{ if (scale <= 0) { throw null; } return scale * scale; }"
    );
    assert_eq!(back.method_display_name(area.id), "Shapes.Square::Area");
}

#[test]
fn hierarchy_reaches_interfaces_through_bases() {
    let unit = sample_unit();
    let hierarchy = TypeHierarchy::new(&unit).unwrap();
    let square = unit.find_type("Shapes.Square").unwrap();
    let base = unit.find_type("Shapes.ShapeBase").unwrap();
    let ishape = unit.find_type("Shapes.IShape").unwrap();

    assert_eq!(hierarchy.base_chain(square), vec![TypeRef::Named(base)]);
    assert!(hierarchy.all_interfaces(square).is_empty());
    assert_eq!(hierarchy.all_interfaces(base), vec![TypeRef::Named(ishape)]);
    assert_eq!(hierarchy.derived_of(base), vec![square]);
}

#[test]
fn statement_spans_resolve_to_source_text() {
    let unit = sample_unit();
    let square = unit.find_type("Shapes.Square").unwrap();
    let area = unit.find_method(square, "Area", 1).unwrap();
    let span = area.body.as_ref().unwrap().stmts[0].span.clone().unwrap();

    let mut sources = SourceMap::new();
    sources.add_document(
        "Square.cs",
        "int Area(int scale) {\n        if (scale <= 0) throw null;\n}",
    );
    assert_eq!(
        sources.span_text(&span).as_deref(),
        Some("if (scale <= 0) throw null;")
    );
}
