//! End-to-end coverage of the generated Eq, Ord, Hash, and Clone
//! implementations: derive a type, lower the module, and run the generated
//! functions through the interpreter.

mod common;

use common::*;
use tarnc::{
    diagnostics::codes,
    interp::value::Value,
    middle::{
        hir::{AssignTarget, ExpressionKind, Module, StatementKind},
        ty::{AdtId, AdtTable, DeriveKind, Type},
    },
};

fn point_module(derives: Vec<DeriveKind>) -> (Module, AdtId) {
    let mut adts = AdtTable::new();
    let point = adts.insert(struct_def(
        "Point",
        vec![field("x", Type::int()), field("y", Type::int())],
        derives,
    ));

    (
        Module {
            adts,
            functions: Vec::new(),
        },
        point,
    )
}

fn point(adt: AdtId, x: i64, y: i64) -> Value {
    Value::Struct {
        adt,
        fields: vec![Value::Int(x), Value::Int(y)],
    }
}

#[test]
fn struct_eq_is_reflexive_and_field_sensitive() {
    let (module, adt) = point_module(vec![DeriveKind::Eq]);
    let (unit, diagnostics) = lower(&module);
    assert!(diagnostics.is_empty());

    let same = eval_named(
        &unit,
        "Point__op_eq",
        vec![point(adt, 3, 4), point(adt, 3, 4)],
    )
    .unwrap();
    assert_eq!(same, Value::Bool(true));

    let differs_late = eval_named(
        &unit,
        "Point__op_eq",
        vec![point(adt, 3, 4), point(adt, 3, 5)],
    )
    .unwrap();
    assert_eq!(differs_late, Value::Bool(false));

    let differs_early = eval_named(
        &unit,
        "Point__op_eq",
        vec![point(adt, 0, 4), point(adt, 3, 4)],
    )
    .unwrap();
    assert_eq!(differs_early, Value::Bool(false));
}

#[test]
fn struct_cmp_orders_lexicographically() {
    let (module, adt) = point_module(vec![DeriveKind::Ord]);
    let (unit, diagnostics) = lower(&module);
    assert!(diagnostics.is_empty());

    let cmp = |a: Value, b: Value| {
        eval_named(&unit, "Point__op_cmp", vec![a, b])
            .unwrap()
            .as_int()
            .unwrap()
    };

    assert_eq!(cmp(point(adt, 1, 2), point(adt, 1, 2)), 0);
    assert!(cmp(point(adt, 1, 2), point(adt, 1, 3)) < 0);
    assert!(cmp(point(adt, 2, 0), point(adt, 1, 9)) > 0);
}

#[test]
fn cmp_is_a_total_order_consistent_with_eq() {
    let (module, adt) = point_module(vec![DeriveKind::Eq, DeriveKind::Ord]);
    let (unit, diagnostics) = lower(&module);
    assert!(diagnostics.is_empty());

    let values: Vec<Value> = [(0, 0), (0, 1), (1, 0), (1, 1), (0, 1)]
        .iter()
        .map(|&(x, y)| point(adt, x, y))
        .collect();

    let cmp = |a: &Value, b: &Value| {
        eval_named(&unit, "Point__op_cmp", vec![a.clone(), b.clone()])
            .unwrap()
            .as_int()
            .unwrap()
    };
    let eq = |a: &Value, b: &Value| {
        eval_named(&unit, "Point__op_eq", vec![a.clone(), b.clone()]).unwrap()
            == Value::Bool(true)
    };

    for a in &values {
        for b in &values {
            // antisymmetry, and agreement between the two generated operations
            assert_eq!(cmp(a, b).signum(), -cmp(b, a).signum());
            assert_eq!(cmp(a, b) == 0, eq(a, b));

            for c in &values {
                if cmp(a, b) <= 0 && cmp(b, c) <= 0 {
                    assert!(cmp(a, c) <= 0);
                }
            }
        }
    }
}

#[test]
fn enum_values_order_by_variant_before_payload() {
    let mut adts = AdtTable::new();
    let shape = adts.insert(enum_def(
        "Shape",
        vec![
            ("Dot", Vec::new()),
            ("Circle", vec![field("radius", Type::int())]),
            (
                "Rect",
                vec![field("width", Type::int()), field("height", Type::int())],
            ),
        ],
        vec![DeriveKind::Eq, DeriveKind::Ord],
    ));

    let module = Module {
        adts,
        functions: Vec::new(),
    };
    let (unit, diagnostics) = lower(&module);
    assert!(diagnostics.is_empty());

    let value = |tag: i64, payload: Vec<Value>| Value::Enum {
        adt: shape,
        tag,
        payload,
    };

    // a large early-variant payload still sorts before any later variant
    let cmp = eval_named(
        &unit,
        "Shape__op_cmp",
        vec![
            value(1, vec![Value::Int(1_000_000)]),
            value(2, vec![Value::Int(1), Value::Int(1)]),
        ],
    )
    .unwrap();
    assert!(cmp.as_int().unwrap() < 0);

    let eq_across_variants = eval_named(
        &unit,
        "Shape__op_eq",
        vec![value(0, Vec::new()), value(1, vec![Value::Int(0)])],
    )
    .unwrap();
    assert_eq!(eq_across_variants, Value::Bool(false));

    let payload_tie_break = eval_named(
        &unit,
        "Shape__op_cmp",
        vec![value(1, vec![Value::Int(2)]), value(1, vec![Value::Int(7)])],
    )
    .unwrap();
    assert!(payload_tie_break.as_int().unwrap() < 0);
}

#[test]
fn enum_cmp_is_a_total_order_consistent_with_eq() {
    let mut adts = AdtTable::new();
    let shape = adts.insert(enum_def(
        "Shape",
        vec![
            ("Dot", Vec::new()),
            ("Circle", vec![field("radius", Type::int())]),
            (
                "Rect",
                vec![field("width", Type::int()), field("height", Type::int())],
            ),
        ],
        vec![DeriveKind::Eq, DeriveKind::Ord],
    ));

    let module = Module {
        adts,
        functions: Vec::new(),
    };
    let (unit, diagnostics) = lower(&module);
    assert!(diagnostics.is_empty());

    let value = |tag: i64, payload: Vec<i64>| Value::Enum {
        adt: shape,
        tag,
        payload: payload.into_iter().map(Value::Int).collect(),
    };
    let values = vec![
        value(0, Vec::new()),
        value(1, vec![1]),
        value(1, vec![2]),
        value(2, vec![1, 1]),
        value(2, vec![1, 2]),
        value(1, vec![1]),
    ];

    let cmp = |a: &Value, b: &Value| {
        eval_named(&unit, "Shape__op_cmp", vec![a.clone(), b.clone()])
            .unwrap()
            .as_int()
            .unwrap()
    };
    let eq = |a: &Value, b: &Value| {
        eval_named(&unit, "Shape__op_eq", vec![a.clone(), b.clone()]).unwrap()
            == Value::Bool(true)
    };

    for a in &values {
        for b in &values {
            assert_eq!(cmp(a, b).signum(), -cmp(b, a).signum());
            assert_eq!(cmp(a, b) == 0, eq(a, b));

            for c in &values {
                if cmp(a, b) <= 0 && cmp(b, c) <= 0 {
                    assert!(cmp(a, c) <= 0);
                }
            }
        }
    }
}

#[test]
fn hash_mixes_the_tag_before_the_payload() {
    let mut adts = AdtTable::new();
    let coin = adts.insert(enum_def(
        "Coin",
        vec![
            ("Heads", vec![field("value", Type::int())]),
            ("Tails", vec![field("value", Type::int())]),
        ],
        vec![DeriveKind::Hash],
    ));

    let module = Module {
        adts,
        functions: Vec::new(),
    };
    let (unit, diagnostics) = lower(&module);
    assert!(diagnostics.is_empty());

    let hash = |tag: i64| {
        eval_named(
            &unit,
            "Coin__hash",
            vec![Value::Enum {
                adt: coin,
                tag,
                payload: vec![Value::Int(7)],
            }],
        )
        .unwrap()
    };

    // identical payloads under different tags must not collide
    assert_ne!(hash(0), hash(1));
    // and hashing is deterministic
    assert_eq!(hash(0), hash(0));
}

#[test]
fn struct_hash_is_deterministic_and_field_sensitive() {
    let (module, adt) = point_module(vec![DeriveKind::Hash]);
    let (unit, diagnostics) = lower(&module);
    assert!(diagnostics.is_empty());

    let hash = |x: i64, y: i64| eval_named(&unit, "Point__hash", vec![point(adt, x, y)]).unwrap();

    assert_eq!(hash(3, 4), hash(3, 4));
    assert_ne!(hash(3, 4), hash(4, 3));
}

#[test]
fn equal_values_hash_alike() {
    let (module, adt) = point_module(vec![DeriveKind::Eq, DeriveKind::Hash]);
    let (unit, diagnostics) = lower(&module);
    assert!(diagnostics.is_empty());

    let values: Vec<Value> = [(0, 0), (3, 4), (4, 3), (3, 4)]
        .iter()
        .map(|&(x, y)| point(adt, x, y))
        .collect();

    let eq = |a: &Value, b: &Value| {
        eval_named(&unit, "Point__op_eq", vec![a.clone(), b.clone()]).unwrap()
            == Value::Bool(true)
    };
    let hash =
        |a: &Value| eval_named(&unit, "Point__hash", vec![a.clone()]).unwrap();

    for a in &values {
        for b in &values {
            if eq(a, b) {
                assert_eq!(hash(a), hash(b));
            }
        }
    }
}

#[test]
fn equal_floats_hash_alike_including_signed_zero() {
    let mut adts = AdtTable::new();
    let reading = adts.insert(struct_def(
        "Reading",
        vec![field("value", Type::float())],
        vec![DeriveKind::Eq, DeriveKind::Hash],
    ));

    let module = Module {
        adts,
        functions: Vec::new(),
    };
    let (unit, diagnostics) = lower(&module);
    assert!(diagnostics.is_empty());

    let wrap = |value: f64| Value::Struct {
        adt: reading,
        fields: vec![Value::Float(value)],
    };

    // -0.0 and 0.0 compare equal, so their hashes must match too
    let equal = eval_named(&unit, "Reading__op_eq", vec![wrap(-0.0), wrap(0.0)]).unwrap();
    assert_eq!(equal, Value::Bool(true));

    let hash = |value: f64| eval_named(&unit, "Reading__hash", vec![wrap(value)]).unwrap();
    assert_eq!(hash(-0.0), hash(0.0));
    assert_ne!(hash(0.0), hash(1.5));
}

#[test]
fn clone_reproduces_the_value() {
    let (module, adt) = point_module(vec![DeriveKind::Clone]);
    let (unit, diagnostics) = lower(&module);
    assert!(diagnostics.is_empty());

    let original = point(adt, -2, 9);
    let cloned = eval_named(&unit, "Point__clone", vec![original.clone()]).unwrap();

    assert_eq!(cloned, original);
}

#[test]
fn clone_rebuilds_the_matching_enum_variant() {
    let mut adts = AdtTable::new();
    let shape = adts.insert(enum_def(
        "Shape",
        vec![
            ("Dot", Vec::new()),
            ("Circle", vec![field("radius", Type::int())]),
        ],
        vec![DeriveKind::Clone],
    ));

    let module = Module {
        adts,
        functions: Vec::new(),
    };
    let (unit, diagnostics) = lower(&module);
    assert!(diagnostics.is_empty());

    let circle = Value::Enum {
        adt: shape,
        tag: 1,
        payload: vec![Value::Int(12)],
    };
    let cloned = eval_named(&unit, "Shape__clone", vec![circle.clone()]).unwrap();
    assert_eq!(cloned, circle);

    let dot = Value::Enum {
        adt: shape,
        tag: 0,
        payload: Vec::new(),
    };
    let cloned = eval_named(&unit, "Shape__clone", vec![dot.clone()]).unwrap();
    assert_eq!(cloned, dot);
}

#[test]
fn mutating_a_clone_leaves_the_original_alone() {
    let mut adts = AdtTable::new();
    let point_adt = adts.insert(struct_def(
        "Point",
        vec![field("x", Type::int()), field("y", Type::int())],
        vec![DeriveKind::Clone],
    ));
    let point_ty = Type::adt(point_adt);

    // fn mutate_copy(x, y) -> int {
    //     let p = Point { x, y };
    //     let q = Point__clone(p);
    //     q.x = 99;
    //     p.x
    // }
    let body = block(
        vec![
            statement(StatementKind::Let {
                name: sym("p"),
                initializer: expr(
                    ExpressionKind::StructLiteral {
                        adt: point_adt,
                        fields: vec![var("x", Type::int()), var("y", Type::int())],
                    },
                    point_ty.clone(),
                ),
            }),
            statement(StatementKind::Let {
                name: sym("q"),
                initializer: call(
                    "Point__clone",
                    vec![var("p", point_ty.clone())],
                    point_ty.clone(),
                ),
            }),
            statement(StatementKind::Assign {
                target: AssignTarget::Field {
                    base: sym("q"),
                    field_index: 0,
                },
                value: int(99),
            }),
        ],
        Some(expr(
            ExpressionKind::FieldAccess {
                base: Box::new(var("p", point_ty)),
                field_index: 0,
            },
            Type::int(),
        )),
    );

    let mutate_copy = function(
        "mutate_copy",
        vec![param("x", Type::int()), param("y", Type::int())],
        Type::int(),
        body,
    );

    let module = Module {
        adts,
        functions: vec![mutate_copy],
    };
    let (unit, diagnostics) = lower(&module);
    assert!(diagnostics.is_empty());

    assert_eq!(
        eval_named(&unit, "mutate_copy", vec![Value::Int(7), Value::Int(8)]).unwrap(),
        Value::Int(7)
    );
}

#[test]
fn nested_aggregates_delegate_to_the_nested_operation() {
    let mut adts = AdtTable::new();
    let point_adt = adts.insert(struct_def(
        "Point",
        vec![field("x", Type::int()), field("y", Type::int())],
        vec![DeriveKind::Eq],
    ));
    let line = adts.insert(struct_def(
        "Line",
        vec![
            field("a", Type::adt(point_adt)),
            field("b", Type::adt(point_adt)),
        ],
        vec![DeriveKind::Eq],
    ));

    let module = Module {
        adts,
        functions: Vec::new(),
    };
    let (unit, diagnostics) = lower(&module);
    assert!(diagnostics.is_empty());

    let make = |ax: i64, ay: i64, bx: i64, by: i64| Value::Struct {
        adt: line,
        fields: vec![point(point_adt, ax, ay), point(point_adt, bx, by)],
    };

    let equal = eval_named(
        &unit,
        "Line__op_eq",
        vec![make(0, 1, 2, 3), make(0, 1, 2, 3)],
    )
    .unwrap();
    assert_eq!(equal, Value::Bool(true));

    let nested_difference = eval_named(
        &unit,
        "Line__op_eq",
        vec![make(0, 1, 2, 3), make(0, 1, 2, 4)],
    )
    .unwrap();
    assert_eq!(nested_difference, Value::Bool(false));
}

#[test]
fn missing_operation_fails_the_whole_request() {
    let mut adts = AdtTable::new();
    // the nested type does not derive Eq
    let bare = adts.insert(struct_def("Bare", vec![field("n", Type::int())], Vec::new()));
    adts.insert(struct_def(
        "Holder",
        vec![field("inner", Type::adt(bare))],
        vec![DeriveKind::Eq],
    ));

    let module = Module {
        adts,
        functions: Vec::new(),
    };
    let (unit, diagnostics) = lower(&module);

    assert!(
        diagnostics
            .iter()
            .any(|d| d.code == codes::MISSING_OPERATION)
    );
    assert!(unit.function_by_name(sym("Holder__op_eq")).is_none());
}

#[test]
fn pointer_fields_do_not_support_ordering() {
    let mut adts = AdtTable::new();
    adts.insert(struct_def(
        "Cursor",
        vec![field("at", Type::pointer(Type::int()))],
        vec![DeriveKind::Ord],
    ));

    let module = Module {
        adts,
        functions: Vec::new(),
    };
    let (_, diagnostics) = lower(&module);

    assert!(
        diagnostics
            .iter()
            .any(|d| d.code == codes::MISSING_OPERATION)
    );
}

#[test]
fn recursive_layout_without_indirection_is_rejected() {
    let mut adts = AdtTable::new();
    let node = adts.next_id();

    // Node { next: Node } contains itself by value
    let inserted = adts.insert(struct_def(
        "Node",
        vec![field("next", Type::adt(node))],
        vec![DeriveKind::Clone],
    ));
    assert_eq!(inserted, node);

    let module = Module {
        adts,
        functions: Vec::new(),
    };
    let (unit, diagnostics) = lower(&module);

    assert!(
        diagnostics
            .iter()
            .any(|d| d.code == codes::RECURSIVE_LAYOUT)
    );
    assert!(unit.function_by_name(sym("Node__clone")).is_none());
}

#[test]
fn pointer_indirection_breaks_the_cycle() {
    let mut adts = AdtTable::new();
    let node = adts.next_id();

    let inserted = adts.insert(struct_def(
        "Node",
        vec![
            field("value", Type::int()),
            field("next", Type::pointer(Type::adt(node))),
        ],
        vec![DeriveKind::Clone, DeriveKind::Eq],
    ));
    assert_eq!(inserted, node);

    let module = Module {
        adts,
        functions: Vec::new(),
    };
    let (unit, diagnostics) = lower(&module);

    assert!(diagnostics.is_empty());
    assert!(unit.function_by_name(sym("Node__clone")).is_some());
    assert!(unit.function_by_name(sym("Node__op_eq")).is_some());
}
