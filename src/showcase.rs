//! A built-in typed module the driver lowers when no front end is attached.
//! It exercises the derive generator, recursion, loops, and aggregate
//! plumbing.

use tarnc::{
    intern::InternedSymbol,
    middle::{
        hir::{
            AssignTarget, BinaryOperator, Block, Expression, ExpressionKind, Function, Literal,
            Module, Parameter, Statement, StatementKind,
        },
        ty::{AdtDef, AdtId, AdtKind, AdtTable, DeriveKind, FieldDef, Type, VariantDef},
    },
    span::Span,
};

pub fn module() -> Module {
    let mut adts = AdtTable::new();

    let point = adts.insert(AdtDef {
        name: InternedSymbol::new("Point"),
        generic_params: Vec::new(),
        kind: AdtKind::Struct {
            fields: vec![
                field("x", Type::int()),
                field("y", Type::int()),
            ],
        },
        derives: vec![
            DeriveKind::Eq,
            DeriveKind::Ord,
            DeriveKind::Hash,
            DeriveKind::Clone,
        ],
        span: Span::default(),
    });

    let shape = adts.insert(AdtDef {
        name: InternedSymbol::new("Shape"),
        generic_params: Vec::new(),
        kind: AdtKind::Enum {
            variants: vec![
                VariantDef {
                    name: InternedSymbol::new("Dot"),
                    fields: Vec::new(),
                    span: Span::default(),
                },
                VariantDef {
                    name: InternedSymbol::new("Circle"),
                    fields: vec![field("radius", Type::int())],
                    span: Span::default(),
                },
                VariantDef {
                    name: InternedSymbol::new("Rect"),
                    fields: vec![field("width", Type::int()), field("height", Type::int())],
                    span: Span::default(),
                },
            ],
        },
        derives: vec![
            DeriveKind::Eq,
            DeriveKind::Ord,
            DeriveKind::Hash,
            DeriveKind::Clone,
        ],
        span: Span::default(),
    });

    Module {
        adts,
        functions: vec![
            fib(),
            triangle(),
            points_equal(point),
            point_hash(point),
            shape_cmp(shape),
        ],
    }
}

/// fn fib(n: int) -> int { if n < 2 { n } else { fib(n - 1) + fib(n - 2) } }
fn fib() -> Function {
    let n = || var("n", Type::int());

    let recurse = |offset: i64| {
        call(
            "fib",
            vec![binary(BinaryOperator::Subtract, n(), int(offset), Type::int())],
            Type::int(),
        )
    };

    let body = expr_block(expr(
        ExpressionKind::If {
            condition: Box::new(binary(
                BinaryOperator::LessThan,
                n(),
                int(2),
                Type::bool(),
            )),
            positive: expr_block(n()),
            negative: Some(expr_block(binary(
                BinaryOperator::Add,
                recurse(1),
                recurse(2),
                Type::int(),
            ))),
        },
        Type::int(),
    ));

    function("fib", vec![param("n", Type::int())], Type::int(), body)
}

/// fn triangle(n: int) -> int, summing 1..=n with a while loop
fn triangle() -> Function {
    let body = Block {
        statements: vec![
            statement(StatementKind::Let {
                name: InternedSymbol::new("total"),
                initializer: int(0),
            }),
            statement(StatementKind::Let {
                name: InternedSymbol::new("i"),
                initializer: int(0),
            }),
            statement(StatementKind::While {
                condition: binary(
                    BinaryOperator::LessThan,
                    var("i", Type::int()),
                    var("n", Type::int()),
                    Type::bool(),
                ),
                block: Block {
                    statements: vec![
                        statement(StatementKind::Assign {
                            target: AssignTarget::Variable(InternedSymbol::new("i")),
                            value: binary(
                                BinaryOperator::Add,
                                var("i", Type::int()),
                                int(1),
                                Type::int(),
                            ),
                        }),
                        statement(StatementKind::Assign {
                            target: AssignTarget::Variable(InternedSymbol::new("total")),
                            value: binary(
                                BinaryOperator::Add,
                                var("total", Type::int()),
                                var("i", Type::int()),
                                Type::int(),
                            ),
                        }),
                    ],
                    tail: None,
                    span: Span::default(),
                },
            }),
        ],
        tail: Some(Box::new(var("total", Type::int()))),
        span: Span::default(),
    };

    function("triangle", vec![param("n", Type::int())], Type::int(), body)
}

/// fn points_equal(ax, ay, bx, by) -> bool via the generated Point__op_eq
fn points_equal(point: AdtId) -> Function {
    let make = |x: &str, y: &str| {
        expr(
            ExpressionKind::StructLiteral {
                adt: point,
                fields: vec![var(x, Type::int()), var(y, Type::int())],
            },
            Type::adt(point),
        )
    };

    let body = expr_block(call(
        "Point__op_eq",
        vec![make("ax", "ay"), make("bx", "by")],
        Type::bool(),
    ));

    function(
        "points_equal",
        vec![
            param("ax", Type::int()),
            param("ay", Type::int()),
            param("bx", Type::int()),
            param("by", Type::int()),
        ],
        Type::bool(),
        body,
    )
}

/// fn point_hash(x, y) -> int via the generated Point__hash
fn point_hash(point: AdtId) -> Function {
    let body = expr_block(call(
        "Point__hash",
        vec![expr(
            ExpressionKind::StructLiteral {
                adt: point,
                fields: vec![var("x", Type::int()), var("y", Type::int())],
            },
            Type::adt(point),
        )],
        Type::int(),
    ));

    function(
        "point_hash",
        vec![param("x", Type::int()), param("y", Type::int())],
        Type::int(),
        body,
    )
}

/// fn shape_cmp(r, w) -> int ordering a circle against a rect
fn shape_cmp(shape: AdtId) -> Function {
    let circle = expr(
        ExpressionKind::EnumLiteral {
            adt: shape,
            variant_index: 1,
            payload: vec![var("r", Type::int())],
        },
        Type::adt(shape),
    );

    let rect = expr(
        ExpressionKind::EnumLiteral {
            adt: shape,
            variant_index: 2,
            payload: vec![var("w", Type::int()), var("w", Type::int())],
        },
        Type::adt(shape),
    );

    let body = expr_block(call("Shape__op_cmp", vec![circle, rect], Type::int()));

    function(
        "shape_cmp",
        vec![param("r", Type::int()), param("w", Type::int())],
        Type::int(),
        body,
    )
}

fn field(name: &str, ty: Type) -> FieldDef {
    FieldDef {
        name: InternedSymbol::new(name),
        ty,
        span: Span::default(),
    }
}

fn param(name: &str, ty: Type) -> Parameter {
    Parameter {
        name: InternedSymbol::new(name),
        ty,
        span: Span::default(),
    }
}

fn function(name: &str, parameters: Vec<Parameter>, return_type: Type, body: Block) -> Function {
    Function {
        name: InternedSymbol::new(name),
        parameters,
        return_type,
        body,
        span: Span::default(),
    }
}

fn expr(kind: ExpressionKind, ty: Type) -> Expression {
    Expression {
        kind,
        ty,
        span: Span::default(),
    }
}

fn int(value: i64) -> Expression {
    expr(ExpressionKind::Literal(Literal::Int(value)), Type::int())
}

fn var(name: &str, ty: Type) -> Expression {
    expr(ExpressionKind::Variable(InternedSymbol::new(name)), ty)
}

fn binary(operator: BinaryOperator, lhs: Expression, rhs: Expression, ty: Type) -> Expression {
    expr(
        ExpressionKind::Binary {
            operator,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        ty,
    )
}

fn call(name: &str, arguments: Vec<Expression>, ty: Type) -> Expression {
    expr(
        ExpressionKind::Call {
            callee: InternedSymbol::new(name),
            arguments,
        },
        ty,
    )
}

fn statement(kind: StatementKind) -> Statement {
    Statement {
        kind,
        span: Span::default(),
    }
}

fn expr_block(tail: Expression) -> Block {
    Block {
        statements: Vec::new(),
        tail: Some(Box::new(tail)),
        span: Span::default(),
    }
}
