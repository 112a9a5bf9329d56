#![allow(dead_code)]

//! Hand-construction helpers for typed modules, shared by the integration
//! tests. Spans are irrelevant to the behavior under test and default to
//! zero.

use tarnc::{
    diagnostics::{Diagnostic, DiagnosticEngine},
    intern::InternedSymbol,
    interp::{self, Trap, value::Value},
    middle::{
        hir::{
            BinaryOperator, Block, Expression, ExpressionKind, Function, Literal, Module,
            Parameter, Statement, StatementKind,
        },
        mir::{Unit, hir_lowering},
        ty::{AdtDef, AdtKind, DeriveKind, FieldDef, Type, VariantDef},
    },
    span::Span,
};

pub fn sym(value: &str) -> InternedSymbol {
    InternedSymbol::new(value)
}

pub fn field(name: &str, ty: Type) -> FieldDef {
    FieldDef {
        name: sym(name),
        ty,
        span: Span::default(),
    }
}

pub fn struct_def(name: &str, fields: Vec<FieldDef>, derives: Vec<DeriveKind>) -> AdtDef {
    AdtDef {
        name: sym(name),
        generic_params: Vec::new(),
        kind: AdtKind::Struct { fields },
        derives,
        span: Span::default(),
    }
}

pub fn enum_def(
    name: &str,
    variants: Vec<(&str, Vec<FieldDef>)>,
    derives: Vec<DeriveKind>,
) -> AdtDef {
    AdtDef {
        name: sym(name),
        generic_params: Vec::new(),
        kind: AdtKind::Enum {
            variants: variants
                .into_iter()
                .map(|(name, fields)| VariantDef {
                    name: sym(name),
                    fields,
                    span: Span::default(),
                })
                .collect(),
        },
        derives,
        span: Span::default(),
    }
}

pub fn param(name: &str, ty: Type) -> Parameter {
    Parameter {
        name: sym(name),
        ty,
        span: Span::default(),
    }
}

pub fn function(name: &str, parameters: Vec<Parameter>, return_type: Type, body: Block) -> Function {
    Function {
        name: sym(name),
        parameters,
        return_type,
        body,
        span: Span::default(),
    }
}

pub fn expr(kind: ExpressionKind, ty: Type) -> Expression {
    Expression {
        kind,
        ty,
        span: Span::default(),
    }
}

pub fn int(value: i64) -> Expression {
    expr(ExpressionKind::Literal(Literal::Int(value)), Type::int())
}

pub fn boolean(value: bool) -> Expression {
    expr(ExpressionKind::Literal(Literal::Bool(value)), Type::bool())
}

pub fn var(name: &str, ty: Type) -> Expression {
    expr(ExpressionKind::Variable(sym(name)), ty)
}

pub fn binary(operator: BinaryOperator, lhs: Expression, rhs: Expression, ty: Type) -> Expression {
    expr(
        ExpressionKind::Binary {
            operator,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        ty,
    )
}

pub fn call(name: &str, arguments: Vec<Expression>, ty: Type) -> Expression {
    expr(
        ExpressionKind::Call {
            callee: sym(name),
            arguments,
        },
        ty,
    )
}

pub fn statement(kind: StatementKind) -> Statement {
    Statement {
        kind,
        span: Span::default(),
    }
}

pub fn block(statements: Vec<Statement>, tail: Option<Expression>) -> Block {
    Block {
        statements,
        tail: tail.map(Box::new),
        span: Span::default(),
    }
}

pub fn expr_block(tail: Expression) -> Block {
    block(Vec::new(), Some(tail))
}

/// Lowers a module and hands back the sealed unit together with everything
/// the engine collected
pub fn lower(module: &Module) -> (Unit, Vec<Diagnostic>) {
    let diagnostics = DiagnosticEngine::new();
    let unit = hir_lowering::lower_module(module, &diagnostics);

    (unit, diagnostics.drain())
}

pub fn eval_named(unit: &Unit, name: &str, arguments: Vec<Value>) -> Result<Value, Trap> {
    let entry = unit
        .function_id(sym(name))
        .unwrap_or_else(|| panic!("no function named `{name}` in the unit"));

    interp::evaluate(unit, entry, arguments)
}
