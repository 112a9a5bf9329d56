//! The typed tree handed to this tier by the front end.
//!
//! Every node carries a resolved [`Type`] and a [`Span`]. Name resolution and
//! type checking already happened; nothing below this layer reads source text.

use crate::{
    intern::InternedSymbol,
    middle::ty::{AdtId, AdtTable, Type},
    span::Span,
};

/// One compilation unit's worth of typed declarations
#[derive(Debug)]
pub struct Module {
    pub adts: AdtTable,
    pub functions: Vec<Function>,
}

#[derive(Debug)]
pub struct Function {
    pub name: InternedSymbol,
    pub parameters: Vec<Parameter>,
    pub return_type: Type,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug)]
pub struct Parameter {
    pub name: InternedSymbol,
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug)]
pub struct Block {
    pub statements: Vec<Statement>,
    /// Trailing expression whose value the block evaluates to
    pub tail: Option<Box<Expression>>,
    pub span: Span,
}

#[derive(Debug)]
pub struct Statement {
    pub kind: StatementKind,
    pub span: Span,
}

#[derive(Debug)]
pub enum StatementKind {
    /// `let <name> = <initializer>;`
    ///
    /// Introduces a binding into the innermost scope, shadowing any outer
    /// binding of the same name
    Let {
        name: InternedSymbol,
        initializer: Expression,
    },
    /// `<target> = <value>;`
    Assign {
        target: AssignTarget,
        value: Expression,
    },
    /// `while <condition> { ... }`
    While {
        condition: Expression,
        block: Block,
    },
    /// An expression evaluated for effect
    Expression(Expression),
    /// `return;` or `return <value>;`
    Return(Option<Expression>),
}

#[derive(Debug)]
pub enum AssignTarget {
    Variable(InternedSymbol),
    /// `<base>.<field>` where `base` names a local of aggregate type
    Field {
        base: InternedSymbol,
        field_index: usize,
    },
}

#[derive(Debug)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug)]
pub enum ExpressionKind {
    Literal(Literal),
    /// A reference to a local binding or parameter
    Variable(InternedSymbol),
    Unary {
        operator: UnaryOperator,
        operand: Box<Expression>,
    },
    Binary {
        operator: BinaryOperator,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    /// `<base>.<field>`, resolved to a field index by the type checker
    FieldAccess {
        base: Box<Expression>,
        field_index: usize,
    },
    /// `Point { x: ..., y: ... }` with operands in declaration order
    StructLiteral {
        adt: AdtId,
        fields: Vec<Expression>,
    },
    /// `Shape::Circle(...)` with payload operands in declaration order
    EnumLiteral {
        adt: AdtId,
        variant_index: usize,
        payload: Vec<Expression>,
    },
    /// A direct call to a named function; indirect calls are not modeled
    Call {
        callee: InternedSymbol,
        arguments: Vec<Expression>,
    },
    /// `&<place>` producing a non-owning reference to a local
    Ref(InternedSymbol),
    /// `*<pointer>`
    Deref(Box<Expression>),
    /// `if <condition> { ... } else { ... }`, usable as an expression when
    /// both arms produce a value
    If {
        condition: Box<Expression>,
        positive: Block,
        negative: Option<Block>,
    },
    Block(Block),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    Str(InternedSymbol),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum UnaryOperator {
    /// `-x`
    Negate,
    /// `!x`
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqualTo,
    GreaterThan,
    GreaterThanOrEqualTo,
    And,
    Or,
}

impl BinaryOperator {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOperator::Equals
                | BinaryOperator::NotEquals
                | BinaryOperator::LessThan
                | BinaryOperator::LessThanOrEqualTo
                | BinaryOperator::GreaterThan
                | BinaryOperator::GreaterThanOrEqualTo
        )
    }
}
