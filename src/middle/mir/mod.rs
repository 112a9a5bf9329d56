//! The mid-level intermediate representation.
//!
//! A [`Unit`] holds every function of one compilation invocation. Function
//! bodies are graphs of basic blocks over typed virtual registers; blocks
//! hold straight-line instructions and end in exactly one [`Terminator`].
//! Construction goes through [`builder::FunctionBuilder`], which validates
//! register references at append time, so a finished body is structurally
//! sound by construction.

pub mod auto_impl;
pub mod builder;
pub mod hir_lowering;
pub mod pretty_print;

use std::collections::BTreeMap;

use crate::{
    index::{IndexVec, simple_index},
    intern::InternedSymbol,
    middle::{
        hir::{BinaryOperator, UnaryOperator},
        ty::{AdtId, DeriveKind, Type},
    },
    span::Span,
};

simple_index! {
    /// Identifies a function within a [`Unit`]
    pub struct FuncId;
}

simple_index! {
    /// Identifies a basic block within a function body
    pub struct BlockId;
}

simple_index! {
    /// A typed virtual register. Registers are function-local and mutable;
    /// the same register may be written on both sides of a branch.
    pub struct RegisterId;
}

/// Errors raised while constructing MIR. Each maps to a stable diagnostic
/// code when surfaced through the engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructuralError {
    #[error("operand references {0:?} before any instruction defines it")]
    DanglingReference(RegisterId),
    #[error("unit is sealed and can no longer be mutated")]
    SealedUnit,
    #[error("{0:?} already has a terminator")]
    TerminatedBlock(BlockId),
    #[error("{0:?} has no terminator")]
    MissingTerminator(BlockId),
    #[error("terminator targets unknown {0:?}")]
    UnknownBlock(BlockId),
    #[error("a function named `{0}` already exists in this unit")]
    DuplicateFunction(InternedSymbol),
}

/// A complete, append-only collection of lowered functions.
///
/// Functions are registered in lowering order and iterate back out in that
/// same order. Once [`Unit::seal`] is called the unit is immutable and safe
/// to hand to concurrent readers.
#[derive(Debug, Default)]
pub struct Unit {
    functions: IndexVec<FuncId, Function>,
    ids: BTreeMap<InternedSymbol, FuncId>,
    sealed: bool,
}

impl Unit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a finished function, returning its id. Names are unique per
    /// unit.
    pub fn add_function(&mut self, function: Function) -> Result<FuncId, StructuralError> {
        if self.sealed {
            return Err(StructuralError::SealedUnit);
        }

        if self.ids.contains_key(&function.name) {
            return Err(StructuralError::DuplicateFunction(function.name));
        }

        let name = function.name;
        let id = self.functions.push(function);
        self.ids.insert(name, id);

        log::trace!("unit: registered function `{name}` as {id:?}");

        Ok(id)
    }

    /// Marks the unit complete. Idempotent; all further mutation fails with
    /// [`StructuralError::SealedUnit`].
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn function(&self, id: FuncId) -> &Function {
        &self.functions[id]
    }

    pub fn function_id(&self, name: InternedSymbol) -> Option<FuncId> {
        self.ids.get(&name).copied()
    }

    pub fn function_by_name(&self, name: InternedSymbol) -> Option<&Function> {
        self.function_id(name).map(|id| self.function(id))
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Iterates functions in registration order
    pub fn iter(&self) -> impl Iterator<Item = (FuncId, &Function)> {
        self.functions.enumerate()
    }
}

#[derive(Debug, Clone)]
pub struct Function {
    pub name: InternedSymbol,
    /// Registers pre-populated with the caller's arguments, in order
    pub parameters: Vec<RegisterId>,
    pub return_type: Type,
    pub registers: IndexVec<RegisterId, Register>,
    pub blocks: IndexVec<BlockId, Block>,
    /// Span of the declaration this body was lowered from; generated bodies
    /// reuse the span of the deriving type
    pub span: Span,
}

impl Function {
    pub const ENTRY_BLOCK: BlockId = BlockId(0);

    pub fn register_type(&self, register: RegisterId) -> &Type {
        &self.registers[register].ty
    }

    /// Locates the instruction that defines `register`, in append order.
    /// Parameters have no defining instruction.
    pub fn defining_instruction(&self, register: RegisterId) -> Option<(BlockId, usize)> {
        for (block_id, block) in self.blocks.enumerate() {
            for (position, instruction) in block.instructions.iter().enumerate() {
                if instruction.destination() == Some(register) {
                    return Some((block_id, position));
                }
            }
        }

        None
    }
}

#[derive(Debug, Clone)]
pub struct Register {
    pub ty: Type,
}

#[derive(Debug, Clone)]
pub struct Block {
    pub instructions: Vec<Instruction>,
    pub terminator: Terminator,
}

/// A value an instruction reads: either a literal or a previously defined
/// register
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Immediate(Immediate),
    Register(RegisterId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Immediate {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    Str(InternedSymbol),
}

/// The callee of a [`Instruction::Call`].
///
/// `DeriveOf` defers resolution of a generated operation on a generic
/// parameter until the enclosing body is instantiated; evaluating one before
/// instantiation traps.
#[derive(Debug, Clone, PartialEq)]
pub enum Callee {
    Named(InternedSymbol),
    DeriveOf(DeriveKind, Type),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AggregateKind {
    Struct(AdtId),
    /// One enum variant, identified by declaration index
    Variant(AdtId, usize),
    Array(Type),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// destination = source
    Move {
        destination: RegisterId,
        source: Operand,
    },
    /// destination = op operand
    UnaryOperation {
        operator: UnaryOperator,
        destination: RegisterId,
        operand: Operand,
    },
    /// destination = lhs op rhs
    BinaryOperation {
        operator: BinaryOperator,
        destination: RegisterId,
        lhs: Operand,
        rhs: Operand,
    },
    /// destination = source.field
    ///
    /// `field` indexes struct fields, enum payload fields, or array elements
    LoadField {
        destination: RegisterId,
        source: RegisterId,
        field: usize,
    },
    /// target.field = value
    StoreField {
        target: RegisterId,
        field: usize,
        value: Operand,
    },
    /// destination = <aggregate of kind, built from operands in order>
    Aggregate {
        destination: RegisterId,
        kind: AggregateKind,
        operands: Vec<Operand>,
    },
    /// destination = tag of the enum value in source
    Discriminant {
        destination: RegisterId,
        source: RegisterId,
    },
    /// destination = &source
    Ref {
        destination: RegisterId,
        source: RegisterId,
    },
    /// destination = *source
    Deref {
        destination: RegisterId,
        source: Operand,
    },
    /// destination = operand reinterpreted as destination's type
    Cast {
        destination: RegisterId,
        operand: Operand,
    },
    /// destination = callee(arguments...)
    Call {
        destination: Option<RegisterId>,
        callee: Callee,
        arguments: Vec<Operand>,
    },
}

impl Instruction {
    pub fn destination(&self) -> Option<RegisterId> {
        match self {
            Instruction::Move { destination, .. }
            | Instruction::UnaryOperation { destination, .. }
            | Instruction::BinaryOperation { destination, .. }
            | Instruction::LoadField { destination, .. }
            | Instruction::Aggregate { destination, .. }
            | Instruction::Discriminant { destination, .. }
            | Instruction::Ref { destination, .. }
            | Instruction::Deref { destination, .. }
            | Instruction::Cast { destination, .. } => Some(*destination),
            Instruction::StoreField { .. } => None,
            Instruction::Call { destination, .. } => *destination,
        }
    }

    /// Registers this instruction reads, used for define-before-use
    /// validation
    pub fn operand_registers(&self) -> Vec<RegisterId> {
        fn of(operand: &Operand) -> Option<RegisterId> {
            match operand {
                Operand::Register(register) => Some(*register),
                Operand::Immediate(_) => None,
            }
        }

        match self {
            Instruction::Move { source, .. } => of(source).into_iter().collect(),
            Instruction::UnaryOperation { operand, .. } => of(operand).into_iter().collect(),
            Instruction::BinaryOperation { lhs, rhs, .. } => {
                of(lhs).into_iter().chain(of(rhs)).collect()
            }
            Instruction::LoadField { source, .. } => vec![*source],
            Instruction::StoreField { target, value, .. } => {
                std::iter::once(*target).chain(of(value)).collect()
            }
            Instruction::Aggregate { operands, .. } => operands.iter().filter_map(of).collect(),
            Instruction::Discriminant { source, .. } => vec![*source],
            Instruction::Ref { source, .. } => vec![*source],
            Instruction::Deref { source, .. } => of(source).into_iter().collect(),
            Instruction::Cast { operand, .. } => of(operand).into_iter().collect(),
            Instruction::Call { arguments, .. } => arguments.iter().filter_map(of).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Terminator {
    /// Unconditional transfer
    Jump { target: BlockId },
    /// Two-way transfer on a boolean condition
    Branch {
        condition: Operand,
        positive: BlockId,
        negative: BlockId,
    },
    /// Multi-way transfer on an integer discriminant. Unmatched values take
    /// `otherwise`.
    SwitchInt {
        discriminant: Operand,
        targets: Vec<(i64, BlockId)>,
        otherwise: BlockId,
    },
    /// Leave the function, optionally producing a value
    Return { value: Option<Operand> },
    /// Control flow the lowering proved impossible; reaching it at runtime
    /// traps
    Unreachable,
}

impl Terminator {
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Terminator::Jump { target } => vec![*target],
            Terminator::Branch {
                positive, negative, ..
            } => vec![*positive, *negative],
            Terminator::SwitchInt {
                targets, otherwise, ..
            } => targets
                .iter()
                .map(|(_, block)| *block)
                .chain(std::iter::once(*otherwise))
                .collect(),
            Terminator::Return { .. } | Terminator::Unreachable => Vec::new(),
        }
    }

    pub fn operand_register(&self) -> Option<RegisterId> {
        let operand = match self {
            Terminator::Branch { condition, .. } => condition,
            Terminator::SwitchInt { discriminant, .. } => discriminant,
            Terminator::Return { value: Some(value) } => value,
            _ => return None,
        };

        match operand {
            Operand::Register(register) => Some(*register),
            Operand::Immediate(_) => None,
        }
    }
}
