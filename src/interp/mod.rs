//! Compile-time evaluation of MIR bodies.
//!
//! The interpreter executes a sealed [`Unit`] with an explicit frame stack;
//! host recursion depth never depends on evaluated call depth. Frames live
//! in an arena of reusable slots, each carrying a generation counter:
//! references created by `Ref` capture the slot's generation, and a
//! dereference whose generation no longer matches traps as stale instead of
//! observing whatever frame reused the slot.
//!
//! Evaluation either produces a final [`Value`] or a [`Trap`]; traps carry
//! the function they fired in. Budget and depth limits come from
//! [`EvalSettings`].

pub mod value;

use crate::{
    index::Index,
    intern::InternedSymbol,
    middle::{
        hir::{BinaryOperator, UnaryOperator},
        mir::{
            AggregateKind, BlockId, Callee, FuncId, Function, Immediate, Instruction, Operand,
            RegisterId, Terminator, Unit,
        },
    },
};

use value::{FrameHandle, FrameRef, Value};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrapKind {
    #[error("division by zero")]
    DivideByZero,
    #[error("field index {index} out of bounds for aggregate with {length} field(s)")]
    OutOfBounds { index: usize, length: usize },
    #[error("entered a block the compiler proved unreachable")]
    Unreachable,
    #[error("call depth exceeded the configured limit of {limit}")]
    StackOverflow { limit: usize },
    #[error("instruction budget of {budget} exhausted")]
    BudgetExceeded { budget: u64 },
    #[error("dereferenced a reference into a frame that no longer exists")]
    StaleReference,
    #[error("call target `{name}` is not present in this unit")]
    UnresolvedCallee { name: String },
    #[error("operand has the wrong type for this operation")]
    TypeMismatch,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("evaluation trapped in `{function}`: {kind}")]
pub struct Trap {
    pub kind: TrapKind,
    pub function: InternedSymbol,
}

#[derive(Debug, Clone, Copy)]
pub struct EvalSettings {
    /// Upper bound on executed instructions; `None` means unbounded
    pub instruction_budget: Option<u64>,
    /// Maximum evaluated call depth
    pub max_depth: usize,
}

impl Default for EvalSettings {
    fn default() -> Self {
        Self {
            instruction_budget: None,
            max_depth: 256,
        }
    }
}

/// Evaluates `entry` with the default settings
pub fn evaluate(unit: &Unit, entry: FuncId, arguments: Vec<Value>) -> Result<Value, Trap> {
    Interpreter::new(unit, EvalSettings::default()).evaluate(entry, arguments)
}

struct Frame {
    function: FuncId,
    registers: Vec<Value>,
    block: BlockId,
    pc: usize,
    /// Caller register awaiting this frame's return value
    return_to: Option<RegisterId>,
    generation: u64,
}

/// Frames in slot storage. Slots are reused after pop; the per-slot
/// generation counter increments on teardown so dangling [`FrameRef`]s can
/// be told apart from live ones.
#[derive(Default)]
struct FrameArena {
    slots: Vec<Option<Frame>>,
    generations: Vec<u64>,
    free: Vec<usize>,
    stack: Vec<usize>,
}

impl FrameArena {
    fn push(&mut self, mut frame: Frame) -> usize {
        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                self.slots.push(None);
                self.generations.push(0);
                self.slots.len() - 1
            }
        };

        frame.generation = self.generations[slot];
        self.slots[slot] = Some(frame);
        self.stack.push(slot);

        slot
    }

    fn pop(&mut self) -> Option<Frame> {
        let slot = self.stack.pop()?;
        let frame = self.slots[slot].take();

        self.generations[slot] += 1;
        self.free.push(slot);

        frame
    }

    fn top_slot(&self) -> Option<usize> {
        self.stack.last().copied()
    }

    fn frame(&self, slot: usize) -> &Frame {
        self.slots[slot]
            .as_ref()
            .unwrap_or_else(|| unreachable!("slot on the stack is always occupied"))
    }

    fn frame_mut(&mut self, slot: usize) -> &mut Frame {
        self.slots[slot]
            .as_mut()
            .unwrap_or_else(|| unreachable!("slot on the stack is always occupied"))
    }

    fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Reads through a reference, trapping if the frame it points into has
    /// been torn down
    fn read_ref(&self, reference: FrameRef) -> Result<Value, TrapKind> {
        let FrameHandle { slot, generation } = reference.frame;

        let frame = self
            .slots
            .get(slot)
            .and_then(|slot| slot.as_ref())
            .filter(|frame| frame.generation == generation)
            .ok_or(TrapKind::StaleReference)?;

        Ok(frame.registers[reference.register.index()].clone())
    }
}

pub struct Interpreter<'a> {
    unit: &'a Unit,
    settings: EvalSettings,
}

impl<'a> Interpreter<'a> {
    pub fn new(unit: &'a Unit, settings: EvalSettings) -> Self {
        Self { unit, settings }
    }

    pub fn evaluate(&self, entry: FuncId, arguments: Vec<Value>) -> Result<Value, Trap> {
        let function = self.unit.function(entry);

        log::debug!(
            "interp: evaluating `{}` with {} argument(s)",
            function.name,
            arguments.len()
        );

        let mut arena = FrameArena::default();
        let frame = self
            .new_frame(entry, arguments, None)
            .map_err(|kind| Trap {
                kind,
                function: function.name,
            })?;
        arena.push(frame);

        let mut executed: u64 = 0;

        loop {
            let Some(slot) = arena.top_slot() else {
                unreachable!("the loop returns before the last frame pops");
            };

            let function = self.unit.function(arena.frame(slot).function);

            if let Some(budget) = self.settings.instruction_budget {
                executed += 1;
                if executed > budget {
                    return Err(Trap {
                        kind: TrapKind::BudgetExceeded { budget },
                        function: function.name,
                    });
                }
            }

            let step = self.step(&mut arena, slot, function).map_err(|kind| Trap {
                kind,
                function: function.name,
            })?;

            if let Some(result) = step {
                return Ok(result);
            }
        }
    }

    /// Executes one instruction or terminator of the frame in `slot`.
    /// Returns the final value once the outermost frame returns.
    fn step(
        &self,
        arena: &mut FrameArena,
        slot: usize,
        function: &Function,
    ) -> Result<Option<Value>, TrapKind> {
        let frame = arena.frame(slot);
        let block = &function.blocks[frame.block];

        if frame.pc < block.instructions.len() {
            let instruction = block.instructions[frame.pc].clone();
            arena.frame_mut(slot).pc += 1;
            self.execute_instruction(arena, slot, &instruction)?;
            return Ok(None);
        }

        match block.terminator.clone() {
            Terminator::Jump { target } => self.enter_block(arena, slot, target),
            Terminator::Branch {
                condition,
                positive,
                negative,
            } => {
                let condition = self
                    .operand(arena, slot, &condition)?
                    .as_bool()
                    .ok_or(TrapKind::TypeMismatch)?;

                self.enter_block(arena, slot, if condition { positive } else { negative })
            }
            Terminator::SwitchInt {
                discriminant,
                targets,
                otherwise,
            } => {
                let discriminant = self
                    .operand(arena, slot, &discriminant)?
                    .as_int()
                    .ok_or(TrapKind::TypeMismatch)?;

                let target = targets
                    .iter()
                    .find(|(value, _)| *value == discriminant)
                    .map(|(_, block)| *block)
                    .unwrap_or(otherwise);

                self.enter_block(arena, slot, target)
            }
            Terminator::Return { value } => {
                let value = match value {
                    Some(operand) => self.operand(arena, slot, &operand)?,
                    None => Value::Unit,
                };

                let finished = arena
                    .pop()
                    .unwrap_or_else(|| unreachable!("the executing frame is on the stack"));

                match arena.top_slot() {
                    Some(caller) => {
                        if let Some(register) = finished.return_to {
                            arena.frame_mut(caller).registers[register.index()] = value;
                        }
                        Ok(None)
                    }
                    None => Ok(Some(value)),
                }
            }
            Terminator::Unreachable => Err(TrapKind::Unreachable),
        }
    }

    fn enter_block(
        &self,
        arena: &mut FrameArena,
        slot: usize,
        target: BlockId,
    ) -> Result<Option<Value>, TrapKind> {
        let frame = arena.frame_mut(slot);
        frame.block = target;
        frame.pc = 0;

        Ok(None)
    }

    fn execute_instruction(
        &self,
        arena: &mut FrameArena,
        slot: usize,
        instruction: &Instruction,
    ) -> Result<(), TrapKind> {
        match instruction {
            Instruction::Move {
                destination,
                source,
            } => {
                let value = self.operand(arena, slot, source)?;
                self.write(arena, slot, *destination, value);
            }
            Instruction::UnaryOperation {
                operator,
                destination,
                operand,
            } => {
                let operand = self.operand(arena, slot, operand)?;
                let value = unary_operation(*operator, operand)?;
                self.write(arena, slot, *destination, value);
            }
            Instruction::BinaryOperation {
                operator,
                destination,
                lhs,
                rhs,
            } => {
                let lhs = self.operand(arena, slot, lhs)?;
                let rhs = self.operand(arena, slot, rhs)?;
                let value = binary_operation(*operator, lhs, rhs)?;
                self.write(arena, slot, *destination, value);
            }
            Instruction::LoadField {
                destination,
                source,
                field,
            } => {
                let source = self.read(arena, slot, *source);
                let value = load_field(&source, *field)?;
                self.write(arena, slot, *destination, value);
            }
            Instruction::StoreField {
                target,
                field,
                value,
            } => {
                let value = self.operand(arena, slot, value)?;
                let mut aggregate = self.read(arena, slot, *target);
                store_field(&mut aggregate, *field, value)?;
                self.write(arena, slot, *target, aggregate);
            }
            Instruction::Aggregate {
                destination,
                kind,
                operands,
            } => {
                let operands = operands
                    .iter()
                    .map(|operand| self.operand(arena, slot, operand))
                    .collect::<Result<Vec<_>, _>>()?;

                let value = match kind {
                    AggregateKind::Struct(adt) => Value::Struct {
                        adt: *adt,
                        fields: operands,
                    },
                    AggregateKind::Variant(adt, index) => Value::Enum {
                        adt: *adt,
                        tag: *index as i64,
                        payload: operands,
                    },
                    AggregateKind::Array(_) => Value::Array(operands),
                };

                self.write(arena, slot, *destination, value);
            }
            Instruction::Discriminant {
                destination,
                source,
            } => {
                let value = match self.read(arena, slot, *source) {
                    Value::Enum { tag, .. } => Value::Int(tag),
                    _ => return Err(TrapKind::TypeMismatch),
                };

                self.write(arena, slot, *destination, value);
            }
            Instruction::Ref {
                destination,
                source,
            } => {
                let frame = arena.frame(slot);
                let value = Value::Ref(FrameRef {
                    frame: FrameHandle {
                        slot,
                        generation: frame.generation,
                    },
                    register: *source,
                });

                self.write(arena, slot, *destination, value);
            }
            Instruction::Deref {
                destination,
                source,
            } => {
                let value = match self.operand(arena, slot, source)? {
                    Value::Ref(reference) => arena.read_ref(reference)?,
                    _ => return Err(TrapKind::TypeMismatch),
                };

                self.write(arena, slot, *destination, value);
            }
            Instruction::Cast {
                destination,
                operand,
            } => {
                let operand = self.operand(arena, slot, operand)?;
                let value = Value::Int(cast_to_int(&operand)?);
                self.write(arena, slot, *destination, value);
            }
            Instruction::Call {
                destination,
                callee,
                arguments,
            } => {
                let target = match callee {
                    Callee::Named(name) => {
                        self.unit
                            .function_id(*name)
                            .ok_or_else(|| TrapKind::UnresolvedCallee {
                                name: name.value().to_owned(),
                            })?
                    }
                    // a generated operation over an uninstantiated type
                    // parameter has no body to run
                    Callee::DeriveOf(operation, ty) => {
                        return Err(TrapKind::UnresolvedCallee {
                            name: format!("<{ty} as {operation}>"),
                        });
                    }
                };

                if arena.depth() >= self.settings.max_depth {
                    return Err(TrapKind::StackOverflow {
                        limit: self.settings.max_depth,
                    });
                }

                let arguments = arguments
                    .iter()
                    .map(|argument| self.operand(arena, slot, argument))
                    .collect::<Result<Vec<_>, _>>()?;

                let frame = self.new_frame(target, arguments, *destination)?;
                arena.push(frame);
            }
        }

        Ok(())
    }

    fn new_frame(
        &self,
        function: FuncId,
        arguments: Vec<Value>,
        return_to: Option<RegisterId>,
    ) -> Result<Frame, TrapKind> {
        let definition = self.unit.function(function);

        if arguments.len() != definition.parameters.len() {
            return Err(TrapKind::TypeMismatch);
        }

        let mut registers = vec![Value::Undefined; definition.registers.len()];
        for (register, argument) in definition.parameters.iter().zip(arguments) {
            registers[register.index()] = argument;
        }

        Ok(Frame {
            function,
            registers,
            block: Function::ENTRY_BLOCK,
            pc: 0,
            return_to,
            generation: 0,
        })
    }

    fn operand(
        &self,
        arena: &FrameArena,
        slot: usize,
        operand: &Operand,
    ) -> Result<Value, TrapKind> {
        match operand {
            Operand::Register(register) => Ok(self.read(arena, slot, *register)),
            Operand::Immediate(immediate) => Ok(match immediate {
                Immediate::Unit => Value::Unit,
                Immediate::Bool(value) => Value::Bool(*value),
                Immediate::Int(value) => Value::Int(*value),
                Immediate::Float(value) => Value::Float(*value),
                Immediate::Char(value) => Value::Char(*value),
                Immediate::Str(value) => Value::Str(value.value().to_owned()),
            }),
        }
    }

    fn read(&self, arena: &FrameArena, slot: usize, register: RegisterId) -> Value {
        arena.frame(slot).registers[register.index()].clone()
    }

    fn write(&self, arena: &mut FrameArena, slot: usize, register: RegisterId, value: Value) {
        arena.frame_mut(slot).registers[register.index()] = value;
    }
}

fn unary_operation(operator: UnaryOperator, operand: Value) -> Result<Value, TrapKind> {
    match (operator, operand) {
        (UnaryOperator::Negate, Value::Int(value)) => Ok(Value::Int(value.wrapping_neg())),
        (UnaryOperator::Negate, Value::Float(value)) => Ok(Value::Float(-value)),
        (UnaryOperator::Not, Value::Bool(value)) => Ok(Value::Bool(!value)),
        _ => Err(TrapKind::TypeMismatch),
    }
}

fn binary_operation(operator: BinaryOperator, lhs: Value, rhs: Value) -> Result<Value, TrapKind> {
    use BinaryOperator::*;

    match (lhs, rhs) {
        (Value::Int(lhs), Value::Int(rhs)) => match operator {
            Add => Ok(Value::Int(lhs.wrapping_add(rhs))),
            Subtract => Ok(Value::Int(lhs.wrapping_sub(rhs))),
            Multiply => Ok(Value::Int(lhs.wrapping_mul(rhs))),
            Divide => {
                if rhs == 0 {
                    return Err(TrapKind::DivideByZero);
                }
                Ok(Value::Int(lhs.wrapping_div(rhs)))
            }
            Modulo => {
                if rhs == 0 {
                    return Err(TrapKind::DivideByZero);
                }
                Ok(Value::Int(lhs.wrapping_rem(rhs)))
            }
            Equals => Ok(Value::Bool(lhs == rhs)),
            NotEquals => Ok(Value::Bool(lhs != rhs)),
            LessThan => Ok(Value::Bool(lhs < rhs)),
            LessThanOrEqualTo => Ok(Value::Bool(lhs <= rhs)),
            GreaterThan => Ok(Value::Bool(lhs > rhs)),
            GreaterThanOrEqualTo => Ok(Value::Bool(lhs >= rhs)),
            And | Or => Err(TrapKind::TypeMismatch),
        },
        (Value::Float(lhs), Value::Float(rhs)) => match operator {
            Add => Ok(Value::Float(lhs + rhs)),
            Subtract => Ok(Value::Float(lhs - rhs)),
            Multiply => Ok(Value::Float(lhs * rhs)),
            Divide => Ok(Value::Float(lhs / rhs)),
            Modulo => Ok(Value::Float(lhs % rhs)),
            Equals => Ok(Value::Bool(lhs == rhs)),
            NotEquals => Ok(Value::Bool(lhs != rhs)),
            LessThan => Ok(Value::Bool(lhs < rhs)),
            LessThanOrEqualTo => Ok(Value::Bool(lhs <= rhs)),
            GreaterThan => Ok(Value::Bool(lhs > rhs)),
            GreaterThanOrEqualTo => Ok(Value::Bool(lhs >= rhs)),
            And | Or => Err(TrapKind::TypeMismatch),
        },
        (Value::Bool(lhs), Value::Bool(rhs)) => match operator {
            And => Ok(Value::Bool(lhs && rhs)),
            Or => Ok(Value::Bool(lhs || rhs)),
            Equals => Ok(Value::Bool(lhs == rhs)),
            NotEquals => Ok(Value::Bool(lhs != rhs)),
            _ => Err(TrapKind::TypeMismatch),
        },
        (Value::Char(lhs), Value::Char(rhs)) => match operator {
            Equals => Ok(Value::Bool(lhs == rhs)),
            NotEquals => Ok(Value::Bool(lhs != rhs)),
            LessThan => Ok(Value::Bool(lhs < rhs)),
            LessThanOrEqualTo => Ok(Value::Bool(lhs <= rhs)),
            GreaterThan => Ok(Value::Bool(lhs > rhs)),
            GreaterThanOrEqualTo => Ok(Value::Bool(lhs >= rhs)),
            _ => Err(TrapKind::TypeMismatch),
        },
        (Value::Str(lhs), Value::Str(rhs)) => match operator {
            Add => Ok(Value::Str(lhs + &rhs)),
            Equals => Ok(Value::Bool(lhs == rhs)),
            NotEquals => Ok(Value::Bool(lhs != rhs)),
            LessThan => Ok(Value::Bool(lhs < rhs)),
            LessThanOrEqualTo => Ok(Value::Bool(lhs <= rhs)),
            GreaterThan => Ok(Value::Bool(lhs > rhs)),
            GreaterThanOrEqualTo => Ok(Value::Bool(lhs >= rhs)),
            _ => Err(TrapKind::TypeMismatch),
        },
        // all unit values are the same value
        (Value::Unit, Value::Unit) => match operator {
            Equals | LessThanOrEqualTo | GreaterThanOrEqualTo => Ok(Value::Bool(true)),
            NotEquals | LessThan | GreaterThan => Ok(Value::Bool(false)),
            _ => Err(TrapKind::TypeMismatch),
        },
        // references compare by identity
        (Value::Ref(lhs), Value::Ref(rhs)) => match operator {
            Equals => Ok(Value::Bool(lhs == rhs)),
            NotEquals => Ok(Value::Bool(lhs != rhs)),
            _ => Err(TrapKind::TypeMismatch),
        },
        _ => Err(TrapKind::TypeMismatch),
    }
}

fn load_field(source: &Value, field: usize) -> Result<Value, TrapKind> {
    let fields = aggregate_fields(source)?;

    fields.get(field).cloned().ok_or(TrapKind::OutOfBounds {
        index: field,
        length: fields.len(),
    })
}

fn store_field(target: &mut Value, field: usize, value: Value) -> Result<(), TrapKind> {
    let fields = aggregate_fields_mut(target)?;
    let length = fields.len();

    match fields.get_mut(field) {
        Some(slot) => {
            *slot = value;
            Ok(())
        }
        None => Err(TrapKind::OutOfBounds {
            index: field,
            length,
        }),
    }
}

fn aggregate_fields(value: &Value) -> Result<&[Value], TrapKind> {
    match value {
        Value::Struct { fields, .. } => Ok(fields),
        Value::Enum { payload, .. } => Ok(payload),
        Value::Array(elements) => Ok(elements),
        _ => Err(TrapKind::TypeMismatch),
    }
}

fn aggregate_fields_mut(value: &mut Value) -> Result<&mut Vec<Value>, TrapKind> {
    match value {
        Value::Struct { fields, .. } => Ok(fields),
        Value::Enum { payload, .. } => Ok(payload),
        Value::Array(elements) => Ok(elements),
        _ => Err(TrapKind::TypeMismatch),
    }
}

/// Integer representation used when hashing non-integer primitives
fn cast_to_int(value: &Value) -> Result<i64, TrapKind> {
    match value {
        Value::Int(value) => Ok(*value),
        Value::Bool(value) => Ok(*value as i64),
        Value::Char(value) => Ok(*value as i64),
        // -0.0 and 0.0 compare equal, so they must map to the same bits
        Value::Float(value) => {
            let value = if *value == 0.0 { 0.0 } else { *value };
            Ok(value.to_bits() as i64)
        }
        Value::Unit => Ok(0),
        // FNV-1a over the bytes
        Value::Str(value) => {
            let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
            for byte in value.bytes() {
                hash ^= u64::from(byte);
                hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
            }
            Ok(hash as i64)
        }
        _ => Err(TrapKind::TypeMismatch),
    }
}
