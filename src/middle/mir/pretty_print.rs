//! Human-readable MIR dumps, used by the `--dump-mir` driver flag and a few
//! tests that assert on structure.

use colored::Colorize;
use itertools::Itertools;

use crate::{
    index::Index,
    middle::{
        mir::{
            AggregateKind, Block, BlockId, Callee, Function, Immediate, Instruction, Operand,
            RegisterId, Terminator, Unit,
        },
        ty::AdtTable,
    },
};

pub fn pretty_print_unit(unit: &Unit, adts: &AdtTable) -> String {
    unit.iter()
        .map(|(_, function)| pretty_print_function(function, adts))
        .join("\n")
}

pub fn pretty_print_function(function: &Function, adts: &AdtTable) -> String {
    let mut output = String::new();

    let parameters = function
        .parameters
        .iter()
        .map(|register| {
            format!(
                "{}: {}",
                display_register(*register),
                adts.display_type(function.register_type(*register))
            )
        })
        .join(", ");

    output.push_str(&format!(
        "{} {}({parameters}) -> {} {{\n",
        "fn".purple(),
        function.name.value().cyan(),
        adts.display_type(&function.return_type)
    ));

    for (id, block) in function.blocks.enumerate() {
        output.push_str(&pretty_print_block(id, block, adts));
    }

    output.push_str("}\n");
    output
}

fn pretty_print_block(id: BlockId, block: &Block, adts: &AdtTable) -> String {
    let mut output = String::new();

    output.push_str(&format!("{}:\n", display_block(id).green()));

    for instruction in &block.instructions {
        output.push_str(&format!("    {}\n", display_instruction(instruction, adts)));
    }

    output.push_str(&format!("    {}\n", display_terminator(&block.terminator)));
    output
}

fn display_register(register: RegisterId) -> String {
    format!("%{}", register.index())
}

fn display_block(block: BlockId) -> String {
    format!("bb{}", block.index())
}

fn display_operand(operand: &Operand) -> String {
    match operand {
        Operand::Register(register) => display_register(*register),
        Operand::Immediate(immediate) => display_immediate(immediate),
    }
}

fn display_immediate(immediate: &Immediate) -> String {
    match immediate {
        Immediate::Unit => "()".to_owned(),
        Immediate::Bool(value) => value.to_string(),
        Immediate::Int(value) => value.to_string(),
        Immediate::Float(value) => format!("{value:?}"),
        Immediate::Char(value) => format!("{value:?}"),
        Immediate::Str(value) => format!("{:?}", value.value()),
    }
}

fn display_callee(callee: &Callee) -> String {
    match callee {
        Callee::Named(name) => name.value().to_owned(),
        Callee::DeriveOf(kind, ty) => format!("<{ty} as {kind}>"),
    }
}

fn display_instruction(instruction: &Instruction, adts: &AdtTable) -> String {
    match instruction {
        Instruction::Move {
            destination,
            source,
        } => format!(
            "{} = {}",
            display_register(*destination),
            display_operand(source)
        ),
        Instruction::UnaryOperation {
            operator,
            destination,
            operand,
        } => format!(
            "{} = {} {}",
            display_register(*destination),
            operator.to_string().blue(),
            display_operand(operand)
        ),
        Instruction::BinaryOperation {
            operator,
            destination,
            lhs,
            rhs,
        } => format!(
            "{} = {} {}, {}",
            display_register(*destination),
            operator.to_string().blue(),
            display_operand(lhs),
            display_operand(rhs)
        ),
        Instruction::LoadField {
            destination,
            source,
            field,
        } => format!(
            "{} = {}.{field}",
            display_register(*destination),
            display_register(*source)
        ),
        Instruction::StoreField {
            target,
            field,
            value,
        } => format!(
            "{}.{field} = {}",
            display_register(*target),
            display_operand(value)
        ),
        Instruction::Aggregate {
            destination,
            kind,
            operands,
        } => {
            let kind = match kind {
                AggregateKind::Struct(id) => adts.get(*id).name.value().to_owned(),
                AggregateKind::Variant(id, index) => {
                    let def = adts.get(*id);
                    let variant = &def.variants().unwrap_or(&[])[*index];
                    format!("{}::{}", def.name, variant.name)
                }
                AggregateKind::Array(ty) => format!("[{}]", adts.display_type(ty)),
            };

            format!(
                "{} = {} {{ {} }}",
                display_register(*destination),
                kind.cyan(),
                operands.iter().map(display_operand).join(", ")
            )
        }
        Instruction::Discriminant {
            destination,
            source,
        } => format!(
            "{} = {} {}",
            display_register(*destination),
            "discriminant".blue(),
            display_register(*source)
        ),
        Instruction::Ref {
            destination,
            source,
        } => format!(
            "{} = &{}",
            display_register(*destination),
            display_register(*source)
        ),
        Instruction::Deref {
            destination,
            source,
        } => format!(
            "{} = *{}",
            display_register(*destination),
            display_operand(source)
        ),
        Instruction::Cast {
            destination,
            operand,
        } => format!(
            "{} = {} {}",
            display_register(*destination),
            "cast".blue(),
            display_operand(operand)
        ),
        Instruction::Call {
            destination,
            callee,
            arguments,
        } => {
            let arguments = arguments.iter().map(display_operand).join(", ");
            let call = format!("{} {}({arguments})", "call".blue(), display_callee(callee));

            match destination {
                Some(destination) => format!("{} = {call}", display_register(*destination)),
                None => call,
            }
        }
    }
}

fn display_terminator(terminator: &Terminator) -> String {
    match terminator {
        Terminator::Jump { target } => {
            format!("{} {}", "jump".purple(), display_block(*target).green())
        }
        Terminator::Branch {
            condition,
            positive,
            negative,
        } => format!(
            "{} {}, {}, {}",
            "branch".purple(),
            display_operand(condition),
            display_block(*positive).green(),
            display_block(*negative).green()
        ),
        Terminator::SwitchInt {
            discriminant,
            targets,
            otherwise,
        } => {
            let targets = targets
                .iter()
                .map(|(value, block)| format!("{value} => {}", display_block(*block).green()))
                .join(", ");

            format!(
                "{} {} [{targets}, otherwise => {}]",
                "switch".purple(),
                display_operand(discriminant),
                display_block(*otherwise).green()
            )
        }
        Terminator::Return { value } => match value {
            Some(value) => format!("{} {}", "return".purple(), display_operand(value)),
            None => "return".purple().to_string(),
        },
        Terminator::Unreachable => "unreachable".purple().to_string(),
    }
}
