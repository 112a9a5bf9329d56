//! Generated structural hashing.
//!
//! `T__hash(value: T) -> int` folds every field into a seeded accumulator
//! (`acc = acc * 31 + field_hash`) in declaration order. For enums the tag
//! is mixed in before the payload so distinct variants with identical
//! payloads hash apart. Non-integer primitive fields are cast to an integer
//! representation before mixing.

use crate::middle::{
    hir::BinaryOperator,
    mir::{
        BlockId, Function, Immediate, Instruction, Operand, RegisterId, StructuralError,
        Terminator, builder::FunctionBuilder,
    },
    ty::{AdtDef, AdtId, AdtKind, AdtTable, DeriveKind, FieldDef, Type, TypeKind},
};

use super::{callee_for, new_builder};

/// Initial accumulator value. Part of the generated functions' observable
/// behavior, so changing it invalidates anything that persisted hashes.
pub const HASH_SEED: i64 = 0x9e37_79b9;

const HASH_MULTIPLIER: i64 = 31;

pub(super) fn generate(
    adts: &AdtTable,
    adt: AdtId,
    def: &AdtDef,
) -> Result<Function, StructuralError> {
    let mut builder = new_builder(adts, adt, def, DeriveKind::Hash, 1, Type::int());

    let value = builder.parameter(0);

    let accumulator = builder.allocate_register(Type::int());
    builder.push(Instruction::Move {
        destination: accumulator,
        source: Operand::Immediate(Immediate::Int(HASH_SEED)),
    })?;

    match &def.kind {
        AdtKind::Struct { fields } => {
            mix_fields(&mut builder, adts, value, accumulator, fields)?;
            builder.terminate(Terminator::Return {
                value: Some(Operand::Register(accumulator)),
            })?;
        }
        AdtKind::Enum { variants } => {
            let tag = builder.allocate_register(Type::int());
            builder.push(Instruction::Discriminant {
                destination: tag,
                source: value,
            })?;
            mix(&mut builder, accumulator, tag)?;

            let done = builder.create_block();
            let variant_blocks: Vec<BlockId> =
                variants.iter().map(|_| builder.create_block()).collect();
            let unmatched = builder.create_block();

            builder.terminate(Terminator::SwitchInt {
                discriminant: Operand::Register(tag),
                targets: variant_blocks
                    .iter()
                    .enumerate()
                    .map(|(tag, block)| (tag as i64, *block))
                    .collect(),
                otherwise: unmatched,
            })?;

            builder.switch_to_block(unmatched);
            builder.terminate(Terminator::Unreachable)?;

            for (variant, block) in variants.iter().zip(variant_blocks) {
                builder.switch_to_block(block);
                mix_fields(&mut builder, adts, value, accumulator, &variant.fields)?;
                builder.terminate(Terminator::Jump { target: done })?;
            }

            builder.switch_to_block(done);
            builder.terminate(Terminator::Return {
                value: Some(Operand::Register(accumulator)),
            })?;
        }
    }

    builder.finish()
}

fn mix_fields(
    builder: &mut FunctionBuilder,
    adts: &AdtTable,
    value: RegisterId,
    accumulator: RegisterId,
    fields: &[FieldDef],
) -> Result<(), StructuralError> {
    for (index, field) in fields.iter().enumerate() {
        let loaded = builder.allocate_register(field.ty.clone());
        builder.push(Instruction::LoadField {
            destination: loaded,
            source: value,
            field: index,
        })?;

        let field_hash = match callee_for(adts, &field.ty, DeriveKind::Hash) {
            Some(callee) => {
                let result = builder.allocate_register(Type::int());
                builder.push(Instruction::Call {
                    destination: Some(result),
                    callee,
                    arguments: vec![Operand::Register(loaded)],
                })?;
                result
            }
            None if matches!(&*field.ty, TypeKind::Int) => loaded,
            None => {
                let cast = builder.allocate_register(Type::int());
                builder.push(Instruction::Cast {
                    destination: cast,
                    operand: Operand::Register(loaded),
                })?;
                cast
            }
        };

        mix(builder, accumulator, field_hash)?;
    }

    Ok(())
}

/// acc = acc * 31 + value
fn mix(
    builder: &mut FunctionBuilder,
    accumulator: RegisterId,
    value: RegisterId,
) -> Result<(), StructuralError> {
    builder.push(Instruction::BinaryOperation {
        operator: BinaryOperator::Multiply,
        destination: accumulator,
        lhs: Operand::Register(accumulator),
        rhs: Operand::Immediate(Immediate::Int(HASH_MULTIPLIER)),
    })?;
    builder.push(Instruction::BinaryOperation {
        operator: BinaryOperator::Add,
        destination: accumulator,
        lhs: Operand::Register(accumulator),
        rhs: Operand::Register(value),
    })?;

    Ok(())
}
