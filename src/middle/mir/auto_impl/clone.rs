//! Generated cloning.
//!
//! `T__clone(value: T) -> T` rebuilds the aggregate field by field, calling
//! the nested clone for aggregate fields. Pointer fields are copied
//! shallowly: the clone aliases the original referent.

use crate::middle::{
    mir::{
        AggregateKind, BlockId, Function, Instruction, Operand, RegisterId, StructuralError,
        Terminator, builder::FunctionBuilder,
    },
    ty::{AdtDef, AdtId, AdtKind, AdtTable, DeriveKind, FieldDef, Type},
};

use super::{callee_for, new_builder};

pub(super) fn generate(
    adts: &AdtTable,
    adt: AdtId,
    def: &AdtDef,
) -> Result<Function, StructuralError> {
    let mut builder = new_builder(adts, adt, def, DeriveKind::Clone, 1, Type::adt(adt));

    let value = builder.parameter(0);

    match &def.kind {
        AdtKind::Struct { fields } => {
            let cloned = clone_fields(&mut builder, adts, value, fields)?;

            let result = builder.allocate_register(Type::adt(adt));
            builder.push(Instruction::Aggregate {
                destination: result,
                kind: AggregateKind::Struct(adt),
                operands: cloned.into_iter().map(Operand::Register).collect(),
            })?;
            builder.terminate(Terminator::Return {
                value: Some(Operand::Register(result)),
            })?;
        }
        AdtKind::Enum { variants } => {
            // no variants means no values to clone
            if variants.is_empty() {
                builder.terminate(Terminator::Unreachable)?;
                return builder.finish();
            }

            let result = builder.allocate_register(Type::adt(adt));

            let tag = builder.allocate_register(Type::int());
            builder.push(Instruction::Discriminant {
                destination: tag,
                source: value,
            })?;

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

            for (index, (variant, block)) in variants.iter().zip(variant_blocks).enumerate() {
                builder.switch_to_block(block);

                let cloned = clone_fields(&mut builder, adts, value, &variant.fields)?;
                builder.push(Instruction::Aggregate {
                    destination: result,
                    kind: AggregateKind::Variant(adt, index),
                    operands: cloned.into_iter().map(Operand::Register).collect(),
                })?;
                builder.terminate(Terminator::Jump { target: done })?;
            }

            builder.switch_to_block(done);
            builder.terminate(Terminator::Return {
                value: Some(Operand::Register(result)),
            })?;
        }
    }

    builder.finish()
}

fn clone_fields(
    builder: &mut FunctionBuilder,
    adts: &AdtTable,
    value: RegisterId,
    fields: &[FieldDef],
) -> Result<Vec<RegisterId>, StructuralError> {
    let mut cloned = Vec::with_capacity(fields.len());

    for (index, field) in fields.iter().enumerate() {
        let loaded = builder.allocate_register(field.ty.clone());
        builder.push(Instruction::LoadField {
            destination: loaded,
            source: value,
            field: index,
        })?;

        let register = match callee_for(adts, &field.ty, DeriveKind::Clone) {
            Some(callee) => {
                let result = builder.allocate_register(field.ty.clone());
                builder.push(Instruction::Call {
                    destination: Some(result),
                    callee,
                    arguments: vec![Operand::Register(loaded)],
                })?;
                result
            }
            // primitives copy by value, pointers copy the handle
            None => loaded,
        };

        cloned.push(register);
    }

    Ok(cloned)
}
