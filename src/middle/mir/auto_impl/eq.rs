//! Generated structural equality.
//!
//! `T__op_eq(a: T, b: T) -> bool` compares field by field in declaration
//! order and short-circuits on the first mismatch. For enums the tags are
//! compared first; payloads are only inspected when the tags agree.

use crate::{
    middle::{
        mir::{
            BlockId, Function, Instruction, Operand, StructuralError, Terminator,
            builder::FunctionBuilder,
        },
        ty::{AdtDef, AdtId, AdtKind, AdtTable, DeriveKind, FieldDef, Type},
    },
};

use super::{callee_for, new_builder};

pub(super) fn generate(
    adts: &AdtTable,
    adt: AdtId,
    def: &AdtDef,
) -> Result<Function, StructuralError> {
    let mut builder = new_builder(adts, adt, def, DeriveKind::Eq, 2, Type::bool());

    let ret_true = builder.create_block();
    let ret_false = builder.create_block();

    let a = builder.parameter(0);
    let b = builder.parameter(1);

    match &def.kind {
        AdtKind::Struct { fields } => {
            compare_fields(&mut builder, adts, a, b, fields, ret_false)?;
            builder.terminate(Terminator::Jump { target: ret_true })?;
        }
        AdtKind::Enum { variants } => {
            let tag_a = builder.allocate_register(Type::int());
            builder.push(Instruction::Discriminant {
                destination: tag_a,
                source: a,
            })?;

            let tag_b = builder.allocate_register(Type::int());
            builder.push(Instruction::Discriminant {
                destination: tag_b,
                source: b,
            })?;

            let tags_equal = builder.allocate_register(Type::bool());
            builder.push(Instruction::BinaryOperation {
                operator: crate::middle::hir::BinaryOperator::Equals,
                destination: tags_equal,
                lhs: Operand::Register(tag_a),
                rhs: Operand::Register(tag_b),
            })?;

            let dispatch = builder.create_block();
            builder.terminate(Terminator::Branch {
                condition: Operand::Register(tags_equal),
                positive: dispatch,
                negative: ret_false,
            })?;

            let variant_blocks: Vec<BlockId> =
                variants.iter().map(|_| builder.create_block()).collect();

            let unmatched = builder.create_block();
            builder.switch_to_block(unmatched);
            builder.terminate(Terminator::Unreachable)?;

            builder.switch_to_block(dispatch);
            builder.terminate(Terminator::SwitchInt {
                discriminant: Operand::Register(tag_a),
                targets: variant_blocks
                    .iter()
                    .enumerate()
                    .map(|(tag, block)| (tag as i64, *block))
                    .collect(),
                otherwise: unmatched,
            })?;

            for (variant, block) in variants.iter().zip(variant_blocks) {
                builder.switch_to_block(block);
                compare_fields(&mut builder, adts, a, b, &variant.fields, ret_false)?;
                builder.terminate(Terminator::Jump { target: ret_true })?;
            }
        }
    }

    builder.switch_to_block(ret_true);
    builder.terminate(Terminator::Return {
        value: Some(Operand::Immediate(crate::middle::mir::Immediate::Bool(true))),
    })?;

    builder.switch_to_block(ret_false);
    builder.terminate(Terminator::Return {
        value: Some(Operand::Immediate(crate::middle::mir::Immediate::Bool(
            false,
        ))),
    })?;

    builder.finish()
}

/// Emits the short-circuit comparison chain for one run of fields, leaving
/// the builder parked in the all-equal continuation block
fn compare_fields(
    builder: &mut FunctionBuilder,
    adts: &AdtTable,
    a: crate::middle::mir::RegisterId,
    b: crate::middle::mir::RegisterId,
    fields: &[FieldDef],
    on_not_equal: BlockId,
) -> Result<(), StructuralError> {
    for (index, field) in fields.iter().enumerate() {
        let lhs = builder.allocate_register(field.ty.clone());
        builder.push(Instruction::LoadField {
            destination: lhs,
            source: a,
            field: index,
        })?;

        let rhs = builder.allocate_register(field.ty.clone());
        builder.push(Instruction::LoadField {
            destination: rhs,
            source: b,
            field: index,
        })?;

        let equal = builder.allocate_register(Type::bool());

        match callee_for(adts, &field.ty, DeriveKind::Eq) {
            Some(callee) => {
                builder.push(Instruction::Call {
                    destination: Some(equal),
                    callee,
                    arguments: vec![Operand::Register(lhs), Operand::Register(rhs)],
                })?;
            }
            // primitives and pointers compare inline
            None => {
                builder.push(Instruction::BinaryOperation {
                    operator: crate::middle::hir::BinaryOperator::Equals,
                    destination: equal,
                    lhs: Operand::Register(lhs),
                    rhs: Operand::Register(rhs),
                })?;
            }
        }

        let next = builder.create_block();
        builder.terminate(Terminator::Branch {
            condition: Operand::Register(equal),
            positive: next,
            negative: on_not_equal,
        })?;
        builder.switch_to_block(next);
    }

    Ok(())
}
