//! Generated total ordering.
//!
//! `T__op_cmp(a: T, b: T) -> int` returns a negative, zero, or positive
//! value, comparing fields lexicographically in declaration order. Enum
//! variants order by declaration index first, so any value of an earlier
//! variant sorts before every value of a later one; payloads only break
//! ties between values of the same variant.

use crate::middle::{
    hir::BinaryOperator,
    mir::{
        BlockId, Function, Immediate, Instruction, Operand, RegisterId, StructuralError,
        Terminator, builder::FunctionBuilder,
    },
    ty::{AdtDef, AdtId, AdtKind, AdtTable, DeriveKind, FieldDef, Type},
};

use super::{callee_for, new_builder};

struct Outcomes {
    ret_less: BlockId,
    ret_greater: BlockId,
    ret_equal: BlockId,
}

pub(super) fn generate(
    adts: &AdtTable,
    adt: AdtId,
    def: &AdtDef,
) -> Result<Function, StructuralError> {
    let mut builder = new_builder(adts, adt, def, DeriveKind::Ord, 2, Type::int());

    let outcomes = Outcomes {
        ret_less: builder.create_block(),
        ret_greater: builder.create_block(),
        ret_equal: builder.create_block(),
    };

    let a = builder.parameter(0);
    let b = builder.parameter(1);

    match &def.kind {
        AdtKind::Struct { fields } => {
            compare_fields(&mut builder, adts, a, b, fields, &outcomes)?;
            builder.terminate(Terminator::Jump {
                target: outcomes.ret_equal,
            })?;
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

            compare_scalars(&mut builder, tag_a, tag_b, &outcomes)?;

            // tags agree, order by payload
            let variant_blocks: Vec<BlockId> =
                variants.iter().map(|_| builder.create_block()).collect();

            let unmatched = builder.create_block();

            builder.terminate(Terminator::SwitchInt {
                discriminant: Operand::Register(tag_a),
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
                compare_fields(&mut builder, adts, a, b, &variant.fields, &outcomes)?;
                builder.terminate(Terminator::Jump {
                    target: outcomes.ret_equal,
                })?;
            }
        }
    }

    for (block, value) in [
        (outcomes.ret_less, -1),
        (outcomes.ret_greater, 1),
        (outcomes.ret_equal, 0),
    ] {
        builder.switch_to_block(block);
        builder.terminate(Terminator::Return {
            value: Some(Operand::Immediate(Immediate::Int(value))),
        })?;
    }

    builder.finish()
}

fn compare_fields(
    builder: &mut FunctionBuilder,
    adts: &AdtTable,
    a: RegisterId,
    b: RegisterId,
    fields: &[FieldDef],
    outcomes: &Outcomes,
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

        match callee_for(adts, &field.ty, DeriveKind::Ord) {
            Some(callee) => {
                let ordering = builder.allocate_register(Type::int());
                builder.push(Instruction::Call {
                    destination: Some(ordering),
                    callee,
                    arguments: vec![Operand::Register(lhs), Operand::Register(rhs)],
                })?;

                let is_equal = builder.allocate_register(Type::bool());
                builder.push(Instruction::BinaryOperation {
                    operator: BinaryOperator::Equals,
                    destination: is_equal,
                    lhs: Operand::Register(ordering),
                    rhs: Operand::Immediate(Immediate::Int(0)),
                })?;

                // propagate the nested ordering unchanged
                let propagate = builder.create_block();
                let next = builder.create_block();
                builder.terminate(Terminator::Branch {
                    condition: Operand::Register(is_equal),
                    positive: next,
                    negative: propagate,
                })?;

                builder.switch_to_block(propagate);
                builder.terminate(Terminator::Return {
                    value: Some(Operand::Register(ordering)),
                })?;

                builder.switch_to_block(next);
            }
            None => {
                compare_scalars(builder, lhs, rhs, outcomes)?;
            }
        }
    }

    Ok(())
}

/// Emits `a < b -> less; a > b -> greater; fall through when equal`, leaving
/// the builder parked in the fall-through block
fn compare_scalars(
    builder: &mut FunctionBuilder,
    lhs: RegisterId,
    rhs: RegisterId,
    outcomes: &Outcomes,
) -> Result<(), StructuralError> {
    let less = builder.allocate_register(Type::bool());
    builder.push(Instruction::BinaryOperation {
        operator: BinaryOperator::LessThan,
        destination: less,
        lhs: Operand::Register(lhs),
        rhs: Operand::Register(rhs),
    })?;

    let check_greater = builder.create_block();
    builder.terminate(Terminator::Branch {
        condition: Operand::Register(less),
        positive: outcomes.ret_less,
        negative: check_greater,
    })?;
    builder.switch_to_block(check_greater);

    let greater = builder.allocate_register(Type::bool());
    builder.push(Instruction::BinaryOperation {
        operator: BinaryOperator::GreaterThan,
        destination: greater,
        lhs: Operand::Register(lhs),
        rhs: Operand::Register(rhs),
    })?;

    let next = builder.create_block();
    builder.terminate(Terminator::Branch {
        condition: Operand::Register(greater),
        positive: outcomes.ret_greater,
        negative: next,
    })?;
    builder.switch_to_block(next);

    Ok(())
}
