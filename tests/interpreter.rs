//! Trap behavior and reference semantics of the evaluator, driven by
//! hand-built MIR so each test controls exactly what executes.

use tarnc::{
    index::Index,
    intern::InternedSymbol,
    interp::{EvalSettings, Interpreter, TrapKind, evaluate, value::Value},
    middle::{
        hir::BinaryOperator,
        mir::{
            Callee, Immediate, Instruction, Operand, StructuralError, Terminator, Unit,
            builder::FunctionBuilder,
        },
        ty::{AdtId, DeriveKind, Type},
    },
    span::Span,
};

fn sym(value: &str) -> InternedSymbol {
    InternedSymbol::new(value)
}

/// fn divide(a: int, b: int) -> int { a / b }
fn divide_unit() -> Unit {
    let mut builder = FunctionBuilder::new(
        sym("divide"),
        [Type::int(), Type::int()],
        Type::int(),
        Span::default(),
    );

    let result = builder.allocate_register(Type::int());
    builder
        .push(Instruction::BinaryOperation {
            operator: BinaryOperator::Divide,
            destination: result,
            lhs: Operand::Register(builder.parameter(0)),
            rhs: Operand::Register(builder.parameter(1)),
        })
        .unwrap();
    builder
        .terminate(Terminator::Return {
            value: Some(Operand::Register(result)),
        })
        .unwrap();

    let mut unit = Unit::new();
    unit.add_function(builder.finish().unwrap()).unwrap();
    unit.seal();
    unit
}

#[test]
fn division_works_and_division_by_zero_traps() {
    let unit = divide_unit();
    let entry = unit.function_id(sym("divide")).unwrap();

    let value = evaluate(&unit, entry, vec![Value::Int(84), Value::Int(2)]).unwrap();
    assert_eq!(value, Value::Int(42));

    let trap = evaluate(&unit, entry, vec![Value::Int(1), Value::Int(0)]).unwrap_err();
    assert_eq!(trap.kind, TrapKind::DivideByZero);
    assert_eq!(trap.function, sym("divide"));
}

#[test]
fn budget_exhaustion_traps_on_infinite_loops() {
    // fn spin() -> () { loop {} }
    let mut builder = FunctionBuilder::new(sym("spin"), [], Type::unit(), Span::default());
    let entry_block = builder.current_block();
    builder
        .terminate(Terminator::Jump {
            target: entry_block,
        })
        .unwrap();

    let mut unit = Unit::new();
    let entry = unit.add_function(builder.finish().unwrap()).unwrap();
    unit.seal();

    let settings = EvalSettings {
        instruction_budget: Some(1_000),
        max_depth: 16,
    };

    let trap = Interpreter::new(&unit, settings)
        .evaluate(entry, Vec::new())
        .unwrap_err();
    assert_eq!(trap.kind, TrapKind::BudgetExceeded { budget: 1_000 });
}

#[test]
fn unbounded_recursion_traps_at_the_depth_limit() {
    // fn forever() -> () { forever() }
    let mut builder = FunctionBuilder::new(sym("forever"), [], Type::unit(), Span::default());
    builder
        .push(Instruction::Call {
            destination: None,
            callee: Callee::Named(sym("forever")),
            arguments: Vec::new(),
        })
        .unwrap();
    builder
        .terminate(Terminator::Return { value: None })
        .unwrap();

    let mut unit = Unit::new();
    let entry = unit.add_function(builder.finish().unwrap()).unwrap();
    unit.seal();

    let settings = EvalSettings {
        instruction_budget: None,
        max_depth: 32,
    };

    let trap = Interpreter::new(&unit, settings)
        .evaluate(entry, Vec::new())
        .unwrap_err();
    assert_eq!(trap.kind, TrapKind::StackOverflow { limit: 32 });
}

#[test]
fn reaching_an_unreachable_terminator_traps() {
    let mut builder = FunctionBuilder::new(sym("oops"), [], Type::unit(), Span::default());
    builder.terminate(Terminator::Unreachable).unwrap();

    let mut unit = Unit::new();
    let entry = unit.add_function(builder.finish().unwrap()).unwrap();
    unit.seal();

    let trap = evaluate(&unit, entry, Vec::new()).unwrap_err();
    assert_eq!(trap.kind, TrapKind::Unreachable);
}

#[test]
fn references_read_back_within_the_owning_frame() {
    // fn read_through() -> int { let x = 41; let r = &x; *r + 1 }
    let mut builder =
        FunctionBuilder::new(sym("read_through"), [], Type::int(), Span::default());

    let x = builder
        .define(Type::int(), Operand::Immediate(Immediate::Int(41)))
        .unwrap();

    let pointer = builder.allocate_register(Type::pointer(Type::int()));
    builder
        .push(Instruction::Ref {
            destination: pointer,
            source: x,
        })
        .unwrap();

    let loaded = builder.allocate_register(Type::int());
    builder
        .push(Instruction::Deref {
            destination: loaded,
            source: Operand::Register(pointer),
        })
        .unwrap();

    let result = builder.allocate_register(Type::int());
    builder
        .push(Instruction::BinaryOperation {
            operator: BinaryOperator::Add,
            destination: result,
            lhs: Operand::Register(loaded),
            rhs: Operand::Immediate(Immediate::Int(1)),
        })
        .unwrap();
    builder
        .terminate(Terminator::Return {
            value: Some(Operand::Register(result)),
        })
        .unwrap();

    let mut unit = Unit::new();
    let entry = unit.add_function(builder.finish().unwrap()).unwrap();
    unit.seal();

    assert_eq!(evaluate(&unit, entry, Vec::new()).unwrap(), Value::Int(42));
}

#[test]
fn dereferencing_a_dead_frames_register_traps_as_stale() {
    // fn leak() -> *int { let x = 1; &x }
    let mut builder = FunctionBuilder::new(
        sym("leak"),
        [],
        Type::pointer(Type::int()),
        Span::default(),
    );
    let x = builder
        .define(Type::int(), Operand::Immediate(Immediate::Int(1)))
        .unwrap();
    let pointer = builder.allocate_register(Type::pointer(Type::int()));
    builder
        .push(Instruction::Ref {
            destination: pointer,
            source: x,
        })
        .unwrap();
    builder
        .terminate(Terminator::Return {
            value: Some(Operand::Register(pointer)),
        })
        .unwrap();
    let leak = builder.finish().unwrap();

    // fn use_after_return() -> int { *leak() }
    let mut builder =
        FunctionBuilder::new(sym("use_after_return"), [], Type::int(), Span::default());
    let pointer = builder.allocate_register(Type::pointer(Type::int()));
    builder
        .push(Instruction::Call {
            destination: Some(pointer),
            callee: Callee::Named(sym("leak")),
            arguments: Vec::new(),
        })
        .unwrap();
    let loaded = builder.allocate_register(Type::int());
    builder
        .push(Instruction::Deref {
            destination: loaded,
            source: Operand::Register(pointer),
        })
        .unwrap();
    builder
        .terminate(Terminator::Return {
            value: Some(Operand::Register(loaded)),
        })
        .unwrap();

    let mut unit = Unit::new();
    unit.add_function(leak).unwrap();
    let entry = unit.add_function(builder.finish().unwrap()).unwrap();
    unit.seal();

    let trap = evaluate(&unit, entry, Vec::new()).unwrap_err();
    assert_eq!(trap.kind, TrapKind::StaleReference);
    assert_eq!(trap.function, sym("use_after_return"));
}

#[test]
fn field_access_past_the_aggregate_bounds_traps() {
    let adt: AdtId = Index::new(0);

    // fn out_of_bounds(p: <struct>) -> int { p.5 }
    let mut builder = FunctionBuilder::new(
        sym("out_of_bounds"),
        [Type::adt(adt)],
        Type::int(),
        Span::default(),
    );
    let loaded = builder.allocate_register(Type::int());
    builder
        .push(Instruction::LoadField {
            destination: loaded,
            source: builder.parameter(0),
            field: 5,
        })
        .unwrap();
    builder
        .terminate(Terminator::Return {
            value: Some(Operand::Register(loaded)),
        })
        .unwrap();

    let mut unit = Unit::new();
    let entry = unit.add_function(builder.finish().unwrap()).unwrap();
    unit.seal();

    let argument = Value::Struct {
        adt,
        fields: vec![Value::Int(1)],
    };
    let trap = evaluate(&unit, entry, vec![argument]).unwrap_err();
    assert_eq!(trap.kind, TrapKind::OutOfBounds { index: 5, length: 1 });
}

#[test]
fn calling_an_uninstantiated_derive_traps_as_unresolved() {
    let parameter = Type::param(0, sym("T"));

    // the body a generic derive would produce before instantiation
    let mut builder =
        FunctionBuilder::new(sym("generic_eq"), [], Type::bool(), Span::default());
    let result = builder.allocate_register(Type::bool());
    builder
        .push(Instruction::Call {
            destination: Some(result),
            callee: Callee::DeriveOf(DeriveKind::Eq, parameter),
            arguments: Vec::new(),
        })
        .unwrap();
    builder
        .terminate(Terminator::Return {
            value: Some(Operand::Register(result)),
        })
        .unwrap();

    let mut unit = Unit::new();
    let entry = unit.add_function(builder.finish().unwrap()).unwrap();
    unit.seal();

    let trap = evaluate(&unit, entry, Vec::new()).unwrap_err();
    assert!(matches!(trap.kind, TrapKind::UnresolvedCallee { .. }));
}

#[test]
fn store_field_updates_only_the_targeted_copy() {
    let adt: AdtId = Index::new(0);

    // fn mutate(p: <struct>) -> int { let q = p; q.0 = 99; p.0 }
    let mut builder = FunctionBuilder::new(
        sym("mutate"),
        [Type::adt(adt)],
        Type::int(),
        Span::default(),
    );
    let p = builder.parameter(0);
    let q = builder
        .define(Type::adt(adt), Operand::Register(p))
        .unwrap();
    builder
        .push(Instruction::StoreField {
            target: q,
            field: 0,
            value: Operand::Immediate(Immediate::Int(99)),
        })
        .unwrap();
    let loaded = builder.allocate_register(Type::int());
    builder
        .push(Instruction::LoadField {
            destination: loaded,
            source: p,
            field: 0,
        })
        .unwrap();
    builder
        .terminate(Terminator::Return {
            value: Some(Operand::Register(loaded)),
        })
        .unwrap();

    let mut unit = Unit::new();
    let entry = unit.add_function(builder.finish().unwrap()).unwrap();
    unit.seal();

    let argument = Value::Struct {
        adt,
        fields: vec![Value::Int(7)],
    };
    // aggregates copy on move, so the original field is untouched
    assert_eq!(evaluate(&unit, entry, vec![argument]).unwrap(), Value::Int(7));
}

#[test]
fn sealed_units_reject_further_registration() {
    let mut unit = divide_unit();

    let mut builder = FunctionBuilder::new(sym("late"), [], Type::unit(), Span::default());
    builder
        .terminate(Terminator::Return { value: None })
        .unwrap();

    let error = unit.add_function(builder.finish().unwrap()).unwrap_err();
    assert_eq!(error, StructuralError::SealedUnit);
}

#[test]
fn duplicate_function_names_are_rejected() {
    let mut unit = Unit::new();

    for _ in 0..2 {
        let mut builder = FunctionBuilder::new(sym("twin"), [], Type::unit(), Span::default());
        builder
            .terminate(Terminator::Return { value: None })
            .unwrap();

        match unit.add_function(builder.finish().unwrap()) {
            Ok(_) => {}
            Err(error) => {
                assert_eq!(error, StructuralError::DuplicateFunction(sym("twin")));
                return;
            }
        }
    }

    panic!("second registration should have failed");
}
