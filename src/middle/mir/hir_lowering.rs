//! Lowering from the typed tree to MIR.
//!
//! Runs in two passes over a module. The first pass registers every function
//! signature, the declared ones and the derive-generated ones alike, into a
//! symbol table; the second generates the requested automatic
//! implementations and lowers every declared body against that table, so
//! mutual recursion and calls into not-yet-lowered functions resolve without
//! any fixup step. Failures surface as diagnostics; a body that fails to
//! lower is skipped while the rest of the module proceeds.

use std::collections::BTreeMap;

use hashbrown::HashMap;

use crate::{
    diagnostics::{Diagnostic, DiagnosticEngine, codes},
    intern::InternedSymbol,
    middle::{
        hir::{
            self, AssignTarget, Expression, ExpressionKind, Literal, Statement, StatementKind,
        },
        mir::{
            AggregateKind, BlockId, Callee, Immediate, Instruction, Operand, RegisterId,
            StructuralError, Terminator, Unit,
            auto_impl::{AutoImplGenerator, DeriveError, DeriveRequest, derive_symbol},
            builder::FunctionBuilder,
        },
        ty::{DeriveKind, Type},
    },
    span::Span,
};

#[derive(Debug, Clone)]
struct Signature {
    parameter_types: Vec<Type>,
    return_type: Type,
    span: Span,
}

#[derive(Debug, thiserror::Error)]
enum LoweringError {
    #[error("cannot find `{name}` in this scope")]
    UnresolvedName { name: InternedSymbol, span: Span },
    #[error("cannot find function `{name}`")]
    UnresolvedCallee { name: InternedSymbol, span: Span },
    #[error(transparent)]
    Structural(#[from] StructuralError),
}

/// Lowers a whole module, reporting problems through `diagnostics`. The
/// returned unit is sealed; callers should check `diagnostics.has_errors()`
/// before trusting it.
pub fn lower_module(module: &hir::Module, diagnostics: &DiagnosticEngine) -> Unit {
    let mut unit = Unit::new();
    let mut symbols: BTreeMap<InternedSymbol, Signature> = BTreeMap::new();

    // pass 1: signatures
    for function in &module.functions {
        let signature = Signature {
            parameter_types: function.parameters.iter().map(|p| p.ty.clone()).collect(),
            return_type: function.return_type.clone(),
            span: function.span,
        };

        if let Some(previous) = symbols.insert(function.name, signature) {
            diagnostics.emit(
                Diagnostic::error(
                    codes::DUPLICATE_DEFINITION,
                    function.span,
                    format!("a function named `{}` is already defined", function.name),
                )
                .with_label(previous.span, "previous definition"),
            );
        }
    }

    let mut requests = Vec::new();

    for (adt, def) in module.adts.iter() {
        for operation in &def.derives {
            let name = derive_symbol(&module.adts, adt, *operation);
            let ty = Type::adt(adt);

            let (parameter_types, return_type) = match operation {
                DeriveKind::Eq => (vec![ty.clone(), ty], Type::bool()),
                DeriveKind::Ord => (vec![ty.clone(), ty], Type::int()),
                DeriveKind::Hash => (vec![ty], Type::int()),
                DeriveKind::Clone => (vec![ty.clone()], ty),
            };

            symbols.insert(
                name,
                Signature {
                    parameter_types,
                    return_type,
                    span: def.span,
                },
            );

            requests.push(DeriveRequest {
                adt,
                operation: *operation,
            });
        }
    }

    // pass 2: derive generation, then bodies
    let generator = AutoImplGenerator::new(&module.adts);

    for request in requests {
        match generator.generate(request) {
            Ok(function) => {
                if let Err(error) = unit.add_function(function) {
                    emit_structural(diagnostics, &error, module.adts.get(request.adt).span);
                }
            }
            Err(error) => emit_derive_error(diagnostics, &error),
        }
    }

    for function in &module.functions {
        let context = FunctionLoweringContext::new(&symbols, function);

        match context.lower() {
            Ok(lowered) => {
                if let Err(error) = unit.add_function(lowered) {
                    emit_structural(diagnostics, &error, function.span);
                }
            }
            Err(error) => emit_lowering_error(diagnostics, &error, function.span),
        }
    }

    unit.seal();

    log::debug!(
        "lowering: produced {} function(s), {} error(s)",
        unit.len(),
        diagnostics.error_count()
    );

    unit
}

fn emit_structural(diagnostics: &DiagnosticEngine, error: &StructuralError, span: Span) {
    let code = match error {
        StructuralError::DanglingReference(_) => codes::DANGLING_REFERENCE,
        StructuralError::SealedUnit => codes::SEALED_UNIT,
        StructuralError::DuplicateFunction(_) => codes::DUPLICATE_DEFINITION,
        _ => codes::DANGLING_REFERENCE,
    };

    diagnostics.emit(Diagnostic::error(code, span, error.to_string()));
}

fn emit_derive_error(diagnostics: &DiagnosticEngine, error: &DeriveError) {
    match error {
        DeriveError::MissingOperation { span, .. } => {
            diagnostics.emit(Diagnostic::error(
                codes::MISSING_OPERATION,
                *span,
                error.to_string(),
            ));
        }
        DeriveError::RecursiveLayout { span, .. } => {
            diagnostics.emit(Diagnostic::error(
                codes::RECURSIVE_LAYOUT,
                *span,
                error.to_string(),
            ));
        }
        DeriveError::Structural(structural) => {
            emit_structural(diagnostics, structural, Span::default())
        }
    }
}

fn emit_lowering_error(diagnostics: &DiagnosticEngine, error: &LoweringError, function: Span) {
    match error {
        LoweringError::UnresolvedName { span, .. } => {
            diagnostics.emit(Diagnostic::error(
                codes::UNRESOLVED_NAME,
                *span,
                error.to_string(),
            ));
        }
        LoweringError::UnresolvedCallee { span, .. } => {
            diagnostics.emit(Diagnostic::error(
                codes::UNRESOLVED_CALLEE,
                *span,
                error.to_string(),
            ));
        }
        LoweringError::Structural(structural) => emit_structural(diagnostics, structural, function),
    }
}

struct FunctionLoweringContext<'a> {
    symbols: &'a BTreeMap<InternedSymbol, Signature>,
    function: &'a hir::Function,
    builder: FunctionBuilder,
    /// Innermost scope last. Bindings shadow outward; a block's bindings die
    /// with the block.
    scopes: Vec<HashMap<InternedSymbol, RegisterId>>,
}

impl<'a> FunctionLoweringContext<'a> {
    fn new(
        symbols: &'a BTreeMap<InternedSymbol, Signature>,
        function: &'a hir::Function,
    ) -> Self {
        let builder = FunctionBuilder::new(
            function.name,
            function.parameters.iter().map(|p| p.ty.clone()),
            function.return_type.clone(),
            function.span,
        );

        Self {
            symbols,
            function,
            builder,
            scopes: Vec::new(),
        }
    }

    fn lower(mut self) -> Result<crate::middle::mir::Function, LoweringError> {
        let function = self.function;

        self.push_scope();

        for (index, parameter) in function.parameters.iter().enumerate() {
            let register = self.builder.parameter(index);
            self.bind(parameter.name, register);
        }

        let tail = self.lower_block(&function.body)?;

        if !self.builder.is_terminated(self.builder.current_block()) {
            let value = match tail {
                Some(value) => Some(value),
                None if function.return_type.is_unit() => None,
                // every path already returned; this block is only reachable
                // on paper
                None => return self.finish_unreachable(),
            };

            self.builder.terminate(Terminator::Return { value })?;
        }

        self.pop_scope();

        Ok(self.builder.finish()?)
    }

    fn finish_unreachable(mut self) -> Result<crate::middle::mir::Function, LoweringError> {
        self.builder.terminate(Terminator::Unreachable)?;
        Ok(self.builder.finish()?)
    }

    fn lower_block(&mut self, block: &hir::Block) -> Result<Option<Operand>, LoweringError> {
        self.push_scope();

        for statement in &block.statements {
            self.lower_statement(statement)?;

            // an explicit return terminated the current block; anything after
            // it is dead and lowered into a fresh unreachable block
            if self.builder.is_terminated(self.builder.current_block()) {
                let dead = self.builder.create_block();
                self.builder.switch_to_block(dead);
            }
        }

        let tail = match &block.tail {
            Some(expression) => Some(self.lower_expression(expression)?),
            None => None,
        };

        self.pop_scope();

        Ok(tail)
    }

    fn lower_statement(&mut self, statement: &Statement) -> Result<(), LoweringError> {
        match &statement.kind {
            StatementKind::Let { name, initializer } => {
                let value = self.lower_expression(initializer)?;
                let register = self.builder.define(initializer.ty.clone(), value)?;
                self.bind(*name, register);
            }
            StatementKind::Assign { target, value } => {
                let value = self.lower_expression(value)?;

                match target {
                    AssignTarget::Variable(name) => {
                        let register = self.lookup(*name, statement.span)?;
                        self.builder.push(Instruction::Move {
                            destination: register,
                            source: value,
                        })?;
                    }
                    AssignTarget::Field { base, field_index } => {
                        let register = self.lookup(*base, statement.span)?;
                        self.builder.push(Instruction::StoreField {
                            target: register,
                            field: *field_index,
                            value,
                        })?;
                    }
                }
            }
            StatementKind::While { condition, block } => {
                let condition_block = self.builder.create_block();
                let body_block = self.builder.create_block();
                let after_block = self.builder.create_block();

                self.builder.terminate(Terminator::Jump {
                    target: condition_block,
                })?;

                self.builder.switch_to_block(condition_block);
                let condition = self.lower_expression(condition)?;
                self.builder.terminate(Terminator::Branch {
                    condition,
                    positive: body_block,
                    negative: after_block,
                })?;

                self.builder.switch_to_block(body_block);
                self.lower_block(block)?;
                if !self.builder.is_terminated(self.builder.current_block()) {
                    self.builder.terminate(Terminator::Jump {
                        target: condition_block,
                    })?;
                }

                self.builder.switch_to_block(after_block);
            }
            StatementKind::Expression(expression) => {
                self.lower_expression(expression)?;
            }
            StatementKind::Return(value) => {
                let value = match value {
                    Some(expression) => Some(self.lower_expression(expression)?),
                    None => None,
                };

                self.builder.terminate(Terminator::Return { value })?;
            }
        }

        Ok(())
    }

    fn lower_expression(&mut self, expression: &Expression) -> Result<Operand, LoweringError> {
        match &expression.kind {
            ExpressionKind::Literal(literal) => Ok(Operand::Immediate(match literal {
                Literal::Unit => Immediate::Unit,
                Literal::Bool(value) => Immediate::Bool(*value),
                Literal::Int(value) => Immediate::Int(*value),
                Literal::Float(value) => Immediate::Float(*value),
                Literal::Char(value) => Immediate::Char(*value),
                Literal::Str(value) => Immediate::Str(*value),
            })),
            ExpressionKind::Variable(name) => {
                let register = self.lookup(*name, expression.span)?;
                Ok(Operand::Register(register))
            }
            ExpressionKind::Unary { operator, operand } => {
                let operand = self.lower_expression(operand)?;
                let destination = self.builder.allocate_register(expression.ty.clone());

                self.builder.push(Instruction::UnaryOperation {
                    operator: *operator,
                    destination,
                    operand,
                })?;

                Ok(Operand::Register(destination))
            }
            ExpressionKind::Binary { operator, lhs, rhs } => {
                let lhs = self.lower_expression(lhs)?;
                let rhs = self.lower_expression(rhs)?;
                let destination = self.builder.allocate_register(expression.ty.clone());

                self.builder.push(Instruction::BinaryOperation {
                    operator: *operator,
                    destination,
                    lhs,
                    rhs,
                })?;

                Ok(Operand::Register(destination))
            }
            ExpressionKind::FieldAccess { base, field_index } => {
                let base_ty = base.ty.clone();
                let base = self.lower_expression(base)?;
                let source = self.ensure_register(base_ty, base)?;
                let destination = self.builder.allocate_register(expression.ty.clone());

                self.builder.push(Instruction::LoadField {
                    destination,
                    source,
                    field: *field_index,
                })?;

                Ok(Operand::Register(destination))
            }
            ExpressionKind::StructLiteral { adt, fields } => {
                let operands = fields
                    .iter()
                    .map(|field| self.lower_expression(field))
                    .collect::<Result<Vec<_>, _>>()?;

                let destination = self.builder.allocate_register(expression.ty.clone());
                self.builder.push(Instruction::Aggregate {
                    destination,
                    kind: AggregateKind::Struct(*adt),
                    operands,
                })?;

                Ok(Operand::Register(destination))
            }
            ExpressionKind::EnumLiteral {
                adt,
                variant_index,
                payload,
            } => {
                let operands = payload
                    .iter()
                    .map(|field| self.lower_expression(field))
                    .collect::<Result<Vec<_>, _>>()?;

                let destination = self.builder.allocate_register(expression.ty.clone());
                self.builder.push(Instruction::Aggregate {
                    destination,
                    kind: AggregateKind::Variant(*adt, *variant_index),
                    operands,
                })?;

                Ok(Operand::Register(destination))
            }
            ExpressionKind::Call { callee, arguments } => {
                let Some(signature) = self.symbols.get(callee) else {
                    return Err(LoweringError::UnresolvedCallee {
                        name: *callee,
                        span: expression.span,
                    });
                };

                // the tree is typed, so arity mismatches are front end bugs
                debug_assert_eq!(arguments.len(), signature.parameter_types.len());
                let return_type = signature.return_type.clone();

                let arguments = arguments
                    .iter()
                    .map(|argument| self.lower_expression(argument))
                    .collect::<Result<Vec<_>, _>>()?;

                let destination = if return_type.is_unit() {
                    None
                } else {
                    Some(self.builder.allocate_register(return_type))
                };

                self.builder.push(Instruction::Call {
                    destination,
                    callee: Callee::Named(*callee),
                    arguments,
                })?;

                Ok(match destination {
                    Some(register) => Operand::Register(register),
                    None => Operand::Immediate(Immediate::Unit),
                })
            }
            ExpressionKind::Ref(name) => {
                let source = self.lookup(*name, expression.span)?;
                let destination = self.builder.allocate_register(expression.ty.clone());

                self.builder.push(Instruction::Ref {
                    destination,
                    source,
                })?;

                Ok(Operand::Register(destination))
            }
            ExpressionKind::Deref(pointer) => {
                let source = self.lower_expression(pointer)?;
                let destination = self.builder.allocate_register(expression.ty.clone());

                self.builder.push(Instruction::Deref {
                    destination,
                    source,
                })?;

                Ok(Operand::Register(destination))
            }
            ExpressionKind::If {
                condition,
                positive,
                negative,
            } => self.lower_if(expression, condition, positive, negative.as_ref()),
            ExpressionKind::Block(block) => {
                let tail = self.lower_block(block)?;
                Ok(tail.unwrap_or(Operand::Immediate(Immediate::Unit)))
            }
        }
    }

    fn lower_if(
        &mut self,
        expression: &Expression,
        condition: &Expression,
        positive: &hir::Block,
        negative: Option<&hir::Block>,
    ) -> Result<Operand, LoweringError> {
        let condition = self.lower_expression(condition)?;

        let positive_block = self.builder.create_block();
        let merge_block = self.builder.create_block();
        let negative_block = match negative {
            Some(_) => self.builder.create_block(),
            None => merge_block,
        };

        // a value-producing if writes both arms into one result register
        let result = if expression.ty.is_unit() {
            None
        } else {
            Some(self.builder.allocate_register(expression.ty.clone()))
        };

        self.builder.terminate(Terminator::Branch {
            condition,
            positive: positive_block,
            negative: negative_block,
        })?;

        self.builder.switch_to_block(positive_block);
        let value = self.lower_block(positive)?;
        self.close_arm(result, value, merge_block)?;

        if let Some(negative) = negative {
            self.builder.switch_to_block(negative_block);
            let value = self.lower_block(negative)?;
            self.close_arm(result, value, merge_block)?;
        }

        self.builder.switch_to_block(merge_block);

        Ok(match result {
            Some(register) => Operand::Register(register),
            None => Operand::Immediate(Immediate::Unit),
        })
    }

    fn close_arm(
        &mut self,
        result: Option<RegisterId>,
        value: Option<Operand>,
        merge_block: BlockId,
    ) -> Result<(), LoweringError> {
        if self.builder.is_terminated(self.builder.current_block()) {
            return Ok(());
        }

        if let (Some(result), Some(value)) = (result, value) {
            self.builder.push(Instruction::Move {
                destination: result,
                source: value,
            })?;
        }

        self.builder.terminate(Terminator::Jump {
            target: merge_block,
        })?;

        Ok(())
    }

    fn ensure_register(&mut self, ty: Type, operand: Operand) -> Result<RegisterId, LoweringError> {
        match operand {
            Operand::Register(register) => Ok(register),
            Operand::Immediate(_) => Ok(self.builder.define(ty, operand)?),
        }
    }

    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn bind(&mut self, name: InternedSymbol, register: RegisterId) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name, register);
        }
    }

    fn lookup(&self, name: InternedSymbol, span: Span) -> Result<RegisterId, LoweringError> {
        for scope in self.scopes.iter().rev() {
            if let Some(register) = scope.get(&name) {
                return Ok(*register);
            }
        }

        Err(LoweringError::UnresolvedName { name, span })
    }
}
