//! Incremental construction of function bodies.
//!
//! The builder owns all mutation: registers are allocated up front, blocks
//! are created and filled one instruction at a time, and every append
//! validates its register references against what is already defined. A body
//! only leaves the builder through [`FunctionBuilder::finish`], which checks
//! that every block is terminated, so downstream passes never see a
//! half-built function.

use crate::{
    index::IndexVec,
    intern::InternedSymbol,
    middle::{
        mir::{
            Block, BlockId, Function, Instruction, Operand, Register, RegisterId,
            StructuralError, Terminator,
        },
        ty::Type,
    },
    span::Span,
};

struct BlockInProgress {
    instructions: Vec<Instruction>,
    terminator: Option<Terminator>,
}

pub struct FunctionBuilder {
    name: InternedSymbol,
    parameters: Vec<RegisterId>,
    return_type: Type,
    registers: IndexVec<RegisterId, Register>,
    blocks: IndexVec<BlockId, BlockInProgress>,
    /// Which registers have a definition so far, in append order. Parameters
    /// count as defined on entry.
    defined: Vec<bool>,
    current: BlockId,
    span: Span,
}

impl FunctionBuilder {
    /// Creates a builder with an empty entry block and one pre-defined
    /// register per parameter
    pub fn new(
        name: InternedSymbol,
        parameter_types: impl IntoIterator<Item = Type>,
        return_type: Type,
        span: Span,
    ) -> Self {
        let mut registers = IndexVec::new();
        let mut defined = Vec::new();
        let mut parameters = Vec::new();

        for ty in parameter_types {
            parameters.push(registers.push(Register { ty }));
            defined.push(true);
        }

        let mut blocks = IndexVec::new();
        let entry = blocks.push(BlockInProgress {
            instructions: Vec::new(),
            terminator: None,
        });

        Self {
            name,
            parameters,
            return_type,
            registers,
            blocks,
            defined,
            current: entry,
            span,
        }
    }

    pub fn name(&self) -> InternedSymbol {
        self.name
    }

    pub fn parameter(&self, index: usize) -> RegisterId {
        self.parameters[index]
    }

    pub fn return_type(&self) -> &Type {
        &self.return_type
    }

    /// Allocates a fresh register. The register is not usable as an operand
    /// until some instruction defines it.
    pub fn allocate_register(&mut self, ty: Type) -> RegisterId {
        self.defined.push(false);
        self.registers.push(Register { ty })
    }

    pub fn register_type(&self, register: RegisterId) -> &Type {
        &self.registers[register].ty
    }

    /// Creates an empty, unterminated block and returns its id without
    /// switching to it
    pub fn create_block(&mut self) -> BlockId {
        self.blocks.push(BlockInProgress {
            instructions: Vec::new(),
            terminator: None,
        })
    }

    /// Makes `block` the target of subsequent appends
    pub fn switch_to_block(&mut self, block: BlockId) {
        self.current = block;
    }

    pub fn current_block(&self) -> BlockId {
        self.current
    }

    /// Appends `instruction` to the current block.
    ///
    /// Fails with [`StructuralError::DanglingReference`] if any operand
    /// names a register no earlier append has defined, and with
    /// [`StructuralError::TerminatedBlock`] if the block is already closed.
    /// On success the instruction's destination becomes defined.
    pub fn push(&mut self, instruction: Instruction) -> Result<(), StructuralError> {
        if self.blocks[self.current].terminator.is_some() {
            return Err(StructuralError::TerminatedBlock(self.current));
        }

        for register in instruction.operand_registers() {
            self.check_defined(register)?;
        }

        if let Some(destination) = instruction.destination() {
            self.defined[crate::index::Index::index(destination)] = true;
        }

        self.blocks[self.current].instructions.push(instruction);

        Ok(())
    }

    /// Closes the current block with `terminator`. Target blocks must already
    /// exist; a second terminator is rejected.
    pub fn terminate(&mut self, terminator: Terminator) -> Result<(), StructuralError> {
        if self.blocks[self.current].terminator.is_some() {
            return Err(StructuralError::TerminatedBlock(self.current));
        }

        for successor in terminator.successors() {
            if self.blocks.get(successor).is_none() {
                return Err(StructuralError::UnknownBlock(successor));
            }
        }

        if let Some(register) = terminator.operand_register() {
            self.check_defined(register)?;
        }

        self.blocks[self.current].terminator = Some(terminator);

        Ok(())
    }

    pub fn is_terminated(&self, block: BlockId) -> bool {
        self.blocks[block].terminator.is_some()
    }

    /// Convenience for the common move-into-fresh-register pattern
    pub fn define(&mut self, ty: Type, source: Operand) -> Result<RegisterId, StructuralError> {
        let destination = self.allocate_register(ty);
        self.push(Instruction::Move {
            destination,
            source,
        })?;

        Ok(destination)
    }

    /// Seals the body. Every block must be terminated; the returned
    /// [`Function`] is immutable.
    pub fn finish(self) -> Result<Function, StructuralError> {
        let mut blocks = IndexVec::new();

        for (id, block) in self.blocks.enumerate() {
            let Some(terminator) = block.terminator.clone() else {
                return Err(StructuralError::MissingTerminator(id));
            };

            blocks.push(Block {
                instructions: block.instructions.clone(),
                terminator,
            });
        }

        log::trace!(
            "builder: finished `{}` with {} block(s), {} register(s)",
            self.name,
            blocks.len(),
            self.registers.len()
        );

        Ok(Function {
            name: self.name,
            parameters: self.parameters,
            return_type: self.return_type,
            registers: self.registers,
            blocks,
            span: self.span,
        })
    }

    fn check_defined(&self, register: RegisterId) -> Result<(), StructuralError> {
        let index = crate::index::Index::index(register);

        if !self.defined.get(index).copied().unwrap_or(false) {
            return Err(StructuralError::DanglingReference(register));
        }

        Ok(())
    }
}
