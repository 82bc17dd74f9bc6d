use crate::chunk::Chunk;
use crate::code::CodeBlockWriter;
use crate::constants::{ConstantPosition, ConstantPoolWriter};
use crate::error::BytecodeError;
use crate::instruction::Instruction;
use crate::lines::LineTracker;
use crate::types::{BuiltInType, Object, Primitive};

/// Assembles a [`Chunk`].
///
/// Every emit helper writes the instruction, any constant it needs, and the
/// current source line in one step. Helpers return the index of the emitted
/// instruction.
#[derive(Debug, Default)]
pub struct ChunkBuilder {
    code: CodeBlockWriter,
    constants: ConstantPoolWriter,
    lines: LineTracker,
    line: Option<u32>,
}

impl ChunkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Source line attributed to the instructions emitted from now on.
    pub fn line(&mut self, line: u32) -> &mut Self {
        self.line = Some(line);
        self
    }

    /// Index of the next instruction.
    pub fn current_offset(&self) -> usize {
        self.code.len()
    }

    pub fn emit(&mut self, instruction: Instruction) -> Result<usize, BytecodeError> {
        if let Some(line) = self.line {
            self.lines.add(self.code.len(), line)?;
        }
        Ok(self.code.push(instruction))
    }

    // ── constant pool ──────────────────────────────────────────────

    /// Writes a constant without emitting anything.
    pub fn write_constant<T: Primitive>(&mut self, value: T) -> Result<ConstantPosition, BytecodeError> {
        self.constants.write(value)
    }

    pub fn write_object(&mut self, object: Option<Object>) -> Result<ConstantPosition, BytecodeError> {
        self.constants.write_object(object)
    }

    // ── emit helpers ───────────────────────────────────────────────

    /// `CONSTANT <T> #pos`
    pub fn constant<T: Primitive>(&mut self, value: T) -> Result<usize, BytecodeError> {
        let position = self.constants.write(value)?;
        self.emit(Instruction::Constant {
            ty: T::TYPE,
            position,
        })
    }

    /// `CONSTANT object #pos`
    pub fn constant_object(&mut self, object: Option<Object>) -> Result<usize, BytecodeError> {
        let position = self.constants.write_object(object)?;
        self.emit(Instruction::Constant {
            ty: BuiltInType::Object,
            position,
        })
    }

    pub fn add(&mut self, ty: BuiltInType) -> Result<usize, BytecodeError> {
        self.emit(Instruction::Add { ty })
    }

    pub fn pop(&mut self, ty: BuiltInType) -> Result<usize, BytecodeError> {
        self.emit(Instruction::Pop { ty })
    }

    /// `GET_LOCAL <ty> [offset]`, offset in words from the frame base.
    pub fn get_local(&mut self, ty: BuiltInType, offset: u8) -> Result<usize, BytecodeError> {
        self.emit(Instruction::GetLocal { ty, offset })
    }

    pub fn set_local(&mut self, ty: BuiltInType, offset: u8) -> Result<usize, BytecodeError> {
        self.emit(Instruction::SetLocal { ty, offset })
    }

    /// `CALL #pos`. `function` is stored as an object constant.
    pub fn call(&mut self, function: Object) -> Result<usize, BytecodeError> {
        let position = self.constants.write_object(Some(function))?;
        self.emit(Instruction::Call { position })
    }

    /// `EXTERNAL_CALL #pos`
    pub fn external_call(&mut self, native: Object) -> Result<usize, BytecodeError> {
        let position = self.constants.write_object(Some(native))?;
        self.emit(Instruction::ExternalCall { position })
    }

    pub fn ret(&mut self) -> Result<usize, BytecodeError> {
        self.emit(Instruction::Return)
    }

    pub fn finish(self) -> Chunk {
        Chunk::new(self.code.finish(), self.constants.finish(), self.lines)
    }
}
