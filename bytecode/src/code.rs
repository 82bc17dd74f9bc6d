use crate::error::BytecodeError;
use crate::instruction::{Instruction, RawInstruction};

const MIN_CAPACITY: usize = 8;

/// Growable instruction buffer used while compiling a function body.
#[derive(Debug)]
pub struct CodeBlockWriter {
    code: Vec<RawInstruction>,
}

impl CodeBlockWriter {
    pub fn new() -> Self {
        Self::with_capacity(MIN_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            code: Vec::with_capacity(capacity.max(MIN_CAPACITY)),
        }
    }

    /// Number of instructions written, which is also the index of the next one.
    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.code.capacity()
    }

    /// Appends an instruction and returns its index.
    pub fn push(&mut self, instruction: impl Into<RawInstruction>) -> usize {
        if self.code.len() == self.code.capacity() {
            self.code.reserve_exact(self.code.capacity());
        }
        self.code.push(instruction.into());
        self.code.len() - 1
    }

    pub fn finish(self) -> CodeBlock {
        CodeBlock {
            code: self.code[..].into(),
        }
    }
}

impl Default for CodeBlockWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Frozen instruction sequence.
#[derive(Debug, Default)]
pub struct CodeBlock {
    code: Box<[RawInstruction]>,
}

impl CodeBlock {
    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    #[inline(always)]
    pub fn get(&self, ip: usize) -> Result<RawInstruction, BytecodeError> {
        self.code
            .get(ip)
            .copied()
            .ok_or(BytecodeError::IndexOutOfRange {
                index: ip,
                len: self.code.len(),
            })
    }

    pub fn as_slice(&self) -> &[RawInstruction] {
        &self.code
    }

    /// Decodes every instruction in order. Undecodable entries are yielded as
    /// errors in place.
    pub fn instructions(&self) -> impl Iterator<Item = Result<Instruction, BytecodeError>> + '_ {
        self.code.iter().map(|raw| Instruction::decode(*raw))
    }
}
