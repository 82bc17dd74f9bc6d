use core::fmt;

use crate::code::CodeBlock;
use crate::constants::ConstantPool;
use crate::lines::LineTracker;

/// A compiled unit: code, the constants it refers to, and its line table.
#[derive(Debug, Default)]
pub struct Chunk {
    code: CodeBlock,
    constants: ConstantPool,
    lines: LineTracker,
}

impl Chunk {
    pub fn new(code: CodeBlock, constants: ConstantPool, lines: LineTracker) -> Self {
        Self {
            code,
            constants,
            lines,
        }
    }

    #[inline(always)]
    pub fn code(&self) -> &CodeBlock {
        &self.code
    }

    #[inline(always)]
    pub fn constants(&self) -> &ConstantPool {
        &self.constants
    }

    pub fn lines(&self) -> &LineTracker {
        &self.lines
    }

    pub fn line_for(&self, ip: usize) -> Option<u32> {
        self.lines.line_for(ip)
    }
}

/// One instruction per line, prefixed with its index and source line.
impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (ip, decoded) in self.code.instructions().enumerate() {
            match self.lines.line_for(ip) {
                Some(line) => write!(f, "{ip:04} {line:>4} ")?,
                None => write!(f, "{ip:04}    - ")?,
            }
            match decoded {
                Ok(instruction) => writeln!(f, "{instruction}")?,
                Err(err) => writeln!(f, "<{err}>")?,
            }
        }
        Ok(())
    }
}
